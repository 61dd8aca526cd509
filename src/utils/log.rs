pub fn log_init() {
    use std::io::Write;
    // level comes from RUST_LOG, info when unset
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stdout)
        .format(|buf, record| writeln!(buf, "{}: {}", record.level(), record.args()))
        .init();
}

/// Logger for unit tests, safe to call from every test.
pub fn log_init_for_test() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(::log::LevelFilter::Debug)
        .try_init();
}
