fn main() {
    // Load .env file if present (for development convenience)
    // Silently ignore if not found - production uses system env vars
    let _ = dotenvy::dotenv();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = polyglot_tutor::settings::load_settings();
    // Write back so fields added since the file was created show up in it
    if let Err(e) = polyglot_tutor::settings::save_settings(&settings) {
        log::warn!("Settings: {}", e);
    }
    let settings = settings.with_env_overrides();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("Failed to start async runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(polyglot_tutor::run(settings)) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
