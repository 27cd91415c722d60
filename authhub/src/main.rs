use authhub::config::GatewayConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    let config = GatewayConfig::from_env()?;
    let store = authhub::session_store(&config).await?;
    let sweeper = authhub::spawn_session_sweeper(store.clone(), config.session_sweep);
    let gateway = authhub::build_gateway(&config, store)?;
    log::info!(
        "{} login routes, uatid {}",
        gateway.login_variants.len(),
        if config.uatid.is_some() { "enabled" } else { "disabled" }
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    log::info!("authhub listening on {} ({})", config.bind_addr, config.base_url);
    axum::serve(listener, authhub::app(gateway)).await?;
    sweeper.abort();
    Ok(())
}
