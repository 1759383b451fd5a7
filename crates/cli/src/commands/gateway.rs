//! `codecouncil gateway` — Start the HTTP API server.

use codecouncil_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("CodeCouncil Gateway");
    println!("   Listening:      {}:{}", config.gateway.host, config.gateway.port);
    println!("   Allowed origin: {}", config.gateway.allowed_origin);
    let provider = super::default_provider(&config)?;
    println!(
        "   Deployment key: {}",
        if provider.has_fallback_credential() { "configured" } else { "none (callers must send X-Api-Key)" }
    );

    codecouncil_gateway::start(config).await?;

    Ok(())
}
