//! `codecouncil status` — Show the effective configuration.

use codecouncil_config::AppConfig;
use tracing::warn;

pub async fn run(check: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let provider = super::default_provider(&config)?;

    println!("CodeCouncil Status");
    println!("==================");
    println!("  Config dir:     {}", AppConfig::config_dir().display());
    println!("  Provider:       {}", provider.name());
    println!("  Model:          {}", config.default_model);
    println!("  Temperature:    {}", config.default_temperature);
    println!(
        "  API key:        {}",
        if provider.has_fallback_credential() { "set" } else { "not set" }
    );
    println!("  Max iterations: {}", config.agent.max_iterations);
    println!("  Default role:   {}", config.agent.default_role);
    println!("  Max sessions:   {}", config.agent.max_sessions);
    println!("  Gateway:        {}:{}", config.gateway.host, config.gateway.port);
    println!(
        "  Web search:     {}",
        config.tools.search_endpoint.as_deref().unwrap_or("offline")
    );

    let mut providers: Vec<&str> = config.providers.keys().map(String::as_str).collect();
    providers.sort_unstable();
    if !providers.is_empty() {
        println!("  Providers:      {}", providers.join(", "));
    }

    if check {
        match provider.health_check().await {
            Ok(true) => println!("  Reachable:      yes"),
            Ok(false) => println!("  Reachable:      no (rejected or no key)"),
            Err(e) => {
                warn!(provider = provider.name(), error = %e, "Provider health check failed");
                println!("  Reachable:      no ({e})");
            }
        }
    }

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file — run `codecouncil onboard` first");
    }

    Ok(())
}
