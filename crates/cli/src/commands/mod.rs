pub mod agent;
pub mod gateway;
pub mod onboard;
pub mod status;

use std::sync::Arc;

use codecouncil_config::AppConfig;
use codecouncil_core::provider::Provider;

/// The default provider wired the way the gateway wires it, so a key set
/// under `[providers.<name>]` counts as the deployment key.
pub(crate) fn default_provider(
    config: &AppConfig,
) -> Result<Arc<dyn Provider>, Box<dyn std::error::Error>> {
    let router = codecouncil_providers::router::build_from_config(config);
    Ok(router.default().ok_or("No default provider configured")?)
}
