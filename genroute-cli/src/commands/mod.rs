pub mod config;
pub mod dispatch;
pub mod health;
pub mod providers;
pub mod select;
pub mod usage;

pub use config::{handle_config_command, ConfigCommand};
pub use dispatch::{handle_dispatch_command, DispatchArgs};
pub use health::{handle_health_command, HealthCommand};
pub use providers::{handle_providers_command, ProvidersCommand};
pub use select::{handle_select_command, SelectArgs};
pub use usage::{handle_usage_command, UsageCommand};

use genroute_core::{GenrouteConfig, Orchestrator};
use tracing::debug;

/// Build an orchestrator and load persisted budget state without starting the
/// background probe loop; CLI invocations are too short-lived for it.
pub(crate) async fn open_orchestrator(config: GenrouteConfig) -> anyhow::Result<Orchestrator> {
    let orchestrator = Orchestrator::from_config(config).await?;
    orchestrator.initialize().await?;
    debug!(
        "Orchestrator ready with {} provider endpoints",
        orchestrator.clients().len()
    );
    Ok(orchestrator)
}

pub(crate) fn format_cost(cost: f64) -> String {
    if cost >= 1.0 {
        format!("${:.2}", cost)
    } else {
        format!("${:.4}", cost)
    }
}

pub(crate) fn format_percent(rate: f64) -> String {
    format!("{:.1}%", rate * 100.0)
}
