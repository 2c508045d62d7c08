//! Command implementations for the orgctl CLI

use anyhow::{Context, Result};
use orgctl_core::{Connection, OrgContext, OrgctlConfig, SfdxCli};

pub mod apex;
pub mod communities;
pub mod data;
pub mod org;
pub mod package;
pub mod user;

// Re-export main dispatcher functions for flat access from main.rs
pub use apex::run_apex;
pub use communities::run_communities;
pub use data::run_data;
pub use org::run_org;
pub use package::run_package;
pub use user::run_user;

/// Load the user config and the platform-CLI invoker it names.
pub(crate) fn toolbox() -> Result<(OrgctlConfig, SfdxCli)> {
    let config = OrgctlConfig::load().context("failed to load orgctl config")?;
    let cli = SfdxCli::new(&config.cli.binary);
    Ok((config, cli))
}

/// Resolve an authenticated REST connection for a target org.
pub(crate) async fn connect_org(
    config: &OrgctlConfig,
    cli: &SfdxCli,
    target_org: &str,
) -> Result<Connection> {
    let context = OrgContext::resolve(cli, target_org, &config.cli.api_version)
        .await
        .with_context(|| format!("failed to resolve org '{}'", target_org))?;
    Connection::new(context).context("failed to build REST client")
}
