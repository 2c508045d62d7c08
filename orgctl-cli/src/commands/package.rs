//! Package installation - single packages and project dependencies

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use futures::future::join_all;
use orgctl_core::project::SfdxProject;
use orgctl_core::{
    poll_until, run_json, CliInvoker, FlagSet, OrgError, PollConfig, PollStatus,
};
use serde_json::Value;
use tracing::{debug, info};

use crate::ui;

#[derive(Parser, Debug)]
pub struct PackageArgs {
    #[command(subcommand)]
    pub command: PackageCommands,
}

#[derive(Subcommand, Debug)]
pub enum PackageCommands {
    /// Install a package into the target org without prompting
    Install(InstallArgs),
    /// Project dependency operations
    #[command(subcommand)]
    Dependency(DependencyCommands),
}

#[derive(Subcommand, Debug)]
pub enum DependencyCommands {
    /// Install missing sfdx-project.json dependencies into the target org
    Install(DependencyInstallArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy, Default)]
pub enum ApexCompile {
    #[default]
    #[value(name = "all")]
    All,
    #[value(name = "package")]
    Package,
}

#[derive(ValueEnum, Debug, Clone, Copy, Default)]
pub enum SecurityType {
    #[value(name = "AllUsers")]
    AllUsers,
    #[default]
    #[value(name = "AdminsOnly")]
    AdminsOnly,
}

#[derive(ValueEnum, Debug, Clone, Copy, Default)]
pub enum UpgradeType {
    #[value(name = "DeprecateOnly")]
    DeprecateOnly,
    #[default]
    #[value(name = "Mixed")]
    Mixed,
    #[value(name = "Delete")]
    Delete,
}

impl ApexCompile {
    fn as_str(&self) -> &'static str {
        match self {
            ApexCompile::All => "all",
            ApexCompile::Package => "package",
        }
    }
}

impl SecurityType {
    fn as_str(&self) -> &'static str {
        match self {
            SecurityType::AllUsers => "AllUsers",
            SecurityType::AdminsOnly => "AdminsOnly",
        }
    }
}

impl UpgradeType {
    fn as_str(&self) -> &'static str {
        match self {
            UpgradeType::DeprecateOnly => "DeprecateOnly",
            UpgradeType::Mixed => "Mixed",
            UpgradeType::Delete => "Delete",
        }
    }
}

#[derive(Parser, Debug)]
pub struct InstallArgs {
    /// Target org username or alias
    #[arg(long = "target-org", short = 'u', value_name = "ORG")]
    pub target_org: String,

    /// Package version id or alias to install
    #[arg(long, short = 'p')]
    pub package: String,

    /// Apex compilation scope after install
    #[arg(long = "apex-compile", short = 'a', value_enum, default_value = "all")]
    pub apex_compile: ApexCompile,

    /// Installation key for key-protected packages
    #[arg(long = "installation-key", short = 'k')]
    pub installation_key: Option<String>,

    /// Who gets access to the installed package
    #[arg(long = "security-type", short = 's', value_enum, default_value = "AdminsOnly")]
    pub security_type: SecurityType,

    /// How removed components are handled on upgrade
    #[arg(long = "upgrade-type", short = 't', value_enum, default_value = "Mixed")]
    pub upgrade_type: UpgradeType,

    /// Directory of .apex files to run before the install
    #[arg(long = "pre-scripts", short = 'r', value_name = "DIR")]
    pub pre_scripts: Option<PathBuf>,

    /// Directory of .apex files to run after the install
    #[arg(long = "post-scripts", short = 'o', value_name = "DIR")]
    pub post_scripts: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct DependencyInstallArgs {
    /// Target org username or alias
    #[arg(long = "target-org", short = 'u', value_name = "ORG")]
    pub target_org: String,

    /// Project directory holding sfdx-project.json
    #[arg(long = "project-dir", default_value = ".", value_name = "DIR")]
    pub project_dir: PathBuf,
}

pub async fn run_package(args: PackageArgs) -> Result<()> {
    match args.command {
        PackageCommands::Install(install_args) => run_install(install_args).await,
        PackageCommands::Dependency(DependencyCommands::Install(dependency_args)) => {
            run_dependency_install(dependency_args).await
        }
    }
}

async fn run_install(args: InstallArgs) -> Result<()> {
    let (config, cli) = super::toolbox()?;

    let pb = ui::spinner(format!(
        "Installing package [{}] to {}",
        args.package, args.target_org
    ));

    if let Some(ref dir) = args.pre_scripts {
        ui::set_status(&pb, "Running pre-installation scripts...");
        if let Err(err) = super::apex::execute_directory(&cli, &args.target_org, dir, false).await {
            ui::finish_error(pb, "Pre-installation scripts failed");
            return Err(err.into());
        }
    }

    let message = match install_package(&cli, config.poll_config(), &args).await {
        Ok(message) => message,
        Err(err) => {
            ui::finish_error(pb, "Package install failed");
            return Err(err.into());
        }
    };

    if let Some(ref dir) = args.post_scripts {
        ui::set_status(&pb, "Running post-installation scripts...");
        if let Err(err) = super::apex::execute_directory(&cli, &args.target_org, dir, false).await {
            ui::finish_error(pb, "Post-installation scripts failed");
            return Err(err.into());
        }
    }

    ui::finish_success(pb, &message);
    println!("{}", message);
    Ok(())
}

/// Kick off the install and, when it comes back still in flight, follow the
/// install request through the report command until it lands.
async fn install_package(
    cli: &dyn CliInvoker,
    poll_config: PollConfig,
    args: &InstallArgs,
) -> orgctl_core::Result<String> {
    let mut flags = FlagSet::new();
    flags.push("apexcompile", args.apex_compile.as_str());
    if let Some(ref key) = args.installation_key {
        flags.push("installationkey", key.as_str());
    }
    flags.push("package", args.package.as_str());
    flags.push("securitytype", args.security_type.as_str());
    flags.push("upgradetype", args.upgrade_type.as_str());
    flags.push("targetusername", args.target_org.as_str());

    debug!("{}", flags.render_onto("force:package:install --noprompt --wait 10 --json"));

    let mut argv: Vec<String> = ["force:package:install", "--noprompt", "--wait", "10", "--json"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    argv.extend(flags.to_args());

    let result = run_json(cli, &argv).await?;

    let final_report = if result["Status"].as_str() == Some("SUCCESS") {
        result
    } else {
        let request_id = result["Id"]
            .as_str()
            .ok_or_else(|| OrgError::unexpected_output("force:package:install (missing Id)"))?
            .to_string();
        poll_install_report(cli, poll_config, &args.target_org, &request_id).await?
    };

    let version_key = final_report["SubscriberPackageVersionKey"]
        .as_str()
        .unwrap_or(args.package.as_str());
    Ok(format!("Successfully installed package [{}]", version_key))
}

/// Poll the install report until it reaches SUCCESS. An ERROR status or a
/// failing report command aborts with its diagnostic text; running out of
/// attempts is a PollTimeout.
async fn poll_install_report(
    cli: &dyn CliInvoker,
    poll_config: PollConfig,
    target_org: &str,
    request_id: &str,
) -> orgctl_core::Result<Value> {
    poll_until(poll_config, || async move {
        let argv: Vec<String> = [
            "force:package:install:report",
            "--requestid",
            request_id,
            "--targetusername",
            target_org,
            "--json",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let report = run_json(cli, &argv).await.map_err(|err| {
            OrgError::external_command(format!(
                "Failed to fetch install status with request Id: {}.\n{}",
                request_id, err
            ))
        })?;

        match report["Status"].as_str() {
            Some("SUCCESS") => Ok(PollStatus::Ready(report)),
            Some("ERROR") => Err(OrgError::external_command(format!(
                "Package install request {} failed.\n{}",
                request_id, report
            ))),
            _ => Ok(PollStatus::Pending),
        }
    })
    .await
}

async fn run_dependency_install(args: DependencyInstallArgs) -> Result<()> {
    let (_config, cli) = super::toolbox()?;

    let pb = ui::spinner("Checking package dependencies...");

    match install_project_dependencies(&cli, &args.target_org, &args.project_dir).await {
        Ok(message) => {
            ui::finish_success(pb, &message);
            println!("{}", message);
            Ok(())
        }
        Err(err) => {
            ui::finish_error(pb, "Dependency install failed");
            Err(err.into())
        }
    }
}

/// Install every sfdx-project.json dependency that is not already present
/// in the target org at the aliased version. All missing dependencies are
/// installed concurrently; every failure is collected and reported, along
/// with the packages that did install.
pub(crate) async fn install_project_dependencies(
    cli: &dyn CliInvoker,
    target_org: &str,
    project_dir: &Path,
) -> orgctl_core::Result<String> {
    let project = SfdxProject::load(project_dir)?;
    let mut dependencies = project.dependency_versions();

    if dependencies.is_empty() {
        return Ok("No dependencies".to_string());
    }

    for (name, version_id) in installed_packages(cli, target_org).await? {
        if dependencies.get(&name) == Some(&version_id) {
            dependencies.remove(&name);
        }
    }

    if dependencies.is_empty() {
        return Ok(format!("Org {} is up to date.", target_org));
    }

    let names: Vec<String> = dependencies.keys().cloned().collect();
    info!("installing dependencies: {}", names.join(", "));

    let outcomes = join_all(dependencies.iter().map(|(name, version_id)| async move {
        let argv: Vec<String> = [
            "force:package:install",
            "-a",
            "package",
            "-b",
            "10",
            "-p",
            version_id,
            "-t",
            "DeprecateOnly",
            "-u",
            target_org,
            "-w",
            "10",
            "-r",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        (name.clone(), cli.run(&argv).await)
    }))
    .await;

    let mut installed = Vec::new();
    let mut failures = Vec::new();
    for (name, outcome) in outcomes {
        match outcome {
            Ok(_) => installed.push(name),
            Err(err) => failures.push(format!("{}: {}", name, err)),
        }
    }

    if !failures.is_empty() {
        let mut report = format!(
            "Failed to install {} of {} dependencies:",
            failures.len(),
            names.len()
        );
        for failure in &failures {
            report.push_str(&format!("\n  ✗ {}", failure));
        }
        if !installed.is_empty() {
            report.push_str(&format!("\ninstalled: {}", installed.join(", ")));
        }
        return Err(OrgError::external_command(report));
    }

    Ok(format!(
        "Successfully installed the following dependencies: {} to {}",
        names.join(", "),
        target_org
    ))
}

/// Installed packages in the org as (name, version id) pairs.
async fn installed_packages(
    cli: &dyn CliInvoker,
    target_org: &str,
) -> orgctl_core::Result<Vec<(String, String)>> {
    let argv: Vec<String> = ["force:package:installed:list", "-u", target_org, "--json"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    let result = run_json(cli, &argv).await?;
    let list = result
        .as_array()
        .ok_or_else(|| OrgError::unexpected_output("force:package:installed:list"))?;

    Ok(list
        .iter()
        .filter_map(|el| {
            Some((
                el["SubscriberPackageName"].as_str()?.to_string(),
                el["SubscriberPackageVersionId"].as_str()?.to_string(),
            ))
        })
        .collect())
}
