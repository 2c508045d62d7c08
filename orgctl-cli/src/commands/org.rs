//! Scratch/sandbox org lifecycle - create and share

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use orgctl_core::{is_valid_email, run_json, CliInvoker, OrgError, OrgctlConfig, FlagSet};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::ui;

#[derive(Parser, Debug)]
pub struct OrgArgs {
    #[command(subcommand)]
    pub command: OrgCommands,
}

#[derive(Subcommand, Debug)]
pub enum OrgCommands {
    /// Create a scratch or sandbox org, then set it up for development
    Create(CreateArgs),
    /// Share an org's login URL with teammates by email
    Share(ShareArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy, Default)]
pub enum OrgType {
    #[default]
    Scratch,
    Sandbox,
}

impl OrgType {
    fn as_str(&self) -> &'static str {
        match self {
            OrgType::Scratch => "scratch",
            OrgType::Sandbox => "sandbox",
        }
    }
}

#[derive(Parser, Debug)]
pub struct CreateArgs {
    /// Dev hub username or alias
    #[arg(long = "dev-hub", short = 'v', value_name = "ORG")]
    pub dev_hub: String,

    /// Connected-app consumer key
    #[arg(long = "client-id", short = 'i')]
    pub client_id: Option<String>,

    /// Only create the org; skip dependency install and source push
    #[arg(long = "create-only")]
    pub create_only: bool,

    /// Org definition file (falls back to [org].default_definition_file)
    #[arg(long = "definition-file", short = 'f', value_name = "PATH")]
    pub definition_file: Option<PathBuf>,

    /// Duration of the scratch org in days
    #[arg(long = "duration-days", short = 'd', default_value_t = 7, value_parser = clap::value_parser!(u8).range(1..=30))]
    pub duration_days: u8,

    /// Do not include second-generation package ancestors
    #[arg(long = "no-ancestors", short = 'c')]
    pub no_ancestors: bool,

    /// Create the org with no namespace
    #[arg(long = "no-namespace", short = 'n')]
    pub no_namespace: bool,

    /// Type of org to create
    #[arg(long = "type", short = 't', value_enum, default_value = "scratch")]
    pub org_type: OrgType,

    /// Alias for the created org
    #[arg(long = "set-alias", short = 'a')]
    pub set_alias: Option<String>,

    /// Set the created org as the default username
    #[arg(long = "set-default-username", short = 's')]
    pub set_default_username: bool,

    /// Project directory holding sfdx-project.json
    #[arg(long = "project-dir", default_value = ".", value_name = "DIR")]
    pub project_dir: PathBuf,
}

#[derive(Parser, Debug)]
pub struct ShareArgs {
    /// Org username or alias to share
    #[arg(long = "target-org", short = 'u', value_name = "ORG")]
    pub target_org: String,

    /// Dev hub that owns the org (sender of the share email)
    #[arg(long = "dev-hub", short = 'v', value_name = "ORG")]
    pub dev_hub: String,

    /// Recipient email addresses (comma-separated)
    #[arg(long = "email", short = 'e', value_delimiter = ',', required = true)]
    pub email: Vec<String>,
}

pub async fn run_org(args: OrgArgs) -> Result<()> {
    match args.command {
        OrgCommands::Create(create_args) => run_create(create_args).await,
        OrgCommands::Share(share_args) => run_share(share_args).await,
    }
}

async fn run_create(args: CreateArgs) -> Result<()> {
    let (config, cli) = super::toolbox()?;

    let pb = ui::spinner("Creating scratch org");

    match create_and_setup(&cli, &config, &args, &pb).await {
        Ok(username) => {
            let message = format!("Successfully created scratch org {}", username);
            ui::finish_success(pb, &message);
            println!("{}", message);
            Ok(())
        }
        Err(err) => {
            ui::finish_error(pb, "Org creation failed");
            Err(err.into())
        }
    }
}

/// Create the org and, unless --create-only, bring it up to date: project
/// package dependencies first, then a forced source push.
async fn create_and_setup(
    cli: &orgctl_core::SfdxCli,
    config: &OrgctlConfig,
    args: &CreateArgs,
    pb: &Option<indicatif::ProgressBar>,
) -> orgctl_core::Result<String> {
    let username = create_org(cli, config, args).await?;

    if !args.create_only {
        ui::set_status(pb, "Installing dependencies to new scratch org...");
        super::package::install_project_dependencies(cli, &username, &args.project_dir).await?;

        ui::set_status(pb, "Deploying source to new scratch org...");
        push_source(cli, &username).await?;
    }

    Ok(username)
}

/// Run `force:org:create` and extract the created org's username.
async fn create_org(
    cli: &dyn CliInvoker,
    config: &OrgctlConfig,
    args: &CreateArgs,
) -> orgctl_core::Result<String> {
    let flags = create_flags(config, args);
    debug!("{}", flags.render_onto("force:org:create --json"));

    let mut argv = vec!["force:org:create".to_string(), "--json".to_string()];
    argv.extend(flags.to_args());

    let result = run_json(cli, &argv).await?;
    result["username"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| OrgError::unexpected_output("force:org:create (missing username)"))
}

/// Render the create flag set in a stable order. Booleans appear only when
/// set; the definition file falls back to the configured default.
fn create_flags(config: &OrgctlConfig, args: &CreateArgs) -> FlagSet {
    let mut flags = FlagSet::new();

    if let Some(ref client_id) = args.client_id {
        flags.push("clientid", client_id.as_str());
    }

    let definition_file = args
        .definition_file
        .clone()
        .or_else(|| config.org.default_definition_file.clone());
    match definition_file {
        Some(path) => flags.push("definitionfile", path.display().to_string()),
        None => info!("no definition file given; relying on project defaults"),
    }

    flags.push("durationdays", args.duration_days as i64);
    if args.no_ancestors {
        flags.push("noancestors", true);
    }
    if args.no_namespace {
        flags.push("nonamespace", true);
    }
    flags.push("type", args.org_type.as_str());
    if let Some(ref alias) = args.set_alias {
        flags.push("setalias", alias.as_str());
    }
    if args.set_default_username {
        flags.push("setdefaultusername", true);
    }
    flags.push("targetdevhubusername", args.dev_hub.as_str());

    flags
}

/// Push project source to the new org.
async fn push_source(cli: &dyn CliInvoker, username: &str) -> orgctl_core::Result<()> {
    let argv: Vec<String> = [
        "force:source:push", "-f", "-g", "-u", username, "-w", "10", "--json",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    cli.run(&argv).await?;
    info!("deployed source to {}", username);
    Ok(())
}

async fn run_share(args: ShareArgs) -> Result<()> {
    let invalid: Vec<&String> = args.email.iter().filter(|e| !is_valid_email(e)).collect();
    if !invalid.is_empty() {
        anyhow::bail!(
            "Invalid Email Address: [{}]",
            invalid.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
        );
    }

    let (config, cli) = super::toolbox()?;

    let recipients = args.email.join(", ");
    let pb = ui::spinner(format!("Sharing scratch org to {}", recipients));

    let outcome = share_org(&cli, &config, &args).await;
    match outcome {
        Ok(()) => {
            let message = format!("Successfully shared {} with {}", args.target_org, recipients);
            ui::finish_success(pb, &message);
            println!("{}", message);
            Ok(())
        }
        Err(err) => {
            ui::finish_error(pb, "Share failed");
            Err(err)
        }
    }
}

async fn share_org(
    cli: &orgctl_core::SfdxCli,
    config: &OrgctlConfig,
    args: &ShareArgs,
) -> Result<()> {
    let org_url = fetch_org_url(cli, &args.target_org).await?;

    let devhub = super::connect_org(config, cli, &args.dev_hub).await?;
    let payload = build_email_payload(&devhub.context().username, &org_url, &args.email);

    devhub
        .post_json("/actions/standard/emailSimple", &payload)
        .await?;
    Ok(())
}

/// Login URL of the org, via `force:org:open --urlonly`.
async fn fetch_org_url(cli: &dyn CliInvoker, target_org: &str) -> orgctl_core::Result<String> {
    let argv: Vec<String> = [
        "force:org:open", "--urlonly", "--targetusername", target_org, "--json",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    let result = run_json(cli, &argv).await?;
    result["url"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| OrgError::unexpected_output("force:org:open (missing url)"))
}

/// Body for the standard emailSimple action.
fn build_email_payload(devhub_username: &str, org_url: &str, recipients: &[String]) -> Value {
    json!({
        "inputs": [{
            "emailBody": format!(
                "{} has created you a Salesforce org. Here's your login URL: {}. Keep this URL confidential and do not share with others.",
                devhub_username, org_url
            ),
            "emailAddressesArray": recipients,
            "emailSubject": format!("{} created you a new Salesforce org", devhub_username),
            "senderType": "CurrentUser"
        }]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use orgctl_core::MockCli;

    fn base_args() -> CreateArgs {
        CreateArgs {
            dev_hub: "DevHub".into(),
            client_id: None,
            create_only: false,
            definition_file: None,
            duration_days: 7,
            no_ancestors: false,
            no_namespace: false,
            org_type: OrgType::Scratch,
            set_alias: None,
            set_default_username: false,
            project_dir: PathBuf::from("."),
        }
    }

    #[test]
    fn create_flags_render_in_definition_order() {
        let mut args = base_args();
        args.definition_file = Some(PathBuf::from("config/project-scratch-def.json"));
        args.no_ancestors = true;
        args.set_alias = Some("MyScratchOrg".into());

        let flags = create_flags(&OrgctlConfig::default(), &args);
        // a boolean flag renders as a bare switch, leaving its trailing space
        assert_eq!(
            flags.render_onto("force:org:create --json"),
            "force:org:create --json --definitionfile \"config/project-scratch-def.json\" \
             --durationdays 7 --noancestors  --type \"scratch\" --setalias \"MyScratchOrg\" \
             --targetdevhubusername \"DevHub\""
        );
    }

    #[test]
    fn create_flags_fall_back_to_configured_definition() {
        let mut config = OrgctlConfig::default();
        config.org.default_definition_file = Some(PathBuf::from("config/default-def.json"));

        let flags = create_flags(&config, &base_args());
        assert!(flags
            .render_onto("")
            .contains("--definitionfile \"config/default-def.json\""));
    }

    #[tokio::test]
    async fn create_org_returns_new_username() {
        let mock = MockCli::new();
        mock.add_stdout(
            r#"{"status":0,"result":{"orgId":"00D000000000001","username":"test-abc@example.com"}}"#,
        );

        let username = create_org(&mock, &OrgctlConfig::default(), &base_args()).await.unwrap();
        assert_eq!(username, "test-abc@example.com");

        let calls = mock.calls();
        assert_eq!(calls[0][0], "force:org:create");
        assert!(calls[0].contains(&"--targetdevhubusername".to_string()));
    }

    #[tokio::test]
    async fn fetch_org_url_unwraps_result() {
        let mock = MockCli::new();
        mock.add_stdout(r#"{"status":0,"result":{"url":"https://test.salesforce.com/secur/..."}}"#);

        let url = fetch_org_url(&mock, "MyScratchOrg").await.unwrap();
        assert!(url.starts_with("https://test.salesforce.com"));
    }

    #[test]
    fn email_payload_addresses_all_recipients() {
        let payload = build_email_payload(
            "devhub@example.com",
            "https://login.example.com",
            &["a@example.com".to_string(), "b@example.com".to_string()],
        );

        let input = &payload["inputs"][0];
        assert_eq!(input["emailAddressesArray"].as_array().unwrap().len(), 2);
        assert!(input["emailBody"].as_str().unwrap().contains("https://login.example.com"));
        assert_eq!(input["senderType"], "CurrentUser");
    }
}
