//! orgctl CLI - org administration on top of the platform CLI and REST API
//!
//! This is the main entry point for the orgctl command-line tool, which provides:
//! - Anonymous Apex execution (`apex` subcommand)
//! - Community describe/publish (`communities` subcommand)
//! - SObject-tree data import with record-type resolution (`data` subcommand)
//! - Scratch/sandbox org creation and sharing (`org` subcommand)
//! - Package and project-dependency installation (`package` subcommand)
//! - User email/password/permission-set management (`user` subcommand)

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod commands;
mod ui;

#[derive(Parser, Debug)]
#[command(
    name = "orgctl",
    author,
    version,
    about = "Administrative automation for cloud tenant orgs",
    long_about = "Orchestrates the platform org-management CLI and REST API to run Apex, \
                  manage communities, import data trees, create and share orgs, install \
                  packages, and manage user credentials and permissions."
)]
struct Cli {
    /// Suppress progress spinners (for script consumption)
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Execute anonymous Apex against an org
    Apex(commands::apex::ApexArgs),
    /// Describe and publish an org's communities
    Communities(commands::communities::CommunitiesArgs),
    /// Import SObject-tree data into an org
    Data(commands::data::DataArgs),
    /// Create and share scratch/sandbox orgs
    Org(commands::org::OrgArgs),
    /// Install packages and project dependencies
    Package(commands::package::PackageArgs),
    /// Manage org users (email, passwords, permission sets)
    User(commands::user::UserArgs),
    /// Generate shell completion scripts
    Completions(CompletionsArgs),
}

#[derive(Parser, Debug)]
struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    shell: Shell,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)] // PowerShell is a proper noun, not a suffix
enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

fn init_tracing() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|err| anyhow!(err))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing().ok();
    let cli = Cli::parse();

    // Initialize UI quiet mode from flag, env var, and TTY detection
    ui::init_quiet_mode(cli.quiet);

    match cli.command {
        Commands::Apex(args) => commands::run_apex(args).await?,
        Commands::Communities(args) => commands::run_communities(args).await?,
        Commands::Data(args) => commands::run_data(args).await?,
        Commands::Org(args) => commands::run_org(args).await?,
        Commands::Package(args) => commands::run_package(args).await?,
        Commands::User(args) => commands::run_user(args).await?,
        Commands::Completions(args) => run_completions(args)?,
    }
    Ok(())
}

fn run_completions(args: CompletionsArgs) -> Result<()> {
    use clap::CommandFactory;
    use clap_complete::{generate, Shell as CompletionShell};
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();

    let shell = match args.shell {
        Shell::Bash => CompletionShell::Bash,
        Shell::Zsh => CompletionShell::Zsh,
        Shell::Fish => CompletionShell::Fish,
        Shell::PowerShell => CompletionShell::PowerShell,
        Shell::Elvish => CompletionShell::Elvish,
    };

    generate(shell, &mut cmd, bin_name, &mut io::stdout());

    Ok(())
}
