//! Community management - describe and publish via the connect REST API

use anyhow::Result;
use clap::{Parser, Subcommand};
use futures::future::join_all;
use orgctl_core::{Connection, OrgError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::ui;

#[derive(Parser, Debug)]
pub struct CommunitiesArgs {
    #[command(subcommand)]
    pub command: CommunitiesCommands,
}

#[derive(Subcommand, Debug)]
pub enum CommunitiesCommands {
    /// Fetch community details from the target org
    Describe(DescribeArgs),
    /// Publish communities in the target org
    Publish(PublishArgs),
}

#[derive(Parser, Debug)]
pub struct DescribeArgs {
    /// Target org username or alias
    #[arg(long = "target-org", short = 'u', value_name = "ORG")]
    pub target_org: String,

    /// Only the community with this name (case-insensitive)
    #[arg(long, short = 'n')]
    pub name: Option<String>,

    /// Write the details to ./communities.json
    #[arg(long)]
    pub store: bool,
}

#[derive(Parser, Debug)]
pub struct PublishArgs {
    /// Target org username or alias
    #[arg(long = "target-org", short = 'u', value_name = "ORG")]
    pub target_org: String,

    /// Only the community with this name (case-insensitive)
    #[arg(long, short = 'n')]
    pub name: Option<String>,
}

/// One community as returned by `/connect/communities/`. Extra fields ride
/// along untouched so describe output keeps the full payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Community {
    pub id: String,
    pub name: String,
    #[serde(rename = "siteAsContainerEnabled", default)]
    pub site_as_container_enabled: bool,
    #[serde(flatten)]
    pub rest: serde_json::Map<String, Value>,
}

pub async fn run_communities(args: CommunitiesArgs) -> Result<()> {
    match args.command {
        CommunitiesCommands::Describe(describe_args) => run_describe(describe_args).await,
        CommunitiesCommands::Publish(publish_args) => run_publish(publish_args).await,
    }
}

async fn run_describe(args: DescribeArgs) -> Result<()> {
    let (config, cli) = super::toolbox()?;
    let conn = super::connect_org(&config, &cli, &args.target_org).await?;

    let pb = ui::spinner(format!(
        "Fetching {} community details",
        args.name.as_deref().unwrap_or("")
    ));

    let communities = match fetch_communities(&conn, args.name.as_deref()).await {
        Ok(communities) => communities,
        Err(err) => {
            ui::finish_error(pb, "Failed to fetch communities");
            return Err(err.into());
        }
    };

    let details = serde_json::to_string_pretty(&communities)?;

    if args.store {
        std::fs::write("communities.json", &details)?;
        ui::finish_success(
            pb,
            "Successfully stored community details to communities.json. (./communities.json)",
        );
    } else {
        ui::finish_success(pb, "Fetched community details");
    }

    println!("{}", details);
    Ok(())
}

async fn run_publish(args: PublishArgs) -> Result<()> {
    let (config, cli) = super::toolbox()?;
    let conn = super::connect_org(&config, &cli, &args.target_org).await?;

    let communities = fetch_communities(&conn, args.name.as_deref()).await?;
    let names: Vec<&str> = communities.iter().map(|c| c.name.as_str()).collect();

    let pb = ui::spinner(format!("Publishing communities [{}]", names.join(", ")));

    match publish_communities(&conn, &communities).await {
        Ok(results) => {
            ui::finish_success(pb, format!("Published communities [{}]", names.join(", ")));
            println!("{}", serde_json::to_string_pretty(&results)?);
            Ok(())
        }
        Err(err) => {
            ui::finish_error(pb, "Publish failed");
            Err(err.into())
        }
    }
}

/// Fetch communities from the org, keeping only real communities (sites
/// without a community container are excluded) and applying the optional
/// case-insensitive name filter.
pub(crate) async fn fetch_communities(
    conn: &Connection,
    name: Option<&str>,
) -> orgctl_core::Result<Vec<Community>> {
    let payload = conn.get_json("/connect/communities/").await?;
    let communities = parse_communities(&payload)?;
    let filtered = filter_communities(communities, name);

    if filtered.is_empty() {
        let message = match name {
            Some(name) => format!("Community {} not found", name),
            None => "No communities found".to_string(),
        };
        return Err(OrgError::validation(message));
    }

    info!("{} matching communities", filtered.len());
    Ok(filtered)
}

fn parse_communities(payload: &Value) -> orgctl_core::Result<Vec<Community>> {
    let list = payload
        .get("communities")
        .cloned()
        .ok_or_else(|| OrgError::unexpected_output("/connect/communities/"))?;
    serde_json::from_value(list).map_err(|err| OrgError::json("communities list", err))
}

fn filter_communities(communities: Vec<Community>, name: Option<&str>) -> Vec<Community> {
    let name = name.map(str::to_lowercase);
    communities
        .into_iter()
        .filter(|c| c.site_as_container_enabled)
        .filter(|c| match &name {
            Some(name) => c.name.to_lowercase() == *name,
            None => true,
        })
        .collect()
}

/// Publish all given communities concurrently. Every publish is attempted;
/// failures are collected and reported together with the ids that did
/// succeed.
pub(crate) async fn publish_communities(
    conn: &Connection,
    communities: &[Community],
) -> orgctl_core::Result<Vec<Value>> {
    let body = json!({});
    let outcomes = join_all(communities.iter().map(|community| {
        let path = format!("/connect/communities/{}/publish", community.id);
        let body = &body;
        async move { conn.post_json(&path, body).await }
    }))
    .await;

    let mut results = Vec::new();
    let mut failures = Vec::new();
    for (community, outcome) in communities.iter().zip(outcomes) {
        match outcome {
            Ok(result) => results.push(result),
            Err(err) => failures.push(format!("{}: {}", community.name, err)),
        }
    }

    if !failures.is_empty() {
        let mut report = format!(
            "Failed to publish {} of {} communities:",
            failures.len(),
            communities.len()
        );
        for failure in &failures {
            report.push_str(&format!("\n  ✗ {}", failure));
        }
        if !results.is_empty() {
            report.push_str(&format!(
                "\npublished before the failure: {}",
                serde_json::to_string(&results).unwrap_or_default()
            ));
        }
        return Err(OrgError::external_command(report));
    }

    Ok(results)
}
