//! SObject-tree data import with record-type substitution
//!
//! Tree files may reference record types by developer name; the org wants
//! record-type ids. Before import the affected files are rewritten in place
//! with the resolved ids, and the original contents are restored afterwards
//! whether or not the import succeeded.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use orgctl_core::{soql, CliInvoker, Connection, FlagSet, OrgError};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::ui;

#[derive(Parser, Debug)]
pub struct DataArgs {
    #[command(subcommand)]
    pub command: DataCommands,
}

#[derive(Subcommand, Debug)]
pub enum DataCommands {
    /// SObject-tree operations
    #[command(subcommand)]
    Tree(TreeCommands),
}

#[derive(Subcommand, Debug)]
pub enum TreeCommands {
    /// Import tree files or a plan into the target org
    Import(ImportArgs),
}

#[derive(Parser, Debug)]
pub struct ImportArgs {
    /// Target org username or alias
    #[arg(long = "target-org", short = 'u', value_name = "ORG")]
    pub target_org: String,

    /// SObject-tree files to import (comma-separated)
    #[arg(long, short = 'f', value_delimiter = ',', value_name = "PATHS")]
    pub files: Vec<PathBuf>,

    /// Plan file listing groups of tree files
    #[arg(long, short = 'p', value_name = "PATH", conflicts_with = "files")]
    pub plan: Option<PathBuf>,
}

/// A tree file whose records carry record-type references
struct AffectedFile {
    path: PathBuf,
    original_text: String,
    content: Value,
}

#[derive(Debug, Deserialize)]
struct PlanGroup {
    #[serde(default)]
    files: Vec<String>,
}

pub async fn run_data(args: DataArgs) -> Result<()> {
    match args.command {
        DataCommands::Tree(TreeCommands::Import(import_args)) => run_import(import_args).await,
    }
}

async fn run_import(args: ImportArgs) -> Result<()> {
    if args.files.is_empty() && args.plan.is_none() {
        anyhow::bail!("Please provide either --files or --plan");
    }

    let (config, cli) = super::toolbox()?;

    let source = describe_source(&args);
    let pb = ui::spinner(format!(
        "Uploading data from {} to org {}",
        source, args.target_org
    ));

    match import_flow(&config, &cli, &args, &pb).await {
        Ok(()) => {
            let message = format!("Successfully imported data from {}", source);
            ui::finish_success(pb, &message);
            println!("{}", message);
            Ok(())
        }
        Err(err) => {
            ui::finish_error(pb, "Import failed");
            Err(err)
        }
    }
}

async fn import_flow(
    config: &orgctl_core::OrgctlConfig,
    cli: &orgctl_core::SfdxCli,
    args: &ImportArgs,
    pb: &Option<indicatif::ProgressBar>,
) -> Result<()> {
    let paths = resolve_paths(args)?;
    let (affected, sobject_types) = scan_record_types(&paths)?;

    if !affected.is_empty() {
        ui::set_status(
            pb,
            format!(
                "Updating recordtype ids for files [{}]",
                affected
                    .iter()
                    .map(|f| f.path.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        );
        let conn = super::connect_org(config, cli, &args.target_org).await?;
        let record_types = fetch_record_type_ids(&conn, &sobject_types).await?;
        rewrite_affected(&affected, &record_types)?;
    }

    let import_result = execute_import(cli, args).await;

    // Inputs go back to their committed form even when the import failed.
    if !affected.is_empty() {
        restore_affected(&affected)?;
    }

    import_result.map_err(|err| anyhow::anyhow!("Error uploading.\n{}", err))
}

fn describe_source(args: &ImportArgs) -> String {
    if let Some(ref plan) = args.plan {
        plan.display().to_string()
    } else {
        args.files
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Expand the input to concrete tree-file paths and verify every one
/// exists, reporting all missing paths at once.
fn resolve_paths(args: &ImportArgs) -> orgctl_core::Result<Vec<PathBuf>> {
    let paths = if let Some(ref plan) = args.plan {
        validate_files_exist(std::slice::from_ref(plan))?;
        let content = std::fs::read_to_string(plan)?;
        let groups: Vec<PlanGroup> = serde_json::from_str(&content)
            .map_err(|err| OrgError::json(plan.display().to_string(), err))?;
        resolve_plan_files(plan, &groups)
    } else {
        args.files.clone()
    };

    validate_files_exist(&paths)?;
    Ok(paths)
}

/// Plan entries are relative to the plan file's directory.
fn resolve_plan_files(plan: &Path, groups: &[PlanGroup]) -> Vec<PathBuf> {
    let base = plan.parent().unwrap_or_else(|| Path::new("."));
    groups
        .iter()
        .flat_map(|group| group.files.iter().map(|f| base.join(f)))
        .collect()
}

fn validate_files_exist(paths: &[PathBuf]) -> orgctl_core::Result<()> {
    let missing: Vec<PathBuf> = paths.iter().filter(|p| !p.exists()).cloned().collect();
    if !missing.is_empty() {
        return Err(OrgError::missing_files(missing));
    }
    Ok(())
}

/// Load every tree file and pick out the ones whose records reference a
/// record type. Returns the affected files plus the distinct sobject types
/// involved. A `RecordType` object without a `DeveloperName` is malformed.
fn scan_record_types(paths: &[PathBuf]) -> orgctl_core::Result<(Vec<AffectedFile>, Vec<String>)> {
    let mut affected = Vec::new();
    let mut sobject_types: Vec<String> = Vec::new();

    for path in paths {
        let text = std::fs::read_to_string(path)?;
        let content: Value = serde_json::from_str(&text)
            .map_err(|err| OrgError::json(path.display().to_string(), err))?;

        if let Some(sobject_type) = file_record_type_sobject(path, &content)? {
            if !sobject_types.contains(&sobject_type) {
                sobject_types.push(sobject_type);
            }
            affected.push(AffectedFile {
                path: path.clone(),
                original_text: text,
                content,
            });
        }
    }

    Ok((affected, sobject_types))
}

/// Does this file carry record-type references? Returns the sobject type of
/// its records when it does. All records within one file share a type.
fn file_record_type_sobject(path: &Path, content: &Value) -> orgctl_core::Result<Option<String>> {
    let records = content["records"].as_array().cloned().unwrap_or_default();

    let mut has_record_type = false;
    for record in &records {
        if let Some(record_type) = record.get("RecordType") {
            if record_type.get("DeveloperName").and_then(Value::as_str).is_none() {
                return Err(OrgError::validation(format!(
                    "Missing recordtype developername in file {}.\n{}",
                    path.display(),
                    serde_json::to_string_pretty(record).unwrap_or_default()
                )));
            }
            has_record_type = true;
        }
    }

    if !has_record_type {
        return Ok(None);
    }

    let sobject_type = records
        .first()
        .and_then(|r| r["attributes"]["type"].as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            OrgError::validation(format!(
                "Missing record attributes.type in file {}",
                path.display()
            ))
        })?;

    Ok(Some(sobject_type))
}

/// Resolve record-type ids for the given sobject types, keyed by
/// `{SobjectType}-{DeveloperName}`.
async fn fetch_record_type_ids(
    conn: &Connection,
    sobject_types: &[String],
) -> orgctl_core::Result<BTreeMap<String, String>> {
    let result = conn.query(&soql::record_types_query(sobject_types)).await?;

    if result.total_size == 0 {
        return Err(OrgError::validation(format!(
            "No recordtype found for sobjects [{}]",
            sobject_types.join(", ")
        )));
    }

    let mut map = BTreeMap::new();
    for record in &result.records {
        if let (Some(sobject), Some(developer_name), Some(id)) = (
            record["SobjectType"].as_str(),
            record["DeveloperName"].as_str(),
            record["Id"].as_str(),
        ) {
            map.insert(format!("{}-{}", sobject, developer_name), id.to_string());
        }
    }

    Ok(map)
}

/// Write each affected file back with `RecordType` references replaced by
/// the resolved `RecordTypeId`.
fn rewrite_affected(
    affected: &[AffectedFile],
    record_types: &BTreeMap<String, String>,
) -> orgctl_core::Result<()> {
    for file in affected {
        let mut content = file.content.clone();
        substitute_record_types(&file.path, &mut content, record_types)?;
        let text = serde_json::to_string_pretty(&content)
            .map_err(|err| OrgError::json(file.path.display().to_string(), err))?;
        std::fs::write(&file.path, text.as_bytes())?;
        debug!("substituted record types in {}", file.path.display());
    }
    Ok(())
}

fn substitute_record_types(
    path: &Path,
    content: &mut Value,
    record_types: &BTreeMap<String, String>,
) -> orgctl_core::Result<()> {
    let records = match content["records"].as_array_mut() {
        Some(records) => records,
        None => return Ok(()),
    };

    for record in records {
        let developer_name = match record["RecordType"]["DeveloperName"].as_str() {
            Some(name) => name.to_string(),
            None => continue,
        };
        let sobject_type = record["attributes"]["type"].as_str().unwrap_or_default().to_string();

        let key = format!("{}-{}", sobject_type, developer_name);
        let id = record_types.get(&key).ok_or_else(|| {
            OrgError::validation(format!(
                "RecordType {} not found in Sobject {} ({})",
                developer_name,
                sobject_type,
                path.display()
            ))
        })?;

        let object = record.as_object_mut().expect("records are objects");
        object.insert("RecordTypeId".to_string(), Value::String(id.clone()));
        object.remove("RecordType");
    }

    Ok(())
}

fn restore_affected(affected: &[AffectedFile]) -> orgctl_core::Result<()> {
    for file in affected {
        std::fs::write(&file.path, file.original_text.as_bytes())?;
        info!("restored {}", file.path.display());
    }
    Ok(())
}

/// Hand the actual upload to the platform CLI.
async fn execute_import(cli: &dyn CliInvoker, args: &ImportArgs) -> orgctl_core::Result<()> {
    let mut flags = FlagSet::new();
    if let Some(ref plan) = args.plan {
        flags.push("plan", plan.display().to_string());
    } else {
        flags.push(
            "sobjecttreefiles",
            args.files
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(","),
        );
    }
    flags.push("targetusername", args.target_org.as_str());

    debug!("{}", flags.render_onto("force:data:tree:import --json"));

    let mut argv = vec!["force:data:tree:import".to_string(), "--json".to_string()];
    argv.extend(flags.to_args());

    cli.run(&argv).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use orgctl_core::MockCli;
    use serde_json::json;
    use tempfile::TempDir;

    fn tree_with_record_type() -> Value {
        json!({
            "records": [
                {
                    "attributes": { "type": "Account", "referenceId": "AccountRef1" },
                    "Name": "Acme",
                    "RecordType": { "DeveloperName": "Customer" }
                },
                {
                    "attributes": { "type": "Account", "referenceId": "AccountRef2" },
                    "Name": "Globex"
                }
            ]
        })
    }

    #[test]
    fn plan_files_resolve_relative_to_plan_dir() {
        let groups = vec![
            PlanGroup { files: vec!["Accounts.json".into()] },
            PlanGroup { files: vec!["Contacts.json".into()] },
        ];

        let paths = resolve_plan_files(Path::new("data/Account-plan.json"), &groups);
        assert_eq!(paths, vec![PathBuf::from("data/Accounts.json"), PathBuf::from("data/Contacts.json")]);
    }

    #[test]
    fn missing_files_are_reported_together() {
        let err = validate_files_exist(&[
            PathBuf::from("/nope/a.json"),
            PathBuf::from("/nope/b.json"),
        ])
        .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("/nope/a.json"));
        assert!(message.contains("/nope/b.json"));
    }

    #[test]
    fn detects_record_type_and_sobject() {
        let content = tree_with_record_type();
        let sobject = file_record_type_sobject(Path::new("Accounts.json"), &content).unwrap();
        assert_eq!(sobject.as_deref(), Some("Account"));
    }

    #[test]
    fn record_type_without_developer_name_is_rejected() {
        let content = json!({
            "records": [{
                "attributes": { "type": "Account" },
                "RecordType": { "Name": "Customer" }
            }]
        });

        let err = file_record_type_sobject(Path::new("Accounts.json"), &content).unwrap_err();
        assert!(err.to_string().contains("Missing recordtype developername in file Accounts.json"));
    }

    #[test]
    fn files_without_record_types_are_not_affected() {
        let content = json!({
            "records": [{ "attributes": { "type": "Contact" }, "LastName": "Smith" }]
        });

        let sobject = file_record_type_sobject(Path::new("Contacts.json"), &content).unwrap();
        assert!(sobject.is_none());
    }

    #[test]
    fn substitution_replaces_record_type_with_id() {
        let mut content = tree_with_record_type();
        let mut record_types = BTreeMap::new();
        record_types.insert("Account-Customer".to_string(), "012000000000001".to_string());

        substitute_record_types(Path::new("Accounts.json"), &mut content, &record_types).unwrap();

        let first = &content["records"][0];
        assert_eq!(first["RecordTypeId"], "012000000000001");
        assert!(first.get("RecordType").is_none());
        // records without a RecordType are untouched
        assert!(content["records"][1].get("RecordTypeId").is_none());
    }

    #[test]
    fn substitution_rejects_unknown_record_type() {
        let mut content = tree_with_record_type();
        let record_types = BTreeMap::new();

        let err = substitute_record_types(Path::new("Accounts.json"), &mut content, &record_types)
            .unwrap_err();
        assert!(err.to_string().contains("RecordType Customer not found in Sobject Account"));
    }

    #[test]
    fn rewrite_and_restore_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("Accounts.json");
        let original_text = serde_json::to_string_pretty(&tree_with_record_type()).unwrap();
        std::fs::write(&path, &original_text).unwrap();

        let affected = vec![AffectedFile {
            path: path.clone(),
            original_text: original_text.clone(),
            content: tree_with_record_type(),
        }];

        let mut record_types = BTreeMap::new();
        record_types.insert("Account-Customer".to_string(), "012000000000001".to_string());

        rewrite_affected(&affected, &record_types).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("012000000000001"));

        restore_affected(&affected).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), original_text);
    }

    #[tokio::test]
    async fn import_invokes_tree_import_with_file_flags() {
        let mock = MockCli::new();
        mock.add_stdout(r#"{"status":0,"result":[]}"#);

        let args = ImportArgs {
            target_org: "MyScratchOrg".into(),
            files: vec![PathBuf::from("data/Accounts.json"), PathBuf::from("data/Contacts.json")],
            plan: None,
        };

        execute_import(&mock, &args).await.unwrap();

        let calls = mock.calls();
        assert_eq!(
            calls[0],
            vec![
                "force:data:tree:import",
                "--json",
                "--sobjecttreefiles",
                "data/Accounts.json,data/Contacts.json",
                "--targetusername",
                "MyScratchOrg"
            ]
        );
    }

    #[tokio::test]
    async fn failed_import_carries_cli_diagnostics() {
        let mock = MockCli::new();
        mock.add_failure("ERROR: invalid reference id");

        let args = ImportArgs {
            target_org: "MyScratchOrg".into(),
            files: vec![PathBuf::from("data/Accounts.json")],
            plan: None,
        };

        let err = execute_import(&mock, &args).await.unwrap_err();
        assert!(err.to_string().contains("invalid reference id"));
    }
}
