//! Anonymous Apex execution
//!
//! Commands: execute (single file, or a directory of .apex files)

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use futures::future::join_all;
use orgctl_core::{run_json, CliInvoker, OrgError};
use serde_json::Value;
use tracing::info;

use crate::ui;

#[derive(Parser, Debug)]
pub struct ApexArgs {
    #[command(subcommand)]
    pub command: ApexCommands,
}

#[derive(Subcommand, Debug)]
pub enum ApexCommands {
    /// Execute anonymous Apex from a file or a directory of files
    Execute(ExecuteArgs),
}

#[derive(Parser, Debug)]
pub struct ExecuteArgs {
    /// Target org username or alias
    #[arg(long = "target-org", short = 'u', value_name = "ORG")]
    pub target_org: String,

    /// Path to a single Apex code file
    #[arg(long, short = 'f', value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Directory containing .apex files (scanned recursively)
    #[arg(long, short = 'd', value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Run the directory's files concurrently, reporting every failure at
    /// the end instead of stopping at the first
    #[arg(long, requires = "dir")]
    pub batch: bool,
}

pub async fn run_apex(args: ApexArgs) -> Result<()> {
    match args.command {
        ApexCommands::Execute(execute_args) => run_execute(execute_args).await,
    }
}

async fn run_execute(args: ExecuteArgs) -> Result<()> {
    validate(&args)?;
    let (_config, cli) = super::toolbox()?;

    let pb = ui::spinner("Executing anonymous apex");

    let outcome = if let Some(ref file) = args.file {
        execute_file(&cli, &args.target_org, file).await.map(|r| vec![r])
    } else {
        let dir = args.dir.as_ref().expect("validated");
        execute_directory(&cli, &args.target_org, dir, args.batch).await
    };

    match outcome {
        Ok(results) => {
            ui::finish_success(pb, "Successfully executed anonymous apex");
            println!("{}", serde_json::to_string_pretty(&results)?);
            Ok(())
        }
        Err(err) => {
            ui::finish_error(pb, "Apex execution failed");
            Err(err.into())
        }
    }
}

fn validate(args: &ExecuteArgs) -> Result<()> {
    if args.file.is_some() == args.dir.is_some() {
        anyhow::bail!(
            "Please provide only either the path to an apex file or a directory that contains the files"
        );
    }
    Ok(())
}

/// Execute one anonymous Apex file and return its result payload with the
/// file path attached. The `logs` field is stripped from the result; it can
/// exceed the output buffer on its own.
pub(crate) async fn execute_file(
    cli: &dyn CliInvoker,
    target_org: &str,
    path: &Path,
) -> orgctl_core::Result<Value> {
    let args = vec![
        "force:apex:execute".to_string(),
        "--targetusername".to_string(),
        target_org.to_string(),
        "--apexcodefile".to_string(),
        path.display().to_string(),
        "--json".to_string(),
    ];

    let mut result = run_json(cli, &args).await?;

    if !result["success"].as_bool().unwrap_or(false) {
        return Err(OrgError::external_command(format!(
            "Failed to execute {}\n{}",
            path.display(),
            result
        )));
    }

    if let Some(object) = result.as_object_mut() {
        object.remove("logs");
        object.insert("path".to_string(), Value::String(path.display().to_string()));
    }

    Ok(result)
}

/// Execute every .apex file under a directory.
///
/// Sequential by default: the first failure aborts the remaining files.
/// In batch mode all files run concurrently and failures are aggregated
/// into one error that also carries the successful results.
pub(crate) async fn execute_directory(
    cli: &dyn CliInvoker,
    target_org: &str,
    dir: &Path,
    batch: bool,
) -> orgctl_core::Result<Vec<Value>> {
    let files = collect_apex_files(dir)?;
    info!("executing {} apex files from {}", files.len(), dir.display());

    if batch {
        execute_batch(cli, target_org, &files).await
    } else {
        let mut results = Vec::with_capacity(files.len());
        for file in &files {
            results.push(execute_file(cli, target_org, file).await?);
        }
        Ok(results)
    }
}

async fn execute_batch(
    cli: &dyn CliInvoker,
    target_org: &str,
    files: &[PathBuf],
) -> orgctl_core::Result<Vec<Value>> {
    let outcomes = join_all(
        files
            .iter()
            .map(|file| execute_file(cli, target_org, file)),
    )
    .await;

    let failed = outcomes.iter().filter(|o| o.is_err()).count();
    if failed == 0 {
        return Ok(outcomes.into_iter().map(|o| o.expect("checked")).collect());
    }

    let mut report = format!("Failed to execute {} of {} apex files:", failed, files.len());
    for (file, outcome) in files.iter().zip(&outcomes) {
        match outcome {
            Ok(result) => {
                report.push_str(&format!("\n  ✓ {}: {}", file.display(), result));
            }
            Err(err) => {
                report.push_str(&format!("\n  ✗ {}: {}", file.display(), err));
            }
        }
    }
    Err(OrgError::external_command(report))
}

/// Collect .apex files recursively, in a stable order.
pub(crate) fn collect_apex_files(dir: &Path) -> orgctl_core::Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(OrgError::validation(format!("Invalid Path {}", dir.display())));
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path().is_file() && e.path().extension().and_then(|s| s.to_str()) == Some("apex")
        })
        .map(|e| e.path().to_path_buf())
        .collect();
    files.sort();

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use orgctl_core::MockCli;
    use tempfile::TempDir;

    const SUCCESS: &str = r#"{"status":0,"result":{"success":true,"compiled":true,"logs":"long log text"}}"#;
    const COMPILE_FAILURE: &str = r#"{"status":0,"result":{"success":false,"compiled":false,"compileProblem":"Unexpected token"}}"#;

    fn apex_dir(names: &[&str]) -> TempDir {
        let temp = TempDir::new().unwrap();
        for name in names {
            std::fs::write(temp.path().join(name), "System.debug('hi');").unwrap();
        }
        temp
    }

    #[tokio::test]
    async fn file_execution_strips_logs_and_attaches_path() {
        let mock = MockCli::new();
        mock.add_stdout(SUCCESS);

        let result = execute_file(&mock, "MyOrg", Path::new("setup.apex")).await.unwrap();

        assert_eq!(result["path"], "setup.apex");
        assert!(result.get("logs").is_none());
        assert_eq!(result["compiled"], true);

        let calls = mock.calls();
        assert_eq!(
            calls[0],
            vec![
                "force:apex:execute",
                "--targetusername",
                "MyOrg",
                "--apexcodefile",
                "setup.apex",
                "--json"
            ]
        );
    }

    #[tokio::test]
    async fn unsuccessful_result_is_an_error_naming_the_file() {
        let mock = MockCli::new();
        mock.add_stdout(COMPILE_FAILURE);

        let err = execute_file(&mock, "MyOrg", Path::new("bad.apex")).await.unwrap_err();
        assert!(err.to_string().contains("Failed to execute bad.apex"));
        assert!(err.to_string().contains("Unexpected token"));
    }

    #[tokio::test]
    async fn sequential_run_aborts_on_first_failure() {
        let temp = apex_dir(&["a.apex", "b.apex", "c.apex"]);
        let mock = MockCli::new();
        mock.add_stdout(SUCCESS);
        mock.add_stdout(COMPILE_FAILURE);
        // no third response queued: c.apex must never run

        let err = execute_directory(&mock, "MyOrg", temp.path(), false).await.unwrap_err();
        assert!(err.to_string().contains("b.apex"));
        assert_eq!(mock.calls().len(), 2);
    }

    #[tokio::test]
    async fn batch_run_reports_all_outcomes() {
        let temp = apex_dir(&["a.apex", "b.apex"]);
        let mock = MockCli::new();
        mock.add_stdout(SUCCESS);
        mock.add_stdout(COMPILE_FAILURE);

        let err = execute_directory(&mock, "MyOrg", temp.path(), true).await.unwrap_err();
        let report = err.to_string();

        assert!(report.contains("Failed to execute 1 of 2 apex files"));
        assert!(report.contains("✗"));
        assert!(report.contains("b.apex"));
        // the successful file's result is still indicated
        assert!(report.contains("✓"));
        assert!(report.contains("a.apex"));
        assert_eq!(mock.calls().len(), 2);
    }

    #[tokio::test]
    async fn batch_run_attempts_every_file() {
        let temp = apex_dir(&["a.apex", "b.apex", "c.apex"]);
        let mock = MockCli::new();
        mock.add_failure("spawn error a");
        mock.add_failure("spawn error b");
        mock.add_failure("spawn error c");

        let err = execute_directory(&mock, "MyOrg", temp.path(), true).await.unwrap_err();
        assert!(err.to_string().contains("3 of 3"));
        assert_eq!(mock.calls().len(), 3);
    }

    #[test]
    fn collect_rejects_non_directories() {
        let err = collect_apex_files(Path::new("/definitely/not/here")).unwrap_err();
        assert!(err.to_string().contains("Invalid Path"));
    }

    #[test]
    fn collect_finds_nested_apex_files_in_order() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("nested")).unwrap();
        std::fs::write(temp.path().join("b.apex"), "").unwrap();
        std::fs::write(temp.path().join("nested/a.apex"), "").unwrap();
        std::fs::write(temp.path().join("notes.txt"), "").unwrap();

        let files = collect_apex_files(temp.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("b.apex"));
        assert!(files[1].ends_with("nested/a.apex"));
    }
}
