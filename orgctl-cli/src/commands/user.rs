//! User administration - email, passwords, permission sets

use anyhow::Result;
use clap::{Parser, Subcommand};
use orgctl_core::{is_valid_email, soql, Connection, OrgError};
use serde_json::{json, Value};
use tracing::info;

use crate::ui;

#[derive(Parser, Debug)]
pub struct UserArgs {
    #[command(subcommand)]
    pub command: UserCommands,
}

#[derive(Subcommand, Debug)]
pub enum UserCommands {
    /// Email operations
    #[command(subcommand)]
    Email(EmailCommands),
    /// Password operations
    #[command(subcommand)]
    Password(PasswordCommands),
    /// Permission-set operations
    #[command(subcommand)]
    Permset(PermsetCommands),
}

#[derive(Subcommand, Debug)]
pub enum EmailCommands {
    /// Change a user's email address
    Set(EmailSetArgs),
}

#[derive(Subcommand, Debug)]
pub enum PasswordCommands {
    /// Set a user's password
    Set(PasswordSetArgs),
    /// Reset a user's password (the user gets a reset link by email)
    Reset(PasswordResetArgs),
}

#[derive(Subcommand, Debug)]
pub enum PermsetCommands {
    /// Assign a permission set to users
    Assign(PermsetAssignArgs),
}

#[derive(Parser, Debug)]
pub struct EmailSetArgs {
    /// Target org username or alias
    #[arg(long = "target-org", short = 'u', value_name = "ORG")]
    pub target_org: String,

    /// New email address
    #[arg(long, short = 'e')]
    pub email: String,

    /// Username of the user to update
    #[arg(long, short = 's')]
    pub username: String,
}

#[derive(Parser, Debug)]
pub struct PasswordSetArgs {
    /// Target org username or alias
    #[arg(long = "target-org", short = 'u', value_name = "ORG")]
    pub target_org: String,

    /// New password
    #[arg(long, short = 'p')]
    pub password: String,

    /// Username of the user to update
    #[arg(long, short = 's')]
    pub username: String,
}

#[derive(Parser, Debug)]
pub struct PasswordResetArgs {
    /// Target org username or alias
    #[arg(long = "target-org", short = 'u', value_name = "ORG")]
    pub target_org: String,

    /// Username of the user to reset
    #[arg(long, short = 's')]
    pub username: String,
}

#[derive(Parser, Debug)]
pub struct PermsetAssignArgs {
    /// Target org username or alias
    #[arg(long = "target-org", short = 'u', value_name = "ORG")]
    pub target_org: String,

    /// Permission set name or label
    #[arg(long, short = 'n')]
    pub name: String,

    /// Usernames to assign the permission set to (comma-separated)
    #[arg(long, short = 's', value_delimiter = ',', required = true)]
    pub usernames: Vec<String>,
}

pub async fn run_user(args: UserArgs) -> Result<()> {
    match args.command {
        UserCommands::Email(EmailCommands::Set(set_args)) => run_email_set(set_args).await,
        UserCommands::Password(PasswordCommands::Set(set_args)) => run_password_set(set_args).await,
        UserCommands::Password(PasswordCommands::Reset(reset_args)) => {
            run_password_reset(reset_args).await
        }
        UserCommands::Permset(PermsetCommands::Assign(assign_args)) => {
            run_permset_assign(assign_args).await
        }
    }
}

async fn run_email_set(args: EmailSetArgs) -> Result<()> {
    if !is_valid_email(&args.email) {
        anyhow::bail!("Invalid Email Address: {}", args.email);
    }

    let (config, cli) = super::toolbox()?;
    let conn = super::connect_org(&config, &cli, &args.target_org).await?;

    let pb = ui::spinner(format!(
        "Updating user {} email to {}",
        args.username, args.email
    ));

    let outcome = async {
        let user_id = fetch_user_id(&conn, &args.username).await?;
        conn.patch_json(
            &format!("/sobjects/User/{}", user_id),
            &json!({ "Email": args.email }),
        )
        .await
    }
    .await;

    match outcome {
        Ok(_) => {
            let message = format!(
                "Finished changing email for user {}. Please check email ({}) for verification.",
                args.username, args.email
            );
            ui::finish_success(pb, &message);
            println!("{}", message);
            Ok(())
        }
        Err(err) => {
            ui::finish_error(pb, "Email update failed");
            Err(err.into())
        }
    }
}

async fn run_password_set(args: PasswordSetArgs) -> Result<()> {
    let (config, cli) = super::toolbox()?;
    let conn = super::connect_org(&config, &cli, &args.target_org).await?;

    let pb = ui::spinner(format!("Updating user {} password", args.username));

    let outcome = async {
        let user_id = fetch_user_id(&conn, &args.username).await?;
        conn.post_json(
            &format!("/sobjects/User/{}/password", user_id),
            &json!({ "NewPassword": args.password }),
        )
        .await
    }
    .await;

    match outcome {
        Ok(_) => {
            let message = format!("Successfully updated password for user {}", args.username);
            ui::finish_success(pb, &message);
            println!("{}", message);
            Ok(())
        }
        Err(err) => {
            ui::finish_error(pb, "Password update failed");
            Err(err.into())
        }
    }
}

async fn run_password_reset(args: PasswordResetArgs) -> Result<()> {
    let (config, cli) = super::toolbox()?;
    let conn = super::connect_org(&config, &cli, &args.target_org).await?;

    let pb = ui::spinner(format!("Resetting password of user {}", args.username));

    let outcome = async {
        let user_id = fetch_user_id(&conn, &args.username).await?;
        conn.delete(&format!("/sobjects/User/{}/password", user_id)).await
    }
    .await;

    match outcome {
        Ok(_) => {
            let message = format!(
                "Finished resetting password of user {}. Please check email for the password link.",
                args.username
            );
            ui::finish_success(pb, &message);
            println!("{}", message);
            Ok(())
        }
        Err(err) => {
            ui::finish_error(pb, "Password reset failed");
            Err(err.into())
        }
    }
}

async fn run_permset_assign(args: PermsetAssignArgs) -> Result<()> {
    let (config, cli) = super::toolbox()?;
    let conn = super::connect_org(&config, &cli, &args.target_org).await?;

    let usernames = args.usernames.join(", ");
    let pb = ui::spinner(format!(
        "Assigning permission set ({}) to users [{}]",
        args.name, usernames
    ));

    match assign_permission_set(&conn, &args.name, &args.usernames).await {
        Ok(()) => {
            let message = format!(
                "Successfully assigned permission set ({}) to users [{}]",
                args.name, usernames
            );
            ui::finish_success(pb, &message);
            println!("{}", message);
            Ok(())
        }
        Err(err) => {
            ui::finish_error(pb, "Permission set assignment failed");
            Err(err.into())
        }
    }
}

/// Assign a permission set to every given user that does not already have
/// it. A fully-assigned input is a no-op success.
pub(crate) async fn assign_permission_set(
    conn: &Connection,
    name: &str,
    usernames: &[String],
) -> orgctl_core::Result<()> {
    let permission_set_id = fetch_permission_set_id(conn, name).await?;

    let assigned = fetch_assigned_usernames(conn, &permission_set_id, usernames).await?;
    let unassigned = filter_unassigned(usernames, &assigned);
    if unassigned.is_empty() {
        info!("all users already have permission set {}", name);
        return Ok(());
    }

    let user_ids = fetch_user_ids(conn, &unassigned).await?;

    let records = user_ids
        .iter()
        .map(|id| assignment_record(&permission_set_id, id))
        .collect();
    conn.insert_records("PermissionSetAssignment", records).await?;

    Ok(())
}

/// Permission-set id matching the given name or label.
async fn fetch_permission_set_id(conn: &Connection, name: &str) -> orgctl_core::Result<String> {
    let result = conn.query(&soql::permission_set_query(name)).await?;
    if result.total_size == 0 {
        return Err(OrgError::validation(format!(
            "Permission set ({}) not found",
            name
        )));
    }
    result
        .first_id()
        .map(str::to_string)
        .ok_or_else(|| OrgError::unexpected_output("PermissionSet query"))
}

/// Usernames among the given ones that already hold the permission set.
async fn fetch_assigned_usernames(
    conn: &Connection,
    permission_set_id: &str,
    usernames: &[String],
) -> orgctl_core::Result<Vec<String>> {
    let result = conn
        .query(&soql::permission_set_assignments_query(permission_set_id, usernames))
        .await?;

    Ok(result
        .records
        .iter()
        .filter_map(|r| r["Assignee"]["Username"].as_str().map(str::to_string))
        .collect())
}

fn filter_unassigned(usernames: &[String], assigned: &[String]) -> Vec<String> {
    usernames
        .iter()
        .filter(|u| !assigned.contains(u))
        .cloned()
        .collect()
}

/// Resolve usernames to user ids; every username must exist in the org.
async fn fetch_user_ids(conn: &Connection, usernames: &[String]) -> orgctl_core::Result<Vec<String>> {
    let result = conn.query(&soql::user_ids_query(usernames)).await?;

    if result.total_size == 0 {
        return Err(OrgError::validation(format!(
            "User with usernames [{}] not found",
            usernames.join(", ")
        )));
    }

    let found: Vec<String> = result
        .records
        .iter()
        .filter_map(|r| r["Username"].as_str().map(str::to_string))
        .collect();
    let missing = missing_usernames(usernames, &found);
    if !missing.is_empty() {
        return Err(OrgError::validation(format!(
            "User with usernames [{}] not found",
            missing.join(", ")
        )));
    }

    Ok(result
        .records
        .iter()
        .filter_map(|r| r["Id"].as_str().map(str::to_string))
        .collect())
}

fn missing_usernames(requested: &[String], found: &[String]) -> Vec<String> {
    requested
        .iter()
        .filter(|u| !found.contains(u))
        .cloned()
        .collect()
}

/// Single user id by username.
async fn fetch_user_id(conn: &Connection, username: &str) -> orgctl_core::Result<String> {
    let result = conn.query(&soql::user_id_query(username)).await?;
    if result.total_size == 0 {
        return Err(OrgError::validation(format!(
            "User with username {} not found",
            username
        )));
    }
    result
        .first_id()
        .map(str::to_string)
        .ok_or_else(|| OrgError::unexpected_output("User query"))
}

fn assignment_record(permission_set_id: &str, assignee_id: &str) -> Value {
    json!({ "PermissionSetId": permission_set_id, "AssigneeId": assignee_id })
}
