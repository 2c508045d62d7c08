/*!
 * orgctl-core - Platform CLI orchestration primitives
 *
 * This crate provides the shared machinery behind the orgctl subcommands:
 * external-process invocation with normalized success/failure handling,
 * bounded status polling, parameterized SOQL construction, and an explicit
 * REST connection per target org.
 */

use once_cell::sync::Lazy;
use regex::Regex;

pub mod config;
pub mod error;
pub mod invoke;
pub mod org;
pub mod poll;
pub mod project;
pub mod soql;

pub use config::OrgctlConfig;
pub use error::{OrgError, Result};
pub use invoke::{run_json, CliInvoker, FlagSet, FlagValue, MockCli, RawOutput, SfdxCli};
pub use org::{Connection, OrgContext, QueryResult};
pub use poll::{poll_until, PollConfig, PollStatus};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("email regex")
});

/// Loose email-address validation, enough to catch typos before an org
/// round-trip. Not an RFC 5322 parser.
pub fn is_valid_email(address: &str) -> bool {
    EMAIL_RE.is_match(address)
}
