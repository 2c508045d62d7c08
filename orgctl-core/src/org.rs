//! Explicit org context and REST connection.
//!
//! Commands never rely on an ambient "current org": the target org is
//! resolved once from the `-u` flag into an [`OrgContext`] and passed to
//! everything that needs it. Session material comes from the platform CLI
//! (`force:org:display --json`); the auth layer itself stays external.

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{OrgError, Result};
use crate::invoke::{run_json, CliInvoker};

/// Default REST API version used when the config does not override it
pub const DEFAULT_API_VERSION: &str = "52.0";

/// Authenticated handle on one org
#[derive(Debug, Clone)]
pub struct OrgContext {
    pub username: String,
    pub instance_url: String,
    pub access_token: String,
    pub api_version: String,
}

impl OrgContext {
    /// Resolve session material for a target org via the platform CLI.
    pub async fn resolve(
        cli: &dyn CliInvoker,
        target_org: &str,
        api_version: &str,
    ) -> Result<Self> {
        let args = vec![
            "force:org:display".to_string(),
            "--targetusername".to_string(),
            target_org.to_string(),
            "--json".to_string(),
        ];
        let result = run_json(cli, &args).await?;
        Self::from_display_result(&result, api_version)
    }

    /// Build a context from a `force:org:display` result payload.
    pub fn from_display_result(result: &Value, api_version: &str) -> Result<Self> {
        let field = |name: &str| -> Result<String> {
            result
                .get(name)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| OrgError::unexpected_output(format!("force:org:display (missing {})", name)))
        };

        Ok(Self {
            username: field("username")?,
            instance_url: field("instanceUrl")?.trim_end_matches('/').to_string(),
            access_token: field("accessToken")?,
            api_version: api_version.to_string(),
        })
    }

    /// REST base URL: `{instance}/services/data/v{version}`
    pub fn base_url(&self) -> String {
        format!("{}/services/data/v{}", self.instance_url, self.api_version)
    }
}

/// Result page of a SOQL query
#[derive(Debug, Clone, Deserialize)]
pub struct QueryResult {
    #[serde(rename = "totalSize")]
    pub total_size: u64,
    #[serde(default)]
    pub records: Vec<Value>,
}

impl QueryResult {
    /// `Id` of the first record, when present
    pub fn first_id(&self) -> Option<&str> {
        self.records.first().and_then(|r| r["Id"].as_str())
    }
}

/// REST client bound to one org
pub struct Connection {
    context: OrgContext,
    client: reqwest::Client,
}

impl Connection {
    pub fn new(context: OrgContext) -> Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self { context, client })
    }

    pub fn context(&self) -> &OrgContext {
        &self.context
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.context.base_url(), path)
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.bearer_auth(&self.context.access_token)
    }

    /// Run a SOQL query against the org
    pub async fn query(&self, soql: &str) -> Result<QueryResult> {
        let url = format!("{}/query/?q={}", self.context.base_url(), urlencoding::encode(soql));
        debug!("SOQL query against {}", self.context.username);
        let response = self.authorized(self.client.get(&url)).send().await?;
        let value = Self::handle_response(response).await?;
        serde_json::from_value(value).map_err(|err| OrgError::json("query result", err))
    }

    pub async fn get_json(&self, path: &str) -> Result<Value> {
        let response = self.authorized(self.client.get(self.url(path))).send().await?;
        Self::handle_response(response).await
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        let response = self
            .authorized(self.client.post(self.url(path)).json(body))
            .send()
            .await?;
        Self::handle_response(response).await
    }

    pub async fn patch_json(&self, path: &str, body: &Value) -> Result<Value> {
        let response = self
            .authorized(self.client.patch(self.url(path)).json(body))
            .send()
            .await?;
        Self::handle_response(response).await
    }

    pub async fn delete(&self, path: &str) -> Result<Value> {
        let response = self.authorized(self.client.delete(self.url(path))).send().await?;
        Self::handle_response(response).await
    }

    /// Bulk-insert records of one sobject type via the composite endpoint.
    /// Each record gets its `attributes.type` stamped; the insert is
    /// all-or-none.
    pub async fn insert_records(&self, sobject_type: &str, records: Vec<Value>) -> Result<Value> {
        let records: Vec<Value> = records
            .into_iter()
            .map(|mut record| {
                record["attributes"] = json!({ "type": sobject_type });
                record
            })
            .collect();

        let body = json!({ "allOrNone": true, "records": records });
        self.post_json("/composite/sobjects", &body).await
    }

    /// Map a response to its JSON body, or a `Rest` error carrying the
    /// status code and response text. Empty 2xx bodies become `null`.
    async fn handle_response(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if status.is_success() {
            if text.trim().is_empty() {
                Ok(Value::Null)
            } else {
                serde_json::from_str(&text).map_err(|err| OrgError::json("response body", err))
            }
        } else {
            Err(OrgError::Rest {
                status: status.as_u16(),
                body: text,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoke::MockCli;

    #[test]
    fn base_url_includes_api_version() {
        let context = OrgContext {
            username: "test@example.com".into(),
            instance_url: "https://example.my.salesforce.com".into(),
            access_token: "token".into(),
            api_version: "52.0".into(),
        };

        assert_eq!(
            context.base_url(),
            "https://example.my.salesforce.com/services/data/v52.0"
        );
    }

    #[test]
    fn display_result_trims_trailing_slash() {
        let result = serde_json::json!({
            "username": "test@example.com",
            "instanceUrl": "https://example.my.salesforce.com/",
            "accessToken": "00D!token",
        });

        let context = OrgContext::from_display_result(&result, "52.0").unwrap();
        assert_eq!(context.instance_url, "https://example.my.salesforce.com");
    }

    #[test]
    fn display_result_missing_token_is_unexpected_output() {
        let result = serde_json::json!({
            "username": "test@example.com",
            "instanceUrl": "https://example.my.salesforce.com",
        });

        let err = OrgContext::from_display_result(&result, "52.0").unwrap_err();
        assert!(err.to_string().contains("accessToken"));
    }

    #[tokio::test]
    async fn resolve_uses_org_display() {
        let mock = MockCli::new();
        mock.add_stdout(
            r#"{"status":0,"result":{"username":"scratch@example.com","instanceUrl":"https://scratch.my.salesforce.com","accessToken":"00D!abc"}}"#,
        );

        let context = OrgContext::resolve(&mock, "MyScratchOrg", "52.0").await.unwrap();
        assert_eq!(context.username, "scratch@example.com");

        let calls = mock.calls();
        assert_eq!(
            calls[0],
            vec!["force:org:display", "--targetusername", "MyScratchOrg", "--json"]
        );
    }

    #[test]
    fn query_result_first_id() {
        let result: QueryResult = serde_json::from_value(serde_json::json!({
            "totalSize": 1,
            "records": [{ "Id": "0PS000000000001" }]
        }))
        .unwrap();

        assert_eq!(result.first_id(), Some("0PS000000000001"));
    }
}
