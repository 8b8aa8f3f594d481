//! Connectivity check behind the diagnostics page.
//!
//! Probes the data API with a query against a table that normally does not
//! exist. A "relation does not exist" answer proves the service is reachable
//! and the key is accepted, so it counts as connected.

use serde::Serialize;
use tracing::warn;

use crate::config::IdentityConfig;

const PROBE_PATH: &str = "/rest/v1/_test?select=*&limit=1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeOutcome {
    Connected,
    Failed,
    NotConfigured,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticsReport {
    pub identity_url: Option<String>,
    pub api_key_configured: bool,
    pub database_configured: bool,
    pub status: ProbeOutcome,
    pub detail: Option<String>,
}

/// Interpret the probe's HTTP answer.
#[must_use]
pub fn classify_probe(status: u16, body: &str) -> (ProbeOutcome, Option<String>) {
    if (200..300).contains(&status) {
        return (ProbeOutcome::Connected, None);
    }

    let parsed: serde_json::Value = serde_json::from_str(body).unwrap_or_default();
    let code = parsed
        .get("code")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default();
    let message = parsed
        .get("message")
        .and_then(serde_json::Value::as_str)
        .map_or_else(|| body.trim().to_owned(), str::to_owned);

    if matches!(code, "PGRST116" | "PGRST205" | "42P01") || message.contains("does not exist") {
        return (ProbeOutcome::Connected, Some("PostgreSQL reachable; connection confirmed".into()));
    }
    let detail = if message.is_empty() { format!("status {status}") } else { message };
    (ProbeOutcome::Failed, Some(detail))
}

/// Run the probe against the configured service.
pub async fn run(config: Option<&IdentityConfig>, database_configured: bool) -> DiagnosticsReport {
    let Some(config) = config else {
        return DiagnosticsReport {
            identity_url: None,
            api_key_configured: false,
            database_configured,
            status: ProbeOutcome::NotConfigured,
            detail: None,
        };
    };

    let (status, detail) = match probe(config).await {
        Ok((code, body)) => classify_probe(code, &body),
        Err(e) => {
            warn!(error = %e, "diagnostics probe failed");
            (ProbeOutcome::Failed, Some(format!("connection error: {e}")))
        }
    };

    DiagnosticsReport {
        identity_url: Some(config.url.clone()),
        api_key_configured: !config.anon_key.is_empty(),
        database_configured,
        status,
        detail,
    }
}

async fn probe(config: &IdentityConfig) -> Result<(u16, String), reqwest::Error> {
    let client = reqwest::Client::builder()
        .timeout(config.timeout)
        .build()?;
    let response = client
        .get(format!("{}{PROBE_PATH}", config.url))
        .header("apikey", &config.anon_key)
        .bearer_auth(&config.anon_key)
        .send()
        .await?;
    let status = response.status().as_u16();
    let body = response.text().await?;
    Ok((status, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_status_is_connected() {
        assert_eq!(classify_probe(200, "[]"), (ProbeOutcome::Connected, None));
    }

    #[test]
    fn missing_relation_counts_as_connected() {
        let body = r#"{"code":"42P01","message":"relation \"public._test\" does not exist"}"#;
        let (outcome, detail) = classify_probe(404, body);
        assert_eq!(outcome, ProbeOutcome::Connected);
        assert!(detail.unwrap().contains("confirmed"));
    }

    #[test]
    fn pgrst116_counts_as_connected() {
        let (outcome, _) = classify_probe(406, r#"{"code":"PGRST116","message":"JSON object requested"}"#);
        assert_eq!(outcome, ProbeOutcome::Connected);
    }

    #[test]
    fn bad_key_is_failed_with_message() {
        let (outcome, detail) = classify_probe(401, r#"{"message":"Invalid API key"}"#);
        assert_eq!(outcome, ProbeOutcome::Failed);
        assert_eq!(detail.as_deref(), Some("Invalid API key"));
    }

    #[test]
    fn empty_error_body_reports_status() {
        let (outcome, detail) = classify_probe(500, "");
        assert_eq!(outcome, ProbeOutcome::Failed);
        assert_eq!(detail.as_deref(), Some("status 500"));
    }

    #[tokio::test]
    async fn unconfigured_report_skips_probe() {
        let report = run(None, true).await;
        assert_eq!(report.status, ProbeOutcome::NotConfigured);
        assert!(!report.api_key_configured);
        assert!(report.database_configured);
        assert!(report.identity_url.is_none());
    }
}
