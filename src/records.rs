//! Forwarding of landing-page forms to the Airtable record API.

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::post,
};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;

use crate::{error::AppError, state::AppState};

pub const DEFAULT_API_URL: &str = "https://api.airtable.com/v0";

const WAITLIST_TABLE: &str = "ENFOCO Waitlist";
const SUGGESTIONS_TABLE: &str = "User Suggestions & Ideas";
const PARTNERSHIPS_TABLE: &str = "Partnership & Collaboration";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(thiserror::Error, Debug)]
pub enum RecordError {
    #[error("record API credentials are not configured")]
    NotConfigured,
    #[error("record API request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("record API returned {status}")]
    Rejected { status: u16, details: Value },
}

impl RecordError {
    /// Diagnostic payload passed through to the client.
    pub fn details(&self) -> Value {
        match self {
            RecordError::Rejected { details, .. } => details.clone(),
            other => Value::String(other.to_string()),
        }
    }
}

#[derive(Clone)]
pub struct RecordClient {
    http: reqwest::Client,
    api_url: String,
    base_id: Option<String>,
    token: Option<String>,
}

impl RecordClient {
    pub fn new(
        api_url: impl Into<String>,
        base_id: Option<String>,
        token: Option<String>,
    ) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let api_url: String = api_url.into();
        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            base_id: base_id.filter(|s| !s.is_empty()),
            token: token.filter(|s| !s.is_empty()),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.base_id.is_some() && self.token.is_some()
    }

    /// Create a single record in `table` and return the API's response body.
    pub async fn create_record(&self, table: &str, fields: Value) -> Result<Value, RecordError> {
        let (Some(base_id), Some(token)) = (&self.base_id, &self.token) else {
            return Err(RecordError::NotConfigured);
        };

        let url = format!(
            "{}/{}/{}",
            self.api_url,
            base_id,
            utf8_percent_encode(table, NON_ALPHANUMERIC)
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&json!({ "records": [{ "fields": fields }] }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let details = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.get("error").cloned())
                .unwrap_or(Value::String(body));
            return Err(RecordError::Rejected {
                status: status.as_u16(),
                details,
            });
        }

        Ok(response.json().await?)
    }
}

// ── Routes ────────────────────────────────────────────────────────────────────

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/waitlist", post(post_waitlist))
        .route("/api/suggestions", post(post_suggestion))
        .route("/api/partnerships", post(post_partnership))
}

/// Every field present and non-blank.
fn all_present(fields: &[&Option<String>]) -> bool {
    fields
        .iter()
        .all(|f| f.as_deref().is_some_and(|s| !s.trim().is_empty()))
}

async fn forward(
    state: &AppState,
    table: &str,
    fields: Value,
    failure: &str,
) -> Result<(), AppError> {
    state
        .records
        .create_record(table, fields)
        .await
        .map(|_| ())
        .map_err(|e| {
            tracing::error!(table, "Record API error: {}", e);
            AppError::Upstream {
                message: failure.to_string(),
                details: e.details(),
            }
        })
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct WaitlistRequest {
    full_name: Option<String>,
    email: Option<String>,
    industry: Option<String>,
    region: Option<String>,
    budget: Option<String>,
}

async fn post_waitlist(
    State(state): State<AppState>,
    payload: Result<Json<WaitlistRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(req) = payload?;
    if !all_present(&[&req.full_name, &req.email, &req.industry, &req.region, &req.budget]) {
        return Err(AppError::invalid(
            "Please fill in all required fields to join the waitlist",
        ));
    }

    let fields = json!({
        "Full Name": req.full_name,
        "Email Address": req.email,
        "Industry/Role": req.industry,
        "Primary Region of Interest": req.region,
        "Monthly Budget Range": req.budget,
        "Status": "New",
    });
    forward(&state, WAITLIST_TABLE, fields, "Failed to join waitlist").await?;

    Ok(Json(json!({ "message": "Successfully joined waitlist!" })))
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct SuggestionRequest {
    email: Option<String>,
    suggestion: Option<String>,
}

async fn post_suggestion(
    State(state): State<AppState>,
    payload: Result<Json<SuggestionRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(req) = payload?;
    if !all_present(&[&req.email, &req.suggestion]) {
        return Err(AppError::invalid("Please fill in all required fields"));
    }

    let fields = json!({
        "Email": req.email,
        "Detailed Suggestion": req.suggestion,
        "Suggestion Type": "Feature Request",
        "Priority Level": "Medium",
        "Status": "New",
    });
    forward(&state, SUGGESTIONS_TABLE, fields, "Failed to send suggestion").await?;

    Ok(Json(json!({ "message": "Suggestion received!" })))
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct PartnershipRequest {
    email: Option<String>,
    details: Option<String>,
}

async fn post_partnership(
    State(state): State<AppState>,
    payload: Result<Json<PartnershipRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(req) = payload?;
    if !all_present(&[&req.email, &req.details]) {
        return Err(AppError::invalid("Please fill in all required fields"));
    }

    let fields = json!({
        "Email": req.email,
        "Additional Details": req.details,
        "Contact Status": "New",
    });
    forward(
        &state,
        PARTNERSHIPS_TABLE,
        fields,
        "Failed to send partnership request",
    )
    .await?;

    Ok(Json(json!({ "message": "Partnership request received!" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_json, header, method, path_regex},
    };

    fn client(server: &MockServer) -> RecordClient {
        RecordClient::new(server.uri(), Some("app123".into()), Some("tok".into())).unwrap()
    }

    #[tokio::test]
    async fn posts_single_record_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"^/app123/ENFOCO%20Waitlist$"))
            .and(header("authorization", "Bearer tok"))
            .and(body_json(json!({ "records": [{ "fields": { "Email": "a@b.c" } }] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "records": [{ "id": "rec1" }] })))
            .expect(1)
            .mount(&server)
            .await;

        let body = client(&server)
            .create_record(WAITLIST_TABLE, json!({ "Email": "a@b.c" }))
            .await
            .unwrap();

        assert_eq!(body["records"][0]["id"], "rec1");
    }

    #[tokio::test]
    async fn upstream_error_member_is_passed_through() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({
                "error": { "type": "INVALID_VALUE", "message": "bad field" }
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .create_record(SUGGESTIONS_TABLE, json!({}))
            .await
            .unwrap_err();

        assert!(matches!(err, RecordError::Rejected { status: 422, .. }));
        assert_eq!(err.details()["type"], "INVALID_VALUE");
    }

    #[tokio::test]
    async fn non_json_error_body_is_kept_as_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;

        let err = client(&server)
            .create_record(PARTNERSHIPS_TABLE, json!({}))
            .await
            .unwrap_err();

        assert_eq!(err.details(), Value::String("unavailable".into()));
    }

    #[tokio::test]
    async fn missing_credentials_fail_without_a_request() {
        let client = RecordClient::new(DEFAULT_API_URL, None, Some("tok".into())).unwrap();
        assert!(!client.is_configured());
        let err = client.create_record(WAITLIST_TABLE, json!({})).await.unwrap_err();
        assert!(matches!(err, RecordError::NotConfigured));
    }

    #[test]
    fn blank_fields_count_as_missing() {
        let some = Some("x".to_string());
        let blank = Some("  ".to_string());
        assert!(all_present(&[&some, &some]));
        assert!(!all_present(&[&some, &blank]));
        assert!(!all_present(&[&some, &None]));
    }
}
