use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::future::join_all;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

use super::envelope::Envelope;
use super::{ConnectionTestResult, ProbeOutcome, Resource};
use crate::activity::lookup::{user_options, CrmUserOption};
use crate::activity::record::RawRecord;
use crate::credentials::ApiCredentials;
use crate::errors::{CrmError, CrmResult, ErrorClass};

const ORDER_ID: &[&str] = &["id", "orderId"];

/// Authenticated reader for one set of credentials. Cheap to build per cycle;
/// the underlying `reqwest::Client` is shared.
pub struct CrmClient {
    http: Client,
    credentials: ApiCredentials,
}

impl CrmClient {
    pub fn new(http: Client, credentials: ApiCredentials) -> CrmResult<Self> {
        if !credentials.is_complete() {
            return Err(CrmError::MissingCredentials);
        }
        Ok(Self { http, credentials })
    }

    pub fn credentials(&self) -> &ApiCredentials {
        &self.credentials
    }

    fn auth_headers(&self) -> CrmResult<HeaderMap> {
        let token = STANDARD.encode(format!(
            "{}:{}",
            self.credentials.username, self.credentials.password
        ));
        let mut auth = HeaderValue::from_str(&format!("Basic {}", token))
            .map_err(|_| CrmError::MissingCredentials)?;
        auth.set_sensitive(true);

        let schema = HeaderValue::from_str(self.credentials.schema.trim())
            .map_err(|_| CrmError::MissingCredentials)?;

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert("schema", schema);
        Ok(headers)
    }

    fn url(&self, resource: Resource) -> String {
        format!("{}{}", self.credentials.base_url(), resource.path())
    }

    async fn get_json(&self, resource: Resource, query: &[(&str, &str)]) -> CrmResult<Value> {
        let url = self.url(resource);
        log::debug!("Fetching {} from {}", resource.name(), url);

        let response = self
            .http
            .get(&url)
            .headers(self.auth_headers()?)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CrmError::Status {
                resource: resource.name(),
                status,
                body,
            });
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Fetches and unwraps one collection; errors propagate.
    pub async fn fetch_records(&self, resource: Resource) -> CrmResult<Vec<RawRecord>> {
        self.fetch_records_with(resource, &[]).await
    }

    async fn fetch_records_with(
        &self,
        resource: Resource,
        query: &[(&str, &str)],
    ) -> CrmResult<Vec<RawRecord>> {
        let body = self.get_json(resource, query).await?;
        let envelope = Envelope::decode(body);
        if envelope.count().is_none() {
            log::warn!("Unexpected {} response shape, treating as empty", resource.name());
        }
        Ok(envelope.into_records())
    }

    /// Enrichment data: failures are logged and yield an empty list.
    async fn fetch_auxiliary(&self, resource: Resource, query: &[(&str, &str)]) -> Vec<RawRecord> {
        match self.fetch_records_with(resource, query).await {
            Ok(records) => records,
            Err(e) => {
                log::warn!("Error fetching {}, continuing without: {}", resource.name(), e);
                Vec::new()
            }
        }
    }

    pub async fn fetch_notes(&self) -> CrmResult<Vec<RawRecord>> {
        self.fetch_records(Resource::Notes).await.inspect_err(|e| {
            log::error!("Error fetching notes: {}", e);
        })
    }

    pub async fn fetch_todos(&self) -> CrmResult<Vec<RawRecord>> {
        self.fetch_records(Resource::Todos).await.inspect_err(|e| {
            log::error!("Error fetching todos: {}", e);
        })
    }

    pub async fn fetch_orders(&self) -> Vec<RawRecord> {
        self.fetch_auxiliary(Resource::Orders, &[]).await
    }

    pub async fn fetch_customers(&self) -> Vec<RawRecord> {
        self.fetch_auxiliary(Resource::Customers, &[]).await
    }

    pub async fn fetch_users(&self) -> Vec<RawRecord> {
        self.fetch_auxiliary(Resource::Users, &[]).await
    }

    pub async fn fetch_salespersons(&self) -> Vec<RawRecord> {
        let salespersons = self.fetch_auxiliary(Resource::Salespersons, &[]).await;
        log::info!("Loaded {} salespersons", salespersons.len());
        salespersons
    }

    pub async fn fetch_order_rows(&self, order_id: &str) -> Vec<RawRecord> {
        self.fetch_auxiliary(Resource::OrderRows, &[("orderId", order_id)])
            .await
    }

    /// Orders paired with their rows. Rows are fetched one request per order,
    /// concurrently; a failed row request only empties that order's rows.
    pub async fn fetch_orders_with_rows(&self) -> Vec<(RawRecord, Vec<RawRecord>)> {
        let orders = self.fetch_orders().await;
        join_all(orders.into_iter().map(|order| async move {
            let rows = match order.text(ORDER_ID) {
                Some(id) => self.fetch_order_rows(&id).await,
                None => Vec::new(),
            };
            (order, rows)
        }))
        .await
    }

    pub async fn user_directory(&self) -> Vec<CrmUserOption> {
        user_options(&self.fetch_users().await)
    }

    /// One lightweight read of notes, classified. Never fails.
    pub async fn test_connection(&self, timeout: Duration) -> ConnectionTestResult {
        log::info!(
            "Testing API connection: url={}, username={}, schema={}",
            self.credentials.api_url,
            self.credentials.username,
            self.credentials.schema
        );

        let headers = match self.auth_headers() {
            Ok(headers) => headers,
            Err(e) => return connection_failure(e),
        };

        let response = match self
            .http
            .get(self.url(Resource::Notes))
            .headers(headers)
            .timeout(timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return connection_failure(e.into()),
        };

        let status = response.status();
        log::info!("API test response status: {}", status);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return connection_failure(CrmError::Status {
                resource: Resource::Notes.name(),
                status,
                body,
            });
        }

        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(e) => return connection_failure(e.into()),
        };

        match Envelope::decode(body.clone()).count() {
            Some(count) => ConnectionTestResult {
                success: true,
                kind: ProbeOutcome::Connected,
                message: format!("Anslutning lyckades! Hittade {} anteckningar.", count),
                details: Some(body),
            },
            None => ConnectionTestResult {
                success: true,
                kind: ProbeOutcome::UnexpectedShape,
                message: "Anslutningen fungerar men svarsformatet var oväntat.".to_string(),
                details: Some(body),
            },
        }
    }
}

/// Probe entry point that also covers the "nothing configured" case.
pub async fn test_connection(
    http: Client,
    credentials: Option<ApiCredentials>,
    timeout: Duration,
) -> ConnectionTestResult {
    match credentials.map(|c| CrmClient::new(http, c)) {
        Some(Ok(client)) => client.test_connection(timeout).await,
        _ => connection_failure(CrmError::MissingCredentials),
    }
}

/// Maps a failed connection test onto its outcome and user-facing message.
fn connection_failure(error: CrmError) -> ConnectionTestResult {
    log::error!("API connection test failed: {}", error);
    let (kind, message) = match error.classify() {
        ErrorClass::Configuration => (
            ProbeOutcome::NotConfigured,
            "Inga API-inloggningsuppgifter är inställda".to_string(),
        ),
        ErrorClass::Unauthorized => (
            ProbeOutcome::Unauthorized,
            "Obehörig åtkomst. Kontrollera användarnamn och lösenord.".to_string(),
        ),
        ErrorClass::BadRequest => (
            ProbeOutcome::BadRequest,
            "Felaktig förfrågan. Kontrollera schema och andra parametrar.".to_string(),
        ),
        ErrorClass::NotFound => (
            ProbeOutcome::NotFound,
            "API endpoint hittades inte. Kontrollera API URL.".to_string(),
        ),
        ErrorClass::Http(status) => (
            ProbeOutcome::HttpError,
            format!("API svarade med status {}", status.as_u16()),
        ),
        ErrorClass::Transport | ErrorClass::Other => {
            let cause = match &error {
                CrmError::Transport(e) => e.to_string(),
                other => other.to_string(),
            };
            (ProbeOutcome::NetworkError, format!("Anslutningsfel: {}", cause))
        }
    };

    let details = match error {
        CrmError::MissingCredentials => None,
        CrmError::Status { status, body, .. } => {
            Some(json!({ "status": status.as_u16(), "text": body }))
        }
        CrmError::Transport(e) => Some(json!({ "error": e.to_string() })),
        other => Some(json!({ "error": other.to_string() })),
    };

    ConnectionTestResult {
        success: false,
        kind,
        message,
        details,
    }
}
