#![allow(dead_code)]

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crm_activity_feed_lib::config::FeedConfig;
use crm_activity_feed_lib::credentials::storage::Storage;
use crm_activity_feed_lib::credentials::CredentialStore;
use crm_activity_feed_lib::notify::Notifier;
use crm_activity_feed_lib::{ActivityFeed, ApiCredentials};

pub const USERNAME: &str = "anna";
pub const PASSWORD: &str = "secret";
pub const SCHEMA: &str = "t1";
/// base64("anna:secret")
const EXPECTED_AUTH: &str = "Basic YW5uYTpzZWNyZXQ=";

/// Knobs for the fake CRM.
#[derive(Clone, Default)]
pub struct Crm {
    pub fail_notes: bool,
    pub reject_notes: bool,
    pub slow_notes: Option<Duration>,
    pub fail_salespersons: bool,
    pub empty: bool,
}

type Reply = Result<Json<Value>, StatusCode>;

fn authorized(headers: &HeaderMap) -> Result<(), StatusCode> {
    let auth_ok = headers.get("authorization").is_some_and(|v| v == EXPECTED_AUTH);
    let schema_ok = headers.get("schema").is_some_and(|v| v == SCHEMA);
    if auth_ok && schema_ok {
        Ok(())
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}

fn list(crm: &Crm, body: Value) -> Reply {
    if crm.empty {
        Ok(Json(json!([])))
    } else {
        Ok(Json(body))
    }
}

async fn notes(State(crm): State<Crm>, headers: HeaderMap) -> Reply {
    authorized(&headers)?;
    if let Some(delay) = crm.slow_notes {
        tokio::time::sleep(delay).await;
    }
    if crm.fail_notes {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    if crm.reject_notes {
        return Err(StatusCode::BAD_REQUEST);
    }
    list(
        &crm,
        json!({ "items": [
            {
                "id": "n1", "text": "Ring kunden", "created": "2024-05-02T09:00:00Z",
                "createdBy": "ANNA@001", "customerId": "c1"
            },
            {
                "id": "n2", "note": "Offert skickad", "created": "2024-05-01 12:00:00",
                "user": { "id": "bo" }
            }
        ]}),
    )
}

async fn todos(State(crm): State<Crm>, headers: HeaderMap) -> Reply {
    authorized(&headers)?;
    list(
        &crm,
        json!([{
            "id": "t1", "title": "Följ upp", "description": "Ring på fredag",
            "triggerDate": "2024-05-03", "sign": "bo"
        }]),
    )
}

async fn orders(State(crm): State<Crm>, headers: HeaderMap) -> Reply {
    authorized(&headers)?;
    list(
        &crm,
        json!({ "data": [
            {
                "id": "42", "orderNumber": "1001", "status": "Ny", "orderDate": "2024-05-04",
                "createdBy": "anna", "customer": { "id": "c2", "name": "Beta AB" },
                "totalExVat": "2500"
            },
            { "id": "43", "created": "2024-04-30" }
        ]}),
    )
}

async fn order_rows(
    State(crm): State<Crm>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Reply {
    authorized(&headers)?;
    match params.get("orderId").map(String::as_str) {
        Some("42") => list(&crm, json!([{ "productName": "Server", "quantity": 2, "price": 1250 }])),
        _ => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

async fn customers(State(crm): State<Crm>, headers: HeaderMap) -> Reply {
    authorized(&headers)?;
    list(&crm, json!([{ "id": "c1", "name": "Acme AB" }, { "id": "c9" }]))
}

async fn users(State(crm): State<Crm>, headers: HeaderMap) -> Reply {
    authorized(&headers)?;
    list(
        &crm,
        json!([
            { "userid": "anna", "firstname": "Anna", "lastname": "Användare" },
            { "userid": "bo", "Fname": "Bo", "Lname": "Ek" }
        ]),
    )
}

async fn salespersons(State(crm): State<Crm>, headers: HeaderMap) -> Reply {
    authorized(&headers)?;
    if crm.fail_salespersons {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    list(&crm, json!([{ "id": "ANNA", "name": "Anna Säljare" }]))
}

/// Serves the fake CRM on an ephemeral port and returns its base URL.
pub async fn spawn_crm(crm: Crm) -> String {
    let app = Router::new()
        .route("/notes", get(notes))
        .route("/todos", get(todos))
        .route("/orders", get(orders))
        .route("/orderrows", get(order_rows))
        .route("/customers", get(customers))
        .route("/api_users_view", get(users))
        .route("/dashboard/salesperson", get(salespersons))
        .with_state(crm);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

pub fn credentials(base_url: &str) -> ApiCredentials {
    ApiCredentials::new(base_url, USERNAME, PASSWORD, SCHEMA)
}

pub fn feed() -> (ActivityFeed, Notifier) {
    feed_with_config(FeedConfig::default())
}

pub fn feed_with_config(config: FeedConfig) -> (ActivityFeed, Notifier) {
    let notifier = Notifier::new();
    let store = CredentialStore::load(Storage::in_memory().unwrap(), true, notifier.clone()).unwrap();
    let feed = ActivityFeed::new(config, Arc::new(store), notifier.clone());
    (feed, notifier)
}

pub async fn feed_against(crm: Crm) -> ActivityFeed {
    let base = spawn_crm(crm).await;
    let (feed, _) = feed();
    feed.set_credentials(credentials(&base)).unwrap();
    feed
}
