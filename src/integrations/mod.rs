pub mod client;
pub mod envelope;

pub use client::{test_connection, CrmClient};

use serde::{Deserialize, Serialize};

/// Upstream collections the feed reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Notes,
    Todos,
    Orders,
    Customers,
    Users,
    Salespersons,
    OrderRows,
}

impl Resource {
    pub fn path(self) -> &'static str {
        match self {
            Self::Notes => "/notes?viewPage=1",
            Self::Todos => "/todos?viewPage=1",
            Self::Orders => "/orders?viewPage=1",
            Self::Customers => "/customers?viewPage=1",
            Self::Users => "/api_users_view",
            Self::Salespersons => "/dashboard/salesperson",
            Self::OrderRows => "/orderrows",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Notes => "notes",
            Self::Todos => "todos",
            Self::Orders => "orders",
            Self::Customers => "customers",
            Self::Users => "users",
            Self::Salespersons => "salespersons",
            Self::OrderRows => "order rows",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProbeOutcome {
    Connected,
    UnexpectedShape,
    NotConfigured,
    Unauthorized,
    BadRequest,
    NotFound,
    HttpError,
    NetworkError,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionTestResult {
    pub success: bool,
    pub kind: ProbeOutcome,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}
