pub mod changes;
pub mod lookup;
pub mod mock;
pub mod normalize;
pub mod record;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Feed tags. Upstream orders have no tag of their own and are surfaced as `Call`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    Note,
    Message,
    Task,
    Call,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityUser {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelatedEntity {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_value: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<OrderItem>,
}

/// One normalized feed entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ActivityType,
    pub content: String,
    /// RFC 3339, UTC.
    pub timestamp: String,
    pub user: ActivityUser,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_to: Option<RelatedEntity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_details: Option<OrderDetails>,
}

impl Activity {
    /// Epoch millis of `timestamp`; unparseable values sort as the epoch.
    pub fn timestamp_millis(&self) -> i64 {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .map(|t| t.timestamp_millis())
            .unwrap_or(0)
    }
}

/// Newest first, comparing parsed epoch millis rather than strings.
pub fn sort_newest_first(activities: &mut [Activity]) {
    activities.sort_by_cached_key(|a| std::cmp::Reverse(a.timestamp_millis()));
}

pub(crate) fn format_timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
