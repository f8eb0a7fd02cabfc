use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::record::RawRecord;

pub const UNKNOWN_USER: &str = "Okänd användare";

/// Suffix some CRM installs append to user identifiers.
const USER_ID_SUFFIX: &str = "@001";

const CUSTOMER_ID: &[&str] = &["id", "customerId", "customerid"];
const CUSTOMER_NAME: &[&str] = &["name", "companyName", "customerName"];
const USER_KEYS: &[&str] = &["userid", "id", "email"];
const SALESPERSON_KEYS: &[&str] = &["id", "userid", "salespersonId", "email"];
const FULL_NAME: &[&str] = &["name", "fullName", "fullname"];
const FIRST_NAME: &[&str] = &["firstname", "firstName", "Fname"];
const LAST_NAME: &[&str] = &["lastname", "lastName", "Lname"];

/// Lowercases and strips the install suffix so one person maps to one key.
pub fn normalize_user_id(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    match lower.strip_suffix(USER_ID_SUFFIX) {
        Some(stripped) => stripped.to_string(),
        None => lower,
    }
}

/// "First Last" from split name fields, else a single full-name field.
pub fn person_name(record: &RawRecord) -> Option<String> {
    let first = record.text(FIRST_NAME).unwrap_or_default();
    let last = record.text(LAST_NAME).unwrap_or_default();
    let joined = format!("{} {}", first, last).trim().to_string();
    if joined.is_empty() {
        record.text(FULL_NAME)
    } else {
        Some(joined)
    }
}

/// Lookup tables rebuilt from scratch on every aggregation cycle.
#[derive(Debug, Clone, Default)]
pub struct NameMaps {
    customers: HashMap<String, String>,
    users: HashMap<String, String>,
    salespersons: HashMap<String, String>,
}

impl NameMaps {
    pub fn build(customers: &[RawRecord], users: &[RawRecord], salespersons: &[RawRecord]) -> Self {
        let customers = customers
            .iter()
            .filter_map(|c| Some((c.text(CUSTOMER_ID)?, c.text(CUSTOMER_NAME)?)))
            .collect();

        let maps = Self {
            customers,
            users: people_map(users, USER_KEYS),
            salespersons: people_map(salespersons, SALESPERSON_KEYS),
        };
        log::debug!(
            "Built name maps: {} customers, {} users, {} salespersons",
            maps.customers.len(),
            maps.users.len(),
            maps.salespersons.len()
        );
        maps
    }

    pub fn customer_name(&self, id: &str) -> Option<&str> {
        self.customers.get(id.trim()).map(String::as_str)
    }

    /// CRM-provided name, then salesperson map, then user map, then the raw
    /// id, then the unknown-user literal. Never empty.
    pub fn resolve_user_name(&self, crm_name: Option<&str>, raw_id: Option<&str>) -> String {
        if let Some(name) = crm_name.filter(|n| !n.trim().is_empty()) {
            return name.trim().to_string();
        }
        let Some(raw_id) = raw_id.filter(|id| !id.trim().is_empty()) else {
            return UNKNOWN_USER.to_string();
        };
        let key = normalize_user_id(raw_id);
        self.salespersons
            .get(&key)
            .or_else(|| self.users.get(&key))
            .cloned()
            .unwrap_or_else(|| raw_id.trim().to_string())
    }
}

fn people_map(records: &[RawRecord], keys: &[&str]) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for record in records {
        let Some(name) = person_name(record) else {
            continue;
        };
        for key in keys {
            if let Some(id) = record.text(&[*key]) {
                map.insert(normalize_user_id(&id), name.clone());
            }
        }
    }
    map
}

/// An entry for the host's "which CRM user are you" picker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CrmUserOption {
    pub id: String,
    pub name: String,
}

pub fn user_options(users: &[RawRecord]) -> Vec<CrmUserOption> {
    users
        .iter()
        .map(|user| {
            let id = user.text(&["userid", "id"]).unwrap_or_default();
            let name = person_name(user)
                .or_else(|| Some(id.clone()).filter(|id| !id.is_empty()))
                .unwrap_or_else(|| UNKNOWN_USER.to_string());
            CrmUserOption { id, name }
        })
        .collect()
}
