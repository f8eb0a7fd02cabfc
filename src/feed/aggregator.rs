use futures::FutureExt;
use reqwest::Client;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::activity::lookup::NameMaps;
use crate::activity::mock::mock_activities;
use crate::activity::normalize::Normalizer;
use crate::activity::record::RawRecord;
use crate::activity::{sort_newest_first, Activity};
use crate::credentials::{ApiCredentials, CredentialStore};
use crate::errors::CrmResult;
use crate::integrations::CrmClient;
use crate::notify::Notifier;

pub const FALLBACK_WARNING: &str = "Kunde inte hämta aktiviteter. Använder testdata istället.";

/// Runs one full fetch → enrich → normalize → merge cycle per call.
pub struct Aggregator {
    http: Client,
    credentials: Arc<CredentialStore>,
    notifier: Notifier,
}

impl Aggregator {
    pub fn new(http: Client, credentials: Arc<CredentialStore>, notifier: Notifier) -> Self {
        Self {
            http,
            credentials,
            notifier,
        }
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    /// Always resolves to a non-empty list: mock data stands in when nothing
    /// is configured, when upstream is empty, or when the cycle fails.
    pub async fn fetch_activities(&self) -> Vec<Activity> {
        log::info!("Fetching activities at {}", chrono::Utc::now().to_rfc3339());

        let Some(credentials) = self.credentials.get().filter(ApiCredentials::is_complete) else {
            log::info!("No API credentials set, serving mock activities");
            return mock_activities();
        };

        match AssertUnwindSafe(self.collect(credentials)).catch_unwind().await {
            Ok(Ok(activities)) if activities.is_empty() => {
                log::warn!("Upstream returned no activities, serving mock activities");
                mock_activities()
            }
            Ok(Ok(activities)) => {
                log::info!("Total activities: {}", activities.len());
                activities
            }
            Ok(Err(e)) => {
                log::error!("Error fetching activities ({:?}): {}", e.classify(), e);
                self.notifier.warning(FALLBACK_WARNING);
                mock_activities()
            }
            Err(_) => {
                log::error!("Activity aggregation panicked");
                self.notifier.warning(FALLBACK_WARNING);
                mock_activities()
            }
        }
    }

    /// The real upstream cycle. Only note/todo failures surface as errors.
    pub async fn collect(&self, credentials: ApiCredentials) -> CrmResult<Vec<Activity>> {
        let client = CrmClient::new(self.http.clone(), credentials)?;
        log::info!("Fetching from API: {}", client.credentials().api_url);

        let (customers, users, salespersons, notes, todos, orders) = tokio::join!(
            client.fetch_customers(),
            client.fetch_users(),
            client.fetch_salespersons(),
            client.fetch_notes(),
            client.fetch_todos(),
            client.fetch_orders_with_rows(),
        );
        let (notes, todos) = (notes?, todos?);
        log::info!(
            "Fetched {} notes, {} todos, {} orders",
            notes.len(),
            todos.len(),
            orders.len()
        );

        let maps = NameMaps::build(&customers, &users, &salespersons);
        Ok(merge(&maps, &notes, &todos, &orders))
    }
}

/// Normalizes all three kinds and sorts them newest first. Repeated ids
/// within one resource collapse to the newest copy; an id already taken by
/// another resource is re-keyed with the kind prefix instead.
pub fn merge(
    maps: &NameMaps,
    notes: &[RawRecord],
    todos: &[RawRecord],
    orders: &[(RawRecord, Vec<RawRecord>)],
) -> Vec<Activity> {
    let normalizer = Normalizer::new(maps);
    let notes = unique_within(
        notes
            .iter()
            .enumerate()
            .map(|(i, n)| normalizer.note(n, i))
            .collect(),
    );
    let todos = unique_within(
        todos
            .iter()
            .enumerate()
            .map(|(i, t)| normalizer.todo(t, i))
            .collect(),
    );
    let orders = unique_within(
        orders
            .iter()
            .enumerate()
            .map(|(i, (o, rows))| normalizer.order(o, rows, i))
            .collect(),
    );

    let mut taken: HashSet<String> = notes.iter().map(|a| a.id.clone()).collect();
    let mut activities = notes;
    activities.extend(claim_ids(todos, "todo", &mut taken));
    activities.extend(claim_ids(orders, "order", &mut taken));

    sort_newest_first(&mut activities);
    activities
}

fn unique_within(mut activities: Vec<Activity>) -> Vec<Activity> {
    sort_newest_first(&mut activities);
    let mut seen = HashSet::new();
    activities.retain(|a| {
        let fresh = seen.insert(a.id.clone());
        if !fresh {
            log::debug!("Dropping duplicate activity id {}", a.id);
        }
        fresh
    });
    activities
}

fn claim_ids(mut activities: Vec<Activity>, prefix: &str, taken: &mut HashSet<String>) -> Vec<Activity> {
    for activity in &mut activities {
        while taken.contains(&activity.id) {
            let rekeyed = format!("{}-{}", prefix, activity.id);
            log::debug!("Activity id {} already taken, using {}", activity.id, rekeyed);
            activity.id = rekeyed;
        }
        taken.insert(activity.id.clone());
    }
    activities
}
