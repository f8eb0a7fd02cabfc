pub mod aggregator;
pub mod broadcaster;

use chrono::Utc;
use reqwest::Client;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::activity::changes::detect_new;
use crate::activity::lookup::CrmUserOption;
use crate::activity::{format_timestamp, Activity, ActivityType, ActivityUser};
use crate::config::FeedConfig;
use crate::credentials::storage::Storage;
use crate::credentials::{ApiCredentials, CredentialStore};
use crate::errors::CrmResult;
use crate::integrations::{self, ConnectionTestResult, CrmClient};
use crate::notify::{Notice, Notifier};
use aggregator::Aggregator;
use broadcaster::{Broadcaster, Subscription};

const DATABASE_FILE: &str = "feed.db";

#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub activities: Vec<Activity>,
    pub new_items: Vec<Activity>,
}

/// The feed service: built once at startup and shared by reference.
pub struct ActivityFeed {
    config: FeedConfig,
    credentials: Arc<CredentialStore>,
    aggregator: Arc<Aggregator>,
    broadcaster: Arc<Broadcaster>,
    notifier: Notifier,
}

impl ActivityFeed {
    pub fn new(config: FeedConfig, credentials: Arc<CredentialStore>, notifier: Notifier) -> Self {
        let aggregator = Arc::new(Aggregator::new(
            Client::new(),
            credentials.clone(),
            notifier.clone(),
        ));
        let broadcaster = Broadcaster::new(aggregator.clone(), config.poll_interval());
        Self {
            config,
            credentials,
            aggregator,
            broadcaster,
            notifier,
        }
    }

    /// Loads config and persisted credentials from `app_data`.
    pub fn open(app_data: &Path) -> CrmResult<Self> {
        std::fs::create_dir_all(app_data)?;
        let config = FeedConfig::load(app_data);
        let notifier = Notifier::new();
        let storage = Storage::new(&app_data.join(DATABASE_FILE))?;
        let credentials = CredentialStore::load(storage, config.remember_me, notifier.clone())?;
        Ok(Self::new(config, Arc::new(credentials), notifier))
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    pub fn credential_store(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notifier.subscribe()
    }

    pub fn set_credentials(&self, credentials: ApiCredentials) -> CrmResult<()> {
        self.credentials.set(credentials)
    }

    pub fn get_credentials(&self) -> Option<ApiCredentials> {
        self.credentials.get()
    }

    pub async fn test_connection(&self) -> ConnectionTestResult {
        integrations::test_connection(
            self.aggregator.http().clone(),
            self.credentials.get(),
            self.config.probe_timeout(),
        )
        .await
    }

    pub async fn fetch_activities(&self) -> Vec<Activity> {
        self.aggregator.fetch_activities().await
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&[Activity]) + Send + Sync + 'static,
    {
        self.broadcaster.subscribe(callback)
    }

    pub fn is_polling(&self) -> bool {
        self.broadcaster.is_polling()
    }

    /// Manual refresh: pushes to subscribers and reports what is new since
    /// the last snapshot they saw.
    pub async fn refresh(&self) -> RefreshOutcome {
        let previous = self.broadcaster.last_snapshot();
        let activities = self.broadcaster.refresh().await;
        let new_items: Vec<Activity> = detect_new(&previous, &activities)
            .into_iter()
            .cloned()
            .collect();

        if new_items.is_empty() {
            self.notifier.info("Inga nya aktiviteter");
        } else {
            self.notifier
                .success(format!("{} nya aktiviteter", new_items.len()));
        }
        RefreshOutcome {
            activities,
            new_items,
        }
    }

    /// Local-only: the CRM has no message endpoint, so the message is
    /// prepended to a fresh snapshot and never sent upstream.
    pub async fn send_message(&self, content: &str) -> Option<Activity> {
        if !self.credentials.get().is_some_and(|c| c.is_complete()) {
            self.notifier
                .error("Vänligen konfigurera dina API-inställningar först");
            return None;
        }
        if content.trim().is_empty() {
            self.notifier.error("Meddelandet kan inte vara tomt");
            return None;
        }

        let message = Activity {
            id: uuid::Uuid::new_v4().to_string(),
            kind: ActivityType::Message,
            content: content.trim().to_string(),
            timestamp: format_timestamp(Utc::now()),
            user: ActivityUser {
                id: "100".to_string(),
                name: "Aktiv användare".to_string(),
                avatar: None,
            },
            related_to: None,
            order_details: None,
        };

        let mut activities = self.aggregator.fetch_activities().await;
        activities.insert(0, message.clone());
        self.broadcaster.dispatch(&activities);

        self.notifier.success("Meddelande skickat");
        Some(message)
    }

    /// CRM users for the host's user picker; empty when unconfigured.
    pub async fn user_directory(&self) -> Vec<CrmUserOption> {
        match self
            .credentials
            .get()
            .map(|c| CrmClient::new(self.aggregator.http().clone(), c))
        {
            Some(Ok(client)) => client.user_directory().await,
            _ => Vec::new(),
        }
    }
}
