pub mod storage;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::watch;

use crate::errors::CrmResult;
use crate::notify::Notifier;
use storage::Storage;

pub const CREDENTIALS_KEY: &str = "crmApiCredentials";
pub const REMEMBER_ME_KEY: &str = "crm-remember-me";

/// Connection parameters for the upstream CRM. `schema` is the tenant id
/// sent as a header on every request.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ApiCredentials {
    pub api_url: String,
    pub username: String,
    pub password: String,
    pub schema: String,
}

impl ApiCredentials {
    pub fn new(
        api_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        schema: impl Into<String>,
    ) -> Self {
        Self {
            api_url: api_url.into().trim().trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
            schema: schema.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        [&self.api_url, &self.username, &self.password, &self.schema]
            .iter()
            .all(|field| !field.trim().is_empty())
    }

    pub fn base_url(&self) -> &str {
        self.api_url.trim_end_matches('/')
    }
}

impl fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("api_url", &self.api_url)
            .field("username", &self.username)
            .field("password", &"********")
            .field("schema", &self.schema)
            .finish()
    }
}

/// Holds the active credentials, persists them when "remember me" is on and
/// publishes every change to watchers.
pub struct CredentialStore {
    storage: Mutex<Storage>,
    remember_me: Mutex<bool>,
    current: watch::Sender<Option<ApiCredentials>>,
    notifier: Notifier,
}

impl CredentialStore {
    /// Loads the persisted flag and credentials. `remember_default` applies
    /// only when no flag has been stored yet.
    pub fn load(storage: Storage, remember_default: bool, notifier: Notifier) -> CrmResult<Self> {
        let remember_me = match storage.get_setting(REMEMBER_ME_KEY)? {
            Some(flag) => flag == "true",
            None => remember_default,
        };

        let credentials = if remember_me {
            match storage.get_setting(CREDENTIALS_KEY)? {
                Some(raw) => match serde_json::from_str::<ApiCredentials>(&raw) {
                    Ok(creds) => {
                        log::info!("Restored API credentials for {}", creds.api_url);
                        Some(creds)
                    }
                    Err(e) => {
                        log::error!("Failed to parse saved credentials: {}", e);
                        storage.delete_setting(CREDENTIALS_KEY)?;
                        None
                    }
                },
                None => None,
            }
        } else {
            storage.delete_setting(CREDENTIALS_KEY)?;
            None
        };

        let (current, _) = watch::channel(credentials);
        Ok(Self {
            storage: Mutex::new(storage),
            remember_me: Mutex::new(remember_me),
            current,
            notifier,
        })
    }

    pub fn get(&self) -> Option<ApiCredentials> {
        self.current.borrow().clone()
    }

    pub fn set(&self, credentials: ApiCredentials) -> CrmResult<()> {
        {
            let storage = self.storage.lock();
            if *self.remember_me.lock() {
                storage.put_setting(CREDENTIALS_KEY, &serde_json::to_string(&credentials)?)?;
            } else {
                storage.delete_setting(CREDENTIALS_KEY)?;
            }
        }
        log::info!("Saved API credentials for {}", credentials.api_url);
        self.current.send_replace(Some(credentials));
        self.notifier.success("API-inställningar har sparats!");
        Ok(())
    }

    pub fn clear(&self) -> CrmResult<()> {
        self.storage.lock().delete_setting(CREDENTIALS_KEY)?;
        self.current.send_replace(None);
        Ok(())
    }

    pub fn remember_me(&self) -> bool {
        *self.remember_me.lock()
    }

    /// Turning the flag off drops the persisted copy but keeps the
    /// in-memory credentials for the rest of the session.
    pub fn set_remember_me(&self, remember: bool) -> CrmResult<()> {
        let storage = self.storage.lock();
        storage.put_setting(REMEMBER_ME_KEY, if remember { "true" } else { "false" })?;
        match (remember, self.current.borrow().as_ref()) {
            (true, Some(creds)) => {
                storage.put_setting(CREDENTIALS_KEY, &serde_json::to_string(creds)?)?
            }
            (true, None) => {}
            (false, _) => storage.delete_setting(CREDENTIALS_KEY)?,
        }
        *self.remember_me.lock() = remember;
        Ok(())
    }

    pub fn watch(&self) -> watch::Receiver<Option<ApiCredentials>> {
        self.current.subscribe()
    }
}
