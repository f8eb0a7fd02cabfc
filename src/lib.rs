pub mod activity;
pub mod config;
pub mod credentials;
pub mod errors;
pub mod feed;
pub mod integrations;
pub mod notify;

pub use activity::{Activity, ActivityType};
pub use credentials::ApiCredentials;
pub use errors::{CrmError, CrmResult};
pub use feed::ActivityFeed;

/// Initializes `env_logger`, defaulting to `info` when `RUST_LOG` is unset.
/// Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
