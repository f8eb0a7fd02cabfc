use anyhow::Context;
use crm_activity_feed_lib::{config, init_logging, ActivityFeed, ApiCredentials};

const USAGE: &str = "usage: crm-activity-feed [watch|once|test|users]";

fn credentials_from_env() -> Option<ApiCredentials> {
    let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
    Some(ApiCredentials::new(
        var("CRM_API_URL")?,
        var("CRM_USERNAME")?,
        var("CRM_PASSWORD")?,
        var("CRM_SCHEMA")?,
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let app_data = config::app_data_dir();
    let feed = ActivityFeed::open(&app_data)
        .with_context(|| format!("opening feed state in {}", app_data.display()))?;

    if let Some(credentials) = credentials_from_env() {
        feed.set_credentials(credentials)?;
    }

    let mut notices = feed.notices();
    tokio::spawn(async move {
        while let Ok(notice) = notices.recv().await {
            eprintln!("[{:?}] {}", notice.level, notice.message);
        }
    });

    let command = std::env::args().nth(1).unwrap_or_else(|| "watch".to_string());
    match command.as_str() {
        "once" => {
            let activities = feed.fetch_activities().await;
            println!("{}", serde_json::to_string_pretty(&activities)?);
        }
        "test" => {
            let result = feed.test_connection().await;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        "users" => {
            let users = feed.user_directory().await;
            println!("{}", serde_json::to_string_pretty(&users)?);
        }
        "watch" => {
            let initial = feed.refresh().await;
            print_feed(&initial.activities);

            let _subscription = feed.subscribe(|activities| print_feed(activities));
            log::info!("Watching feed, Ctrl+C to stop");
            tokio::signal::ctrl_c().await?;
        }
        other => anyhow::bail!("unknown command {:?}\n{}", other, USAGE),
    }

    Ok(())
}

fn print_feed(activities: &[crm_activity_feed_lib::Activity]) {
    for activity in activities {
        let related = activity
            .related_to
            .as_ref()
            .map(|r| format!(" [{}]", r.name))
            .unwrap_or_default();
        println!(
            "{}  {:<7} {}{}: {}",
            activity.timestamp,
            format!("{:?}", activity.kind).to_lowercase(),
            activity.user.name,
            related,
            activity.content
        );
    }
    println!();
}
