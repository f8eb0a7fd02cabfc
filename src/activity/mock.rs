use chrono::{Duration, Utc};

use super::{format_timestamp, Activity, ActivityType, ActivityUser, RelatedEntity};

fn user(id: &str, name: &str, avatar: Option<&str>) -> ActivityUser {
    ActivityUser {
        id: id.to_string(),
        name: name.to_string(),
        avatar: avatar.map(str::to_string),
    }
}

fn related(kind: &str, id: &str, name: &str) -> Option<RelatedEntity> {
    Some(RelatedEntity {
        kind: kind.to_string(),
        id: id.to_string(),
        name: name.to_string(),
    })
}

/// Fixed fallback feed shown when no credentials are set or upstream fails.
/// Ids are stable; timestamps are relative to now and already newest first.
pub fn mock_activities() -> Vec<Activity> {
    let now = Utc::now();
    let ago = |minutes: i64| format_timestamp(now - Duration::minutes(minutes));

    vec![
        Activity {
            id: "1".to_string(),
            kind: ActivityType::Note,
            content: "Kunden har begärt en offert på 3 nya servrar".to_string(),
            timestamp: ago(15),
            user: user("101", "Maria Andersson", Some("https://i.pravatar.cc/150?img=32")),
            related_to: related("customer", "1001", "Acme AB"),
            order_details: None,
        },
        Activity {
            id: "2".to_string(),
            kind: ActivityType::Call,
            content: "Ringde Johan för att bekräfta mötet nästa vecka. Han planerar att ta med sin tekniska chef.".to_string(),
            timestamp: ago(120),
            user: user("102", "Erik Johansson", Some("https://i.pravatar.cc/150?img=53")),
            related_to: related("customer", "1002", "Teknik Konsult AB"),
            order_details: None,
        },
        Activity {
            id: "3".to_string(),
            kind: ActivityType::Message,
            content: "Någon som har kontaktuppgifter till Pernillas ersättare? Behöver komma i kontakt med dem idag!".to_string(),
            timestamp: ago(270),
            user: user("103", "Lina Karlsson", Some("https://i.pravatar.cc/150?img=5")),
            related_to: None,
            order_details: None,
        },
        Activity {
            id: "4".to_string(),
            kind: ActivityType::Task,
            content: "Skickat avtal till SignRight för signering av kunden".to_string(),
            timestamp: ago(480),
            user: user("104", "Niklas Lundgren", None),
            related_to: related("opportunity", "2001", "Service renewal Q2"),
            order_details: None,
        },
        Activity {
            id: "5".to_string(),
            kind: ActivityType::Note,
            content: "Viktig notering: Alla kundens servrar måste uppgraderas innan årsskiftet på grund av säkerhetsskäl. Diskuteras på nästa möte.".to_string(),
            timestamp: ago(720),
            user: user("105", "Sofia Berg", Some("https://i.pravatar.cc/150?img=25")),
            related_to: related("project", "3001", "IT Infrastructure Upgrade"),
            order_details: None,
        },
    ]
}
