//! Converts raw notes, todos and orders into [`Activity`] values.
//!
//! Every field is read through an ordered accessor list; the first non-blank
//! hit wins. Missing fields degrade to placeholders, never to an error, and
//! each conversion is a pure function of its inputs.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use super::lookup::NameMaps;
use super::record::RawRecord;
use super::{format_timestamp, Activity, ActivityType, ActivityUser, OrderDetails, OrderItem, RelatedEntity};

pub const NO_TEXT: &str = "Ingen text";
pub const NO_ORDER_NUMBER: &str = "utan nummer";
pub const UNKNOWN_STATUS: &str = "okänd";
pub const UNSPECIFIED_PRODUCT: &str = "Ospecificerad produkt";

const CREATOR_ID: &[&str] = &["createdBy", "user.id", "user.userid", "user.email", "signature", "sign"];
const CREATOR_NAME: &[&str] = &["user.name", "createdByName"];
const CREATOR_AVATAR: &[&str] = &["user.avatar"];
const CUSTOMER_NAME: &[&str] = &["customer.name", "companyName", "customerName", "company"];
const CUSTOMER_ID: &[&str] = &["customer.id", "customerId", "customerid", "companyId"];

const NOTE_ID: &[&str] = &["id", "noteId"];
const NOTE_TEXT: &[&str] = &["text", "note"];
const NOTE_TIME: &[&str] = &["created", "createdDate", "date"];

const TODO_ID: &[&str] = &["id", "todoId"];
const TODO_TITLE: &[&str] = &["title", "subject"];
const TODO_DESCRIPTION: &[&str] = &["description", "text"];
const TODO_TIME: &[&str] = &["triggerDate", "dueDate", "date", "created"];

const ORDER_ID: &[&str] = &["id", "orderId"];
const ORDER_NUMBER: &[&str] = &["orderNumber", "orderNo", "number"];
const ORDER_STATUS: &[&str] = &["status", "orderStatus"];
const ORDER_TIME: &[&str] = &["orderDate", "created", "createdDate"];
const ORDER_TOTAL: &[&str] = &["totalExVat", "totalExclVat"];

const ROW_ID: &[&str] = &["id", "rowId"];
const ROW_NAME: &[&str] = &["productName", "name", "articleName"];
const ROW_ARTICLE: &[&str] = &["articleNumber", "articleNo"];
const ROW_QUANTITY: &[&str] = &["quantity", "qty"];
const ROW_PRICE: &[&str] = &["price", "unitPrice"];

/// Parses the timestamp shapes seen upstream. Naive values are taken as UTC;
/// anything unreadable becomes the Unix epoch so the feed still sorts.
pub fn parse_timestamp(raw: Option<&str>) -> DateTime<Utc> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return DateTime::<Utc>::UNIX_EPOCH;
    };
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return t.with_timezone(&Utc);
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(raw, format) {
            return t.and_utc();
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(t) = d.and_hms_opt(0, 0, 0) {
            return t.and_utc();
        }
    }
    log::debug!("Unparseable timestamp {:?}, using epoch", raw);
    DateTime::<Utc>::UNIX_EPOCH
}

pub struct Normalizer<'a> {
    maps: &'a NameMaps,
}

impl<'a> Normalizer<'a> {
    pub fn new(maps: &'a NameMaps) -> Self {
        Self { maps }
    }

    /// `position` is the record's index within its upstream list; it only
    /// feeds the fallback id of records that carry none.
    pub fn note(&self, raw: &RawRecord, position: usize) -> Activity {
        let created = raw.text(NOTE_TIME);
        Activity {
            id: record_id(raw, NOTE_ID, "note", position),
            kind: ActivityType::Note,
            content: raw.text(NOTE_TEXT).unwrap_or_else(|| NO_TEXT.to_string()),
            timestamp: format_timestamp(parse_timestamp(created.as_deref())),
            user: self.creator(raw),
            related_to: self.related_customer(raw),
            order_details: None,
        }
    }

    pub fn todo(&self, raw: &RawRecord, position: usize) -> Activity {
        let content = match (raw.text(TODO_TITLE), raw.text(TODO_DESCRIPTION)) {
            (Some(title), Some(description)) => format!("{}: {}", title, description),
            (Some(one), None) | (None, Some(one)) => one,
            (None, None) => NO_TEXT.to_string(),
        };
        let due = raw.text(TODO_TIME);
        Activity {
            id: record_id(raw, TODO_ID, "todo", position),
            kind: ActivityType::Task,
            content,
            timestamp: format_timestamp(parse_timestamp(due.as_deref())),
            user: self.creator(raw),
            related_to: self.related_customer(raw),
            order_details: None,
        }
    }

    /// Orders share the id space with notes and todos, hence the `order-` prefix.
    pub fn order(&self, raw: &RawRecord, rows: &[RawRecord], position: usize) -> Activity {
        let number = raw.text(ORDER_NUMBER);
        let status = raw.text(ORDER_STATUS).unwrap_or_else(|| UNKNOWN_STATUS.to_string());
        let ordered = raw.text(ORDER_TIME);

        let id = match raw.text(ORDER_ID).or_else(|| number.clone()) {
            Some(upstream) => format!("order-{}", upstream),
            None => fallback_id(raw, "order", position),
        };

        let items: Vec<OrderItem> = rows.iter().map(order_item).collect();
        let total_value = raw.text(ORDER_TOTAL);
        let order_details = if total_value.is_some() || !items.is_empty() {
            Some(OrderDetails { total_value, items })
        } else {
            None
        };

        Activity {
            id,
            kind: ActivityType::Call,
            content: format!(
                "Order {} skapad med status: {}",
                number.as_deref().unwrap_or(NO_ORDER_NUMBER),
                status
            ),
            timestamp: format_timestamp(parse_timestamp(ordered.as_deref())),
            user: self.creator(raw),
            related_to: self.related_customer(raw),
            order_details,
        }
    }

    fn creator(&self, raw: &RawRecord) -> ActivityUser {
        let id = raw.text(CREATOR_ID);
        let name = self
            .maps
            .resolve_user_name(raw.text(CREATOR_NAME).as_deref(), id.as_deref());
        ActivityUser {
            id: id.unwrap_or_default(),
            name,
            avatar: raw.text(CREATOR_AVATAR),
        }
    }

    fn related_customer(&self, raw: &RawRecord) -> Option<RelatedEntity> {
        let id = raw.text(CUSTOMER_ID);
        let name = raw.text(CUSTOMER_NAME).or_else(|| {
            id.as_deref()
                .and_then(|id| self.maps.customer_name(id))
                .map(str::to_string)
        })?;
        Some(RelatedEntity {
            kind: "customer".to_string(),
            id: id.unwrap_or_default(),
            name,
        })
    }
}

fn record_id(raw: &RawRecord, paths: &[&str], kind: &str, position: usize) -> String {
    raw.text(paths)
        .unwrap_or_else(|| fallback_id(raw, kind, position))
}

/// `<kind>-<position>-<content hash>`: stable across cycles for the same
/// upstream list, distinct for every record in it.
fn fallback_id(raw: &RawRecord, kind: &str, position: usize) -> String {
    let mut hasher = DefaultHasher::new();
    serde_json::to_string(raw).unwrap_or_default().hash(&mut hasher);
    format!("{}-{}-{:016x}", kind, position, hasher.finish())
}

fn order_item(row: &RawRecord) -> OrderItem {
    OrderItem {
        id: row.text(ROW_ID),
        name: row
            .text(ROW_NAME)
            .or_else(|| row.text(ROW_ARTICLE))
            .unwrap_or_else(|| UNSPECIFIED_PRODUCT.to_string()),
        quantity: row.number(ROW_QUANTITY),
        price: row.number(ROW_PRICE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::lookup::UNKNOWN_USER;
    use serde_json::json;

    fn raw(value: serde_json::Value) -> RawRecord {
        RawRecord::from_value(value).unwrap()
    }

    fn maps() -> NameMaps {
        NameMaps::build(
            &[raw(json!({ "id": "c1", "name": "Acme AB" }))],
            &[raw(json!({ "userid": "eva", "firstname": "Eva", "lastname": "Lind" }))],
            &[],
        )
    }

    #[test]
    fn note_reads_alternate_text_field_and_resolves_names() {
        let maps = maps();
        let note = Normalizer::new(&maps).note(&raw(json!({
            "id": 5,
            "note": "Ring tillbaka",
            "created": "2024-03-01 08:15:00",
            "createdBy": "EVA@001",
            "customerId": "c1"
        })), 0);
        assert_eq!(note.id, "5");
        assert_eq!(note.kind, ActivityType::Note);
        assert_eq!(note.content, "Ring tillbaka");
        assert_eq!(note.timestamp, "2024-03-01T08:15:00.000Z");
        assert_eq!(note.user.name, "Eva Lind");
        assert_eq!(note.user.id, "EVA@001");
        let related = note.related_to.unwrap();
        assert_eq!((related.id.as_str(), related.name.as_str()), ("c1", "Acme AB"));
    }

    #[test]
    fn note_without_text_gets_placeholder() {
        let maps = NameMaps::default();
        let note = Normalizer::new(&maps).note(&raw(json!({ "id": "1" })), 0);
        assert_eq!(note.content, NO_TEXT);
        assert_eq!(note.user.name, UNKNOWN_USER);
        assert_eq!(note.timestamp, "1970-01-01T00:00:00.000Z");
        assert!(note.related_to.is_none());
    }

    #[test]
    fn embedded_company_name_beats_map_lookup() {
        let maps = maps();
        let note = Normalizer::new(&maps).note(&raw(json!({
            "id": "1", "text": "x", "customer": { "id": "c1", "name": "Acme Sverige" }
        })), 0);
        assert_eq!(note.related_to.unwrap().name, "Acme Sverige");
    }

    #[test]
    fn todo_joins_title_and_description() {
        let maps = maps();
        let n = Normalizer::new(&maps);
        let both = n.todo(&raw(json!({
            "id": "t1", "title": "Offert", "description": "Skicka i dag",
            "triggerDate": "2024-03-02T10:00:00+01:00", "user": { "id": "eva" }
        })), 0);
        assert_eq!(both.kind, ActivityType::Task);
        assert_eq!(both.content, "Offert: Skicka i dag");
        assert_eq!(both.timestamp, "2024-03-02T09:00:00.000Z");
        assert_eq!(both.user.name, "Eva Lind");

        let title_only = n.todo(&raw(json!({ "id": "t2", "title": "Offert" })), 1);
        assert_eq!(title_only.content, "Offert");
        let description_only = n.todo(&raw(json!({ "id": "t3", "description": "Skicka" })), 2);
        assert_eq!(description_only.content, "Skicka");
    }

    #[test]
    fn order_is_prefixed_and_pure() {
        let maps = maps();
        let n = Normalizer::new(&maps);
        let order = raw(json!({
            "id": "42", "orderNumber": "1001", "status": "Levererad",
            "created": "2024-01-01", "orderDate": "2024-01-05", "totalExclVat": 1500.5
        }));
        let rows = vec![
            raw(json!({ "id": 1, "productName": "Server", "quantity": 3, "price": "500" })),
            raw(json!({ "articleNumber": "ART-7" })),
            raw(json!({})),
        ];
        let first = n.order(&order, &rows, 0);
        let second = n.order(&order, &rows, 0);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );

        assert_eq!(first.id, "order-42");
        assert_eq!(first.kind, ActivityType::Call);
        assert_eq!(first.content, "Order 1001 skapad med status: Levererad");
        assert_eq!(first.timestamp, "2024-01-05T00:00:00.000Z");

        let details = first.order_details.unwrap();
        assert_eq!(details.total_value.as_deref(), Some("1500.5"));
        let names: Vec<_> = details.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Server", "ART-7", UNSPECIFIED_PRODUCT]);
        assert_eq!(details.items[0].quantity, Some(3.0));
        assert_eq!(details.items[0].price, Some(500.0));
    }

    #[test]
    fn order_placeholders_for_missing_number_and_status() {
        let maps = NameMaps::default();
        let order = Normalizer::new(&maps).order(&raw(json!({ "id": 7, "created": "2024-02-01" })), &[], 0);
        assert_eq!(order.content, "Order utan nummer skapad med status: okänd");
        assert_eq!(order.timestamp, "2024-02-01T00:00:00.000Z");
        assert!(order.order_details.is_none());
    }

    #[test]
    fn records_without_ids_get_distinct_stable_ids() {
        let maps = NameMaps::default();
        let n = Normalizer::new(&maps);
        let bare = raw(json!({ "text": "Samma text" }));

        let first = n.note(&bare, 0);
        assert!(first.id.starts_with("note-0-"));
        assert_eq!(first.id, n.note(&bare, 0).id);
        assert_ne!(first.id, n.note(&bare, 1).id);
        assert_ne!(first.id, n.note(&raw(json!({ "text": "Annan text" })), 0).id);

        let order = n.order(&raw(json!({ "status": "Ny" })), &[], 3);
        assert!(order.id.starts_with("order-3-"));
        let numbered = n.order(&raw(json!({ "orderNumber": "1001" })), &[], 3);
        assert_eq!(numbered.id, "order-1001");
    }
}
