use serde_json::Value;

use crate::activity::record::RawRecord;

/// The list shapes the CRM answers with. Anything else counts as empty.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Bare(Vec<Value>),
    Items(Vec<Value>),
    Data(Vec<Value>),
    Unrecognized,
}

impl Envelope {
    pub fn decode(body: Value) -> Self {
        match body {
            Value::Array(list) => Self::Bare(list),
            Value::Object(mut map) => {
                if let Some(Value::Array(list)) = map.remove("items") {
                    Self::Items(list)
                } else if let Some(Value::Array(list)) = map.remove("data") {
                    Self::Data(list)
                } else {
                    Self::Unrecognized
                }
            }
            _ => Self::Unrecognized,
        }
    }

    /// Number of entries, or `None` for an unrecognized shape.
    pub fn count(&self) -> Option<usize> {
        match self {
            Self::Bare(list) | Self::Items(list) | Self::Data(list) => Some(list.len()),
            Self::Unrecognized => None,
        }
    }

    /// Object entries only; scalars inside the list are dropped.
    pub fn into_records(self) -> Vec<RawRecord> {
        match self {
            Self::Bare(list) | Self::Items(list) | Self::Data(list) => {
                list.into_iter().filter_map(RawRecord::from_value).collect()
            }
            Self::Unrecognized => Vec::new(),
        }
    }
}
