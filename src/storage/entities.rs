use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::utils::time::WorkingTime;

/// Column names of the work log, in order.
pub const HEADER: [&str; 3] = ["start_time", "end_time", "description"];

/// One tracked work interval, stored as one row of the work log.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct SessionRecord {
    #[serde(with = "timestamp_ser")]
    pub start_time: NaiveDateTime,
    #[serde(with = "timestamp_ser")]
    pub end_time: NaiveDateTime,
    #[serde(default)]
    pub description: String,
}

impl SessionRecord {
    /// A freshly started session: zero length and no description yet.
    pub fn open_at(moment: NaiveDateTime) -> Self {
        Self {
            start_time: moment,
            end_time: moment,
            description: String::new(),
        }
    }

    pub fn elapsed(&self) -> WorkingTime {
        WorkingTime::between(self.start_time, self.end_time)
    }

    pub fn apply(&mut self, field: RecordField) {
        match field {
            RecordField::EndTime(end_time) => self.end_time = end_time,
            RecordField::Description(description) => self.description = description,
        }
    }
}

/// A change to one field of the open row.
#[derive(PartialEq, Eq, Debug, Clone)]
pub enum RecordField {
    EndTime(NaiveDateTime),
    Description(String),
}

mod timestamp_ser {
    use chrono::NaiveDateTime;
    use serde::{self, de::Error, Deserialize, Deserializer, Serializer};

    use crate::utils::time::TIMESTAMP_FORMAT;

    pub fn serialize<S>(moment: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&moment.format(TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&s, TIMESTAMP_FORMAT)
            .map_err(|e| D::Error::custom(format!("invalid timestamp {s:?}: {e}")))
    }
}
