use chrono::DateTime;
use serde::{Deserialize, Serialize};

use super::Id;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Event {
    pub id: Id,
    #[serde(rename = "titleKey")]
    pub title_key: String,
    #[serde(rename = "descriptionKey", default)]
    pub description_key: Option<String>,
    pub date: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(rename = "categoryKey")]
    pub category_key: String,
    #[serde(rename = "statusKey")]
    pub status_key: String,
    #[serde(default)]
    pub participants: Participants,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Participants {
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub max: Option<u32>,
}

impl Participants {
    /// Remaining places, `None` when the event has no cap.
    pub fn spots_left(&self) -> Option<u32> {
        self.max.map(|max| max.saturating_sub(self.count))
    }

    pub fn is_full(&self) -> bool {
        self.spots_left() == Some(0)
    }
}

impl Event {
    pub fn formatted_date(&self) -> String {
        if let Ok(dt) = DateTime::parse_from_rfc3339(&self.date) {
            dt.format("%b %d, %Y").to_string()
        } else if self.date.is_empty() {
            "TBD".to_string()
        } else {
            // Fall back to the raw date portion
            self.date.chars().take(10).collect()
        }
    }

    pub fn is_upcoming(&self) -> bool {
        self.status_key == "upcoming"
    }
}
