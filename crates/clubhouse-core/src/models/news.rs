use chrono::DateTime;
use serde::{Deserialize, Serialize};

use super::Id;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct NewsItem {
    pub id: Id,
    #[serde(rename = "titleKey")]
    pub title_key: String,
    #[serde(rename = "excerptKey", default)]
    pub excerpt_key: Option<String>,
    #[serde(rename = "contentKey", default)]
    pub content_key: Option<String>,
    pub date: String,
    #[serde(rename = "categoryKey")]
    pub category_key: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

impl NewsItem {
    pub fn formatted_date(&self) -> String {
        match DateTime::parse_from_rfc3339(&self.date) {
            Ok(dt) => dt.format("%b %d, %Y").to_string(),
            Err(_) => self.date.chars().take(10).collect(),
        }
    }
}
