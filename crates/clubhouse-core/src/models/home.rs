use serde::{Deserialize, Serialize};

use super::{Event, NewsItem};

/// Everything the landing page shows, fetched in one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct HomeData {
    #[serde(rename = "upcomingEvents", default)]
    pub upcoming_events: Vec<Event>,
    #[serde(rename = "recentNews", default)]
    pub recent_news: Vec<NewsItem>,
    #[serde(default)]
    pub stats: Vec<Stat>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Stat {
    #[serde(rename = "iconId")]
    pub icon_id: StatIcon,
    pub value: String,
    #[serde(rename = "labelKey")]
    pub label_key: String,
}

/// Icon tag for a stat tile. The UI maps it to an actual icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum StatIcon {
    #[serde(rename = "users")]
    Users,
    #[serde(rename = "calendar")]
    Calendar,
    #[serde(rename = "mapPin")]
    MapPin,
    #[serde(rename = "clock")]
    Clock,
}
