//! Data models for the club site.
//!
//! This module contains the payloads served by the API:
//!
//! - `Event`, `NewsItem`: paged list items
//! - `CalendarEvent`: calendar entries with parsed start/end times
//! - `HomeData`, `Stat`: the landing page aggregate
//! - `User`: the signed-in member
//!
//! `ResourceData` is what the query cache stores for every resource kind.

pub mod calendar;
pub mod event;
pub mod home;
pub mod news;
pub mod user;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::query::Page;

pub use calendar::{parse_datetime, CalendarEvent, CalendarEventWire};
pub use event::{Event, Participants};
pub use home::{HomeData, Stat, StatIcon};
pub use news::NewsItem;
pub(crate) use user::UserRecord;
pub use user::{NewUser, ProfileUpdate, User};

/// Record id. The mock API mixes numeric and string ids; both become text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(from = "RawId")]
pub struct Id(pub String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

impl From<RawId> for Id {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(s) => Id(s),
            RawId::Number(n) => Id(n.to_string()),
        }
    }
}

impl Id {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Id(s.to_string())
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single record fetched by id.
#[derive(Debug, Clone, PartialEq)]
pub enum DetailItem {
    Event(Event),
    News(NewsItem),
    User(User),
}

/// Cached payload for any resource kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceData {
    Events(Page<Event>),
    News(Page<NewsItem>),
    Calendar(Vec<CalendarEvent>),
    Home(HomeData),
    /// `None` when the id does not exist. This is a successful result.
    Detail(Option<DetailItem>),
}

impl ResourceData {
    pub fn as_events(&self) -> Option<&Page<Event>> {
        match self {
            ResourceData::Events(page) => Some(page),
            _ => None,
        }
    }

    pub fn as_news(&self) -> Option<&Page<NewsItem>> {
        match self {
            ResourceData::News(page) => Some(page),
            _ => None,
        }
    }

    pub fn as_calendar(&self) -> Option<&[CalendarEvent]> {
        match self {
            ResourceData::Calendar(events) => Some(events),
            _ => None,
        }
    }

    pub fn as_home(&self) -> Option<&HomeData> {
        match self {
            ResourceData::Home(home) => Some(home),
            _ => None,
        }
    }

    /// The detail record, `None` both for "not found" and for non-detail data.
    pub fn as_detail(&self) -> Option<&DetailItem> {
        match self {
            ResourceData::Detail(item) => item.as_ref(),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ResourceData::Detail(None))
    }
}
