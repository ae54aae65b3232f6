use serde::{Deserialize, Serialize};

use super::Id;

/// A club member as exposed to the rest of the app. Never carries a password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct User {
    pub id: Id,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(rename = "memberSince", default, skip_serializing_if = "Option::is_none")]
    pub member_since: Option<String>,
}

/// User row as stored by the mock API, password included.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct UserRecord {
    #[serde(flatten)]
    pub user: User,
    #[serde(default)]
    pub password: Option<String>,
}

/// Registration payload.
#[derive(Debug, Clone, Serialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(rename = "memberSince", skip_serializing_if = "Option::is_none")]
    pub member_since: Option<String>,
}

/// Profile fields a member may change. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl User {
    pub fn initials(&self) -> String {
        self.name
            .split_whitespace()
            .filter_map(|part| part.chars().next())
            .take(2)
            .flat_map(|c| c.to_uppercase())
            .collect()
    }
}
