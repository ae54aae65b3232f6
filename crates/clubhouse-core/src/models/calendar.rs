use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::Id;

/// Calendar entry as served by the API: start/end are ISO 8601 strings.
#[derive(Debug, Clone, Deserialize)]
pub struct CalendarEventWire {
    pub id: Id,
    #[serde(rename = "titleKey")]
    pub title_key: String,
    pub start: String,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(rename = "categoryKey", default)]
    pub category_key: Option<String>,
    #[serde(rename = "allDay", default)]
    pub all_day: bool,
}

/// Calendar entry with parsed times. A missing end means "same as start".
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct CalendarEvent {
    pub id: Id,
    #[serde(rename = "titleKey")]
    pub title_key: String,
    #[cfg_attr(feature = "ts", ts(type = "string"))]
    pub start: DateTime<FixedOffset>,
    #[cfg_attr(feature = "ts", ts(type = "string"))]
    pub end: DateTime<FixedOffset>,
    #[serde(rename = "categoryKey")]
    pub category_key: Option<String>,
    #[serde(rename = "allDay")]
    pub all_day: bool,
}

/// Parse an ISO 8601 timestamp. Values without an offset are taken as UTC;
/// a bare date is midnight UTC.
pub fn parse_datetime(value: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt);
    }
    let utc = FixedOffset::east_opt(0)?;
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return utc.from_local_datetime(&naive).single();
        }
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?;
    utc.from_local_datetime(&date.and_hms_opt(0, 0, 0)?).single()
}

impl TryFrom<CalendarEventWire> for CalendarEvent {
    type Error = String;

    fn try_from(wire: CalendarEventWire) -> Result<Self, Self::Error> {
        let start = parse_datetime(&wire.start)
            .ok_or_else(|| format!("calendar event {}: invalid start '{}'", wire.id, wire.start))?;
        let end = match wire.end.as_deref() {
            Some(end) => parse_datetime(end)
                .ok_or_else(|| format!("calendar event {}: invalid end '{}'", wire.id, end))?,
            None => start,
        };
        Ok(Self {
            id: wire.id,
            title_key: wire.title_key,
            start,
            end,
            category_key: wire.category_key,
            all_day: wire.all_day,
        })
    }
}

impl CalendarEvent {
    pub fn duration(&self) -> chrono::Duration {
        self.end - self.start
    }

    /// Whether the event overlaps the given UTC day.
    pub fn occurs_on(&self, day: NaiveDate) -> bool {
        let start = self.start.with_timezone(&Utc).date_naive();
        let end = self.end.with_timezone(&Utc).date_naive();
        start <= day && day <= end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_datetime_variants() {
        assert!(parse_datetime("2026-05-02T18:00:00+02:00").is_some());
        assert!(parse_datetime("2026-05-02T18:00:00Z").is_some());
        let naive = parse_datetime("2026-05-02T18:00:00").expect("naive datetime");
        assert_eq!(naive.offset().local_minus_utc(), 0);
        assert!(parse_datetime("2026-05-02T18:00").is_some());
        assert!(parse_datetime("2026-05-02").is_some());
        assert!(parse_datetime("next tuesday").is_none());
    }

    #[test]
    fn test_convert_wire_event() {
        let json = r#"{"id":4,"titleKey":"calendar.training","start":"2026-05-02T18:00:00Z","end":"2026-05-03T10:00:00Z"}"#;
        let wire: CalendarEventWire = serde_json::from_str(json).expect("valid wire event");
        let event = CalendarEvent::try_from(wire).expect("valid dates");
        assert_eq!(event.duration(), chrono::Duration::hours(16));
        assert!(event.occurs_on(NaiveDate::from_ymd_opt(2026, 5, 3).expect("date")));
        assert!(!event.occurs_on(NaiveDate::from_ymd_opt(2026, 5, 4).expect("date")));
    }

    #[test]
    fn test_missing_end_defaults_to_start() {
        let json = r#"{"id":"x","titleKey":"t","start":"2026-05-02"}"#;
        let wire: CalendarEventWire = serde_json::from_str(json).expect("valid wire event");
        let event = CalendarEvent::try_from(wire).expect("valid dates");
        assert_eq!(event.start, event.end);
    }

    #[test]
    fn test_invalid_start_is_rejected() {
        let json = r#"{"id":9,"titleKey":"t","start":"soon"}"#;
        let wire: CalendarEventWire = serde_json::from_str(json).expect("valid wire event");
        let err = CalendarEvent::try_from(wire).expect_err("invalid start");
        assert!(err.contains("invalid start 'soon'"));
    }
}
