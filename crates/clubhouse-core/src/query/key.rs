//! Query keys and the parameters they are built from.
//!
//! A [`QueryKey`] is the canonical identity of one (resource, parameters)
//! combination. Keys are built by [`build_key`], which normalizes filter
//! values so that "no filter" has exactly one representation.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Filter key recognised by events and news.
pub const FILTER_CATEGORY: &str = "categoryKey";

/// Filter key recognised by events only.
pub const FILTER_STATUS: &str = "statusKey";

/// The fetchable entity categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceKind {
    Events,
    News,
    CalendarEvents,
    HomeAggregate,
    Detail,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Events => "events",
            ResourceKind::News => "news",
            ResourceKind::CalendarEvents => "calendarEvents",
            ResourceKind::HomeAggregate => "homeAggregate",
            ResourceKind::Detail => "detail",
        }
    }

    /// Filter keys this resource accepts, in canonical order.
    pub fn filter_keys(&self) -> &'static [&'static str] {
        match self {
            ResourceKind::Events => &[FILTER_CATEGORY, FILTER_STATUS],
            ResourceKind::News => &[FILTER_CATEGORY],
            _ => &[],
        }
    }

    /// Sort fields this resource accepts.
    pub fn sort_fields(&self) -> &'static [SortField] {
        match self {
            ResourceKind::Events => &[SortField::Date, SortField::TitleKey, SortField::ParticipantsCount],
            ResourceKind::News => &[SortField::Date, SortField::TitleKey],
            _ => &[],
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collections addressable by id through a detail fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Collection {
    Events,
    News,
    Users,
}

impl Collection {
    /// URL path segment on the API.
    pub fn path(&self) -> &'static str {
        match self {
            Collection::Events => "events",
            Collection::News => "news",
            Collection::Users => "users",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            SortOrder::Asc => SortOrder::Desc,
            SortOrder::Desc => SortOrder::Asc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum SortField {
    #[default]
    #[serde(rename = "date")]
    Date,
    #[serde(rename = "titleKey")]
    TitleKey,
    #[serde(rename = "participants.count")]
    ParticipantsCount,
}

impl SortField {
    /// Field name as the API expects it in `_sort`.
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::Date => "date",
            SortField::TitleKey => "titleKey",
            SortField::ParticipantsCount => "participants.count",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: SortField,
    pub order: SortOrder,
}

impl SortSpec {
    pub fn new(field: SortField, order: SortOrder) -> Self {
        Self { field, order }
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field.as_str(), self.order.as_str())
    }
}

/// Parameters of a paged, sortable, filterable list.
///
/// Filter values are kept as the UI supplied them (`None`, `""` or a value);
/// normalization happens in [`build_key`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListParams {
    pub page: u32,
    pub page_size: u32,
    pub sort: SortSpec,
    pub filters: BTreeMap<String, Option<String>>,
}

impl ListParams {
    pub fn new(page_size: u32) -> Self {
        Self {
            page: 1,
            page_size,
            sort: SortSpec::default(),
            filters: BTreeMap::new(),
        }
    }

    /// Move to another page, keeping sort and filters.
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    /// Change the sort. Resets to page 1.
    pub fn with_sort(mut self, field: SortField, order: SortOrder) -> Self {
        self.sort = SortSpec::new(field, order);
        self.page = 1;
        self
    }

    /// Set a filter value. An empty string means "no filter". Resets to page 1.
    pub fn with_filter(self, key: &str, value: impl Into<String>) -> Self {
        self.set_filter(key, Some(value.into()))
    }

    /// Set or clear a filter value. Resets to page 1.
    pub fn set_filter(mut self, key: &str, value: Option<String>) -> Self {
        self.filters.insert(key.to_string(), value);
        self.page = 1;
        self
    }

    /// Drop every filter. Resets to page 1.
    pub fn clear_filters(mut self) -> Self {
        self.filters.clear();
        self.page = 1;
        self
    }

    pub fn filter(&self, key: &str) -> Option<&str> {
        self.filters
            .get(key)
            .and_then(|v| v.as_deref())
            .filter(|v| !v.is_empty())
    }
}

/// What to fetch. The variant determines the [`ResourceKind`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryParams {
    Events(ListParams),
    News(ListParams),
    CalendarEvents,
    HomeAggregate,
    Detail { collection: Collection, id: String },
}

impl QueryParams {
    pub fn kind(&self) -> ResourceKind {
        match self {
            QueryParams::Events(_) => ResourceKind::Events,
            QueryParams::News(_) => ResourceKind::News,
            QueryParams::CalendarEvents => ResourceKind::CalendarEvents,
            QueryParams::HomeAggregate => ResourceKind::HomeAggregate,
            QueryParams::Detail { .. } => ResourceKind::Detail,
        }
    }

    pub fn detail(collection: Collection, id: impl Into<String>) -> Self {
        QueryParams::Detail {
            collection,
            id: id.into(),
        }
    }

    pub fn list(&self) -> Option<&ListParams> {
        match self {
            QueryParams::Events(p) | QueryParams::News(p) => Some(p),
            _ => None,
        }
    }

    pub fn key(&self) -> QueryKey {
        build_key(self)
    }
}

/// A filter slot in a key. Absent and empty values both collapse to `Unset`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FilterValue {
    Unset,
    Is(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum KeyScope {
    List {
        page: u32,
        page_size: u32,
        sort: SortSpec,
        filters: Vec<(&'static str, FilterValue)>,
    },
    Whole,
    Item {
        collection: Collection,
        id: String,
    },
}

/// Canonical, hashable identity of a query. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
    kind: ResourceKind,
    scope: KeyScope,
}

impl QueryKey {
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn page(&self) -> Option<u32> {
        match &self.scope {
            KeyScope::List { page, .. } => Some(*page),
            _ => None,
        }
    }

    pub fn page_size(&self) -> Option<u32> {
        match &self.scope {
            KeyScope::List { page_size, .. } => Some(*page_size),
            _ => None,
        }
    }

    pub fn sort(&self) -> Option<SortSpec> {
        match &self.scope {
            KeyScope::List { sort, .. } => Some(*sort),
            _ => None,
        }
    }

    pub fn filter(&self, name: &str) -> Option<&FilterValue> {
        match &self.scope {
            KeyScope::List { filters, .. } => filters.iter().find(|(k, _)| *k == name).map(|(_, v)| v),
            _ => None,
        }
    }

    /// `(collection, id)` for detail keys.
    pub fn item(&self) -> Option<(Collection, &str)> {
        match &self.scope {
            KeyScope::Item { collection, id } => Some((*collection, id.as_str())),
            _ => None,
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        match &self.scope {
            KeyScope::List {
                page,
                page_size,
                sort,
                filters,
            } => {
                write!(f, "[page={page} size={page_size} sort={sort}")?;
                for (name, value) in filters {
                    match value {
                        FilterValue::Unset => write!(f, " {name}=*")?,
                        FilterValue::Is(v) => write!(f, " {name}={v}")?,
                    }
                }
                write!(f, "]")
            }
            KeyScope::Whole => Ok(()),
            KeyScope::Item { collection, id } => write!(f, "[{}/{}]", collection.path(), id),
        }
    }
}

/// Derive the canonical key for a query. Pure and deterministic.
///
/// Page and page size are clamped to at least 1. Sort fields the resource
/// does not support fall back to `date`; unknown filter keys are ignored.
pub fn build_key(params: &QueryParams) -> QueryKey {
    let kind = params.kind();
    let scope = match params {
        QueryParams::Events(list) | QueryParams::News(list) => {
            let mut sort = list.sort;
            if !kind.sort_fields().contains(&sort.field) {
                debug!(kind = %kind, field = sort.field.as_str(), "Unsupported sort field, using date");
                sort.field = SortField::Date;
            }

            for name in list.filters.keys() {
                if !kind.filter_keys().contains(&name.as_str()) {
                    debug!(kind = %kind, filter = %name, "Ignoring unrecognised filter");
                }
            }

            let filters = kind
                .filter_keys()
                .iter()
                .map(|name| {
                    let value = match list.filter(name) {
                        Some(v) => FilterValue::Is(v.to_string()),
                        None => FilterValue::Unset,
                    };
                    (*name, value)
                })
                .collect();

            KeyScope::List {
                page: list.page.max(1),
                page_size: list.page_size.max(1),
                sort,
                filters,
            }
        }
        QueryParams::CalendarEvents | QueryParams::HomeAggregate => KeyScope::Whole,
        QueryParams::Detail { collection, id } => KeyScope::Item {
            collection: *collection,
            id: id.clone(),
        },
    };

    QueryKey { kind, scope }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events() -> ListParams {
        ListParams::new(6)
    }

    #[test]
    fn test_build_key_is_deterministic() {
        let params = QueryParams::Events(events().with_filter(FILTER_CATEGORY, "sports"));
        assert_eq!(build_key(&params), build_key(&params));
        assert_eq!(build_key(&params), params.clone().key());
    }

    #[test]
    fn test_unset_and_empty_filters_are_equal() {
        let absent = QueryParams::Events(events());
        let empty = QueryParams::Events(events().with_filter(FILTER_CATEGORY, ""));
        let none = QueryParams::Events(events().set_filter(FILTER_STATUS, None));
        assert_eq!(build_key(&absent), build_key(&empty));
        assert_eq!(build_key(&absent), build_key(&none));
        assert_eq!(build_key(&absent).filter(FILTER_CATEGORY), Some(&FilterValue::Unset));
    }

    #[test]
    fn test_filter_value_changes_key() {
        let a = build_key(&QueryParams::Events(events().with_filter(FILTER_STATUS, "upcoming")));
        let b = build_key(&QueryParams::Events(events().with_filter(FILTER_STATUS, "past")));
        assert_ne!(a, b);
    }

    #[test]
    fn test_unrecognised_filters_are_ignored() {
        // news has no status filter
        let plain = build_key(&QueryParams::News(events()));
        let extra = build_key(&QueryParams::News(events().with_filter(FILTER_STATUS, "past")));
        assert_eq!(plain, extra);
        assert_eq!(extra.filter(FILTER_STATUS), None);
    }

    #[test]
    fn test_kind_distinguishes_keys() {
        assert_ne!(
            build_key(&QueryParams::Events(events())),
            build_key(&QueryParams::News(events()))
        );
    }

    #[test]
    fn test_filter_and_sort_change_resets_page() {
        let on_page_three = events().with_page(3);
        assert_eq!(build_key(&QueryParams::Events(on_page_three.clone())).page(), Some(3));

        let filtered = on_page_three.clone().with_filter(FILTER_CATEGORY, "training");
        assert_eq!(build_key(&QueryParams::Events(filtered)).page(), Some(1));

        let sorted = on_page_three.with_sort(SortField::TitleKey, SortOrder::Asc);
        let key = build_key(&QueryParams::Events(sorted));
        assert_eq!(key.page(), Some(1));
        assert_eq!(key.sort(), Some(SortSpec::new(SortField::TitleKey, SortOrder::Asc)));
    }

    #[test]
    fn test_page_is_clamped() {
        let key = build_key(&QueryParams::Events(events().with_page(0)));
        assert_eq!(key.page(), Some(1));
        let key = build_key(&QueryParams::Events(ListParams::new(0)));
        assert_eq!(key.page_size(), Some(1));
    }

    #[test]
    fn test_news_rejects_participant_sort() {
        let params = QueryParams::News(events().with_sort(SortField::ParticipantsCount, SortOrder::Asc));
        assert_eq!(build_key(&params).sort().map(|s| s.field), Some(SortField::Date));
    }

    #[test]
    fn test_detail_keys() {
        let a = build_key(&QueryParams::detail(Collection::Events, "7"));
        let b = build_key(&QueryParams::detail(Collection::Events, "7"));
        let c = build_key(&QueryParams::detail(Collection::News, "7"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.kind(), ResourceKind::Detail);
        assert_eq!(a.page(), None);
        assert_eq!(a.item(), Some((Collection::Events, "7")));
    }

    #[test]
    fn test_key_display() {
        let key = build_key(&QueryParams::Events(events().with_filter(FILTER_CATEGORY, "sports")));
        assert_eq!(
            key.to_string(),
            "events[page=1 size=6 sort=date desc categoryKey=sports statusKey=*]"
        );
        assert_eq!(build_key(&QueryParams::HomeAggregate).to_string(), "homeAggregate");
    }
}
