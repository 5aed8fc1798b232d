//! Declarative query options.

use crate::error::{CoreError, CoreResult};
use crate::predicate::{Predicate, PropertyRef};
use serde::{Deserialize, Serialize};

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortDirection {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

impl SortDirection {
    /// SQL keyword.
    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// One ORDER BY key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    /// Property to sort on.
    pub property: PropertyRef,
    /// Direction.
    #[serde(default)]
    pub direction: SortDirection,
}

/// What to fetch: filter, order, page and eager-loaded navigations.
///
/// Sort keys apply in insertion order. Page indexes start at 1; a `None`
/// page size means no paging. With no eager-load paths, navigations are
/// discovered automatically unless [`without_eager_load`](Self::without_eager_load)
/// is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryOptions {
    /// Filter.
    pub predicate: Option<Predicate>,
    /// Sort keys.
    pub sort_keys: Vec<SortKey>,
    /// 1-based page index.
    pub page_index: u32,
    /// Rows per page; `None` disables paging.
    pub page_size: Option<u32>,
    /// Navigation properties to join.
    pub eager_load: Vec<String>,
    /// Whether navigations are discovered when `eager_load` is empty.
    pub auto_eager_load: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            predicate: None,
            sort_keys: Vec::new(),
            page_index: 1,
            page_size: None,
            eager_load: Vec::new(),
            auto_eager_load: true,
        }
    }
}

impl QueryOptions {
    /// Creates options that fetch everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a filter, ANDed with any existing one.
    #[must_use]
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(match self.predicate.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    /// Appends an ascending sort key.
    #[must_use]
    pub fn order_by(self, property: impl Into<PropertyRef>) -> Self {
        self.sort(property.into(), SortDirection::Asc)
    }

    /// Appends a descending sort key.
    #[must_use]
    pub fn order_by_desc(self, property: impl Into<PropertyRef>) -> Self {
        self.sort(property.into(), SortDirection::Desc)
    }

    fn sort(mut self, property: PropertyRef, direction: SortDirection) -> Self {
        self.sort_keys.push(SortKey {
            property,
            direction,
        });
        self
    }

    /// Requests one page.
    #[must_use]
    pub fn page(mut self, page_index: u32, page_size: u32) -> Self {
        self.page_index = page_index;
        self.page_size = Some(page_size);
        self
    }

    /// Eager-loads a navigation property. Repeats are ignored.
    #[must_use]
    pub fn include(mut self, navigation: impl Into<String>) -> Self {
        let navigation = navigation.into();
        if !self.eager_load.contains(&navigation) {
            self.eager_load.push(navigation);
        }
        self
    }

    /// Disables automatic navigation discovery.
    #[must_use]
    pub fn without_eager_load(mut self) -> Self {
        self.auto_eager_load = false;
        self
    }

    /// Returns true if a page size is set.
    #[must_use]
    pub fn is_paged(&self) -> bool {
        self.page_size.is_some()
    }

    /// Rows skipped before the requested page.
    #[must_use]
    pub fn offset(&self) -> u64 {
        let size = u64::from(self.page_size.unwrap_or(0));
        size * u64::from(self.page_index.saturating_sub(1))
    }

    /// Checks the page index.
    pub fn validate(&self) -> CoreResult<()> {
        if self.is_paged() && self.page_index < 1 {
            return Err(CoreError::InvalidPage {
                page_index: self.page_index,
            });
        }
        Ok(())
    }
}
