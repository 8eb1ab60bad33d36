use serde::Serialize;

use aclgraph_core::{AppError, AppResult};
use aclgraph_domain::{Entity, EntityGraph, EntityKind, EntitySortField, SortDirection};

use super::{EntityView, Query};

/// Largest accepted page size.
pub const MAX_PAGE_SIZE: i64 = 500;

/// Name filters shared by counting and listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityFilter {
    /// Exact display name match.
    pub name: Option<String>,
    /// Case-insensitive display name substring.
    pub search: Option<String>,
}

impl EntityFilter {
    fn validate(&self) -> AppResult<()> {
        if self.name.as_deref().is_some_and(|value| value.trim().is_empty()) {
            return Err(AppError::Validation(
                "name filter must not be empty".to_owned(),
            ));
        }
        if self
            .search
            .as_deref()
            .is_some_and(|value| value.trim().is_empty())
        {
            return Err(AppError::Validation(
                "search filter must not be empty".to_owned(),
            ));
        }

        Ok(())
    }

    fn matches(&self, entity: &Entity) -> bool {
        let display_name = entity.display_name().as_str();
        let name_matches = self
            .name
            .as_deref()
            .is_none_or(|name| display_name == name.trim());
        let search_matches = self.search.as_deref().is_none_or(|search| {
            display_name
                .to_lowercase()
                .contains(search.trim().to_lowercase().as_str())
        });

        name_matches && search_matches
    }
}

/// Number of entities of one kind matching a filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountEntitiesQuery {
    /// Entity kind.
    pub kind: EntityKind,
    /// Filter.
    pub filter: EntityFilter,
}

impl Query for CountEntitiesQuery {
    type Output = usize;

    fn validate(&self) -> AppResult<()> {
        self.filter.validate()
    }

    fn execute(&self, graph: &EntityGraph) -> AppResult<Self::Output> {
        Ok(graph
            .entities(self.kind)
            .filter(|entity| self.filter.matches(entity))
            .count())
    }
}

/// One page of entities of one kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntitiesQuery {
    /// Entity kind.
    pub kind: EntityKind,
    /// Filter.
    pub filter: EntityFilter,
    /// One-based page number.
    pub page: i64,
    /// Page size in `1..=MAX_PAGE_SIZE`.
    pub page_size: i64,
    /// Sort field.
    pub sort_by: EntitySortField,
    /// Sort direction.
    pub direction: SortDirection,
}

impl ListEntitiesQuery {
    /// Creates a first-page listing ordered by id.
    #[must_use]
    pub fn first_page(kind: EntityKind, page_size: i64) -> Self {
        Self {
            kind,
            filter: EntityFilter::default(),
            page: 1,
            page_size,
            sort_by: EntitySortField::Id,
            direction: SortDirection::Asc,
        }
    }
}

impl Query for ListEntitiesQuery {
    type Output = Vec<EntityView>;

    fn validate(&self) -> AppResult<()> {
        if self.page <= 0 {
            return Err(AppError::Validation(format!(
                "page must be greater than zero, got {}",
                self.page
            )));
        }
        if self.page_size <= 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(AppError::Validation(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}, got {}",
                self.page_size
            )));
        }

        self.filter.validate()
    }

    fn execute(&self, graph: &EntityGraph) -> AppResult<Self::Output> {
        let mut matching: Vec<&Entity> = graph
            .entities(self.kind)
            .filter(|entity| self.filter.matches(entity))
            .collect();

        if self.sort_by == EntitySortField::Name {
            matching.sort_by(|left, right| {
                left.display_name()
                    .as_str()
                    .to_lowercase()
                    .cmp(&right.display_name().as_str().to_lowercase())
                    .then_with(|| left.id().cmp(&right.id()))
            });
        }
        if self.direction == SortDirection::Desc {
            matching.reverse();
        }

        let page_size = usize::try_from(self.page_size).unwrap_or(usize::MAX);
        let offset = usize::try_from(self.page - 1)
            .unwrap_or(usize::MAX)
            .saturating_mul(page_size);

        Ok(matching
            .into_iter()
            .skip(offset)
            .take(page_size)
            .map(EntityView::from)
            .collect())
    }
}

/// Page of entities together with the unpaged match count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityPage {
    /// Entities on the requested page.
    pub items: Vec<EntityView>,
    /// Total matching entities.
    pub total: usize,
    /// One-based page number.
    pub page: i64,
    /// Page size.
    pub page_size: i64,
}

/// Listing composed from a count query and a paged listing query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntitiesWithCountQuery {
    /// Underlying listing.
    pub listing: ListEntitiesQuery,
}

impl ListEntitiesWithCountQuery {
    fn count_query(&self) -> CountEntitiesQuery {
        CountEntitiesQuery {
            kind: self.listing.kind,
            filter: self.listing.filter.clone(),
        }
    }
}

impl Query for ListEntitiesWithCountQuery {
    type Output = EntityPage;

    fn validate(&self) -> AppResult<()> {
        self.listing.validate()?;
        self.count_query().validate()
    }

    fn execute(&self, graph: &EntityGraph) -> AppResult<Self::Output> {
        let total = self.count_query().execute(graph)?;
        let items = self.listing.execute(graph)?;

        Ok(EntityPage {
            items,
            total,
            page: self.listing.page,
            page_size: self.listing.page_size,
        })
    }
}
