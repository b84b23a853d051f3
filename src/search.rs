// Structured object search
//
// A query's `filters` is a list of AND-groups; a record matches when it
// satisfies every filter of at least one group.

use reqwest::Method;
use serde::Serialize;

use crate::api::{ApiClient, ApiResult};
use crate::error::ApiError;
use crate::invoker::ApiCall;
use crate::transport::{Clock, Transport};

pub const COMPUTERS: &str = "Computers";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Operator {
    #[serde(rename = "=")]
    Equals,
    #[serde(rename = "<>")]
    NotEquals,
}

/// One field comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Filter {
    #[serde(rename = "name")]
    pub field: String,
    pub value: String,
    #[serde(rename = "operation")]
    pub operator: Operator,
}

impl Filter {
    pub fn equals(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self { field: field.into(), value: value.into(), operator: Operator::Equals }
    }

    pub fn not_equals(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self { field: field.into(), value: value.into(), operator: Operator::NotEquals }
    }
}

/// Conjunction of filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FilterGroup(Vec<Filter>);

impl FilterGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and(mut self, filter: Filter) -> Self {
        self.0.push(filter);
        self
    }

    pub fn push(&mut self, filter: Filter) {
        self.0.push(filter);
    }

    pub fn filters(&self) -> &[Filter] {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sort {
    pub property: String,
    pub direction: SortDirection,
}

/// Request body of a search. Cloned before every tier-specific change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchParams {
    pub filters: Vec<FilterGroup>,
    pub sort: Vec<Sort>,
    /// Requested field names, grouped.
    pub fields: Vec<Vec<String>>,
}

impl SearchParams {
    /// Query returning only `id_field`, newest record first.
    pub fn newest_first(id_field: &str) -> Self {
        Self {
            filters: Vec::new(),
            sort: vec![Sort { property: id_field.to_string(), direction: SortDirection::Desc }],
            fields: vec![vec![id_field.to_string()]],
        }
    }

    pub fn with_groups(mut self, groups: impl IntoIterator<Item = FilterGroup>) -> Self {
        self.filters.extend(groups);
        self
    }
}

impl<T: Transport, C: Clock> ApiClient<T, C> {
    /// `POST <base>/<object_class>` with `params` as the body.
    pub fn search(
        &mut self,
        object_class: &str,
        params: &SearchParams,
    ) -> Result<ApiResult, ApiError> {
        let call = ApiCall {
            operation: format!("search {}", object_class),
            endpoint: object_class.to_string(),
            method: Method::POST,
            params: serde_json::to_value(params)?,
        };
        self.call(&call)
    }

    pub fn search_computers(&mut self, params: &SearchParams) -> Result<ApiResult, ApiError> {
        self.search(COMPUTERS, params)
    }
}
