//! Query builder: translates query state into a request descriptor.
//!
//! [`RequestDescriptor`] is source-neutral: a list of [`Constraint`]s, one
//! sort key and a cursor window. [`RequestDescriptor::query_pairs`] renders
//! it as REST query parameters; the Postgres and in-memory sources render
//! the same constraints their own way.

use crate::domain::{Cursor, Field, FilterValue, PageRequest, SortKey};

/// How the sort key is sent to a REST backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortStyle {
    /// `sort=field-dir`.
    #[default]
    Combined,
    /// `sortBy=field&sortOrder=dir`.
    Split,
}

/// Parameter naming of a REST backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamStyle {
    /// Name of the search parameter (`q` or `search`).
    pub search_param: String,
    /// How the sort key is encoded.
    pub sort: SortStyle,
}

impl Default for ParamStyle {
    fn default() -> Self {
        Self {
            search_param: "q".to_string(),
            sort: SortStyle::Combined,
        }
    }
}

/// A single constraint against the result set.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// Free-text search over the item's searchable fields.
    Search(String),
    /// Field equals text.
    Equals {
        /// Constrained field.
        field: Field,
        /// Required value.
        value: String,
    },
    /// Field equals flag.
    Flag {
        /// Constrained field.
        field: Field,
        /// Required value.
        value: bool,
    },
    /// Field lies within inclusive bounds; at least one bound is set.
    Range {
        /// Constrained field.
        field: Field,
        /// Lower bound.
        min: Option<f64>,
        /// Upper bound.
        max: Option<f64>,
    },
}

/// Source-neutral description of one page request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    /// Constraints, all of which must hold.
    pub constraints: Vec<Constraint>,
    /// Single sort key.
    pub order: SortKey,
    /// Chunk to fetch.
    pub window: Cursor,
}

impl RequestDescriptor {
    /// Builds the descriptor for `request`.
    ///
    /// Sentinel filters, unbounded ranges and empty search terms produce no
    /// constraint.
    #[must_use]
    pub fn build(request: &PageRequest) -> Self {
        let criteria = &request.criteria;
        let mut constraints = Vec::new();
        if let Some(term) = criteria.search_term() {
            constraints.push(Constraint::Search(term.to_string()));
        }
        for (field, value) in criteria.active_filters() {
            let constraint = match value {
                FilterValue::All => continue,
                FilterValue::Equals(text) => {
                    let text = text.trim();
                    if text.is_empty() {
                        continue;
                    }
                    Constraint::Equals {
                        field,
                        value: text.to_string(),
                    }
                }
                FilterValue::Flag(flag) => Constraint::Flag {
                    field,
                    value: *flag,
                },
                FilterValue::Range { min, max } => {
                    if min.is_none() && max.is_none() {
                        continue;
                    }
                    Constraint::Range {
                        field,
                        min: *min,
                        max: *max,
                    }
                }
            };
            constraints.push(constraint);
        }
        Self {
            constraints,
            order: criteria.sort,
            window: request.cursor.clone(),
        }
    }

    /// Renders the descriptor as REST query parameters.
    ///
    /// Optional parameters appear only when they constrain something.
    #[must_use]
    pub fn query_pairs(&self, style: &ParamStyle) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(self.constraints.len() + 4);
        for constraint in &self.constraints {
            match constraint {
                Constraint::Search(term) => {
                    pairs.push((style.search_param.clone(), term.clone()));
                }
                Constraint::Equals { field, value } => {
                    pairs.push((field.param().to_string(), value.clone()));
                }
                Constraint::Flag { field, value } => {
                    pairs.push((field.param().to_string(), value.to_string()));
                }
                Constraint::Range { field, min, max } => {
                    let (min_param, max_param) = field.range_params();
                    if let Some(min) = min {
                        pairs.push((min_param.to_string(), min.to_string()));
                    }
                    if let Some(max) = max {
                        pairs.push((max_param.to_string(), max.to_string()));
                    }
                }
            }
        }

        match style.sort {
            SortStyle::Combined => pairs.push(("sort".to_string(), self.order.to_string())),
            SortStyle::Split => {
                pairs.push(("sortBy".to_string(), self.order.field.column().to_string()));
                pairs.push((
                    "sortOrder".to_string(),
                    self.order.direction.as_str().to_string(),
                ));
            }
        }

        match &self.window {
            Cursor::Offset { offset, limit } => {
                pairs.push(("start".to_string(), offset.to_string()));
                pairs.push(("limit".to_string(), limit.to_string()));
            }
            Cursor::Page { page, per_page } => {
                pairs.push(("page".to_string(), page.to_string()));
                pairs.push(("limit".to_string(), per_page.to_string()));
            }
            Cursor::Token { token, limit } => {
                if let Some(token) = token {
                    pairs.push(("pageToken".to_string(), token.clone()));
                }
                pairs.push(("limit".to_string(), limit.to_string()));
            }
        }
        pairs
    }
}
