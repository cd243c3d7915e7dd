//! Declarative filter, sort and pagination types.
//!
//! Collections declare which fields callers may filter on ([`FieldSpec`]) and
//! sort by ([`SortSpec`]). Raw request parameters are turned into a typed
//! [`Filter`] list by [`parse_filters`]; storage backends consume that list and
//! never see unvetted field names.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Page size used when the caller does not supply one.
pub const DEFAULT_LIMIT: u32 = 20;

/// Upper bound on a single page, and on the keys accepted by a bulk query.
pub const MAX_LIMIT: u32 = 10_000;

// ─── Field declarations ──────────────────────────────────────────────────────

/// How a filter value is compared against the stored field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
  /// Full equality.
  Exact,
  /// Case-insensitive substring match on the field coerced to text.
  Wildcard,
}

/// The value type a filter parameter must parse as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
  Text,
  Integer,
  /// A closed set of text values; always matched exactly.
  OneOf(&'static [&'static str]),
}

/// A filterable field: the request parameter that carries it, the stored
/// field it applies to, and how it may be matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
  pub param:    &'static str,
  pub field:    &'static str,
  pub ty:       FieldType,
  /// Whether the field switches to [`MatchMode::Wildcard`] when the caller
  /// asks for wildcard search.
  pub wildcard: bool,
}

impl FieldSpec {
  pub const fn text(param: &'static str, field: &'static str) -> Self {
    Self { param, field, ty: FieldType::Text, wildcard: true }
  }

  pub const fn integer(param: &'static str, field: &'static str) -> Self {
    Self { param, field, ty: FieldType::Integer, wildcard: true }
  }

  pub const fn exact(param: &'static str, field: &'static str) -> Self {
    Self { param, field, ty: FieldType::Text, wildcard: false }
  }

  pub const fn one_of(
    param: &'static str,
    field: &'static str,
    values: &'static [&'static str],
  ) -> Self {
    Self { param, field, ty: FieldType::OneOf(values), wildcard: false }
  }

  /// Turn a raw parameter value into a typed [`Filter`].
  pub fn parse(&self, raw: &str, wild: bool) -> Result<Filter> {
    let invalid = || Error::InvalidFilterValue {
      field: self.param.to_owned(),
      value: raw.to_owned(),
    };

    let mode = if wild && self.wildcard {
      MatchMode::Wildcard
    } else {
      MatchMode::Exact
    };

    let value = match self.ty {
      FieldType::Text => FilterValue::Text(raw.to_owned()),
      // A wildcard search on a number is a substring search on its digits.
      FieldType::Integer if mode == MatchMode::Wildcard => {
        FilterValue::Text(raw.to_owned())
      }
      FieldType::Integer => {
        FilterValue::Integer(raw.trim().parse().map_err(|_| invalid())?)
      }
      FieldType::OneOf(values) => {
        if !values.contains(&raw) {
          return Err(invalid());
        }
        FilterValue::Text(raw.to_owned())
      }
    };

    Ok(Filter { field: self.field, mode, value })
  }
}

// ─── Filters ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
  Text(String),
  Integer(i64),
}

impl fmt::Display for FilterValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Text(s) => f.write_str(s),
      Self::Integer(n) => write!(f, "{n}"),
    }
  }
}

impl From<&str> for FilterValue {
  fn from(s: &str) -> Self { Self::Text(s.to_owned()) }
}

impl From<String> for FilterValue {
  fn from(s: String) -> Self { Self::Text(s) }
}

impl From<i64> for FilterValue {
  fn from(n: i64) -> Self { Self::Integer(n) }
}

/// One conjunct of a list query. `field` always comes from a static
/// declaration, never from the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
  pub field: &'static str,
  pub mode:  MatchMode,
  pub value: FilterValue,
}

impl Filter {
  pub fn exact(field: &'static str, value: impl Into<FilterValue>) -> Self {
    Self { field, mode: MatchMode::Exact, value: value.into() }
  }

  pub fn wildcard(field: &'static str, value: impl Into<FilterValue>) -> Self {
    Self { field, mode: MatchMode::Wildcard, value: value.into() }
  }
}

/// Build the filter list for a request.
///
/// Parameters that match no declaration are ignored, as are empty values.
/// Filters come back in declaration order.
pub fn parse_filters<'a, I>(
  specs: &[FieldSpec],
  params: I,
  wild: bool,
) -> Result<Vec<Filter>>
where
  I: IntoIterator<Item = (&'a str, &'a str)>,
{
  let params: Vec<(&str, &str)> = params.into_iter().collect();

  specs
    .iter()
    .filter_map(|spec| {
      params
        .iter()
        .find(|(name, value)| *name == spec.param && !value.is_empty())
        .map(|(_, value)| spec.parse(value, wild))
    })
    .collect()
}

// ─── Sorting ─────────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
  #[default]
  Asc,
  Desc,
}

impl SortDirection {
  pub fn as_sql(self) -> &'static str {
    match self {
      Self::Asc => "ASC",
      Self::Desc => "DESC",
    }
  }
}

impl FromStr for SortDirection {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    if s.eq_ignore_ascii_case("asc") {
      Ok(Self::Asc)
    } else if s.eq_ignore_ascii_case("desc") {
      Ok(Self::Desc)
    } else {
      Err(Error::InvalidSortDirection(s.to_owned()))
    }
  }
}

/// A sortable field and the alias callers use to request it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
  pub name:  &'static str,
  pub field: &'static str,
}

impl SortSpec {
  pub const fn new(name: &'static str, field: &'static str) -> Self {
    Self { name, field }
  }
}

/// Resolve a requested sort key against the declared aliases and field names
/// (case-insensitively). Anything unrecognised falls back to `default`.
pub fn resolve_sort(
  sorts: &[SortSpec],
  requested: Option<&str>,
  default: &'static str,
) -> &'static str {
  let Some(requested) = requested else { return default };
  sorts
    .iter()
    .find(|s| {
      s.name.eq_ignore_ascii_case(requested)
        || s.field.eq_ignore_ascii_case(requested)
    })
    .map(|s| s.field)
    .unwrap_or(default)
}

// ─── List query & page ───────────────────────────────────────────────────────

/// Parameters for every list operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
  /// Applied conjunctively.
  pub filters:   Vec<Filter>,
  /// Requested sort key; resolved by the collection being listed.
  pub sort_by:   Option<String>,
  pub direction: SortDirection,
  pub limit:     u32,
  pub offset:    u32,
}

impl Default for ListQuery {
  fn default() -> Self {
    Self {
      filters:   Vec::new(),
      sort_by:   None,
      direction: SortDirection::Asc,
      limit:     DEFAULT_LIMIT,
      offset:    0,
    }
  }
}

impl ListQuery {
  /// The page size actually applied.
  pub fn effective_limit(&self) -> u32 { self.limit.min(MAX_LIMIT) }
}

/// One page of results plus the number of matches before pagination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
  pub items: Vec<T>,
  pub total: u64,
}

#[cfg(test)]
mod tests {
  use super::*;

  const SPECS: &[FieldSpec] = &[
    FieldSpec::text("command_stem", "command_stem"),
    FieldSpec::text("ops_cat", "operations_category"),
    FieldSpec::integer("sub_address", "sub_address"),
    FieldSpec::one_of("derived", "derived", &["Yes", "No"]),
  ];

  #[test]
  fn exact_mode_unless_wild_requested() {
    let filters =
      parse_filters(SPECS, [("command_stem", "ST")], false).unwrap();
    assert_eq!(filters, vec![Filter::exact("command_stem", "ST")]);

    let filters = parse_filters(SPECS, [("command_stem", "ST")], true).unwrap();
    assert_eq!(filters, vec![Filter::wildcard("command_stem", "ST")]);
  }

  #[test]
  fn param_names_map_to_stored_fields() {
    let filters = parse_filters(SPECS, [("ops_cat", "POWER")], false).unwrap();
    assert_eq!(filters[0].field, "operations_category");
  }

  #[test]
  fn unknown_and_empty_params_are_ignored() {
    let filters = parse_filters(
      SPECS,
      [("limit", "5"), ("command_stem", ""), ("nonsense", "x")],
      true,
    )
    .unwrap();
    assert!(filters.is_empty());
  }

  #[test]
  fn integer_fields_parse_in_exact_mode() {
    let filters = parse_filters(SPECS, [("sub_address", "12")], false).unwrap();
    assert_eq!(filters, vec![Filter::exact("sub_address", 12_i64)]);

    let err = parse_filters(SPECS, [("sub_address", "twelve")], false);
    assert!(matches!(err, Err(Error::InvalidFilterValue { .. })));
  }

  #[test]
  fn integer_fields_search_as_text_in_wildcard_mode() {
    let filters = parse_filters(SPECS, [("sub_address", "1")], true).unwrap();
    assert_eq!(filters, vec![Filter::wildcard("sub_address", "1")]);
  }

  #[test]
  fn closed_sets_stay_exact_and_reject_strangers() {
    let filters = parse_filters(SPECS, [("derived", "Yes")], true).unwrap();
    assert_eq!(filters, vec![Filter::exact("derived", "Yes")]);
    assert!(parse_filters(SPECS, [("derived", "maybe")], true).is_err());
  }

  #[test]
  fn filters_follow_declaration_order() {
    let filters = parse_filters(
      SPECS,
      [("ops_cat", "A"), ("command_stem", "B")],
      false,
    )
    .unwrap();
    let fields: Vec<_> = filters.iter().map(|f| f.field).collect();
    assert_eq!(fields, ["command_stem", "operations_category"]);
  }

  #[test]
  fn sort_direction_is_case_insensitive() {
    assert_eq!("desc".parse::<SortDirection>().unwrap(), SortDirection::Desc);
    assert_eq!("ASC".parse::<SortDirection>().unwrap(), SortDirection::Asc);
    assert!("sideways".parse::<SortDirection>().is_err());
  }

  #[test]
  fn limit_is_capped() {
    let q = ListQuery { limit: 50_000, ..ListQuery::default() };
    assert_eq!(q.effective_limit(), MAX_LIMIT);
    assert_eq!(ListQuery::default().effective_limit(), DEFAULT_LIMIT);
  }
}
