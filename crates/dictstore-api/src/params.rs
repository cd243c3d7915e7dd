//! Query-string parsing shared by every list endpoint.
//!
//! | Parameter | Meaning |
//! |-----------|---------|
//! | `sort`    | `ASC` (default) or `DESC`, any case |
//! | `sort_by` | Sort key; resolved by the collection being listed |
//! | `limit`   | Page size, default 20, capped at 10,000 |
//! | `offset`  | Records to skip, default 0 |
//! | `wild`    | `true` switches text filters to substring matching |
//!
//! Every other parameter is matched against the collection's declared
//! filters; undeclared ones are ignored.

use std::collections::HashMap;

use dictstore_core::query::{
  DEFAULT_LIMIT, FieldSpec, ListQuery, SortDirection, parse_filters,
};

use crate::error::ApiError;

/// Raw query parameters as axum hands them over.
pub type RawParams = HashMap<String, String>;

/// Build a [`ListQuery`] from raw parameters and the filters a collection
/// declares.
pub fn list_query(
  params: &RawParams,
  filters: &[FieldSpec],
) -> Result<ListQuery, ApiError> {
  let direction = match params.get("sort") {
    Some(raw) => raw.parse::<SortDirection>()?,
    None => SortDirection::Asc,
  };
  let limit = number(params, "limit")?.unwrap_or(DEFAULT_LIMIT);
  let offset = number(params, "offset")?.unwrap_or(0);
  let wild = flag(params, "wild")?;

  let filters = parse_filters(
    filters,
    params.iter().map(|(k, v)| (k.as_str(), v.as_str())),
    wild,
  )?;

  Ok(ListQuery {
    filters,
    sort_by: params.get("sort_by").filter(|s| !s.is_empty()).cloned(),
    direction,
    limit,
    offset,
  })
}

fn number(params: &RawParams, name: &str) -> Result<Option<u32>, ApiError> {
  params
    .get(name)
    .map(|raw| {
      raw.trim().parse::<u32>().map_err(|_| {
        ApiError::BadRequest(format!(
          "{name} must be a non-negative integer, got {raw:?}"
        ))
      })
    })
    .transpose()
}

fn flag(params: &RawParams, name: &str) -> Result<bool, ApiError> {
  match params.get(name).map(|s| s.to_ascii_lowercase()).as_deref() {
    None | Some("" | "false" | "0") => Ok(false),
    Some("true" | "1") => Ok(true),
    Some(other) => Err(ApiError::BadRequest(format!(
      "{name} must be true or false, got {other:?}"
    ))),
  }
}

#[cfg(test)]
mod tests {
  use dictstore_core::{
    collection::COMMAND,
    query::{Filter, MAX_LIMIT},
  };

  use super::*;

  fn params(pairs: &[(&str, &str)]) -> RawParams {
    pairs
      .iter()
      .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
      .collect()
  }

  #[test]
  fn defaults_when_nothing_is_supplied() {
    let q = list_query(&params(&[]), COMMAND.filters).unwrap();
    assert_eq!(q, ListQuery::default());
  }

  #[test]
  fn paging_and_sorting_are_read() {
    let q = list_query(
      &params(&[
        ("sort", "desc"),
        ("sort_by", "ops_cat"),
        ("limit", "5"),
        ("offset", "10"),
      ]),
      COMMAND.filters,
    )
    .unwrap();
    assert_eq!(q.direction, SortDirection::Desc);
    assert_eq!(q.sort_by.as_deref(), Some("ops_cat"));
    assert_eq!((q.limit, q.offset), (5, 10));
  }

  #[test]
  fn wild_switches_text_filters() {
    let q = list_query(
      &params(&[("command_stem", "ST"), ("wild", "TRUE")]),
      COMMAND.filters,
    )
    .unwrap();
    assert_eq!(q.filters, vec![Filter::wildcard("command_stem", "ST")]);
  }

  #[test]
  fn bad_numbers_and_flags_are_rejected() {
    for bad in [
      params(&[("limit", "-1")]),
      params(&[("offset", "lots")]),
      params(&[("wild", "maybe")]),
      params(&[("sort", "sideways")]),
    ] {
      assert!(matches!(
        list_query(&bad, COMMAND.filters),
        Err(ApiError::BadRequest(_))
      ));
    }
  }

  #[test]
  fn huge_limits_are_kept_for_the_store_to_cap() {
    let q = list_query(&params(&[("limit", "50000")]), COMMAND.filters).unwrap();
    assert_eq!(q.effective_limit(), MAX_LIMIT);
  }
}
