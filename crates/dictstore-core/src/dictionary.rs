//! Dictionary versions, the parent records every dependent content
//! collection hangs off.
//!
//! A dictionary version is identified by its natural key
//! `(dictionary_type, dictionary_version)`; the surrogate `dictionary_id` is
//! internal and never used for lookups by callers.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  query::{FieldSpec, SortSpec},
};

// ─── Type ────────────────────────────────────────────────────────────────────

/// Which family of dictionaries a version belongs to.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DictionaryType {
  Sse,
  Flight,
}

impl DictionaryType {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Sse => "sse",
      Self::Flight => "flight",
    }
  }
}

impl FromStr for DictionaryType {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "sse" => Ok(Self::Sse),
      "flight" => Ok(Self::Flight),
      other => Err(Error::UnknownDictionaryType(other.to_owned())),
    }
  }
}

impl fmt::Display for DictionaryType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── State ───────────────────────────────────────────────────────────────────

/// Publication state of a dictionary version.
///
/// The usual path is `NotPublished → Published → Released`, with `Retired`
/// reachable from anywhere. Transitions are not validated: any state may be
/// written by a partial update.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DictionaryState {
  #[default]
  NotPublished,
  Published,
  Retired,
  Released,
}

impl DictionaryState {
  pub const ALL_NAMES: &'static [&'static str] =
    &["NOT_PUBLISHED", "PUBLISHED", "RETIRED", "RELEASED"];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::NotPublished => "NOT_PUBLISHED",
      Self::Published => "PUBLISHED",
      Self::Retired => "RETIRED",
      Self::Released => "RELEASED",
    }
  }
}

impl FromStr for DictionaryState {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "NOT_PUBLISHED" => Ok(Self::NotPublished),
      "PUBLISHED" => Ok(Self::Published),
      "RETIRED" => Ok(Self::Retired),
      "RELEASED" => Ok(Self::Released),
      other => Err(Error::UnknownState(other.to_owned())),
    }
  }
}

// ─── Natural key ─────────────────────────────────────────────────────────────

/// The composite natural key of a dictionary version. Dependent content
/// records carry it as their owner key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DictionaryKey {
  pub dictionary_type:    DictionaryType,
  pub dictionary_version: String,
}

impl DictionaryKey {
  pub fn new(dictionary_type: DictionaryType, version: impl Into<String>) -> Self {
    Self { dictionary_type, dictionary_version: version.into() }
  }
}

impl fmt::Display for DictionaryKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.dictionary_type, self.dictionary_version)
  }
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// A stored dictionary version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DictionaryVersion {
  pub dictionary_id:      Uuid,
  pub dictionary_type:    DictionaryType,
  pub dictionary_version: String,
  #[serde(rename = "dictionary_description")]
  pub description:        String,
  pub state:              DictionaryState,
  /// Server-assigned at creation; never changes afterwards.
  pub creation_date:      DateTime<Utc>,
}

impl DictionaryVersion {
  pub fn key(&self) -> DictionaryKey {
    DictionaryKey::new(self.dictionary_type, self.dictionary_version.clone())
  }
}

/// Input to [`crate::store::DictionaryStore::create_dictionary`].
/// `creation_date` is always set by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDictionaryVersion {
  pub dictionary_version: String,
  #[serde(rename = "dictionary_description", default)]
  pub description:        String,
  #[serde(default)]
  pub state:              DictionaryState,
}

impl NewDictionaryVersion {
  pub fn new(version: impl Into<String>) -> Self {
    Self {
      dictionary_version: version.into(),
      description:        String::new(),
      state:              DictionaryState::default(),
    }
  }
}

/// Partial update: only the supplied fields change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DictionaryPatch {
  #[serde(rename = "dictionary_description")]
  pub description: Option<String>,
  pub state:       Option<DictionaryState>,
}

impl DictionaryPatch {
  pub fn is_empty(&self) -> bool {
    self.description.is_none() && self.state.is_none()
  }
}

// ─── Query declarations ──────────────────────────────────────────────────────

/// Filters accepted when listing the versions of one dictionary type.
pub const DICTIONARY_FILTERS: &[FieldSpec] = &[
  FieldSpec::one_of("state_filter", "state", DictionaryState::ALL_NAMES),
  FieldSpec::exact("description_filter", "dictionary_description"),
];

/// `sort_by` aliases accepted when listing dictionary versions.
pub const DICTIONARY_SORTS: &[SortSpec] = &[
  SortSpec::new("VERSION", "dictionary_version"),
  SortSpec::new("CREATION_DATE", "creation_date"),
  SortSpec::new("STATE", "state"),
];

pub const DICTIONARY_DEFAULT_SORT: &str = "dictionary_version";

#[cfg(test)]
mod tests {
  use super::*;
  use crate::query::resolve_sort;

  #[test]
  fn dictionary_type_round_trips_through_str() {
    for t in [DictionaryType::Sse, DictionaryType::Flight] {
      assert_eq!(t.as_str().parse::<DictionaryType>().unwrap(), t);
    }
    assert!("FLIGHT".parse::<DictionaryType>().is_err());
  }

  #[test]
  fn state_serialises_screaming_snake_case() {
    let json = serde_json::to_string(&DictionaryState::NotPublished).unwrap();
    assert_eq!(json, "\"NOT_PUBLISHED\"");
    assert_eq!(
      "RELEASED".parse::<DictionaryState>().unwrap(),
      DictionaryState::Released
    );
  }

  #[test]
  fn version_uses_dictionary_description_on_the_wire() {
    let input: NewDictionaryVersion = serde_json::from_value(serde_json::json!({
      "dictionary_version": "v1",
      "dictionary_description": "first cut",
    }))
    .unwrap();
    assert_eq!(input.description, "first cut");
    assert_eq!(input.state, DictionaryState::NotPublished);
  }

  #[test]
  fn sort_aliases_fall_back_to_version() {
    let pick = |s| resolve_sort(DICTIONARY_SORTS, s, DICTIONARY_DEFAULT_SORT);
    assert_eq!(pick(Some("creation_date")), "creation_date");
    assert_eq!(pick(Some("STATE")), "state");
    assert_eq!(pick(Some("_key")), "dictionary_version");
    assert_eq!(pick(None), "dictionary_version");
  }
}
