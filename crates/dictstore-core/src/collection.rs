//! The collection registry: one [`CollectionSpec`] per content kind.
//!
//! Storage setup, the per-kind managers, and cascading deletion all read the
//! same registry, so adding a collection is a single declaration here.

use std::{collections::HashMap, fmt};

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  content::{Document, key_text},
  dictionary::DictionaryKey,
  query::{FieldSpec, SortSpec, resolve_sort},
  store::KeyCollision,
};

// ─── Kinds ───────────────────────────────────────────────────────────────────

/// The six kinds of content record.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
  Command,
  Channel,
  EventRecord,
  BusVariable,
  VerificationItem,
  CustomScript,
}

impl ContentKind {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Command => "command",
      Self::Channel => "channel",
      Self::EventRecord => "event_record",
      Self::BusVariable => "bus_variable",
      Self::VerificationItem => "verification_item",
      Self::CustomScript => "custom_script",
    }
  }
}

impl fmt::Display for ContentKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Whether records of a kind belong to a dictionary version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
  /// Owned by exactly one dictionary version; deleted with it.
  Dictionary,
  /// Independent of any dictionary; keys are unique globally.
  Global,
}

// ─── Spec ────────────────────────────────────────────────────────────────────

/// Everything the store needs to know about one content collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionSpec {
  pub kind:          ContentKind,
  /// Storage name (table / collection).
  pub collection:    &'static str,
  /// Path segment used by the HTTP layer.
  pub segment:       &'static str,
  pub scope:         Scope,
  /// The natural key callers address single records by.
  pub lookup_field:  &'static str,
  /// Fields that may not repeat within the owning scope. Each is checked on
  /// its own; the lookup field is always among them.
  pub unique_fields: &'static [&'static str],
  /// Fields of the persistent composite unique index, after the owner key.
  pub index_fields:  &'static [&'static str],
  pub filters:       &'static [FieldSpec],
  pub default_sort:  &'static str,
}

impl CollectionSpec {
  pub fn is_dependent(&self) -> bool { self.scope == Scope::Dictionary }

  /// Validate that `owner` is present exactly when the kind needs one.
  pub fn check_owner(&self, owner: Option<&DictionaryKey>) -> Result<()> {
    match (self.scope, owner) {
      (Scope::Dictionary, None) => Err(Error::OwnerRequired { kind: self.kind }),
      (Scope::Global, Some(_)) => {
        Err(Error::OwnerNotAllowed { kind: self.kind })
      }
      _ => Ok(()),
    }
  }

  /// Resolve a requested sort key: any filterable field (by parameter or
  /// field name) or the lookup field; otherwise the default.
  pub fn sort_field(&self, requested: Option<&str>) -> &'static str {
    let sorts: Vec<SortSpec> = self
      .filters
      .iter()
      .map(|f| SortSpec::new(f.param, f.field))
      .chain(std::iter::once(SortSpec::new(
        self.lookup_field,
        self.lookup_field,
      )))
      .collect();
    resolve_sort(&sorts, requested, self.default_sort)
  }

  /// Key values repeated inside one batch of candidates, reported once per
  /// repeated value.
  pub fn batch_collisions(&self, docs: &[Document]) -> Vec<KeyCollision> {
    let mut collisions = Vec::new();
    for field in self.unique_fields {
      let mut seen: HashMap<String, usize> = HashMap::new();
      for doc in docs {
        if let Some(value) = doc.get(*field).and_then(key_text) {
          *seen.entry(value).or_default() += 1;
        }
      }
      let mut repeated: Vec<String> = seen
        .into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|(value, _)| value)
        .collect();
      repeated.sort();
      collisions.extend(
        repeated
          .into_iter()
          .map(|value| KeyCollision::within_batch(field, value)),
      );
    }
    collisions
  }
}

// ─── Standard collections ────────────────────────────────────────────────────

const YES_NO: &[&str] = &["Yes", "No"];

pub const COMMAND: CollectionSpec = CollectionSpec {
  kind:          ContentKind::Command,
  collection:    "command",
  segment:       "cmds",
  scope:         Scope::Dictionary,
  lookup_field:  "command_stem",
  unique_fields: &["command_stem"],
  index_fields:  &["command_stem"],
  filters:       &[
    FieldSpec::text("command_stem", "command_stem"),
    FieldSpec::text("ops_cat", "operations_category"),
    FieldSpec::text("command_description", "cmd_description"),
  ],
  default_sort:  "command_stem",
};

pub const EVENT_RECORD: CollectionSpec = CollectionSpec {
  kind:          ContentKind::EventRecord,
  collection:    "evr",
  segment:       "evrs",
  scope:         Scope::Dictionary,
  lookup_field:  "evr_name",
  unique_fields: &["evr_id", "evr_name"],
  index_fields:  &["evr_id", "evr_name"],
  filters:       &[
    FieldSpec::text("evr_id", "evr_id"),
    FieldSpec::text("evr_name", "evr_name"),
    FieldSpec::text("evr_level", "evr_level"),
    FieldSpec::text("ops_cat", "operations_category"),
    FieldSpec::text("evr_description", "evr_description"),
    FieldSpec::text("evr_message", "evr_message"),
  ],
  default_sort:  "evr_name",
};

pub const CHANNEL: CollectionSpec = CollectionSpec {
  kind:          ContentKind::Channel,
  collection:    "channel",
  segment:       "channels",
  scope:         Scope::Dictionary,
  lookup_field:  "channel_name",
  unique_fields: &["channel_id", "channel_name"],
  index_fields:  &["channel_id", "channel_name"],
  filters:       &[
    FieldSpec::text("channel_name", "channel_name"),
    FieldSpec::text("description", "description"),
    FieldSpec::text("ops_cat", "operations_category"),
    FieldSpec::one_of("derived", "derived", YES_NO),
    FieldSpec::text("channel_id", "channel_id"),
  ],
  default_sort:  "channel_name",
};

pub const BUS_VARIABLE: CollectionSpec = CollectionSpec {
  kind:          ContentKind::BusVariable,
  collection:    "mil1553",
  segment:       "mil1553",
  scope:         Scope::Dictionary,
  lookup_field:  "mil1553_name",
  unique_fields: &["mil1553_name"],
  index_fields:  &["mil1553_name"],
  filters:       &[
    FieldSpec::text("mil1553_name", "mil1553_name"),
    FieldSpec::text("ops_cat", "operations_category"),
    FieldSpec::text("description", "description"),
    FieldSpec::integer("remote_terminal", "remote_terminal"),
    FieldSpec::integer("sub_address", "sub_address"),
    FieldSpec::one_of(
      "output_type",
      "output_type",
      &["INT", "UINT", "BIN", "FLOAT", "HEX"],
    ),
    FieldSpec::one_of(
      "transmit_receive",
      "transmit_receive",
      &["TRANSMIT", "RECEIVE"],
    ),
  ],
  default_sort:  "mil1553_name",
};

pub const VERIFICATION_ITEM: CollectionSpec = CollectionSpec {
  kind:          ContentKind::VerificationItem,
  collection:    "vnv",
  segment:       "vis",
  scope:         Scope::Global,
  lookup_field:  "vi_id",
  unique_fields: &["vi_id"],
  index_fields:  &["vi_id"],
  filters:       &[
    FieldSpec::text("vi_id", "vi_id"),
    FieldSpec::text("vi_name", "vi_name"),
    FieldSpec::text("vi_owner", "vi_owner"),
    FieldSpec::text("vi_type", "vi_type"),
    FieldSpec::text("vi_text", "vi_text"),
    FieldSpec::text("va_poc", "va_poc"),
    FieldSpec::text("vac_name", "vac_name"),
  ],
  default_sort:  "vi_name",
};

pub const CUSTOM_SCRIPT: CollectionSpec = CollectionSpec {
  kind:          ContentKind::CustomScript,
  collection:    "custom_script",
  segment:       "custom_scripts",
  scope:         Scope::Global,
  lookup_field:  "script_id",
  unique_fields: &["script_id"],
  index_fields:  &["script_id"],
  filters:       &[
    FieldSpec::text("script_path", "script_path"),
    FieldSpec::text("script_name", "script_name"),
    FieldSpec::text("description", "description"),
    FieldSpec::text("status", "status"),
  ],
  default_sort:  "script_name",
};

// ─── Registry ────────────────────────────────────────────────────────────────

/// The set of content collections a store manages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionRegistry {
  specs: Vec<CollectionSpec>,
}

impl CollectionRegistry {
  pub fn new(specs: Vec<CollectionSpec>) -> Self { Self { specs } }

  /// All six standard collections.
  pub fn standard() -> Self {
    Self::new(vec![
      COMMAND,
      CHANNEL,
      EVENT_RECORD,
      BUS_VARIABLE,
      VERIFICATION_ITEM,
      CUSTOM_SCRIPT,
    ])
  }

  pub fn get(&self, kind: ContentKind) -> Result<&CollectionSpec> {
    self
      .specs
      .iter()
      .find(|s| s.kind == kind)
      .ok_or_else(|| Error::UnknownCollection(kind.to_string()))
  }

  /// Find a dictionary-owned collection by its path segment.
  pub fn dependent_by_segment(&self, segment: &str) -> Option<&CollectionSpec> {
    self.dependent().find(|s| s.segment == segment)
  }

  pub fn iter(&self) -> impl Iterator<Item = &CollectionSpec> {
    self.specs.iter()
  }

  pub fn dependent(&self) -> impl Iterator<Item = &CollectionSpec> {
    self.specs.iter().filter(|s| s.is_dependent())
  }
}

impl Default for CollectionRegistry {
  fn default() -> Self { Self::standard() }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::dictionary::DictionaryType;

  fn doc(value: serde_json::Value) -> Document {
    value.as_object().cloned().unwrap()
  }

  #[test]
  fn standard_registry_covers_every_kind() {
    let registry = CollectionRegistry::standard();
    for kind in [
      ContentKind::Command,
      ContentKind::Channel,
      ContentKind::EventRecord,
      ContentKind::BusVariable,
      ContentKind::VerificationItem,
      ContentKind::CustomScript,
    ] {
      assert_eq!(registry.get(kind).unwrap().kind, kind);
    }
    assert_eq!(registry.dependent().count(), 4);
  }

  #[test]
  fn lookup_field_is_always_unique() {
    for spec in CollectionRegistry::standard().iter() {
      assert!(spec.unique_fields.contains(&spec.lookup_field), "{}", spec.kind);
    }
  }

  #[test]
  fn segments_resolve_only_dependent_kinds() {
    let registry = CollectionRegistry::standard();
    assert_eq!(
      registry.dependent_by_segment("evrs").map(|s| s.kind),
      Some(ContentKind::EventRecord)
    );
    assert!(registry.dependent_by_segment("vis").is_none());
    assert!(registry.dependent_by_segment("nope").is_none());
  }

  #[test]
  fn owner_must_match_scope() {
    let key = DictionaryKey::new(DictionaryType::Flight, "v1");
    assert!(COMMAND.check_owner(Some(&key)).is_ok());
    assert!(COMMAND.check_owner(None).is_err());
    assert!(CUSTOM_SCRIPT.check_owner(None).is_ok());
    assert!(CUSTOM_SCRIPT.check_owner(Some(&key)).is_err());
  }

  #[test]
  fn sort_field_accepts_params_fields_and_lookup() {
    assert_eq!(COMMAND.sort_field(Some("ops_cat")), "operations_category");
    assert_eq!(COMMAND.sort_field(Some("cmd_description")), "cmd_description");
    assert_eq!(VERIFICATION_ITEM.sort_field(Some("vi_owner")), "vi_owner");
    assert_eq!(VERIFICATION_ITEM.sort_field(Some("_rev")), "vi_name");
    assert_eq!(CHANNEL.sort_field(None), "channel_name");
  }

  #[test]
  fn batch_collisions_check_each_unique_field() {
    let docs = vec![
      doc(json!({ "evr_id": "0x1", "evr_name": "BOOT" })),
      doc(json!({ "evr_id": "0x2", "evr_name": "BOOT" })),
      doc(json!({ "evr_id": "0x2", "evr_name": "HALT" })),
    ];
    let collisions = EVENT_RECORD.batch_collisions(&docs);
    let pairs: Vec<_> = collisions
      .iter()
      .map(|c| (c.field.as_str(), c.value.as_str()))
      .collect();
    assert_eq!(pairs, [("evr_id", "0x2"), ("evr_name", "BOOT")]);
    assert!(collisions.iter().all(|c| c.within_batch));
  }

  #[test]
  fn distinct_batch_has_no_collisions() {
    let docs = vec![
      doc(json!({ "command_stem": "PWR_ON" })),
      doc(json!({ "command_stem": "PWR_OFF" })),
    ];
    assert!(COMMAND.batch_collisions(&docs).is_empty());
  }
}
