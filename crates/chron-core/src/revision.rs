//! Reconstruction of historical attribute state from audit records.
//!
//! The fold is last-write-wins per attribute: each record overwrites the
//! attributes it touched with the values it left behind
//! (see [`AuditRecord::new_attributes`]). Records are folded in ascending
//! version order; ties keep their input (append) order.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::entities::AuditRecord;

/// Attribute state of a target as of `version`. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ReconstructedState {
    pub attributes: BTreeMap<String, Value>,
    pub version: i64,
}

impl ReconstructedState {
    /// `true` when no history was folded. Callers decide whether that means
    /// "start from a fresh record" or "not found".
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.version == 0
    }

    #[must_use]
    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.attributes.get(attribute)
    }
}

/// Incremental fold, fed one record at a time.
///
/// Lets a store stream history page by page and stop at a bound instead of
/// loading the full sequence.
#[derive(Debug, Default)]
pub struct Reconstruction {
    state: ReconstructedState,
    folded: usize,
}

impl Reconstruction {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one record. Callers must feed records in ascending version order.
    pub fn apply(&mut self, record: &AuditRecord) {
        self.state.attributes.extend(record.new_attributes());
        self.state.version = record.version;
        self.folded += 1;
    }

    /// Number of records folded so far.
    #[must_use]
    pub const fn folded(&self) -> usize {
        self.folded
    }

    /// Current state without consuming the fold.
    #[must_use]
    pub const fn state(&self) -> &ReconstructedState {
        &self.state
    }

    #[must_use]
    pub fn finish(self) -> ReconstructedState {
        self.state
    }
}

/// Fold a sequence of ancestor records into the state they describe.
///
/// The input is stably sorted by version first, so records sharing a version
/// keep their relative order. Empty input yields an empty state at version 0.
pub fn reconstruct<'a, I>(ancestors: I) -> ReconstructedState
where
    I: IntoIterator<Item = &'a AuditRecord>,
{
    reconstruct_until(ancestors, None)
}

/// Like [`reconstruct`], but ignores every record above `to_version`.
pub fn reconstruct_until<'a, I>(ancestors: I, to_version: Option<i64>) -> ReconstructedState
where
    I: IntoIterator<Item = &'a AuditRecord>,
{
    let mut ordered: Vec<&AuditRecord> = ancestors
        .into_iter()
        .filter(|r| to_version.is_none_or(|bound| r.version <= bound))
        .collect();
    ordered.sort_by_key(|r| r.version);

    let mut fold = Reconstruction::new();
    for record in ordered {
        fold.apply(record);
    }
    fold.finish()
}

/// A record whose attributes can be assigned by name.
///
/// `try_set` returns `false` for attributes the record does not support;
/// reconstruction and undo skip those instead of failing, so history written
/// under an older schema still applies.
pub trait Revisable {
    fn try_set(&mut self, attribute: &str, value: &Value) -> bool;
}

impl Revisable for BTreeMap<String, Value> {
    fn try_set(&mut self, attribute: &str, value: &Value) -> bool {
        self.insert(attribute.to_string(), value.clone());
        true
    }
}

/// Assign every attribute in `state` onto `target`, best effort.
///
/// Returns the number of attributes the target accepted.
pub fn apply_to<R: Revisable + ?Sized>(target: &mut R, state: &ReconstructedState) -> usize {
    state
        .attributes
        .iter()
        .filter(|(name, value)| target.try_set(name, value))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::AuditAction;
    use crate::payload::ChangePayload;
    use crate::target::TargetRef;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn record(version: i64, action: AuditAction, changes: ChangePayload) -> AuditRecord {
        AuditRecord {
            id: format!("aud-{version:08x}"),
            target: TargetRef::new("Widget", 7),
            action,
            version,
            changes,
            actor: None,
            comment: None,
            request_id: "req-0000000000000001".into(),
            remote_address: None,
            created_at: Utc::now(),
        }
    }

    fn widget_history() -> Vec<AuditRecord> {
        vec![
            record(
                1,
                AuditAction::Create,
                ChangePayload::new()
                    .with("name", Value::Null, json!("Bolt"))
                    .with("size", Value::Null, json!(3)),
            ),
            record(
                2,
                AuditAction::Update,
                ChangePayload::new().with("name", json!("Bolt"), json!("Screw")),
            ),
            record(
                3,
                AuditAction::Update,
                ChangePayload::new().with("size", json!(3), json!(5)),
            ),
        ]
    }

    #[test]
    fn empty_history_is_empty_state() {
        let state = reconstruct(std::iter::empty::<&AuditRecord>());
        assert!(state.is_empty());
        assert_eq!(state.version, 0);
    }

    #[test]
    fn fold_is_last_write_wins() {
        let history = widget_history();
        let state = reconstruct(&history);
        assert_eq!(state.get("name"), Some(&json!("Screw")));
        assert_eq!(state.get("size"), Some(&json!(5)));
        assert_eq!(state.version, 3);
    }

    #[test]
    fn fold_sorts_by_version() {
        let mut history = widget_history();
        history.reverse();
        let state = reconstruct(&history);
        assert_eq!(state.get("name"), Some(&json!("Screw")));
        assert_eq!(state.version, 3);
    }

    #[test]
    fn duplicated_ancestors_are_idempotent() {
        let history = widget_history();
        let mut doubled = history.clone();
        doubled.push(history[1].clone());
        doubled.push(history[0].clone());
        assert_eq!(reconstruct(&doubled), reconstruct(&history));
    }

    #[test]
    fn bounded_fold_stops_at_version() {
        let history = widget_history();
        let state = reconstruct_until(&history, Some(2));
        assert_eq!(state.get("name"), Some(&json!("Screw")));
        assert_eq!(state.get("size"), Some(&json!(3)));
        assert_eq!(state.version, 2);
    }

    #[test]
    fn delete_keeps_last_known_attributes() {
        let mut history = widget_history();
        history.push(record(
            4,
            AuditAction::Delete,
            ChangePayload::new()
                .with("name", json!("Screw"), Value::Null)
                .with("size", json!(5), Value::Null),
        ));
        let state = reconstruct(&history);
        assert_eq!(state.get("name"), Some(&json!("Screw")));
        assert_eq!(state.get("size"), Some(&json!(5)));
        assert_eq!(state.version, 4);
    }

    #[test]
    fn incremental_fold_matches_batch() {
        let history = widget_history();
        let mut fold = Reconstruction::new();
        for r in &history {
            fold.apply(r);
        }
        assert_eq!(fold.folded(), 3);
        assert_eq!(fold.finish(), reconstruct(&history));
    }

    struct NameOnly {
        name: Option<Value>,
    }

    impl Revisable for NameOnly {
        fn try_set(&mut self, attribute: &str, value: &Value) -> bool {
            if attribute == "name" {
                self.name = Some(value.clone());
                true
            } else {
                false
            }
        }
    }

    #[test]
    fn apply_to_skips_unknown_attributes() {
        let state = reconstruct(&widget_history());
        let mut target = NameOnly { name: None };
        let applied = apply_to(&mut target, &state);
        assert_eq!(applied, 1);
        assert_eq!(target.name, Some(json!("Screw")));
    }

    #[test]
    fn apply_to_map_accepts_everything() {
        let state = reconstruct(&widget_history());
        let mut map = BTreeMap::new();
        assert_eq!(apply_to(&mut map, &state), 2);
        assert_eq!(map, state.attributes);
    }
}
