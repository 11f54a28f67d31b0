//! Serde roundtrip and JsonSchema validation tests for core entities.

use chrono::Utc;
use schemars::schema_for;
use serde_json::{Value, json};

use chron_core::actor::Actor;
use chron_core::entities::AuditRecord;
use chron_core::enums::AuditAction;
use chron_core::payload::ChangePayload;
use chron_core::revision::ReconstructedState;
use chron_core::target::TargetRef;

/// Validate a JSON value against a schemars-generated schema.
fn validate_against_schema(schema: &Value, instance: &Value) -> Vec<String> {
    let validator = jsonschema::validator_for(schema).expect("schema should be valid");
    validator
        .iter_errors(instance)
        .map(|e| format!("{e}"))
        .collect()
}

macro_rules! roundtrip_and_validate {
    ($name:ident, $ty:ty, $instance:expr) => {
        #[test]
        fn $name() {
            let val: $ty = $instance;

            let json_str = serde_json::to_string_pretty(&val).unwrap();
            let recovered: $ty = serde_json::from_str(&json_str).unwrap();
            assert_eq!(
                recovered,
                val,
                "serde roundtrip failed for {}",
                stringify!($ty)
            );

            let schema = serde_json::to_value(schema_for!($ty)).unwrap();
            let instance = serde_json::to_value(&val).unwrap();
            let errors = validate_against_schema(&schema, &instance);
            assert!(
                errors.is_empty(),
                "Schema validation failed for {}: {:?}",
                stringify!($ty),
                errors
            );
        }
    };
}

roundtrip_and_validate!(
    create_record_roundtrip,
    AuditRecord,
    AuditRecord {
        id: "aud-a3f8b2c1".into(),
        target: TargetRef::new("Widget", 7),
        action: AuditAction::Create,
        version: 1,
        changes: ChangePayload::new().with("name", Value::Null, json!("Bolt")),
        actor: Some(Actor::named("alice")),
        comment: None,
        request_id: "req-9c41f0d27ab3e655".into(),
        remote_address: Some("10.0.0.1".into()),
        created_at: Utc::now(),
    }
);

roundtrip_and_validate!(
    update_record_with_nested_values_roundtrip,
    AuditRecord,
    AuditRecord {
        id: "aud-0badf00d".into(),
        target: TargetRef::new("Admin::Account", "acct-1"),
        action: AuditAction::Update,
        version: 4,
        changes: ChangePayload::new()
            .with("tags", json!(["a"]), json!(["a", "b"]))
            .with("meta", json!({"depth": {"level": 1}}), json!({"depth": {"level": 2}}))
            .with("note", json!("gone"), Value::Null),
        actor: Some(Actor::identified("User", "42")),
        comment: Some("bulk retag".into()),
        request_id: "req-0000000000000002".into(),
        remote_address: None,
        created_at: Utc::now(),
    }
);

roundtrip_and_validate!(
    reconstructed_state_roundtrip,
    ReconstructedState,
    ReconstructedState {
        attributes: [("name".to_string(), json!("Screw"))].into_iter().collect(),
        version: 2,
    }
);

#[test]
fn record_json_shape_is_flat() {
    let record = AuditRecord {
        id: "aud-00000001".into(),
        target: TargetRef::new("Widget", 7),
        action: AuditAction::Delete,
        version: 3,
        changes: ChangePayload::new().with("name", json!("Screw"), Value::Null),
        actor: None,
        comment: None,
        request_id: "req-0000000000000003".into(),
        remote_address: None,
        created_at: Utc::now(),
    };
    let value = serde_json::to_value(&record).unwrap();
    let obj = value.as_object().unwrap();
    assert!(obj.contains_key("target_type"));
    assert!(obj.contains_key("target_id"));
    assert!(!obj.contains_key("target"));
    assert_eq!(value["changes"]["name"], json!(["Screw", null]));
}
