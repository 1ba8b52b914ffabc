use codecloak_core::{resolve, ObfuscatorConfig, Preset, SOURCE_MAP_OPTION};
use proptest::prelude::*;
use serde_json::{json, Value};

#[test]
fn each_preset_resolves_to_its_table() {
    for preset in Preset::all() {
        let resolved = resolve(Some(&ObfuscatorConfig::with_preset(preset.as_str()))).unwrap();
        assert_eq!(resolved.as_map(), preset.options(), "preset {}", preset);
    }
}

#[test]
fn no_configuration_means_medium() {
    let implicit = resolve(None).unwrap();
    let empty = resolve(Some(&ObfuscatorConfig::new())).unwrap();
    let explicit = resolve(Some(&ObfuscatorConfig::with_preset("medium"))).unwrap();
    assert_eq!(implicit, explicit);
    assert_eq!(empty, explicit);
}

#[test]
fn nonexistent_preset_is_rejected() {
    let err = resolve(Some(&ObfuscatorConfig::with_preset("nonexistent"))).unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().starts_with("Configuration error"));
}

#[test]
fn preset_names_are_case_sensitive() {
    assert!(resolve(Some(&ObfuscatorConfig::with_preset("High"))).is_err());
}

#[test]
fn unknown_keys_pass_through() {
    let cfg = ObfuscatorConfig::with_preset("low").set("somethingNew", json!({"nested": [1, 2]}));
    let resolved = resolve(Some(&cfg)).unwrap();
    assert_eq!(resolved.get("somethingNew"), Some(&json!({"nested": [1, 2]})));
    assert_eq!(resolved.len(), Preset::Low.options().len() + 1);
}

#[test]
fn document_overrides_are_applied() {
    let cfg = ObfuscatorConfig::from_json_str(
        r#"{"preset": "high", "debugProtection": false, "sourceMap": true}"#,
    )
    .unwrap();
    let resolved = resolve(Some(&cfg)).unwrap();
    assert_eq!(resolved.get("debugProtection"), Some(&json!(false)));
    assert_eq!(resolved.get(SOURCE_MAP_OPTION), Some(&json!(true)));
    assert_eq!(resolved.get("stringArrayEncoding"), Some(&json!(["base64", "rc4"])));
}

fn option_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-z]{0,8}".prop_map(Value::from),
    ]
}

proptest! {
    #[test]
    fn overrides_win_over_the_preset(
        preset in prop::sample::select(vec!["low", "medium", "high"]),
        overrides in prop::collection::btree_map("[a-z][a-zA-Z]{0,24}", option_value(), 0..8),
    ) {
        let mut cfg = ObfuscatorConfig::with_preset(preset);
        for (key, value) in &overrides {
            cfg = cfg.set(key.as_str(), value.clone());
        }
        let resolved = resolve(Some(&cfg)).unwrap();
        let table = preset.parse::<Preset>().unwrap().options();

        for (key, value) in &overrides {
            if key != "preset" {
                prop_assert_eq!(resolved.get(key), Some(value));
            }
        }
        for (key, value) in table {
            if !overrides.contains_key(key) {
                prop_assert_eq!(resolved.get(key), Some(value));
            }
        }
        prop_assert!(!resolved.contains_key("preset"));
    }
}
