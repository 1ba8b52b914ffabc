use codecloak_core::engine::lexer::{tokenize, TokenKind};
use codecloak_core::{obfuscate, Engine, LexicalEngine, ObfuscatorConfig, Obfuscator, Preset};
use std::process::Command;

const ADD_PROGRAM: &str = "function add(a, b) { return a + b; } console.log(add(5, 3));";

fn identifiers(code: &str) -> Vec<String> {
    tokenize(code)
        .unwrap()
        .tokens
        .into_iter()
        .filter(|t| t.kind == TokenKind::Identifier)
        .map(|t| t.text)
        .collect()
}

fn seeded(preset: &str, seed: u64) -> ObfuscatorConfig {
    ObfuscatorConfig::with_preset(preset).set("seed", seed)
}

/// Run `code` with node, if it is installed.
fn run_with_node(code: &str) -> Option<String> {
    let output = Command::new("node").arg("-e").arg(code).output().ok()?;
    assert!(
        output.status.success(),
        "node failed: {}\n{}",
        String::from_utf8_lossy(&output.stderr),
        code
    );
    Some(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[test]
fn add_example_is_obfuscated_at_low() {
    let result = obfuscate(ADD_PROGRAM, Some(&seeded("low", 7))).unwrap();

    assert_ne!(result.obfuscated_code, ADD_PROGRAM);
    assert!(!identifiers(&result.obfuscated_code).iter().any(|name| name == "add"));
    assert!(result.source_map.is_none());

    if let Some(stdout) = run_with_node(&result.obfuscated_code) {
        assert_eq!(stdout.trim(), "8");
    }
}

#[test]
fn every_preset_changes_non_trivial_code() {
    let source = "(function () { var greeting = 'hello'; function shout(text) { return text.toUpperCase() + '!'; } shout(greeting); })();";
    for preset in Preset::all() {
        let result = obfuscate(source, Some(&seeded(preset.as_str(), 11))).unwrap();
        assert_ne!(result.obfuscated_code, source, "preset {}", preset);
        assert!(!result.obfuscated_code.contains("greeting"), "preset {}", preset);
    }
}

#[test]
fn presets_keep_behaviour() {
    let source = r#"
        'use strict';
        const items = [3, 1, 2];
        let total = 0;
        for (const item of items) {
            total += item * 10;
        }
        const label = `sum=${total}`;
        const point = { x: 1, y: 2 };
        process.stdout.write(label + ':' + (point.x + point.y) + '\n');
    "#;
    for preset in Preset::all() {
        // debugProtection and the console guard would disturb the check
        let cfg = seeded(preset.as_str(), 3)
            .set("debugProtection", false)
            .set("disableConsoleOutput", false);
        let result = obfuscate(source, Some(&cfg)).unwrap();
        if let Some(stdout) = run_with_node(&result.obfuscated_code) {
            assert_eq!(stdout, "sum=60:3\n", "preset {}", preset);
        }
    }
}

#[test]
fn empty_input_succeeds_at_low() {
    let result = obfuscate("", Some(&ObfuscatorConfig::with_preset("low"))).unwrap();
    assert!(result.obfuscated_code.is_empty());
    assert!(result.source_map.is_none());
}

#[test]
fn source_map_override_never_yields_an_artifact() {
    for preset in Preset::all() {
        let cfg = seeded(preset.as_str(), 5).set("sourceMap", true);
        let result = obfuscate(ADD_PROGRAM, Some(&cfg)).unwrap();
        assert!(result.source_map.is_none(), "preset {}", preset);
    }
}

#[test]
fn engine_alone_honours_source_map_option() {
    let cfg = seeded("low", 5).set("sourceMap", true);
    let options = codecloak_core::resolve(Some(&cfg)).unwrap();
    let output = LexicalEngine::new().transform(ADD_PROGRAM, &options).unwrap();
    let map: serde_json::Value = serde_json::from_str(&output.source_map.unwrap()).unwrap();
    assert_eq!(map["version"], 3);
}

#[test]
fn unknown_preset_fails_before_transforming() {
    let config = ObfuscatorConfig::with_preset("nonexistent");
    let err = obfuscate(ADD_PROGRAM, Some(&config)).unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn syntax_errors_are_transformation_errors() {
    let err = obfuscate("function (", Some(&ObfuscatorConfig::with_preset("low"))).unwrap_err();
    assert!(!err.is_configuration());
    assert!(err.to_string().starts_with("Transformation error"));
}

#[test]
fn invalid_option_value_is_a_configuration_error() {
    let cfg = ObfuscatorConfig::with_preset("low").set("stringArrayThreshold", "lots");
    let err = obfuscate(ADD_PROGRAM, Some(&cfg)).unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("stringArrayThreshold"));
}

#[test]
fn same_seed_same_output() {
    let cfg = seeded("high", 42);
    let first = obfuscate(ADD_PROGRAM, Some(&cfg)).unwrap();
    let second = obfuscate(ADD_PROGRAM, Some(&cfg)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn reserved_names_survive_renaming() {
    let source = "function keepMe(a) { return a; } function dropMe(b) { return keepMe(b); } dropMe(1);";
    let cfg = seeded("low", 9)
        .set("renameGlobals", true)
        .set("reservedNames", serde_json::json!(["^keep"]));
    let result = obfuscate(source, Some(&cfg)).unwrap();
    let names = identifiers(&result.obfuscated_code);
    assert!(names.iter().any(|n| n == "keepMe"));
    assert!(!names.iter().any(|n| n == "dropMe"));
}

#[test]
fn obfuscator_can_be_shared_across_threads() {
    let obfuscator = std::sync::Arc::new(Obfuscator::new());
    let source = |i: usize| format!("var value{} = {};", i, i);
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let obfuscator = obfuscator.clone();
            let source = source(i);
            std::thread::spawn(move || {
                obfuscator.obfuscate(&source, Some(&seeded("medium", 1))).unwrap()
            })
        })
        .collect();
    for (i, handle) in handles.into_iter().enumerate() {
        let shared = handle.join().unwrap();
        let alone = obfuscate(&source(i), Some(&seeded("medium", 1))).unwrap();
        assert_eq!(shared, alone);
    }
}

/// Same program at every preset and a few seeds, with the guards that would
/// disturb a console check switched off.
fn behaviour_configs() -> impl Iterator<Item = ObfuscatorConfig> {
    Preset::all().into_iter().flat_map(|preset| {
        (1..=3).map(move |seed| {
            seeded(preset.as_str(), seed)
                .set("debugProtection", false)
                .set("disableConsoleOutput", false)
        })
    })
}

#[test]
fn local_binding_does_not_rename_a_global_of_the_same_name() {
    let source = "function endpoint(){ const URL='https://api.example.com'; return URL; } console.log(new URL(endpoint()).host);";
    for cfg in behaviour_configs() {
        let result = obfuscate(source, Some(&cfg)).unwrap();
        let names = identifiers(&result.obfuscated_code);
        assert!(names.iter().any(|n| n == "URL"), "{}", result.obfuscated_code);
        assert!(!names.iter().any(|n| n == "endpoint"), "{}", result.obfuscated_code);
        if let Some(stdout) = run_with_node(&result.obfuscated_code) {
            assert_eq!(stdout.trim(), "api.example.com", "{}", result.obfuscated_code);
        }
    }
}

#[test]
fn implicit_global_keeps_its_name() {
    let source = "function helper(){ var total=1; return total; } total=5; console.log(globalThis.total, helper());";
    for cfg in behaviour_configs() {
        let result = obfuscate(source, Some(&cfg)).unwrap();
        let names = identifiers(&result.obfuscated_code);
        assert!(names.iter().any(|n| n == "total"), "{}", result.obfuscated_code);
        assert!(!names.iter().any(|n| n == "helper"), "{}", result.obfuscated_code);
        if let Some(stdout) = run_with_node(&result.obfuscated_code) {
            assert_eq!(stdout.trim(), "5 1", "{}", result.obfuscated_code);
        }
    }
}
