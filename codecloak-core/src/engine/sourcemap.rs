//! Source Map v3 output

use super::emit::Mapping;
use super::settings::EngineSettings;
use serde_json::json;
use std::collections::HashMap;

const BASE64_DIGITS: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Base64 VLQ encoding of one signed value.
fn vlq(out: &mut String, value: i64) {
    let mut rest = if value < 0 {
        ((-value as u64) << 1) | 1
    } else {
        (value as u64) << 1
    };
    loop {
        let mut digit = (rest & 0b11111) as usize;
        rest >>= 5;
        if rest > 0 {
            digit |= 0b100000;
        }
        out.push(BASE64_DIGITS[digit] as char);
        if rest == 0 {
            break;
        }
    }
}

pub fn build(mappings: &[Mapping], source: &str, settings: &EngineSettings) -> String {
    let mut names: Vec<String> = Vec::new();
    let mut name_index: HashMap<&str, usize> = HashMap::new();
    let mut encoded = String::new();

    let mut line = 0;
    let mut first_in_line = true;
    let (mut column, mut source_line, mut source_column, mut name) = (0i64, 0i64, 0i64, 0i64);

    for mapping in mappings {
        while line < mapping.generated_line {
            encoded.push(';');
            line += 1;
            column = 0;
            first_in_line = true;
        }
        if !first_in_line {
            encoded.push(',');
        }
        first_in_line = false;

        let generated_column = mapping.generated_column as i64;
        let original_line = mapping.source_line.saturating_sub(1) as i64;
        let original_column = mapping.source_column as i64;
        vlq(&mut encoded, generated_column - column);
        vlq(&mut encoded, 0);
        vlq(&mut encoded, original_line - source_line);
        vlq(&mut encoded, original_column - source_column);
        column = generated_column;
        source_line = original_line;
        source_column = original_column;

        if let Some(original) = mapping.name.as_deref() {
            let index = *name_index.entry(original).or_insert_with(|| {
                names.push(original.to_string());
                names.len() - 1
            }) as i64;
            vlq(&mut encoded, index - name);
            name = index;
        }
    }

    let source_name = settings
        .input_file_name
        .clone()
        .unwrap_or_else(|| "input.js".to_string());
    let mut map = json!({
        "version": 3,
        "sources": [source_name],
        "sourcesContent": [source],
        "names": names,
        "mappings": encoded,
    });
    if let Some(file) = settings.source_map_file_name.as_deref() {
        map["file"] = json!(file.strip_suffix(".map").unwrap_or(file));
    }
    map.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(value: i64) -> String {
        let mut out = String::new();
        vlq(&mut out, value);
        out
    }

    #[test]
    fn encodes_vlq_values() {
        assert_eq!(encode(0), "A");
        assert_eq!(encode(1), "C");
        assert_eq!(encode(-1), "D");
        assert_eq!(encode(15), "e");
        assert_eq!(encode(16), "gB");
        assert_eq!(encode(-17), "jB");
    }

    #[test]
    fn builds_segments_per_line() {
        let mappings = vec![
            Mapping {
                generated_line: 0,
                generated_column: 0,
                source_line: 1,
                source_column: 0,
                name: None,
            },
            Mapping {
                generated_line: 0,
                generated_column: 4,
                source_line: 1,
                source_column: 4,
                name: Some("total".into()),
            },
            Mapping {
                generated_line: 1,
                generated_column: 2,
                source_line: 2,
                source_column: 0,
                name: None,
            },
        ];
        let settings = EngineSettings {
            input_file_name: Some("app.js".into()),
            source_map_file_name: Some("app.min.js.map".into()),
            ..EngineSettings::default()
        };
        let map: serde_json::Value =
            serde_json::from_str(&build(&mappings, "var total;\nx", &settings)).unwrap();
        assert_eq!(map["mappings"], "AAAA,IAAIA;EACJ");
        assert_eq!(map["names"][0], "total");
        assert_eq!(map["sources"][0], "app.js");
        assert_eq!(map["file"], "app.min.js");
    }
}
