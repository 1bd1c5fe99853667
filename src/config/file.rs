//! Legacy `key = value` config file format (§6) and its regeneration (§4.7.1).

use std::collections::BTreeMap;

use crate::config::error::ConfigError;
use crate::config::store::ConfigValue;

/// Parses the line-oriented `key = value` format: `#` starts a comment,
/// values may be quoted with `"` or `'`, `true`/`false` (any case) become
/// booleans, and otherwise-numeric text becomes an int or float.
pub fn parse_config_file(contents: &str) -> Result<BTreeMap<String, ConfigValue>, ConfigError> {
    let mut entries = BTreeMap::new();
    for raw_line in contents.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| ConfigError::ParseError(raw_line.to_string()))?;
        let key = key.trim().to_string();
        entries.insert(key, parse_value(value.trim()));
    }
    Ok(entries)
}

fn parse_value(raw: &str) -> ConfigValue {
    if let Some(unquoted) = strip_quotes(raw) {
        return ConfigValue::Str(unquoted.to_string());
    }
    match raw.to_ascii_lowercase().as_str() {
        "true" => return ConfigValue::Bool(true),
        "false" => return ConfigValue::Bool(false),
        _ => {}
    }
    if let Ok(i) = raw.parse::<i64>() {
        return ConfigValue::Int(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return ConfigValue::Float(f);
    }
    ConfigValue::Str(raw.to_string())
}

fn strip_quotes(raw: &str) -> Option<&str> {
    let bytes = raw.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if (first == b'"' || first == b'\'') && first == last {
            return Some(&raw[1..raw.len() - 1]);
        }
    }
    None
}

fn render_value(value: &ConfigValue) -> String {
    match value {
        ConfigValue::Str(s) => format!("\"{s}\""),
        ConfigValue::Int(i) => i.to_string(),
        ConfigValue::Float(f) => f.to_string(),
        ConfigValue::Bool(b) => if *b { "True".to_string() } else { "False".to_string() },
        ConfigValue::List(items) => items.join(","),
        ConfigValue::None => "None".to_string(),
    }
}

/// Regenerates the human-editable config file, grouping params by category
/// (the §3.1 catalog's rightmost column) with a `# <Category>` header line
/// per group. `entries` is `(name, value, category)`.
pub fn write_config_file(entries: &[(String, ConfigValue, String)]) -> String {
    let mut by_category: BTreeMap<&str, Vec<(&str, &ConfigValue)>> = BTreeMap::new();
    for (name, value, category) in entries {
        by_category.entry(category.as_str()).or_default().push((name.as_str(), value));
    }

    let mut out = String::new();
    for (category, mut params) in by_category {
        params.sort_by_key(|(name, _)| *name);
        out.push_str(&format!("# {category}\n"));
        for (name, value) in params {
            out.push_str(&format!("{name} = {}\n", render_value(value)));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comments_quotes_and_types() {
        let parsed = parse_config_file(
            "# a comment\nLOG_LEVEL = \"DEBUG\"\nLYDIAN_PORT = 5650\nTRAFFIC_START_SERVERS_FIRST = False\n",
        )
        .unwrap();
        assert_eq!(parsed.get("LOG_LEVEL"), Some(&ConfigValue::Str("DEBUG".into())));
        assert_eq!(parsed.get("LYDIAN_PORT"), Some(&ConfigValue::Int(5650)));
        assert_eq!(parsed.get("TRAFFIC_START_SERVERS_FIRST"), Some(&ConfigValue::Bool(false)));
    }

    #[test]
    fn regeneration_groups_by_category() {
        let entries = vec![
            ("LOG_LEVEL".to_string(), ConfigValue::Str("INFO".into()), "Logging".to_string()),
            ("LYDIAN_PORT".to_string(), ConfigValue::Int(5649), "Service".to_string()),
        ];
        let rendered = write_config_file(&entries);
        assert!(rendered.contains("# Logging\nLOG_LEVEL = \"INFO\""));
        assert!(rendered.contains("# Service\nLYDIAN_PORT = 5649"));
    }
}
