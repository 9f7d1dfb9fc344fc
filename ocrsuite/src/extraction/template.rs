use regex::RegexBuilder;
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use crate::models::{FieldMap, Template};

/// Applies a template's regex rules to recognised text.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateExtractor;

impl TemplateExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, text: &str, template: &Template) -> FieldMap {
        self.extract_with_rules(text, &template.fields_json)
    }

    /// `rules_json` has the shape `{ "field": { "regex": "pattern" } }`.
    ///
    /// Patterns run in multi-line mode against the whole text. The value is
    /// capture group 1 when the pattern declares a group, otherwise the whole
    /// match. Fields whose pattern does not match are left out.
    pub fn extract_with_rules(&self, text: &str, rules_json: &str) -> FieldMap {
        let mut fields = FieldMap::new();

        let Some(rules) = parse_rules(rules_json) else {
            return fields;
        };

        for (name, definition) in &rules {
            let Some(pattern) = definition
                .as_object()
                .and_then(|def| def.get("regex"))
                .and_then(Value::as_str)
                .filter(|p| !p.trim().is_empty())
            else {
                debug!(field = %name, "Skipping field without a regex rule");
                continue;
            };

            let regex = match RegexBuilder::new(pattern).multi_line(true).build() {
                Ok(regex) => regex,
                Err(e) => {
                    warn!(field = %name, error = %e, "Invalid field regex; skipping field");
                    continue;
                }
            };

            if let Some(caps) = regex.captures(text) {
                let value = if regex.captures_len() > 1 {
                    caps.get(1).map(|m| m.as_str()).unwrap_or_default()
                } else {
                    caps.get(0).map(|m| m.as_str()).unwrap_or_default()
                };
                fields.insert(name.as_str(), value);
            }
        }

        fields
    }
}

fn parse_rules(rules_json: &str) -> Option<Map<String, Value>> {
    if rules_json.trim().is_empty() {
        error!("Template rules are empty");
        return None;
    }

    match serde_json::from_str::<Value>(rules_json) {
        Ok(Value::Object(rules)) => Some(rules),
        Ok(other) => {
            error!(kind = json_kind(&other), "Template rules must be a JSON object");
            None
        }
        Err(e) => {
            error!(error = %e, "Failed to parse template rules");
            None
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
