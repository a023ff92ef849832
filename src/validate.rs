use serde_json::Value;
use stac::Item;

/// A failed schema check, carrying every message the validator reported.
#[derive(Debug)]
pub struct ValidationFailure {
    pub messages: Vec<String>,
}

impl ValidationFailure {
    pub fn first_message(&self) -> &str {
        self.messages
            .first()
            .map(String::as_str)
            .unwrap_or("unknown validation failure")
    }
}

/// The seam for the schema validator collaborator. The reconciled item is
/// only handed back to the caller once this check passes.
pub trait SchemaValidator {
    fn validate(&self, item: &Item) -> Result<(), ValidationFailure>;
}

/// Structural check of the fields every STAC item must carry. Not a full
/// JSON-Schema validation; that belongs to the hosting stack.
pub struct CoreValidator;

impl SchemaValidator for CoreValidator {
    fn validate(&self, item: &Item) -> Result<(), ValidationFailure> {
        let value = match serde_json::to_value(item) {
            Ok(value) => value,
            Err(err) => {
                return Err(ValidationFailure {
                    messages: vec![format!("item is not serializable: {}", err)],
                })
            }
        };

        let mut messages = Vec::new();

        if value.get("type").and_then(Value::as_str) != Some("Feature") {
            messages.push("item 'type' must be 'Feature'".to_string());
        }
        if !matches!(value.get("stac_version"), Some(Value::String(version)) if !version.is_empty())
        {
            messages.push("item is missing 'stac_version'".to_string());
        }
        if !matches!(value.get("id"), Some(Value::String(id)) if !id.is_empty()) {
            messages.push("item 'id' must be a non-empty string".to_string());
        }
        if value.get("geometry").is_none() {
            messages.push("item is missing 'geometry'".to_string());
        }

        let properties = value.get("properties").and_then(Value::as_object);
        match properties {
            Some(properties) => {
                let datetime = properties.get("datetime");
                let has_range = properties.contains_key("start_datetime")
                    && properties.contains_key("end_datetime");
                match datetime {
                    Some(Value::String(_)) => {}
                    Some(Value::Null) if has_range => {}
                    _ => messages.push(
                        "item 'properties.datetime' must be set, or null with a datetime range"
                            .to_string(),
                    ),
                }
            }
            None => messages.push("item is missing 'properties'".to_string()),
        }

        if let Some(assets) = value.get("assets").and_then(Value::as_object) {
            for (key, asset) in assets {
                if !matches!(asset.get("href"), Some(Value::String(href)) if !href.is_empty()) {
                    messages.push(format!("asset '{}' is missing a non-empty 'href'", key));
                }
            }
        }

        if messages.is_empty() {
            Ok(())
        } else {
            Err(ValidationFailure { messages })
        }
    }
}
