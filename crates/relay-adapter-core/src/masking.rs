// SPDX-License-Identifier: MIT OR Apache-2.0
//! Password-field masking over dot-notation config keys (§4.8).

use serde_json::Value;

use crate::manifest::AdapterManifest;

const MASK: &str = "***";

fn split(key: &str) -> Vec<&str> {
    key.split('.').collect()
}

fn get_mut<'a>(root: &'a mut Value, path: &[&str]) -> Option<&'a mut Value> {
    let mut cur = root;
    for segment in path {
        cur = cur.as_object_mut()?.get_mut(*segment)?;
    }
    Some(cur)
}

fn get<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut cur = root;
    for segment in path {
        cur = cur.as_object()?.get(*segment)?;
    }
    Some(cur)
}

fn set(root: &mut Value, path: &[&str], value: Value) {
    let Some((last, prefix)) = path.split_last() else {
        return;
    };
    let mut cur = root;
    for segment in prefix {
        if !cur.is_object() {
            *cur = Value::Object(serde_json::Map::new());
        }
        cur = cur
            .as_object_mut()
            .expect("just ensured object")
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
    }
    if !cur.is_object() {
        *cur = Value::Object(serde_json::Map::new());
    }
    cur.as_object_mut()
        .expect("just ensured object")
        .insert((*last).to_string(), value);
}

/// Deep-clone `config`, replacing every password field declared in
/// `manifest` with `"***"`. Fields absent from `config` are left absent.
#[must_use]
pub fn mask_config(manifest: &AdapterManifest, config: &Value) -> Value {
    let mut masked = config.clone();
    for key in manifest.password_keys() {
        let path = split(key);
        if get(&masked, &path).is_some() {
            if let Some(slot) = get_mut(&mut masked, &path) {
                *slot = Value::String(MASK.to_string());
            }
        }
    }
    masked
}

/// Merge `incoming` over `existing`. For password fields, an incoming value
/// of `""`, `"***"`, or `null`/absent preserves the existing value;
/// anything else replaces it. Non-password fields always take the incoming
/// value when present.
#[must_use]
pub fn merge_config(manifest: &AdapterManifest, existing: &Value, incoming: &Value) -> Value {
    let mut merged = existing.clone();
    let Some(incoming_obj) = incoming.as_object() else {
        return merged;
    };

    let password_keys: std::collections::HashSet<&str> = manifest.password_keys().collect();

    fn merge_object(
        merged: &mut Value,
        incoming_obj: &serde_json::Map<String, Value>,
        prefix: &str,
        password_keys: &std::collections::HashSet<&str>,
    ) {
        for (k, v) in incoming_obj {
            let full_key = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            if let Some(nested) = v.as_object() {
                merge_object(merged, nested, &full_key, password_keys);
                continue;
            }
            if password_keys.contains(full_key.as_str()) {
                let is_placeholder = matches!(v, Value::Null)
                    || matches!(v, Value::String(s) if s.is_empty() || s == MASK);
                if is_placeholder {
                    continue;
                }
            }
            let path = split(&full_key);
            set(merged, &path, v.clone());
        }
    }

    merge_object(&mut merged, incoming_obj, "", &password_keys);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ConfigField;

    fn manifest() -> AdapterManifest {
        AdapterManifest {
            type_name: "telegram".to_string(),
            display_name: "Telegram".to_string(),
            builtin: false,
            multi_instance: true,
            config_fields: vec![ConfigField::string("chatId"), ConfigField::password("botToken")],
        }
    }

    #[test]
    fn masks_password_fields_only() {
        let config = serde_json::json!({"chatId": "42", "botToken": "secret-value"});
        let masked = mask_config(&manifest(), &config);
        assert_eq!(masked["chatId"], "42");
        assert_eq!(masked["botToken"], "***");
    }

    #[test]
    fn merge_preserves_password_when_incoming_is_placeholder() {
        let existing = serde_json::json!({"chatId": "42", "botToken": "secret-value"});
        for placeholder in [serde_json::json!(""), serde_json::json!("***"), serde_json::Value::Null] {
            let incoming = serde_json::json!({"botToken": placeholder});
            let merged = merge_config(&manifest(), &existing, &incoming);
            assert_eq!(merged["botToken"], "secret-value");
        }
    }

    #[test]
    fn merge_replaces_password_with_real_value() {
        let existing = serde_json::json!({"botToken": "old"});
        let incoming = serde_json::json!({"botToken": "new-secret"});
        let merged = merge_config(&manifest(), &existing, &incoming);
        assert_eq!(merged["botToken"], "new-secret");
    }

    #[test]
    fn merge_replaces_non_password_fields_unconditionally() {
        let existing = serde_json::json!({"chatId": "42"});
        let incoming = serde_json::json!({"chatId": "99"});
        let merged = merge_config(&manifest(), &existing, &incoming);
        assert_eq!(merged["chatId"], "99");
    }

    #[test]
    fn merge_handles_dotted_nested_password_key() {
        let nested_manifest = AdapterManifest {
            config_fields: vec![ConfigField::password("inbound.secret")],
            ..manifest()
        };
        let existing = serde_json::json!({"inbound": {"secret": "shh"}});
        let incoming = serde_json::json!({"inbound": {"secret": "***"}});
        let merged = merge_config(&nested_manifest, &existing, &incoming);
        assert_eq!(merged["inbound"]["secret"], "shh");
    }
}
