//! Field redaction for logged bodies

use serde_json::{Map, Value};

/// Copy of `fields` without the `excluded` keys.
///
/// Remaining keys keep their order. A name containing `.` removes the key
/// of that exact name if present, otherwise it is followed as a path into
/// nested objects (`user.password`). Unknown names are ignored.
pub fn redact_fields(fields: &Map<String, Value>, excluded: &[String]) -> Map<String, Value> {
    let mut redacted = fields.clone();
    for name in excluded {
        forget(&mut redacted, name);
    }
    redacted
}

/// Redact `value` when it is an object; anything else is returned unchanged.
pub fn redact_value(value: &Value, excluded: &[String]) -> Value {
    match value {
        Value::Object(fields) if !excluded.is_empty() => Value::Object(redact_fields(fields, excluded)),
        other => other.clone(),
    }
}

fn forget(fields: &mut Map<String, Value>, name: &str) {
    if fields.contains_key(name) {
        fields.retain(|key, _| key != name);
        return;
    }

    if let Some((head, rest)) = name.split_once('.')
        && let Some(Value::Object(nested)) = fields.get_mut(head)
    {
        forget(nested, rest);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_removes_excluded_keys_in_order() {
        let body = object(json!({"foo": "bar", "password": "x", "zip": 1, "password_confirmation": "x"}));
        let redacted = redact_fields(&body, &names(&["password", "password_confirmation"]));

        let keys: Vec<&str> = redacted.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["foo", "zip"]);
        assert_eq!(redacted["foo"], json!("bar"));
    }

    #[test]
    fn test_empty_exclusions_keep_everything() {
        let body = object(json!({"b": 1, "a": 2}));
        let redacted = redact_fields(&body, &[]);
        assert_eq!(redacted, body);
        assert_eq!(
            redacted.keys().collect::<Vec<_>>(),
            body.keys().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_absent_names_are_noop() {
        let body = object(json!({"foo": "bar"}));
        assert_eq!(redact_fields(&body, &names(&["token"])), body);
    }

    #[test]
    fn test_keys_are_case_sensitive() {
        let body = object(json!({"Password": "x"}));
        assert!(redact_fields(&body, &names(&["password"])).contains_key("Password"));
    }

    #[test]
    fn test_dot_path() {
        let body = object(json!({"user": {"name": "ann", "password": "x"}, "user.token": "t"}));
        let redacted = redact_fields(&body, &names(&["user.password", "user.token"]));

        assert_eq!(Value::Object(redacted), json!({"user": {"name": "ann"}}));
    }

    #[test]
    fn test_redact_value_non_object() {
        let list = json!([{"password": "x"}]);
        assert_eq!(redact_value(&list, &names(&["password"])), list);
        assert_eq!(redact_value(&Value::Null, &names(&["password"])), Value::Null);
    }
}
