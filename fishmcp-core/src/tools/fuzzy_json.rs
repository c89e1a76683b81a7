use serde_json::{Map, Value};

/// Coerces tool arguments toward the tool's input schema. LLM clients often
/// send numbers and booleans as strings ("0.8", "true"); those are converted
/// when the schema asks for a number or boolean. Anything that cannot be
/// converted is left untouched so deserialization reports it.
pub fn coerce_arguments(value: Value, schema: &Value) -> Value {
    match schema.get("type").and_then(Value::as_str).unwrap_or("object") {
        "object" => coerce_object(value, schema),
        "string" => coerce_string(value),
        "integer" => coerce_number(value, true),
        "number" => coerce_number(value, false),
        "boolean" => coerce_boolean(value),
        _ => value,
    }
}

fn coerce_object(value: Value, schema: &Value) -> Value {
    let Value::Object(map) = value else {
        return value;
    };
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Value::Object(map);
    };

    let coerced: Map<String, Value> = map
        .into_iter()
        .map(|(key, val)| match properties.get(&key) {
            Some(prop_schema) => {
                let val = coerce_arguments(val, prop_schema);
                (key, val)
            }
            None => (key, val),
        })
        .collect();
    Value::Object(coerced)
}

fn coerce_string(value: Value) -> Value {
    match value {
        Value::Number(n) => Value::String(n.to_string()),
        Value::Bool(b) => Value::String(b.to_string()),
        other => other,
    }
}

fn coerce_number(value: Value, integer: bool) -> Value {
    let Value::String(s) = &value else {
        return value;
    };
    let trimmed = s.trim();

    if integer {
        if let Ok(n) = trimmed.parse::<u64>() {
            return Value::Number(n.into());
        }
        if let Ok(n) = trimmed.parse::<i64>() {
            return Value::Number(n.into());
        }
        return value;
    }

    trimmed
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or(value)
}

fn coerce_boolean(value: Value) -> Value {
    match &value {
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Value::Bool(true),
            "false" | "0" | "no" => Value::Bool(false),
            _ => value,
        },
        Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Bool(i != 0),
            None => value,
        },
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn synth_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": {"type": "string"},
                "optimize": {"type": "boolean"},
                "temperature": {"type": "number"},
                "max_new_tokens": {"type": "integer"}
            }
        })
    }

    #[test]
    fn test_coerce_stringly_typed_arguments() {
        let value = json!({
            "text": "Hello",
            "optimize": "false",
            "temperature": "0.7",
            "max_new_tokens": " 1024 "
        });
        assert_eq!(
            coerce_arguments(value, &synth_schema()),
            json!({
                "text": "Hello",
                "optimize": false,
                "temperature": 0.7,
                "max_new_tokens": 1024
            })
        );
    }

    #[test]
    fn test_numbers_become_strings_where_expected() {
        let value = json!({"text": 42});
        assert_eq!(coerce_arguments(value, &synth_schema()), json!({"text": "42"}));
    }

    #[test]
    fn test_preserve_valid_and_unknown_values() {
        let value = json!({"text": "hi", "optimize": true, "extra": "kept"});
        assert_eq!(coerce_arguments(value.clone(), &synth_schema()), value);
    }

    #[test]
    fn test_unparseable_values_are_left_for_deserialization() {
        let value = json!({"temperature": "warm", "max_new_tokens": "1.5", "optimize": "maybe"});
        assert_eq!(coerce_arguments(value.clone(), &synth_schema()), value);
    }
}
