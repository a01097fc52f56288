//! Validation of predict request bodies.
//!
//! Bodies are checked against a JSON Schema before deserialization so that
//! callers get pydantic-style per-field errors (`loc`/`msg`/`type`) instead of
//! a single serde message.

use serde_json::{Map, Value, json};

use crate::passenger::PredictionRequest;

/// A single validation error for one field.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Location of the offending value, e.g. `["body", "passengers", 0, "Sex"]`.
    pub loc: Vec<Value>,
    /// Human-readable error message.
    pub msg: String,
    /// Error type string (e.g. "value_error.missing").
    pub error_type: String,
}

impl ValidationError {
    pub fn to_json(&self) -> Value {
        json!({
            "loc": self.loc,
            "msg": self.msg,
            "type": self.error_type,
        })
    }
}

/// Snake-case field names accepted in place of the manifest aliases.
const FIELD_ALIASES: &[(&str, &str)] = &[
    ("passenger_id", "PassengerId"),
    ("name", "Name"),
    ("pclass", "Pclass"),
    ("sex", "Sex"),
    ("age", "Age"),
    ("sibsp", "SibSp"),
    ("parch", "Parch"),
    ("ticket", "Ticket"),
    ("fare", "Fare"),
    ("cabin", "Cabin"),
    ("embarked", "Embarked"),
];

const REQUIRED_FIELDS: &[&str] = &["Pclass", "Sex", "SibSp", "Parch", "Fare"];

fn passenger_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "PassengerId": {"type": ["integer", "null"]},
            "Name": {"type": ["string", "null"]},
            "Pclass": {"type": "integer", "enum": [1, 2, 3]},
            "Sex": {"type": "string", "enum": ["male", "female"]},
            "Age": {"type": ["number", "null"], "minimum": 0, "maximum": 150},
            "SibSp": {"type": "integer", "minimum": 0},
            "Parch": {"type": "integer", "minimum": 0},
            "Ticket": {"type": ["string", "null"]},
            "Fare": {"type": "number", "minimum": 0},
            "Cabin": {"type": ["string", "null"]},
            "Embarked": {"type": ["string", "null"]}
        },
        "required": REQUIRED_FIELDS
    })
}

/// JSON Schema for the predict request body.
pub fn request_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "passengers": {
                "type": "array",
                "minItems": 1,
                "items": passenger_schema()
            }
        },
        "required": ["passengers"]
    })
}

/// Compiled validator for predict request bodies.
pub struct RequestValidator {
    validator: jsonschema::Validator,
}

impl RequestValidator {
    /// # Panics
    ///
    /// Panics if the built-in schema fails to compile, which is a bug.
    pub fn new() -> Self {
        let validator = jsonschema::validator_for(&request_schema())
            .expect("built-in request schema compiles");
        Self { validator }
    }

    /// Normalize field names, validate, and deserialize a predict body.
    pub fn parse(&self, mut body: Value) -> Result<PredictionRequest, Vec<ValidationError>> {
        normalize_aliases(&mut body);
        self.validate(&body)?;
        serde_json::from_value(body).map_err(|e| {
            vec![ValidationError {
                loc: vec![json!("body")],
                msg: e.to_string(),
                error_type: "value_error".to_string(),
            }]
        })
    }

    /// Validate an already-normalized body against the schema.
    pub fn validate(&self, body: &Value) -> Result<(), Vec<ValidationError>> {
        if self.validator.validate(body).is_ok() {
            return Ok(());
        }

        let mut errors = Vec::new();
        let mut seen_required = Vec::new();

        for error in self.validator.iter_errors(body) {
            let msg = error.to_string();
            let path = error.instance_path().to_string();
            let loc = pointer_to_loc(&path);

            // "required" errors: emit one entry per missing field of that object
            if msg.contains("is a required property") {
                if seen_required.contains(&path) {
                    continue;
                }
                let target = body.pointer(&path);
                let expected: &[&str] = if path.is_empty() {
                    &["passengers"]
                } else {
                    REQUIRED_FIELDS
                };
                for field in expected {
                    let present = target
                        .and_then(Value::as_object)
                        .is_some_and(|obj| obj.contains_key(*field));
                    if !present {
                        let mut field_loc = loc.clone();
                        field_loc.push(json!(field));
                        errors.push(ValidationError {
                            loc: field_loc,
                            msg: "Field required".to_string(),
                            error_type: "value_error.missing".to_string(),
                        });
                    }
                }
                seen_required.push(path);
                continue;
            }

            errors.push(ValidationError {
                loc,
                msg,
                error_type: "value_error".to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl Default for RequestValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// Rename snake-case passenger fields to their aliases in place.
/// An alias already present wins over its snake-case twin.
fn normalize_aliases(body: &mut Value) {
    let Some(passengers) = body.get_mut("passengers").and_then(Value::as_array_mut) else {
        return;
    };
    for passenger in passengers {
        let Some(obj) = passenger.as_object_mut() else {
            continue;
        };
        let original = std::mem::take(obj);
        let mut renamed = Map::with_capacity(original.len());
        let mut snake_case = Vec::new();
        for (key, value) in original {
            match FIELD_ALIASES.iter().find(|(name, _)| *name == key) {
                Some((_, alias)) => snake_case.push((*alias, value)),
                None => {
                    renamed.insert(key, value);
                }
            }
        }
        for (alias, value) in snake_case {
            renamed.entry(alias).or_insert(value);
        }
        *obj = renamed;
    }
}

/// `/passengers/0/Age` → `["body", "passengers", 0, "Age"]`
fn pointer_to_loc(pointer: &str) -> Vec<Value> {
    let mut loc = vec![json!("body")];
    for segment in pointer.split('/').skip(1) {
        let segment = segment.replace("~1", "/").replace("~0", "~");
        match segment.parse::<u64>() {
            Ok(index) => loc.push(json!(index)),
            Err(_) => loc.push(json!(segment)),
        }
    }
    loc
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_passenger() -> Value {
        json!({
            "Pclass": 1, "Sex": "female", "Age": 38, "SibSp": 1,
            "Parch": 0, "Fare": 71.2833, "Embarked": "C"
        })
    }

    #[test]
    fn accepts_valid_body() {
        let request = RequestValidator::new()
            .parse(json!({"passengers": [valid_passenger()]}))
            .unwrap();
        assert_eq!(request.passengers.len(), 1);
        assert_eq!(request.passengers[0].pclass, 1);
    }

    #[test]
    fn accepts_snake_case_names() {
        let request = RequestValidator::new()
            .parse(json!({"passengers": [{
                "pclass": 3, "sex": "male", "sibsp": 0, "parch": 0, "fare": 8.05
            }]}))
            .unwrap();
        assert_eq!(request.passengers[0].pclass, 3);
        assert!(request.passengers[0].age.is_none());
    }

    #[test]
    fn reports_each_missing_field() {
        let errs = RequestValidator::new()
            .parse(json!({"passengers": [{"Pclass": 2, "Parch": 0}]}))
            .unwrap_err();

        let locs: Vec<Value> = errs.iter().map(|e| json!(e.loc)).collect();
        assert_eq!(
            locs,
            vec![
                json!(["body", "passengers", 0, "Sex"]),
                json!(["body", "passengers", 0, "SibSp"]),
                json!(["body", "passengers", 0, "Fare"]),
            ]
        );
        assert!(errs.iter().all(|e| e.error_type == "value_error.missing"));
        assert!(errs.iter().all(|e| e.msg == "Field required"));
    }

    #[test]
    fn missing_passengers_key() {
        let errs = RequestValidator::new().parse(json!({})).unwrap_err();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].loc, vec![json!("body"), json!("passengers")]);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut passenger = valid_passenger();
        passenger["Age"] = json!(151);
        passenger["Pclass"] = json!(4);
        let errs = RequestValidator::new()
            .parse(json!({"passengers": [valid_passenger(), passenger]}))
            .unwrap_err();

        let locs: Vec<Value> = errs.iter().map(|e| json!(e.loc)).collect();
        assert!(locs.contains(&json!(["body", "passengers", 1, "Age"])), "{locs:?}");
        assert!(locs.contains(&json!(["body", "passengers", 1, "Pclass"])), "{locs:?}");
    }

    #[test]
    fn rejects_negative_counts_and_fare() {
        let mut passenger = valid_passenger();
        passenger["SibSp"] = json!(-1);
        passenger["Fare"] = json!(-0.5);
        let errs = RequestValidator::new()
            .parse(json!({"passengers": [passenger]}))
            .unwrap_err();
        assert_eq!(errs.len(), 2);
    }

    #[test]
    fn rejects_empty_batch() {
        let errs = RequestValidator::new()
            .parse(json!({"passengers": []}))
            .unwrap_err();
        assert_eq!(errs[0].loc, vec![json!("body"), json!("passengers")]);
    }

    #[test]
    fn null_optional_fields_are_allowed() {
        let mut passenger = valid_passenger();
        passenger["Age"] = Value::Null;
        passenger["Cabin"] = Value::Null;
        let request = RequestValidator::new()
            .parse(json!({"passengers": [passenger]}))
            .unwrap();
        assert!(request.passengers[0].age.is_none());
    }

    #[test]
    fn alias_wins_over_snake_case_twin() {
        let mut body = json!({"passengers": [{"Pclass": 1, "pclass": 3}]});
        normalize_aliases(&mut body);
        assert_eq!(body["passengers"][0], json!({"Pclass": 1}));
    }

    #[test]
    fn error_serializes_pydantic_style() {
        let err = ValidationError {
            loc: pointer_to_loc("/passengers/2/Fare"),
            msg: "Field required".to_string(),
            error_type: "value_error.missing".to_string(),
        };
        insta::assert_json_snapshot!(err.to_json(), @r#"
        {
          "loc": [
            "body",
            "passengers",
            2,
            "Fare"
          ],
          "msg": "Field required",
          "type": "value_error.missing"
        }
        "#);
    }
}
