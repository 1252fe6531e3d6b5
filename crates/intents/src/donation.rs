//! Donation manifest model and validation (§4.5, §6).
//!
//! Ported from the original's `IntentJSONValidator`: every handler publishes a JSON manifest of
//! its methods (trigger phrases, parameters, examples); it is checked against a bundled JSON
//! Schema at load time, then against semantic rules the schema alone cannot express (duplicate
//! method names/intent suffixes, choice parameters without `choices`, duplicate parameter names).

use jsonschema::JSONSchema;
use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;

pub use voice_core::donation::{Donation, DonationExample, MethodDonation, ParameterSpec, ParameterType};

#[derive(Error, Debug)]
pub enum DonationError {
    #[error("donation failed schema validation: {0}")]
    SchemaInvalid(String),
    #[error("duplicate method name: {0}")]
    DuplicateMethodName(String),
    #[error("duplicate intent suffix: {0}")]
    DuplicateIntentSuffix(String),
    #[error("method '{method}' has duplicate parameter name '{param}'")]
    DuplicateParameter { method: String, param: String },
    #[error("method '{method}' parameter '{param}' is of type 'choice' but declares no choices")]
    ChoiceWithoutOptions { method: String, param: String },
}

const DONATION_SCHEMA: &str = r#"{
  "$schema": "http://json-schema.org/draft-07/schema#",
  "type": "object",
  "required": ["handler_domain", "method_donations"],
  "properties": {
    "handler_domain": { "type": "string", "minLength": 1 },
    "intent_name_patterns": { "type": "array", "items": { "type": "string" } },
    "method_donations": {
      "type": "array",
      "items": {
        "type": "object",
        "required": ["method_name", "intent_suffix"],
        "properties": {
          "method_name": { "type": "string", "minLength": 1 },
          "intent_suffix": { "type": "string", "minLength": 1 },
          "phrases": { "type": "array", "items": { "type": "string" } },
          "parameters": {
            "type": "array",
            "items": {
              "type": "object",
              "required": ["name", "type"],
              "properties": {
                "name": { "type": "string", "minLength": 1 },
                "type": {
                  "enum": ["string", "integer", "float", "duration", "datetime", "boolean", "choice", "entity"]
                },
                "choices": { "type": "array", "items": { "type": "string" } },
                "required": { "type": "boolean" }
              }
            }
          },
          "examples": {
            "type": "array",
            "items": {
              "type": "object",
              "required": ["text"],
              "properties": {
                "text": { "type": "string" },
                "parameters": { "type": "object" }
              }
            }
          }
        }
      }
    }
  }
}"#;

static SCHEMA: Lazy<JSONSchema> = Lazy::new(|| {
    let schema: Value = serde_json::from_str(DONATION_SCHEMA).expect("bundled schema is valid JSON");
    JSONSchema::compile(&schema).expect("bundled schema compiles")
});

/// Validate a raw donation document against the schema, then parse it and run the semantic
/// checks the schema cannot express.
pub fn validate_donation(raw: &Value) -> Result<Donation, DonationError> {
    if let Err(errors) = SCHEMA.validate(raw) {
        let message = errors.map(|e| e.to_string()).collect::<Vec<_>>().join("; ");
        return Err(DonationError::SchemaInvalid(message));
    }

    let donation: Donation =
        serde_json::from_value(raw.clone()).map_err(|e| DonationError::SchemaInvalid(e.to_string()))?;

    validate_semantics(&donation)?;
    Ok(donation)
}

fn validate_semantics(donation: &Donation) -> Result<(), DonationError> {
    let mut seen_methods = HashSet::new();
    let mut seen_suffixes = HashSet::new();

    for method in &donation.method_donations {
        if !seen_methods.insert(method.method_name.clone()) {
            return Err(DonationError::DuplicateMethodName(method.method_name.clone()));
        }
        if !seen_suffixes.insert(method.intent_suffix.clone()) {
            return Err(DonationError::DuplicateIntentSuffix(method.intent_suffix.clone()));
        }

        let mut seen_params = HashSet::new();
        for param in &method.parameters {
            if !seen_params.insert(param.name.clone()) {
                return Err(DonationError::DuplicateParameter {
                    method: method.method_name.clone(),
                    param: param.name.clone(),
                });
            }
            if param.param_type == ParameterType::Choice && param.choices.is_empty() {
                return Err(DonationError::ChoiceWithoutOptions {
                    method: method.method_name.clone(),
                    param: param.name.clone(),
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_donation() -> Value {
        json!({
            "handler_domain": "timer",
            "method_donations": [
                {
                    "method_name": "set_timer",
                    "intent_suffix": "set",
                    "phrases": ["set a timer for {duration}"],
                    "parameters": [
                        { "name": "duration", "type": "duration", "required": true }
                    ],
                    "examples": [
                        { "text": "set a timer for 5 minutes", "parameters": { "duration": "5m" } }
                    ]
                }
            ]
        })
    }

    #[test]
    fn well_formed_donation_parses() {
        let donation = validate_donation(&valid_donation()).unwrap();
        assert_eq!(donation.handler_domain, "timer");
        assert_eq!(donation.method_donations.len(), 1);
    }

    #[test]
    fn missing_required_field_fails_schema() {
        let mut raw = valid_donation();
        raw.as_object_mut().unwrap().remove("handler_domain");
        assert!(matches!(validate_donation(&raw), Err(DonationError::SchemaInvalid(_))));
    }

    #[test]
    fn duplicate_method_names_are_rejected() {
        let mut raw = valid_donation();
        let donations = raw["method_donations"].as_array().unwrap().clone();
        let mut duplicated = donations.clone();
        let mut second = donations[0].clone();
        second["intent_suffix"] = json!("set_again");
        duplicated.push(second);
        raw["method_donations"] = json!(duplicated);

        assert!(matches!(validate_donation(&raw), Err(DonationError::DuplicateMethodName(_))));
    }

    #[test]
    fn choice_parameter_without_choices_is_rejected() {
        let mut raw = valid_donation();
        raw["method_donations"][0]["parameters"] = json!([
            { "name": "unit", "type": "choice" }
        ]);
        assert!(matches!(validate_donation(&raw), Err(DonationError::ChoiceWithoutOptions { .. })));
    }
}
