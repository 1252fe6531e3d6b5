//! Donation manifest data model (§4.5, §6): the shape of what an intent handler can advertise
//! about its own methods so the orchestrator can route execution without hand-written dispatch
//! tables. Schema validation and semantic checks for raw JSON donations live in the `intents`
//! crate, which builds on these types — they stay here so `IntentHandler` can hold one without a
//! dependency cycle.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ParameterType {
    String,
    Integer,
    Float,
    Duration,
    Datetime,
    Boolean,
    Choice,
    Entity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    #[serde(default)]
    pub choices: Vec<String>,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonationExample {
    pub text: String,
    #[serde(default)]
    pub parameters: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodDonation {
    pub method_name: String,
    pub intent_suffix: String,
    #[serde(default)]
    pub phrases: Vec<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
    #[serde(default)]
    pub examples: Vec<DonationExample>,
}

/// A handler's full manifest, as advertised via `IntentHandler::donation` and consumed by the
/// orchestrator's donation-routing preference (§4.5 step 4) and by NLU donation loading (§4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Donation {
    pub handler_domain: String,
    pub method_donations: Vec<MethodDonation>,
    #[serde(default)]
    pub intent_name_patterns: Vec<String>,
}

impl Donation {
    /// The donation for a single method, if this manifest advertises one matching `method_name`.
    pub fn method(&self, method_name: &str) -> Option<&MethodDonation> {
        self.method_donations.iter().find(|m| m.method_name == method_name)
    }
}
