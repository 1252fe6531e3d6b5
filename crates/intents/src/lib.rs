//! Intent registry, contextual orchestrator, donation manifests, and NLU coordination (§4.5).

mod donation;
mod orchestrator;
mod recognizer;
mod registry;

pub use donation::{
    validate_donation, Donation, DonationError, DonationExample, MethodDonation, ParameterSpec,
    ParameterType,
};
pub use orchestrator::{
    resolve_contextual_intent, score_candidate_domains, ContextualResolution, IntentMiddleware,
    Orchestrator, ScoredDomains,
};
pub use recognizer::Recognizer;
pub use registry::IntentRegistry;
