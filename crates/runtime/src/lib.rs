//! Component lifecycle manager, input multiplexer, timer manager, session context manager, and
//! metrics collector (§4.1, §4.2, §4.6, §4.8).

mod component;
mod context_manager;
mod input;
mod metrics;
mod timer;

pub use component::{
    deployment_profile, profile_inputs_from_config, ComponentFactory, ComponentManager,
    FactoryRegistry, ServiceRegistry,
};
pub use context_manager::ContextManager;
pub use input::{CliInputSource, InputManager, SourcedInput};
pub use metrics::{
    init_metrics, record_error, record_intent_execution, record_request, record_stage_latency,
    record_total_latency, render_metrics,
};
pub use timer::{TimerError, TimerManager};
