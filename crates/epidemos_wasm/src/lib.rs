//! WASM bridge exposing Epidemos scenario runs to the browser UI.
//!
//! Requests and results cross the boundary as serde payloads; all numerical
//! work happens in `epidemos_core`.

mod metrics;
mod payload;
mod scenario;

pub use metrics::{
    basic_reproduction_number, display_scale, effective_contact_rate, model_compartments,
    rate_from_days,
};
pub use payload::{CompartmentSeries, ComparisonPayload, ScenarioPayload};
pub use scenario::{compare_with_reference, run_scenario, WasmScenarioCache};
