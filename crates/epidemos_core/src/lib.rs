pub mod comparison;
pub mod error;
pub mod integrator;
pub mod metrics;
pub mod models;
pub mod scenario;
pub mod solvers;
/// The `epidemos_core` crate is the simulation engine behind Epidemos.
/// It integrates compartmental epidemic models (SIR, SIR-D, SEIR and SEIR with
/// mitigation) over a daily time grid and derives the figures the UI shows.
///
/// Key components:
/// - **Traits**: `Scalar` (numeric type abstraction), `RateEquations` (model right-hand sides), `Steppable` (fixed-step solvers).
/// - **Models**: rate equations per variant and the `ModelParameters` that go with them.
/// - **Solvers / Integrator**: RK4 and adaptive Tsit5 with dense output on the grid.
/// - **Scenario**: the validate → integrate → derive pipeline, plus an optional result cache.
/// - **Comparison**: seeding from observed series and overlaying results on them.
pub mod traits;

pub use error::{EpidemicError, Result};
pub use integrator::{IntegrationMethod, IntegratorSettings, TimeGrid, Trajectory};
pub use models::{ModelParameters, ModelVariant};
pub use scenario::{run_scenario, run_scenario_with, ScenarioCache, ScenarioRequest, ScenarioResult};
