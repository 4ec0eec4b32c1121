//! One end-to-end simulation: validate, build the initial state, integrate,
//! derive metrics.

use crate::error::{EpidemicError, Result};
use crate::integrator::{integrate, IntegrationMethod, IntegratorSettings, TimeGrid, Trajectory};
use crate::metrics::{basic_reproduction_number, display_scale};
use crate::models::{
    CompartmentModel, ModelParameters, ModelVariant, DECEASED, EXPOSED, INFECTED, RECOVERED,
    SUSCEPTIBLE,
};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Seeded counts for every compartment except Susceptible, which is filled
/// with the remainder of the population.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitialCounts {
    pub exposed: f64,
    pub infected: f64,
    pub recovered: f64,
    pub deceased: f64,
}

impl InitialCounts {
    fn named(&self) -> [(&'static str, &'static str, f64); 4] {
        [
            ("exposed", EXPOSED, self.exposed),
            ("infected", INFECTED, self.infected),
            ("recovered", RECOVERED, self.recovered),
            ("deceased", DECEASED, self.deceased),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRequest {
    pub total_population: f64,
    #[serde(default)]
    pub initial: InitialCounts,
    pub day_value: usize,
    pub parameters: ModelParameters,
}

impl ScenarioRequest {
    pub fn sir(
        total_population: f64,
        infected: f64,
        recovered: f64,
        day_value: usize,
        contact_rate: f64,
        recovery_rate: f64,
    ) -> Self {
        Self {
            total_population,
            initial: InitialCounts {
                infected,
                recovered,
                ..InitialCounts::default()
            },
            day_value,
            parameters: ModelParameters::Sir {
                contact_rate,
                recovery_rate,
            },
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn sird(
        total_population: f64,
        infected: f64,
        recovered: f64,
        deceased: f64,
        day_value: usize,
        contact_rate: f64,
        recovery_rate: f64,
        deceased_rate: f64,
    ) -> Self {
        Self {
            total_population,
            initial: InitialCounts {
                infected,
                recovered,
                deceased,
                ..InitialCounts::default()
            },
            day_value,
            parameters: ModelParameters::Sird {
                contact_rate,
                recovery_rate,
                deceased_rate,
            },
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn seir(
        total_population: f64,
        exposed: f64,
        infected: f64,
        recovered: f64,
        day_value: usize,
        contact_rate: f64,
        recovery_rate: f64,
        expose_rate: f64,
    ) -> Self {
        Self {
            total_population,
            initial: InitialCounts {
                exposed,
                infected,
                recovered,
                ..InitialCounts::default()
            },
            day_value,
            parameters: ModelParameters::Seir {
                contact_rate,
                recovery_rate,
                expose_rate,
            },
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn seirm(
        total_population: f64,
        exposed: f64,
        infected: f64,
        recovered: f64,
        day_value: usize,
        contact_rate: f64,
        recovery_rate: f64,
        expose_rate: f64,
        mitigation_control: f64,
    ) -> Self {
        Self {
            total_population,
            initial: InitialCounts {
                exposed,
                infected,
                recovered,
                ..InitialCounts::default()
            },
            day_value,
            parameters: ModelParameters::Seirm {
                contact_rate,
                recovery_rate,
                expose_rate,
                mitigation_control,
            },
        }
    }

    pub fn variant(&self) -> ModelVariant {
        self.parameters.variant()
    }

    /// Checks every precondition of the pipeline. Nothing is integrated
    /// unless this passes.
    pub fn validate(&self) -> Result<()> {
        let n = self.total_population;
        if !n.is_finite() || n < 1.0 {
            return Err(EpidemicError::invalid(
                "total_population",
                format!("must be at least 1, got {n}"),
            ));
        }
        if self.day_value == 0 {
            return Err(EpidemicError::invalid(
                "day_value",
                "time horizon must cover at least one day",
            ));
        }
        self.parameters.validate()?;

        let variant = self.variant();
        let mut seeded = 0.0;
        for (field, compartment, value) in self.initial.named() {
            if !value.is_finite() || value < 0.0 {
                return Err(EpidemicError::invalid(
                    field,
                    format!("must be a non-negative count, got {value}"),
                ));
            }
            if variant.index_of(compartment).is_none() {
                if value != 0.0 {
                    return Err(EpidemicError::invalid(
                        field,
                        format!("the {variant} model has no {compartment} compartment"),
                    ));
                }
                continue;
            }
            if value >= n {
                return Err(EpidemicError::invalid(
                    field,
                    format!("{value} is not less than the total population {n}"),
                ));
            }
            seeded += value;
        }
        if seeded >= n {
            return Err(EpidemicError::invalid(
                "initial_state",
                format!("seeded compartments sum to {seeded}, not less than the total population {n}"),
            ));
        }
        Ok(())
    }

    /// Initial state in the variant's compartment order.
    pub fn initial_state(&self) -> Vec<f64> {
        let variant = self.variant();
        let seeded: f64 = self
            .initial
            .named()
            .iter()
            .filter(|(_, compartment, _)| variant.index_of(compartment).is_some())
            .map(|(_, _, value)| value)
            .sum();
        variant
            .compartments()
            .iter()
            .map(|name| match *name {
                SUSCEPTIBLE => self.total_population - seeded,
                EXPOSED => self.initial.exposed,
                INFECTED => self.initial.infected,
                RECOVERED => self.initial.recovered,
                DECEASED => self.initial.deceased,
                _ => 0.0,
            })
            .collect()
    }
}

/// Output of a single scenario run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioResult {
    variant: ModelVariant,
    parameters: ModelParameters,
    trajectory: Trajectory,
    r0: f64,
    display_scale: f64,
}

impl ScenarioResult {
    pub fn variant(&self) -> ModelVariant {
        self.variant
    }

    pub fn parameters(&self) -> &ModelParameters {
        &self.parameters
    }

    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    pub fn r0(&self) -> f64 {
        self.r0
    }

    pub fn display_scale(&self) -> f64 {
        self.display_scale
    }
}

pub fn run_scenario(request: &ScenarioRequest) -> Result<ScenarioResult> {
    run_scenario_with(request, &IntegratorSettings::default())
}

pub fn run_scenario_with(
    request: &ScenarioRequest,
    settings: &IntegratorSettings,
) -> Result<ScenarioResult> {
    let variant = request.variant();
    request.validate()?;
    settings.validate()?;

    let initial = request.initial_state();
    let grid = TimeGrid::days(request.day_value)?;
    debug!(
        "Running {variant} scenario: N = {}, {} days, initial = {initial:?}",
        request.total_population, request.day_value
    );

    let model = CompartmentModel::new(request.total_population, &request.parameters);
    let trajectory = integrate(&model, &initial, &grid, settings)?;

    let r0 = basic_reproduction_number(
        request.parameters.contact_rate(),
        request.parameters.recovery_rate(),
    )?;
    let scale = display_scale(request.total_population);
    debug!("{variant} scenario finished: R0 = {r0:.2}");

    Ok(ScenarioResult {
        variant,
        parameters: request.parameters,
        trajectory,
        r0,
        display_scale: scale,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    variant: ModelVariant,
    population: u64,
    day_value: usize,
    parameters: Vec<u64>,
    initial: [u64; 4],
    method: (u8, usize),
    tolerances: [u64; 4],
    max_steps: usize,
}

impl CacheKey {
    fn new(request: &ScenarioRequest, settings: &IntegratorSettings) -> Self {
        let method = match settings.method {
            IntegrationMethod::Tsit5Adaptive => (0, 0),
            IntegrationMethod::Rk4 { substeps } => (1, substeps),
        };
        Self {
            variant: request.variant(),
            population: request.total_population.to_bits(),
            day_value: request.day_value,
            parameters: request
                .parameters
                .named_values()
                .iter()
                .map(|(_, v)| v.to_bits())
                .collect(),
            initial: request.initial.named().map(|(_, _, v)| v.to_bits()),
            method,
            tolerances: [
                settings.rtol.to_bits(),
                settings.atol.to_bits(),
                settings.h_min.to_bits(),
                settings.h_max.unwrap_or(f64::NAN).to_bits(),
            ],
            max_steps: settings.max_steps,
        }
    }
}

/// Entries kept by [`ScenarioCache::new`].
pub const DEFAULT_CACHE_CAPACITY: usize = 64;

/// Memoizes scenario results on the exact request and integrator settings.
/// Failed runs are not stored. Holds at most `capacity` trajectories; the
/// oldest insertion is evicted first.
#[derive(Debug)]
pub struct ScenarioCache {
    entries: HashMap<CacheKey, Arc<ScenarioResult>>,
    order: VecDeque<CacheKey>,
    capacity: usize,
}

impl Default for ScenarioCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ScenarioCache {
    pub fn new() -> Self {
        Self::bounded(DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(EpidemicError::invalid(
                "cache_capacity",
                "must hold at least one entry",
            ));
        }
        Ok(Self::bounded(capacity))
    }

    fn bounded(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get_or_run(
        &mut self,
        request: &ScenarioRequest,
        settings: &IntegratorSettings,
    ) -> Result<Arc<ScenarioResult>> {
        let key = CacheKey::new(request, settings);
        if let Some(hit) = self.entries.get(&key) {
            debug!("Scenario cache hit for {}", request.variant());
            return Ok(Arc::clone(hit));
        }
        let result = Arc::new(run_scenario_with(request, settings)?);
        while self.entries.len() >= self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, Arc::clone(&result));
        Ok(result)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}
