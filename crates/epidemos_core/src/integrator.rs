//! Drives a solver across a daily time grid and records the trajectory.
//!
//! The adaptive path takes whatever internal steps the error controller
//! allows and samples grid points from each accepted step by Hermite
//! interpolation, so reported rows never depend on where the internal steps
//! happened to land.

use crate::error::{EpidemicError, Result};
use crate::solvers::{hermite_interpolate, Tsit5, RK4};
use crate::traits::{RateEquations, Steppable};
use log::{debug, trace, warn};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// Evenly spaced grid `0, 1, ..., days - 1` in day units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeGrid {
    points: Vec<f64>,
}

impl TimeGrid {
    pub fn days(day_value: usize) -> Result<Self> {
        if day_value == 0 {
            return Err(EpidemicError::invalid(
                "day_value",
                "time horizon must cover at least one day",
            ));
        }
        Ok(Self {
            points: (0..day_value).map(|d| d as f64).collect(),
        })
    }

    pub fn points(&self) -> &[f64] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    fn span(&self) -> f64 {
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        }
    }
}

/// Compartment values sampled on a [`TimeGrid`]: one row per grid point,
/// one column per compartment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    times: Vec<f64>,
    compartments: Vec<String>,
    values: DMatrix<f64>,
}

impl Trajectory {
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn compartments(&self) -> &[String] {
        &self.compartments
    }

    pub fn len(&self) -> usize {
        self.values.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.values.nrows() == 0
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.values
    }

    pub fn column(&self, index: usize) -> Vec<f64> {
        self.values.column(index).iter().copied().collect()
    }

    /// Series for the named compartment, if the model has one.
    pub fn series(&self, name: &str) -> Option<Vec<f64>> {
        self.compartments
            .iter()
            .position(|c| c == name)
            .map(|idx| self.column(idx))
    }

    pub fn row(&self, index: usize) -> Vec<f64> {
        self.values.row(index).iter().copied().collect()
    }

    /// Sum over compartments at every grid point.
    pub fn totals(&self) -> Vec<f64> {
        self.values.row_iter().map(|row| row.sum()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntegrationMethod {
    /// Tsitouras 5(4) with error-controlled step size.
    Tsit5Adaptive,
    /// Classic RK4 with `substeps` equal steps per grid interval.
    Rk4 { substeps: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegratorSettings {
    pub method: IntegrationMethod,
    pub rtol: f64,
    pub atol: f64,
    pub h_min: f64,
    /// Upper bound on the internal step; `None` means the grid span.
    pub h_max: Option<f64>,
    pub max_steps: usize,
}

impl Default for IntegratorSettings {
    fn default() -> Self {
        Self {
            method: IntegrationMethod::Tsit5Adaptive,
            rtol: 1e-8,
            atol: 1e-8,
            h_min: 1e-10,
            h_max: None,
            max_steps: 100_000,
        }
    }
}

impl IntegratorSettings {
    pub fn validate(&self) -> Result<()> {
        if !self.rtol.is_finite() || self.rtol <= 0.0 {
            return Err(EpidemicError::invalid("rtol", "must be finite and > 0"));
        }
        if !self.atol.is_finite() || self.atol <= 0.0 {
            return Err(EpidemicError::invalid("atol", "must be finite and > 0"));
        }
        if !self.h_min.is_finite() || self.h_min <= 0.0 {
            return Err(EpidemicError::invalid("h_min", "must be finite and > 0"));
        }
        if let Some(h_max) = self.h_max {
            if h_max.is_nan() || h_max <= self.h_min {
                return Err(EpidemicError::invalid("h_max", "must exceed h_min"));
            }
        }
        if self.max_steps == 0 {
            return Err(EpidemicError::invalid("max_steps", "must be greater than zero"));
        }
        if let IntegrationMethod::Rk4 { substeps: 0 } = self.method {
            return Err(EpidemicError::invalid("substeps", "must be greater than zero"));
        }
        Ok(())
    }
}

/// Integrates `system` from `initial` over `grid`. Row 0 of the result is
/// `initial` verbatim.
pub fn integrate(
    system: &impl RateEquations<f64>,
    initial: &[f64],
    grid: &TimeGrid,
    settings: &IntegratorSettings,
) -> Result<Trajectory> {
    settings.validate()?;
    let dim = system.dimension();
    if initial.len() != dim {
        return Err(EpidemicError::invalid(
            "initial_state",
            format!("expected {dim} compartments, got {}", initial.len()),
        ));
    }
    if grid.is_empty() {
        return Err(EpidemicError::invalid("day_value", "time grid is empty"));
    }
    ensure_finite(initial, Some(0), "initial state")?;

    let mut values = DMatrix::zeros(grid.len(), dim);
    for (j, v) in initial.iter().enumerate() {
        values[(0, j)] = *v;
    }

    match settings.method {
        IntegrationMethod::Tsit5Adaptive => {
            integrate_adaptive(system, initial, grid, settings, &mut values)?
        }
        IntegrationMethod::Rk4 { substeps } => {
            integrate_fixed(system, initial, grid, substeps, &mut values)?
        }
    }

    Ok(Trajectory {
        times: grid.points().to_vec(),
        compartments: system.compartments().iter().map(|c| c.to_string()).collect(),
        values,
    })
}

fn integrate_fixed(
    system: &impl RateEquations<f64>,
    initial: &[f64],
    grid: &TimeGrid,
    substeps: usize,
    values: &mut DMatrix<f64>,
) -> Result<()> {
    let mut solver = RK4::new(initial.len());
    let mut state = initial.to_vec();
    let points = grid.points();

    for (k, window) in points.windows(2).enumerate() {
        let dt = (window[1] - window[0]) / substeps as f64;
        let mut t = window[0];
        for _ in 0..substeps {
            solver.step(system, &mut t, &mut state, dt);
        }
        ensure_finite(&state, Some(k + 1), "state")?;
        for (j, v) in state.iter().enumerate() {
            values[(k + 1, j)] = *v;
        }
    }
    debug!(
        "RK4 integration finished: {} grid points, {} substeps each",
        points.len(),
        substeps
    );
    Ok(())
}

fn integrate_adaptive(
    system: &impl RateEquations<f64>,
    initial: &[f64],
    grid: &TimeGrid,
    settings: &IntegratorSettings,
    values: &mut DMatrix<f64>,
) -> Result<()> {
    let points = grid.points();
    if points.len() == 1 {
        return Ok(());
    }

    let dim = initial.len();
    let t_end = points[points.len() - 1];
    let h_max = settings.h_max.unwrap_or_else(|| grid.span());

    let mut solver = Tsit5::new(dim);
    let mut t = points[0];
    let mut state = initial.to_vec();
    let mut next = vec![0.0; dim];
    let mut error = vec![0.0; dim];
    let mut sample = vec![0.0; dim];

    solver.prime(system, t, &state);
    ensure_finite(solver.start_derivative(), Some(1), "derivative")?;

    let mut h = next_step(
        initial_step(&state, solver.start_derivative(), settings).min(h_max),
        t_end - t,
        settings.h_min,
    );
    let mut next_index = 1;
    let mut accepted = 0usize;
    let mut rejected = 0usize;

    while next_index < points.len() {
        if accepted + rejected >= settings.max_steps {
            warn!("Step budget of {} exhausted at t = {t}", settings.max_steps);
            return Err(EpidemicError::unstable(
                Some(next_index),
                format!("step budget of {} exhausted at t = {t}", settings.max_steps),
            ));
        }
        if h < settings.h_min {
            warn!("Step size {h:e} fell below minimum at t = {t}");
            return Err(EpidemicError::unstable(
                Some(next_index),
                format!("step size {h:e} fell below h_min at t = {t}"),
            ));
        }

        solver.attempt(system, t, &state, h, &mut next, &mut error);

        let err = error_norm(&state, &next, &error, settings);
        if !err.is_finite() || !all_finite(&next) || !all_finite(solver.end_derivative()) {
            // Non-finite trial: shrink hard and retry until h_min says otherwise.
            rejected += 1;
            trace!("Rejected non-finite trial step h = {h:e} at t = {t}");
            h *= 0.2;
            continue;
        }

        if err > 1.0 {
            rejected += 1;
            h *= step_factor(err).min(1.0);
            trace!("Rejected step at t = {t}, err = {err:.3e}, retry with h = {h:e}");
            continue;
        }

        let reaches_end = h >= t_end - t;
        let t_new = if reaches_end { t_end } else { t + h };
        while next_index < points.len() && points[next_index] <= t_new {
            let theta = (points[next_index] - t) / h;
            hermite_interpolate(
                &state,
                solver.start_derivative(),
                &next,
                solver.end_derivative(),
                h,
                theta,
                &mut sample,
            );
            for (j, v) in sample.iter().enumerate() {
                values[(next_index, j)] = *v;
            }
            next_index += 1;
        }

        solver.accept();
        state.copy_from_slice(&next);
        t = t_new;
        accepted += 1;

        if reaches_end {
            break;
        }
        h = next_step((h * step_factor(err)).min(h_max), t_end - t, settings.h_min);
    }

    if next_index < points.len() {
        return Err(EpidemicError::unstable(
            Some(next_index),
            "integration stopped before the end of the time grid",
        ));
    }

    debug!(
        "Tsit5 integration finished: {} grid points, {accepted} accepted / {rejected} rejected steps",
        points.len()
    );
    Ok(())
}

/// Clips a proposed step to the remaining span. A step that would leave a
/// sliver shorter than `h_min` is stretched to land on the end instead.
fn next_step(proposed: f64, remaining: f64, h_min: f64) -> f64 {
    if proposed >= remaining || remaining - proposed < h_min {
        remaining
    } else {
        proposed
    }
}

/// Growth factor for the next step from a normalized error.
fn step_factor(err: f64) -> f64 {
    const SAFETY: f64 = 0.9;
    const MIN_FACTOR: f64 = 0.2;
    const MAX_FACTOR: f64 = 5.0;
    if err == 0.0 {
        return MAX_FACTOR;
    }
    (SAFETY * err.powf(-0.2)).clamp(MIN_FACTOR, MAX_FACTOR)
}

fn error_norm(y0: &[f64], y1: &[f64], error: &[f64], settings: &IntegratorSettings) -> f64 {
    let sum: f64 = y0
        .iter()
        .zip(y1)
        .zip(error)
        .map(|((a, b), e)| {
            let scale = settings.atol + settings.rtol * a.abs().max(b.abs());
            (e / scale).powi(2)
        })
        .sum();
    (sum / y0.len() as f64).sqrt()
}

/// Starting step from the ratio of state and derivative magnitudes.
fn initial_step(state: &[f64], derivative: &[f64], settings: &IntegratorSettings) -> f64 {
    let scaled = |v: &[f64]| {
        let sum: f64 = v
            .iter()
            .zip(state)
            .map(|(x, y)| (x / (settings.atol + settings.rtol * y.abs())).powi(2))
            .sum();
        (sum / v.len() as f64).sqrt()
    };
    let d0 = scaled(state);
    let d1 = scaled(derivative);
    let h = if d0 < 1e-5 || d1 < 1e-5 {
        1e-6
    } else {
        0.01 * d0 / d1
    };
    h.max(settings.h_min)
}

fn all_finite(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_finite())
}

fn ensure_finite(values: &[f64], time_index: Option<usize>, what: &str) -> Result<()> {
    if all_finite(values) {
        Ok(())
    } else {
        warn!("Non-finite {what} detected");
        Err(EpidemicError::unstable(
            time_index,
            format!("non-finite {what}"),
        ))
    }
}
