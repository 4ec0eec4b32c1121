//! Observed case series: seeding a scenario from them and laying simulated
//! output over them. Nothing here adjusts model parameters.

use crate::error::{EpidemicError, Result};
use crate::models::{ModelParameters, ModelVariant, DECEASED, INFECTED, RECOVERED};
use crate::scenario::{InitialCounts, ScenarioRequest, ScenarioResult};
use serde::{Deserialize, Serialize};

/// Cumulative daily counts for one country, as supplied by the data layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceSeries {
    pub population: f64,
    pub infected: Vec<f64>,
    pub recovered: Vec<f64>,
    pub deceased: Vec<f64>,
}

impl ReferenceSeries {
    /// Number of days covered by the longest series.
    pub fn days(&self) -> usize {
        self.infected
            .len()
            .max(self.recovered.len())
            .max(self.deceased.len())
    }

    /// Builds a request whose initial values are the first observations.
    /// Infected gets one extra case so the epidemic always has a seed.
    pub fn seed(&self, parameters: ModelParameters) -> Result<ScenarioRequest> {
        let first_infected = self.infected.first().copied().ok_or_else(|| {
            EpidemicError::invalid("infected_series", "needs at least one observation")
        })?;
        let deceased = match parameters.variant() {
            ModelVariant::Sird => self.deceased.first().copied().unwrap_or(0.0),
            _ => 0.0,
        };
        Ok(ScenarioRequest {
            total_population: self.population,
            initial: InitialCounts {
                exposed: 0.0,
                infected: first_infected + 1.0,
                recovered: self.recovered.first().copied().unwrap_or(0.0),
                deceased,
            },
            day_value: self.days(),
            parameters,
        })
    }

    fn observed(&self, compartment: &str) -> &[f64] {
        match compartment {
            INFECTED => self.infected.as_slice(),
            RECOVERED => self.recovered.as_slice(),
            DECEASED => self.deceased.as_slice(),
            _ => &[],
        }
    }
}

/// A simulated compartment next to its observed counterpart, day by day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesOverlay {
    pub compartment: String,
    pub simulated: Vec<f64>,
    pub observed: Vec<f64>,
    /// simulated - observed
    pub residuals: Vec<f64>,
    pub mean_absolute_error: f64,
    pub simulated_peak: Peak,
    pub observed_peak: Peak,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Peak {
    pub day: usize,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub variant: ModelVariant,
    pub overlays: Vec<SeriesOverlay>,
}

impl ComparisonReport {
    pub fn overlay(&self, compartment: &str) -> Option<&SeriesOverlay> {
        self.overlays.iter().find(|o| o.compartment == compartment)
    }
}

/// Aligns every observed series that has a matching compartment in the
/// result. Series are truncated to their common length; empty ones and
/// compartments the model lacks are skipped.
pub fn compare(result: &ScenarioResult, reference: &ReferenceSeries) -> ComparisonReport {
    let trajectory = result.trajectory();
    let overlays = [INFECTED, RECOVERED, DECEASED]
        .into_iter()
        .filter_map(|name| {
            let simulated = trajectory.series(name)?;
            let observed = reference.observed(name);
            let len = simulated.len().min(observed.len());
            if len == 0 {
                return None;
            }
            Some(build_overlay(name, &simulated[..len], &observed[..len]))
        })
        .collect();

    ComparisonReport {
        variant: result.variant(),
        overlays,
    }
}

fn build_overlay(name: &str, simulated: &[f64], observed: &[f64]) -> SeriesOverlay {
    let residuals: Vec<f64> = simulated.iter().zip(observed).map(|(s, o)| s - o).collect();
    let mean_absolute_error =
        residuals.iter().map(|r| r.abs()).sum::<f64>() / residuals.len() as f64;
    SeriesOverlay {
        compartment: name.to_string(),
        simulated: simulated.to_vec(),
        observed: observed.to_vec(),
        residuals,
        mean_absolute_error,
        simulated_peak: peak(simulated),
        observed_peak: peak(observed),
    }
}

fn peak(values: &[f64]) -> Peak {
    values
        .iter()
        .enumerate()
        .fold(Peak { day: 0, value: f64::NEG_INFINITY }, |best, (day, &value)| {
            if value > best.value {
                Peak { day, value }
            } else {
                best
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::run_scenario;

    fn reference() -> ReferenceSeries {
        ReferenceSeries {
            population: 100_000.0,
            infected: vec![4.0, 6.0, 9.0, 14.0, 20.0, 29.0, 41.0],
            recovered: vec![1.0, 1.0, 2.0, 3.0, 5.0],
            deceased: vec![0.0, 0.0, 1.0],
        }
    }

    #[test]
    fn seed_uses_first_observations_plus_one_infected() {
        let request = reference()
            .seed(ModelParameters::Sird {
                contact_rate: 0.3,
                recovery_rate: 0.1,
                deceased_rate: 0.01,
            })
            .expect("seed");
        assert_eq!(request.total_population, 100_000.0);
        assert_eq!(request.initial.infected, 5.0);
        assert_eq!(request.initial.recovered, 1.0);
        assert_eq!(request.initial.deceased, 0.0);
        assert_eq!(request.day_value, 7);
    }

    #[test]
    fn seed_ignores_deceased_for_models_without_it() {
        let mut series = reference();
        series.deceased = vec![3.0];
        let request = series
            .seed(ModelParameters::Sir {
                contact_rate: 0.3,
                recovery_rate: 0.1,
            })
            .expect("seed");
        assert_eq!(request.initial.deceased, 0.0);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn seed_requires_an_infected_observation() {
        let series = ReferenceSeries {
            population: 1000.0,
            ..ReferenceSeries::default()
        };
        let err = series
            .seed(ModelParameters::Sir {
                contact_rate: 0.3,
                recovery_rate: 0.1,
            })
            .expect_err("empty series");
        assert_eq!(err.field(), Some("infected_series"));
    }

    #[test]
    fn overlays_truncate_to_common_length() {
        let series = reference();
        let request = series
            .seed(ModelParameters::Sir {
                contact_rate: 0.4,
                recovery_rate: 0.1,
            })
            .expect("seed");
        let result = run_scenario(&request).expect("scenario");
        let report = compare(&result, &series);

        assert_eq!(report.variant, ModelVariant::Sir);
        assert_eq!(report.overlays.len(), 2);
        assert!(report.overlay(DECEASED).is_none());

        let infected = report.overlay(INFECTED).expect("infected overlay");
        assert_eq!(infected.simulated.len(), 7);
        assert_eq!(infected.residuals[0], 1.0);
        assert_eq!(infected.observed_peak, Peak { day: 6, value: 41.0 });

        let recovered = report.overlay(RECOVERED).expect("recovered overlay");
        assert_eq!(recovered.observed.len(), 5);
        assert_eq!(recovered.simulated.len(), 5);
    }

    #[test]
    fn mean_absolute_error_averages_residual_magnitudes() {
        let overlay = build_overlay(INFECTED, &[1.0, 5.0, 3.0], &[2.0, 3.0, 3.0]);
        assert_eq!(overlay.residuals, vec![-1.0, 2.0, 0.0]);
        assert!((overlay.mean_absolute_error - 1.0).abs() < 1e-12);
        assert_eq!(overlay.simulated_peak, Peak { day: 1, value: 5.0 });
    }
}
