//! Serializable shapes handed to the JS side, and the plain-Rust calls that
//! produce them.

use anyhow::Context;
use epidemos_core::comparison::{compare, ComparisonReport, ReferenceSeries};
use epidemos_core::{
    run_scenario_with, IntegratorSettings, ModelParameters, ScenarioCache, ScenarioRequest,
    ScenarioResult,
};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct CompartmentSeries {
    pub name: String,
    pub values: Vec<f64>,
}

/// A scenario result flattened into named series for plotting.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioPayload {
    pub model: String,
    pub times: Vec<f64>,
    pub compartments: Vec<CompartmentSeries>,
    pub r0: f64,
    pub display_scale: f64,
}

impl From<&ScenarioResult> for ScenarioPayload {
    fn from(result: &ScenarioResult) -> Self {
        let trajectory = result.trajectory();
        let compartments = trajectory
            .compartments()
            .iter()
            .enumerate()
            .map(|(idx, name)| CompartmentSeries {
                name: name.clone(),
                values: trajectory.column(idx),
            })
            .collect();
        Self {
            model: result.variant().label().to_string(),
            times: trajectory.times().to_vec(),
            compartments,
            r0: result.r0(),
            display_scale: result.display_scale(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonPayload {
    pub scenario: ScenarioPayload,
    pub report: ComparisonReport,
}

pub(crate) fn run_request(
    request: &ScenarioRequest,
    settings: &IntegratorSettings,
) -> anyhow::Result<ScenarioPayload> {
    let result = run_scenario_with(request, settings)
        .with_context(|| format!("{} scenario failed", request.variant()))?;
    Ok(ScenarioPayload::from(&result))
}

pub(crate) fn run_cached(
    cache: &mut ScenarioCache,
    request: &ScenarioRequest,
    settings: &IntegratorSettings,
) -> anyhow::Result<ScenarioPayload> {
    let result = cache
        .get_or_run(request, settings)
        .with_context(|| format!("{} scenario failed", request.variant()))?;
    Ok(ScenarioPayload::from(result.as_ref()))
}

pub(crate) fn compare_reference(
    parameters: ModelParameters,
    reference: &ReferenceSeries,
    settings: &IntegratorSettings,
) -> anyhow::Result<ComparisonPayload> {
    let request = reference
        .seed(parameters)
        .context("Could not seed scenario from reference data")?;
    let result = run_scenario_with(&request, settings)
        .with_context(|| format!("{} comparison scenario failed", request.variant()))?;
    let report = compare(&result, reference);
    Ok(ComparisonPayload {
        scenario: ScenarioPayload::from(&result),
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_names_every_compartment() {
        let request = ScenarioRequest::sird(10_000.0, 10.0, 0.0, 0.0, 20, 0.3, 0.1, 0.01);
        let payload = run_request(&request, &IntegratorSettings::default()).expect("payload");
        assert_eq!(payload.model, "SIR-D");
        let names: Vec<&str> = payload.compartments.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Susceptible", "Infected", "Recovered", "Deceased"]);
        assert!(payload.compartments.iter().all(|c| c.values.len() == 20));
        assert_eq!(payload.times.len(), 20);
    }

    #[test]
    fn failures_keep_the_core_message_in_the_chain() {
        let request = ScenarioRequest::sir(100.0, 200.0, 0.0, 20, 0.3, 0.1);
        let err = run_request(&request, &IntegratorSettings::default()).expect_err("invalid");
        let message = format!("{err:#}");
        assert!(message.starts_with("SIR scenario failed"), "{message}");
        assert!(message.contains("Invalid parameter `infected`"), "{message}");
    }

    #[test]
    fn cached_runs_share_the_error_chain() {
        let mut cache = ScenarioCache::new();
        let settings = IntegratorSettings::default();
        let request = ScenarioRequest::seir(1000.0, 0.0, 2000.0, 0.0, 20, 0.3, 0.1, 0.2);
        let message = format!(
            "{:#}",
            run_cached(&mut cache, &request, &settings).expect_err("invalid")
        );
        assert!(message.starts_with("SEIR scenario failed"), "{message}");
        assert!(message.contains("Invalid parameter `infected`"), "{message}");
        assert!(cache.is_empty());

        let request = ScenarioRequest::sir(1000.0, 1.0, 0.0, 20, 0.3, 0.1);
        let payload = run_cached(&mut cache, &request, &settings).expect("payload");
        assert_eq!(payload.times.len(), 20);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn comparison_payload_carries_overlays() {
        let reference = ReferenceSeries {
            population: 50_000.0,
            infected: vec![2.0, 3.0, 5.0, 8.0],
            recovered: vec![0.0, 0.0, 1.0, 1.0],
            deceased: Vec::new(),
        };
        let payload = compare_reference(
            ModelParameters::Sir {
                contact_rate: 0.3,
                recovery_rate: 0.1,
            },
            &reference,
            &IntegratorSettings::default(),
        )
        .expect("comparison");
        assert_eq!(payload.scenario.times.len(), 4);
        assert_eq!(payload.report.overlays.len(), 2);
    }
}
