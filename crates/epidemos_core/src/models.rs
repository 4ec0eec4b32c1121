//! Rate equations for the supported compartmental models.
//!
//! Each model is a plain parameter struct implementing [`RateEquations`]. The
//! transmission term is always `beta * S * I / N`; the variants differ only in
//! where the outflow of the infected compartment goes.

use crate::error::{EpidemicError, Result};
use crate::traits::{RateEquations, Scalar};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const SUSCEPTIBLE: &str = "Susceptible";
pub const EXPOSED: &str = "Exposed";
pub const INFECTED: &str = "Infected";
pub const RECOVERED: &str = "Recovered";
pub const DECEASED: &str = "Deceased";

const SIR_COMPARTMENTS: [&str; 3] = [SUSCEPTIBLE, INFECTED, RECOVERED];
const SIRD_COMPARTMENTS: [&str; 4] = [SUSCEPTIBLE, INFECTED, RECOVERED, DECEASED];
const SEIR_COMPARTMENTS: [&str; 4] = [SUSCEPTIBLE, EXPOSED, INFECTED, RECOVERED];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelVariant {
    Sir,
    Sird,
    Seir,
    Seirm,
}

impl ModelVariant {
    pub const ALL: [ModelVariant; 4] = [
        ModelVariant::Sir,
        ModelVariant::Sird,
        ModelVariant::Seir,
        ModelVariant::Seirm,
    ];

    pub fn compartments(self) -> &'static [&'static str] {
        match self {
            ModelVariant::Sir => &SIR_COMPARTMENTS,
            ModelVariant::Sird => &SIRD_COMPARTMENTS,
            ModelVariant::Seir | ModelVariant::Seirm => &SEIR_COMPARTMENTS,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ModelVariant::Sir => "SIR",
            ModelVariant::Sird => "SIR-D",
            ModelVariant::Seir => "SEIR",
            ModelVariant::Seirm => "SEIR(Mitigation)",
        }
    }

    /// Slot of `name` in this variant's state vector.
    pub fn index_of(self, name: &str) -> Option<usize> {
        self.compartments().iter().position(|c| *c == name)
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ModelVariant {
    type Err = EpidemicError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sir" => Ok(ModelVariant::Sir),
            "sird" | "sir-d" => Ok(ModelVariant::Sird),
            "seir" => Ok(ModelVariant::Seir),
            "seirm" | "seir-m" | "seir(mitigation)" | "seir-mitigation" => Ok(ModelVariant::Seirm),
            other => Err(EpidemicError::invalid(
                "model",
                format!("unknown model variant `{other}`"),
            )),
        }
    }
}

/// Rate parameters, one variant per model so a parameter set can never be
/// paired with the wrong equations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum ModelParameters {
    Sir {
        contact_rate: f64,
        recovery_rate: f64,
    },
    Sird {
        contact_rate: f64,
        recovery_rate: f64,
        deceased_rate: f64,
    },
    Seir {
        contact_rate: f64,
        recovery_rate: f64,
        expose_rate: f64,
    },
    Seirm {
        contact_rate: f64,
        recovery_rate: f64,
        expose_rate: f64,
        mitigation_control: f64,
    },
}

impl ModelParameters {
    pub fn variant(&self) -> ModelVariant {
        match self {
            ModelParameters::Sir { .. } => ModelVariant::Sir,
            ModelParameters::Sird { .. } => ModelVariant::Sird,
            ModelParameters::Seir { .. } => ModelVariant::Seir,
            ModelParameters::Seirm { .. } => ModelVariant::Seirm,
        }
    }

    pub fn contact_rate(&self) -> f64 {
        match *self {
            ModelParameters::Sir { contact_rate, .. }
            | ModelParameters::Sird { contact_rate, .. }
            | ModelParameters::Seir { contact_rate, .. }
            | ModelParameters::Seirm { contact_rate, .. } => contact_rate,
        }
    }

    pub fn recovery_rate(&self) -> f64 {
        match *self {
            ModelParameters::Sir { recovery_rate, .. }
            | ModelParameters::Sird { recovery_rate, .. }
            | ModelParameters::Seir { recovery_rate, .. }
            | ModelParameters::Seirm { recovery_rate, .. } => recovery_rate,
        }
    }

    /// Named values in declaration order.
    pub fn named_values(&self) -> Vec<(&'static str, f64)> {
        let mut values = vec![
            ("contact_rate", self.contact_rate()),
            ("recovery_rate", self.recovery_rate()),
        ];
        match *self {
            ModelParameters::Sir { .. } => {}
            ModelParameters::Sird { deceased_rate, .. } => {
                values.push(("deceased_rate", deceased_rate));
            }
            ModelParameters::Seir { expose_rate, .. } => {
                values.push(("expose_rate", expose_rate));
            }
            ModelParameters::Seirm {
                expose_rate,
                mitigation_control,
                ..
            } => {
                values.push(("expose_rate", expose_rate));
                values.push(("mitigation_control", mitigation_control));
            }
        }
        values
    }

    /// Rates must be finite and positive; mitigation control lies in [0, 1].
    pub fn validate(&self) -> Result<()> {
        for (name, value) in self.named_values() {
            if name == "mitigation_control" {
                if !(0.0..=1.0).contains(&value) {
                    return Err(EpidemicError::invalid(
                        name,
                        format!("must lie in [0, 1], got {value}"),
                    ));
                }
            } else if !value.is_finite() || value <= 0.0 {
                return Err(EpidemicError::invalid(
                    name,
                    format!("must be finite and positive, got {value}"),
                ));
            }
        }
        Ok(())
    }
}

/// S -> I -> R.
#[derive(Debug, Clone, Copy)]
pub struct Sir<T> {
    pub population: T,
    pub contact_rate: T,
    pub recovery_rate: T,
}

impl<T: Scalar> RateEquations<T> for Sir<T> {
    fn compartments(&self) -> &'static [&'static str] {
        &SIR_COMPARTMENTS
    }

    fn derivatives(&self, _t: T, x: &[T], out: &mut [T]) {
        let (s, i) = (x[0], x[1]);
        let infection = self.contact_rate * s * i / self.population;
        let recovery = self.recovery_rate * i;
        out[0] = -infection;
        out[1] = infection - recovery;
        out[2] = recovery;
    }
}

/// S -> I -> {R, D}.
#[derive(Debug, Clone, Copy)]
pub struct Sird<T> {
    pub population: T,
    pub contact_rate: T,
    pub recovery_rate: T,
    pub deceased_rate: T,
}

impl<T: Scalar> RateEquations<T> for Sird<T> {
    fn compartments(&self) -> &'static [&'static str] {
        &SIRD_COMPARTMENTS
    }

    fn derivatives(&self, _t: T, x: &[T], out: &mut [T]) {
        let (s, i) = (x[0], x[1]);
        let infection = self.contact_rate * s * i / self.population;
        let recovery = self.recovery_rate * i;
        let death = self.deceased_rate * i;
        out[0] = -infection;
        out[1] = infection - recovery - death;
        out[2] = recovery;
        out[3] = death;
    }
}

/// S -> E -> I -> R, with the transmission term scaled by `1 - u`.
///
/// Plain SEIR is the `mitigation_control == 0` case.
#[derive(Debug, Clone, Copy)]
pub struct Seir<T> {
    pub population: T,
    pub contact_rate: T,
    pub recovery_rate: T,
    pub expose_rate: T,
    pub mitigation_control: T,
}

impl<T: Scalar> RateEquations<T> for Seir<T> {
    fn compartments(&self) -> &'static [&'static str] {
        &SEIR_COMPARTMENTS
    }

    fn derivatives(&self, _t: T, x: &[T], out: &mut [T]) {
        let (s, e, i) = (x[0], x[1], x[2]);
        let effective = (T::one() - self.mitigation_control) * self.contact_rate;
        let exposure = effective * s * i / self.population;
        let onset = self.expose_rate * e;
        let recovery = self.recovery_rate * i;
        out[0] = -exposure;
        out[1] = exposure - onset;
        out[2] = onset - recovery;
        out[3] = recovery;
    }
}

/// Runtime-selected rate equations for one scenario.
#[derive(Debug, Clone, Copy)]
pub enum CompartmentModel {
    Sir(Sir<f64>),
    Sird(Sird<f64>),
    Seir(Seir<f64>),
}

impl CompartmentModel {
    pub fn new(population: f64, parameters: &ModelParameters) -> Self {
        match *parameters {
            ModelParameters::Sir {
                contact_rate,
                recovery_rate,
            } => CompartmentModel::Sir(Sir {
                population,
                contact_rate,
                recovery_rate,
            }),
            ModelParameters::Sird {
                contact_rate,
                recovery_rate,
                deceased_rate,
            } => CompartmentModel::Sird(Sird {
                population,
                contact_rate,
                recovery_rate,
                deceased_rate,
            }),
            ModelParameters::Seir {
                contact_rate,
                recovery_rate,
                expose_rate,
            } => CompartmentModel::Seir(Seir {
                population,
                contact_rate,
                recovery_rate,
                expose_rate,
                mitigation_control: 0.0,
            }),
            ModelParameters::Seirm {
                contact_rate,
                recovery_rate,
                expose_rate,
                mitigation_control,
            } => CompartmentModel::Seir(Seir {
                population,
                contact_rate,
                recovery_rate,
                expose_rate,
                mitigation_control,
            }),
        }
    }
}

impl RateEquations<f64> for CompartmentModel {
    fn compartments(&self) -> &'static [&'static str] {
        match self {
            CompartmentModel::Sir(m) => m.compartments(),
            CompartmentModel::Sird(m) => m.compartments(),
            CompartmentModel::Seir(m) => m.compartments(),
        }
    }

    fn derivatives(&self, t: f64, x: &[f64], out: &mut [f64]) {
        match self {
            CompartmentModel::Sir(m) => m.derivatives(t, x, out),
            CompartmentModel::Sird(m) => m.derivatives(t, x, out),
            CompartmentModel::Seir(m) => m.derivatives(t, x, out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(model: &impl RateEquations<f64>, x: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; model.dimension()];
        model.derivatives(0.0, x, &mut out);
        out
    }

    #[test]
    fn sir_derivatives_match_closed_form() {
        let model = Sir {
            population: 1000.0,
            contact_rate: 0.2,
            recovery_rate: 0.1,
        };
        let d = eval(&model, &[900.0, 50.0, 50.0]);
        assert!((d[0] + 9.0).abs() < 1e-12);
        assert!((d[1] - 4.0).abs() < 1e-12);
        assert!((d[2] - 5.0).abs() < 1e-12);
    }

    #[test]
    fn sird_routes_outflow_to_recovered_and_deceased() {
        let model = Sird {
            population: 1000.0,
            contact_rate: 0.2,
            recovery_rate: 0.1,
            deceased_rate: 0.05,
        };
        let d = eval(&model, &[900.0, 50.0, 40.0, 10.0]);
        assert!((d[1] - (9.0 - 5.0 - 2.5)).abs() < 1e-12);
        assert!((d[2] - 5.0).abs() < 1e-12);
        assert!((d[3] - 2.5).abs() < 1e-12);
    }

    #[test]
    fn derivatives_sum_to_zero_for_every_variant() {
        let params = [
            ModelParameters::Sir {
                contact_rate: 0.3,
                recovery_rate: 0.1,
            },
            ModelParameters::Sird {
                contact_rate: 0.3,
                recovery_rate: 0.1,
                deceased_rate: 0.02,
            },
            ModelParameters::Seir {
                contact_rate: 0.3,
                recovery_rate: 0.1,
                expose_rate: 0.2,
            },
            ModelParameters::Seirm {
                contact_rate: 0.3,
                recovery_rate: 0.1,
                expose_rate: 0.2,
                mitigation_control: 0.4,
            },
        ];
        for p in params {
            let model = CompartmentModel::new(5000.0, &p);
            let x: Vec<f64> = (0..model.dimension()).map(|k| 1000.0 + 10.0 * k as f64).collect();
            let total: f64 = eval(&model, &x).iter().sum();
            assert!(total.abs() < 1e-9, "{:?} derivatives sum to {total}", p.variant());
        }
    }

    #[test]
    fn full_mitigation_stops_new_exposures() {
        let model = CompartmentModel::new(
            1000.0,
            &ModelParameters::Seirm {
                contact_rate: 0.5,
                recovery_rate: 0.1,
                expose_rate: 0.2,
                mitigation_control: 1.0,
            },
        );
        let d = eval(&model, &[800.0, 100.0, 50.0, 50.0]);
        assert_eq!(d[0], 0.0);
        assert!((d[1] + 20.0).abs() < 1e-12);
    }

    #[test]
    fn rate_equations_are_generic_over_scalar() {
        let model = Sir::<f32> {
            population: 100.0,
            contact_rate: 0.5,
            recovery_rate: 0.25,
        };
        let mut out = [0.0f32; 3];
        model.derivatives(0.0, &[50.0, 10.0, 40.0], &mut out);
        assert!((out[0] + 2.5).abs() < 1e-6);
    }

    #[test]
    fn parameter_validation_names_the_field() {
        let err = ModelParameters::Seirm {
            contact_rate: 0.2,
            recovery_rate: 0.1,
            expose_rate: 0.2,
            mitigation_control: 1.5,
        }
        .validate()
        .expect_err("u out of range");
        assert_eq!(err.field(), Some("mitigation_control"));

        let err = ModelParameters::Sird {
            contact_rate: 0.2,
            recovery_rate: 0.1,
            deceased_rate: 0.0,
        }
        .validate()
        .expect_err("zero rate");
        assert_eq!(err.field(), Some("deceased_rate"));
    }

    #[test]
    fn variant_parses_ui_labels() {
        assert_eq!("SIR-D".parse::<ModelVariant>().ok(), Some(ModelVariant::Sird));
        assert_eq!("seirm".parse::<ModelVariant>().ok(), Some(ModelVariant::Seirm));
        assert!("sis".parse::<ModelVariant>().is_err());
        assert_eq!(ModelVariant::Seir.index_of(INFECTED), Some(2));
        assert_eq!(ModelVariant::Sir.index_of(DECEASED), None);
    }
}
