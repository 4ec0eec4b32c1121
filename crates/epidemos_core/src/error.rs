use thiserror::Error;

/// Failures raised by the simulation pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EpidemicError {
    /// A precondition on the request was violated. `field` names the offending input.
    #[error("Invalid parameter `{field}`: {reason}")]
    InvalidParameters { field: String, reason: String },

    #[error("Division by zero while computing {context}")]
    DivisionByZero { context: String },

    /// The integrator could not produce finite values. `time_index` is the grid
    /// point that was being approached, when known.
    #[error("Numerical instability{}: {reason}", fmt_index(.time_index))]
    NumericalInstability {
        time_index: Option<usize>,
        reason: String,
    },
}

fn fmt_index(index: &Option<usize>) -> String {
    match index {
        Some(i) => format!(" at time index {i}"),
        None => String::new(),
    }
}

impl EpidemicError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameters {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn division_by_zero(context: impl Into<String>) -> Self {
        Self::DivisionByZero {
            context: context.into(),
        }
    }

    pub(crate) fn unstable(time_index: Option<usize>, reason: impl Into<String>) -> Self {
        Self::NumericalInstability {
            time_index,
            reason: reason.into(),
        }
    }

    /// Name of the offending field for `InvalidParameters`.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::InvalidParameters { field, .. } => Some(field),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, EpidemicError>;

#[cfg(test)]
mod tests {
    use super::EpidemicError;

    #[test]
    fn instability_message_includes_index_when_known() {
        let err = EpidemicError::unstable(Some(12), "non-finite derivative");
        assert_eq!(
            err.to_string(),
            "Numerical instability at time index 12: non-finite derivative"
        );
        let err = EpidemicError::unstable(None, "step budget exhausted");
        assert_eq!(err.to_string(), "Numerical instability: step budget exhausted");
    }

    #[test]
    fn field_is_exposed_only_for_invalid_parameters() {
        let err = EpidemicError::invalid("infected", "exceeds total population");
        assert_eq!(err.field(), Some("infected"));
        assert_eq!(EpidemicError::division_by_zero("R0").field(), None);
    }
}
