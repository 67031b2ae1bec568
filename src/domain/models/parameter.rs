//! Scalar task parameters (ratio, seed, batch size, ...): each is either a
//! constant value or a named variable carrying a candidate list.

use crate::domain::errors::OrchestratorError;
use crate::domain::models::scalar::ScalarValue;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Parameter {
    Constant(ScalarValue),
    Variable {
        variable_id: String,
        variable_name: String,
        variable_values: Vec<ScalarValue>,
    },
}

impl Parameter {
    pub fn is_variable(&self) -> bool {
        matches!(self, Self::Variable { .. })
    }

    pub fn as_constant(&self) -> Option<&ScalarValue> {
        match self {
            Self::Constant(v) => Some(v),
            Self::Variable { .. } => None,
        }
    }
}

/// Loose wire shape for a `TaskParameter` slot: `{is_variable, type,
/// format, value}` or `{is_variable: true, type, format, variable_id,
/// variable_name, variable_values}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ParameterSpec {
    #[serde(default)]
    pub is_variable: bool,
    #[serde(default)]
    pub format: Option<String>,
    pub value: Option<ScalarValue>,
    #[serde(default)]
    pub variable_id: Option<String>,
    #[serde(default)]
    pub variable_name: Option<String>,
    #[serde(default)]
    pub variable_values: Option<Vec<ScalarValue>>,
}

impl ParameterSpec {
    /// Validate against a slot's declared scalar format (`"string"`,
    /// `"int"`, `"float"`, `"bool"`), coercing every candidate value.
    pub fn validate(&self, slot: &str, format: &str) -> Result<Parameter, OrchestratorError> {
        if self.is_variable {
            let variable_id = self
                .variable_id
                .clone()
                .filter(|s| !s.is_empty())
                .ok_or_else(|| {
                    OrchestratorError::SpecInvalid(format!(
                        "variable slot {slot} is missing variable_id"
                    ))
                })?;
            let variable_name = self
                .variable_name
                .clone()
                .filter(|s| !s.is_empty())
                .ok_or_else(|| {
                    OrchestratorError::SpecInvalid(format!(
                        "variable slot {slot} is missing variable_name"
                    ))
                })?;
            let raw = self.variable_values.as_ref().ok_or_else(|| {
                OrchestratorError::SpecInvalid(format!(
                    "variable slot {slot} is missing variable_values"
                ))
            })?;
            if raw.is_empty() {
                return Err(OrchestratorError::SpecInvalid(format!(
                    "variable slot {slot} variable_values must be non-empty"
                )));
            }
            let variable_values = raw
                .iter()
                .map(|v| {
                    v.coerce(format).ok_or_else(|| {
                        OrchestratorError::SpecInvalid(format!(
                            "value {v} in slot {slot} is not coercible to {format}"
                        ))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Parameter::Variable {
                variable_id,
                variable_name,
                variable_values,
            })
        } else {
            if self.variable_values.is_some() {
                return Err(OrchestratorError::SpecInvalid(format!(
                    "constant slot {slot} must not carry variable_values"
                )));
            }
            let value = self.value.as_ref().ok_or_else(|| {
                OrchestratorError::SpecInvalid(format!("slot {slot} is missing value"))
            })?;
            let coerced = value.coerce(format).ok_or_else(|| {
                OrchestratorError::SpecInvalid(format!(
                    "value for slot {slot} is not coercible to {format}"
                ))
            })?;
            Ok(Parameter::Constant(coerced))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_string_slot_validates() {
        let spec = ParameterSpec {
            is_variable: false,
            format: Some("string".to_string()),
            value: Some(ScalarValue::Str("1:1".to_string())),
            variable_id: None,
            variable_name: None,
            variable_values: None,
        };
        let parameter = spec.validate("ratio", "string").unwrap();
        assert_eq!(parameter, Parameter::Constant(ScalarValue::Str("1:1".to_string())));
    }

    #[test]
    fn variable_slot_requires_nonempty_values() {
        let spec = ParameterSpec {
            is_variable: true,
            format: Some("string".to_string()),
            value: None,
            variable_id: Some("v".to_string()),
            variable_name: Some("ratio".to_string()),
            variable_values: Some(vec![]),
        };
        assert!(spec.validate("ratio", "string").is_err());
    }

    #[test]
    fn value_not_coercible_to_declared_format_is_spec_invalid() {
        let spec = ParameterSpec {
            is_variable: false,
            format: Some("int".to_string()),
            value: Some(ScalarValue::Str("not-a-number".to_string())),
            variable_id: None,
            variable_name: None,
            variable_values: None,
        };
        assert!(spec.validate("seed", "int").is_err());
    }
}
