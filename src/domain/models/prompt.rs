//! Prompt polymorphism: freetext, reference-token, or variable-over-either.
//!
//! `Prompt` is the validated, task-level shape. `PromptSpec` is the loose
//! wire DTO accepted on submission; [`PromptSpec::validate`] is the only
//! path from one to the other, mirroring how the source's pydantic model
//! validates a loose dict into a strict shape.

use crate::domain::errors::OrchestratorError;
use serde::{Deserialize, Serialize};

fn default_weight() -> f64 {
    1.0
}

/// The two reference-token prompt kinds; both carry the same fixed
/// metadata fields when materialized for the upstream API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    OcVtokenAdaptor,
    Elementum,
}

impl ReferenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OcVtokenAdaptor => "oc_vtoken_adaptor",
            Self::Elementum => "elementum",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "oc_vtoken_adaptor" => Some(Self::OcVtokenAdaptor),
            "elementum" => Some(Self::Elementum),
            _ => None,
        }
    }
}

/// A prompt with no remaining variable arms — what a materialized subtask
/// actually holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConstantPrompt {
    Freetext { value: String, weight: f64 },
    Reference {
        #[serde(rename = "type")]
        kind: ReferenceKind,
        value: String,
        uuid: String,
        name: String,
        img_url: String,
        weight: f64,
    },
}

impl ConstantPrompt {
    /// The value this prompt contributes once substituted into a subtask;
    /// used to decide whether a dropped-prompt rule (empty/null value)
    /// applies during materialization.
    pub fn value(&self) -> &str {
        match self {
            Self::Freetext { value, .. } | Self::Reference { value, .. } => value,
        }
    }

    pub fn is_empty_value(&self) -> bool {
        self.value().trim().is_empty()
    }
}

/// A prompt slot bound to a variable: the task carries the candidate list,
/// the expansion engine binds one candidate per subtask coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariablePrompt {
    pub variable_id: String,
    pub variable_name: String,
    pub variable_values: Vec<ConstantPrompt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Prompt {
    Constant(ConstantPrompt),
    Variable(VariablePrompt),
}

impl Prompt {
    pub fn is_variable(&self) -> bool {
        matches!(self, Self::Variable(_))
    }
}

/// Loose wire shape for a prompt entry in a `TaskSpec`. Every field is
/// optional on the wire; [`validate`](Self::validate) enforces the shape
/// demanded by the declared `type`/`is_variable` combination.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PromptSpec {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub is_variable: bool,
    pub value: Option<String>,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub img_url: Option<String>,
    #[serde(default)]
    pub variable_id: Option<String>,
    #[serde(default)]
    pub variable_name: Option<String>,
    #[serde(default)]
    pub variable_values: Option<Vec<PromptSpec>>,
}

impl PromptSpec {
    pub fn validate(&self) -> Result<Prompt, OrchestratorError> {
        if self.is_variable {
            let variable_id = self
                .variable_id
                .clone()
                .filter(|s| !s.is_empty())
                .ok_or_else(|| {
                    OrchestratorError::SpecInvalid(
                        "variable prompt is missing variable_id".to_string(),
                    )
                })?;
            let variable_name = self
                .variable_name
                .clone()
                .filter(|s| !s.is_empty())
                .ok_or_else(|| {
                    OrchestratorError::SpecInvalid(
                        "variable prompt is missing variable_name".to_string(),
                    )
                })?;
            let raw_values = self.variable_values.as_ref().ok_or_else(|| {
                OrchestratorError::SpecInvalid(
                    "variable prompt is missing variable_values".to_string(),
                )
            })?;
            if raw_values.is_empty() {
                return Err(OrchestratorError::SpecInvalid(
                    "variable prompt variable_values must be non-empty".to_string(),
                ));
            }
            let variable_values = raw_values
                .iter()
                .map(PromptSpec::validate_constant)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Prompt::Variable(VariablePrompt {
                variable_id,
                variable_name,
                variable_values,
            }))
        } else {
            if self.variable_values.is_some() {
                return Err(OrchestratorError::SpecInvalid(
                    "constant prompt must not carry variable_values".to_string(),
                ));
            }
            self.validate_constant().map(Prompt::Constant)
        }
    }

    fn validate_constant(&self) -> Result<ConstantPrompt, OrchestratorError> {
        let value = self.value.clone().ok_or_else(|| {
            OrchestratorError::SpecInvalid(format!("prompt of type {} is missing value", self.kind))
        })?;
        match self.kind.as_str() {
            "freetext" => Ok(ConstantPrompt::Freetext {
                value,
                weight: self.weight,
            }),
            other => {
                let kind = ReferenceKind::parse_str(other).ok_or_else(|| {
                    OrchestratorError::SpecInvalid(format!("unknown prompt type {other}"))
                })?;
                Ok(ConstantPrompt::Reference {
                    kind,
                    uuid: self.uuid.clone().unwrap_or_else(|| value.clone()),
                    value,
                    name: self.name.clone().unwrap_or_default(),
                    img_url: self.img_url.clone().unwrap_or_default(),
                    weight: self.weight,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freetext_constant_validates() {
        let spec = PromptSpec {
            kind: "freetext".to_string(),
            is_variable: false,
            value: Some("cat".to_string()),
            weight: 1.0,
            uuid: None,
            name: None,
            img_url: None,
            variable_id: None,
            variable_name: None,
            variable_values: None,
        };
        let prompt = spec.validate().unwrap();
        assert_eq!(
            prompt,
            Prompt::Constant(ConstantPrompt::Freetext {
                value: "cat".to_string(),
                weight: 1.0
            })
        );
    }

    #[test]
    fn variable_prompt_requires_variable_id_and_nonempty_values() {
        let spec = PromptSpec {
            kind: "freetext".to_string(),
            is_variable: true,
            value: None,
            weight: 1.0,
            uuid: None,
            name: None,
            img_url: None,
            variable_id: None,
            variable_name: Some("color".to_string()),
            variable_values: Some(vec![]),
        };
        assert!(spec.validate().is_err());
    }

    #[test]
    fn reference_prompt_validates_with_fixed_metadata_omitted() {
        let spec = PromptSpec {
            kind: "elementum".to_string(),
            is_variable: false,
            value: Some("b5edccfe-46a2-4a14-a8ff-f4d430343805".to_string()),
            weight: 1.0,
            uuid: Some("b5edccfe-46a2-4a14-a8ff-f4d430343805".to_string()),
            name: Some("elementum".to_string()),
            img_url: Some("https://example.com/x.png".to_string()),
            variable_id: None,
            variable_name: None,
            variable_values: None,
        };
        let prompt = spec.validate().unwrap();
        assert!(matches!(
            prompt,
            Prompt::Constant(ConstantPrompt::Reference { kind: ReferenceKind::Elementum, .. })
        ));
    }

    #[test]
    fn constant_prompt_rejects_variable_values_field() {
        let spec = PromptSpec {
            kind: "freetext".to_string(),
            is_variable: false,
            value: Some("cat".to_string()),
            weight: 1.0,
            uuid: None,
            name: None,
            img_url: None,
            variable_id: None,
            variable_name: None,
            variable_values: Some(vec![]),
        };
        assert!(spec.validate().is_err());
    }
}
