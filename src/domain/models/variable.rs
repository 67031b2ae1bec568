//! Active-variable bookkeeping: dimension ordering and the UI-facing
//! `variables_map`.

use serde::{Deserialize, Serialize};

/// The slot or prompt kind a dimension was opened from. Fixed walk order
/// for scalar slots is `Ratio, Seed, UsePolish, IsLumina, LuminaModelName,
/// LuminaCfg, LuminaStep` — `BatchSize` never appears here because
/// `batch_size` is never variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableType {
    Prompt,
    Ratio,
    Seed,
    BatchSize,
    UsePolish,
    IsLumina,
    LuminaModelName,
    LuminaCfg,
    LuminaStep,
}

impl VariableType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prompt => "prompt",
            Self::Ratio => "ratio",
            Self::Seed => "seed",
            Self::BatchSize => "batch_size",
            Self::UsePolish => "use_polish",
            Self::IsLumina => "is_lumina",
            Self::LuminaModelName => "lumina_model_name",
            Self::LuminaCfg => "lumina_cfg",
            Self::LuminaStep => "lumina_step",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "prompt" => Some(Self::Prompt),
            "ratio" => Some(Self::Ratio),
            "seed" => Some(Self::Seed),
            "batch_size" => Some(Self::BatchSize),
            "use_polish" => Some(Self::UsePolish),
            "is_lumina" => Some(Self::IsLumina),
            "lumina_model_name" => Some(Self::LuminaModelName),
            "lumina_cfg" => Some(Self::LuminaCfg),
            "lumina_step" => Some(Self::LuminaStep),
            _ => None,
        }
    }
}

/// One active variable, positioned by the order expansion discovered it in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDimension {
    pub variable_id: String,
    pub dimension_index: u32,
    pub variable_name: String,
    pub variable_type: VariableType,
}

/// UI-facing entry for one dimension, keyed by `dimension_index` (as a
/// decimal string) in `Task::variables_map`. `values` holds the raw
/// candidate list for the dimension — prompt dimensions carry serialized
/// [`ConstantPrompt`](super::prompt::ConstantPrompt) values, scalar
/// dimensions carry serialized [`ScalarValue`](super::scalar::ScalarValue)
/// values. The Matrix Materializer re-projects this into its own
/// `{id, value, type}` shape; this struct stays a thin carrier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableEntry {
    pub variable_id: String,
    pub variable_name: String,
    pub variable_type: VariableType,
    pub values: Vec<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variable_type_round_trips_through_str() {
        for t in [
            VariableType::Prompt,
            VariableType::Ratio,
            VariableType::Seed,
            VariableType::BatchSize,
            VariableType::UsePolish,
            VariableType::IsLumina,
            VariableType::LuminaModelName,
            VariableType::LuminaCfg,
            VariableType::LuminaStep,
        ] {
            assert_eq!(VariableType::parse_str(t.as_str()), Some(t));
        }
    }
}
