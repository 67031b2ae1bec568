//! Task Expansion Engine (C3): turns a `TaskSpec` into a persisted `Task`
//! plus the concrete `Subtask` records covering every point in the
//! Cartesian product of its active variables.
//!
//! Dimension ordering is fixed and deterministic (Design Notes §9): prompts
//! in submission order, then the seven scalar slots in the order
//! `ratio, seed, use_polish, is_lumina, lumina_model_name, lumina_cfg,
//! lumina_step`. `batch_size` never becomes a dimension (Open Question
//! resolution, see DESIGN.md).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::{OrchestratorError, OrchestratorResult};
use crate::domain::models::{
    ConstantPrompt, Parameter, Prompt, ScalarValue, Subtask, SubtaskParams, SubtaskStatus, Task,
    TaskParameters, TaskSpec, TaskStatus, VariableDimension, VariableEntry, VariableType,
};

/// Default guard on `total_images`; a task asking for more than this must
/// opt in explicitly by raising `max_combinations` at the call site
/// (Design Notes §9).
pub const DEFAULT_MAX_COMBINATIONS: i64 = 10_000;

/// One entry of the ordered active-variable list built while walking the
/// spec. `dimension_index` is this entry's position in the vector.
enum ActiveDim {
    Prompt {
        original_id: String,
        name: String,
        values: Vec<ConstantPrompt>,
    },
    Scalar {
        original_id: String,
        name: String,
        var_type: VariableType,
        values: Vec<ScalarValue>,
    },
}

impl ActiveDim {
    fn original_id(&self) -> &str {
        match self {
            Self::Prompt { original_id, .. } | Self::Scalar { original_id, .. } => original_id,
        }
    }

    fn name(&self) -> &str {
        match self {
            Self::Prompt { name, .. } | Self::Scalar { name, .. } => name,
        }
    }

    fn var_type(&self) -> VariableType {
        match self {
            Self::Prompt { .. } => VariableType::Prompt,
            Self::Scalar { var_type, .. } => *var_type,
        }
    }

    fn cardinality(&self) -> usize {
        match self {
            Self::Prompt { values, .. } => values.len(),
            Self::Scalar { values, .. } => values.len(),
        }
    }
}

pub struct Expander {
    pub max_combinations: i64,
}

impl Default for Expander {
    fn default() -> Self {
        Self {
            max_combinations: DEFAULT_MAX_COMBINATIONS,
        }
    }
}

impl Expander {
    pub fn expand(
        &self,
        spec: TaskSpec,
        user_id: String,
        now: DateTime<Utc>,
    ) -> OrchestratorResult<(Task, Vec<Subtask>)> {
        let prompts: Vec<Prompt> = spec
            .prompts
            .iter()
            .map(|p| p.validate())
            .collect::<Result<_, _>>()?;

        let ratio = spec.ratio.validate("ratio", "string")?;
        let seed = spec.seed.validate("seed", "int")?;
        let batch_size = spec.batch_size.validate("batch_size", "int")?;
        if batch_size.is_variable() {
            return Err(OrchestratorError::SpecInvalid(
                "batch_size may never be declared as a variable".to_string(),
            ));
        }
        let use_polish = spec.use_polish.validate("use_polish", "bool")?;
        let is_lumina = spec.is_lumina.validate("is_lumina", "bool")?;
        let lumina_model_name = spec
            .lumina_model_name
            .validate("lumina_model_name", "string")?;
        let lumina_cfg = spec.lumina_cfg.validate("lumina_cfg", "float")?;
        let lumina_step = spec.lumina_step.validate("lumina_step", "int")?;

        let mut active: Vec<ActiveDim> = Vec::new();

        for prompt in &prompts {
            if let Prompt::Variable(v) = prompt {
                active.push(ActiveDim::Prompt {
                    original_id: v.variable_id.clone(),
                    name: v.variable_name.clone(),
                    values: v.variable_values.clone(),
                });
            }
        }

        for (param, var_type) in [
            (&ratio, VariableType::Ratio),
            (&seed, VariableType::Seed),
            (&use_polish, VariableType::UsePolish),
            (&is_lumina, VariableType::IsLumina),
            (&lumina_model_name, VariableType::LuminaModelName),
            (&lumina_cfg, VariableType::LuminaCfg),
            (&lumina_step, VariableType::LuminaStep),
        ] {
            if let Parameter::Variable {
                variable_id,
                variable_name,
                variable_values,
            } = param
            {
                active.push(ActiveDim::Scalar {
                    original_id: variable_id.clone(),
                    name: variable_name.clone(),
                    var_type,
                    values: variable_values.clone(),
                });
            }
        }

        // I2: normalize every active variable's id to its dimension index,
        // regardless of what id the client submitted, so `variables_map`,
        // `variables`, and subtask materialization always key by
        // `"0","1",...,"N-1"` (P4).
        let id_map: BTreeMap<String, String> = active
            .iter()
            .enumerate()
            .map(|(i, dim)| (dim.original_id().to_string(), i.to_string()))
            .collect();

        let prompts = rename_prompt_ids(prompts, &id_map);
        let ratio = rename_parameter_id(ratio, &id_map);
        let seed = rename_parameter_id(seed, &id_map);
        let use_polish = rename_parameter_id(use_polish, &id_map);
        let is_lumina = rename_parameter_id(is_lumina, &id_map);
        let lumina_model_name = rename_parameter_id(lumina_model_name, &id_map);
        let lumina_cfg = rename_parameter_id(lumina_cfg, &id_map);
        let lumina_step = rename_parameter_id(lumina_step, &id_map);

        let cardinalities: Vec<usize> = active.iter().map(ActiveDim::cardinality).collect();
        let total_images: i64 = cardinalities
            .iter()
            .try_fold(1i64, |acc, &c| acc.checked_mul(c as i64))
            .ok_or_else(|| OrchestratorError::SpecInvalid("combination count overflow".to_string()))?
            .max(1);
        if total_images > self.max_combinations {
            return Err(OrchestratorError::SpecInvalid(format!(
                "total_images {total_images} exceeds the configured guard of {}",
                self.max_combinations
            )));
        }

        let mut variables = Vec::with_capacity(active.len());
        let mut variables_map = BTreeMap::new();
        for (i, dim) in active.iter().enumerate() {
            variables.push(VariableDimension {
                variable_id: i.to_string(),
                dimension_index: i as u32,
                variable_name: dim.name().to_string(),
                variable_type: dim.var_type(),
            });
            let values = match dim {
                ActiveDim::Prompt { values, .. } => values
                    .iter()
                    .map(|v| serde_json::to_value(v).unwrap_or(serde_json::Value::Null))
                    .collect(),
                ActiveDim::Scalar { values, .. } => values
                    .iter()
                    .map(|v| serde_json::to_value(v).unwrap_or(serde_json::Value::Null))
                    .collect(),
            };
            variables_map.insert(
                i.to_string(),
                VariableEntry {
                    variable_id: i.to_string(),
                    variable_name: dim.name().to_string(),
                    variable_type: dim.var_type(),
                    values,
                },
            );
        }

        let task_id = Uuid::new_v4();
        let name = spec.name.unwrap_or_else(|| TaskSpec::default_name(now));

        let parameters = TaskParameters {
            ratio,
            seed,
            batch_size,
            use_polish,
            is_lumina,
            lumina_model_name,
            lumina_cfg,
            lumina_step,
        };

        let coordinates = cartesian_indices(&cardinalities);
        let subtasks: Vec<Subtask> = coordinates
            .into_iter()
            .map(|coord| materialize_subtask(task_id, &coord, &prompts, &parameters, &active, now))
            .collect();

        let task = Task {
            id: task_id,
            name,
            user_id,
            priority: spec.priority,
            prompts,
            parameters,
            total_images,
            variables,
            variables_map,
            status: TaskStatus::Pending,
            processed_images: 0,
            progress: 0,
            completed_subtasks: 0,
            failed_subtasks: 0,
            created_at: now,
            updated_at: now,
            completed_at: None,
            is_favorite: false,
            is_deleted: false,
        };

        Ok((task, subtasks))
    }
}

fn rename_prompt_ids(prompts: Vec<Prompt>, id_map: &BTreeMap<String, String>) -> Vec<Prompt> {
    prompts
        .into_iter()
        .map(|p| match p {
            Prompt::Variable(mut v) => {
                if let Some(new_id) = id_map.get(&v.variable_id) {
                    v.variable_id = new_id.clone();
                }
                Prompt::Variable(v)
            }
            constant => constant,
        })
        .collect()
}

fn rename_parameter_id(param: Parameter, id_map: &BTreeMap<String, String>) -> Parameter {
    match param {
        Parameter::Variable {
            variable_id,
            variable_name,
            variable_values,
        } => {
            let variable_id = id_map.get(&variable_id).cloned().unwrap_or(variable_id);
            Parameter::Variable {
                variable_id,
                variable_name,
                variable_values,
            }
        }
        constant => constant,
    }
}

/// Enumerate every coordinate in `∏ [0, cardinalities[d])`, row-major with
/// the last dimension varying fastest. `cardinalities == []` yields a
/// single empty coordinate, matching the "no variables" case (§4.1 step 6).
fn cartesian_indices(cardinalities: &[usize]) -> Vec<Vec<i32>> {
    if cardinalities.is_empty() {
        return vec![vec![]];
    }
    let total: usize = cardinalities.iter().product();
    let mut out = Vec::with_capacity(total);
    let mut counters = vec![0usize; cardinalities.len()];
    for _ in 0..total {
        out.push(counters.iter().map(|&c| c as i32).collect());
        for d in (0..cardinalities.len()).rev() {
            counters[d] += 1;
            if counters[d] < cardinalities[d] {
                break;
            }
            counters[d] = 0;
        }
    }
    out
}

fn resolve_scalar(param: &Parameter, active: &[ActiveDim], coord: &[i32]) -> ScalarValue {
    match param {
        Parameter::Constant(v) => v.clone(),
        Parameter::Variable { variable_id, .. } => {
            let d: usize = variable_id.parse().expect("normalized to dimension index");
            let idx = coord[d] as usize;
            match &active[d] {
                ActiveDim::Scalar { values, .. } => values[idx].clone(),
                ActiveDim::Prompt { .. } => unreachable!("scalar slot bound to a prompt dimension"),
            }
        }
    }
}

fn materialize_subtask(
    task_id: Uuid,
    coord: &[i32],
    prompts: &[Prompt],
    parameters: &TaskParameters,
    active: &[ActiveDim],
    now: DateTime<Utc>,
) -> Subtask {
    let materialized_prompts: Vec<ConstantPrompt> = prompts
        .iter()
        .map(|p| match p {
            Prompt::Constant(c) => c.clone(),
            Prompt::Variable(v) => {
                let d: usize = v.variable_id.parse().expect("normalized to dimension index");
                let idx = coord[d] as usize;
                match &active[d] {
                    ActiveDim::Prompt { values, .. } => values[idx].clone(),
                    ActiveDim::Scalar { .. } => unreachable!("prompt slot bound to a scalar dimension"),
                }
            }
        })
        .filter(|c| !c.is_empty_value())
        .collect();

    let params = SubtaskParams {
        ratio: resolve_scalar(&parameters.ratio, active, coord)
            .as_str()
            .unwrap_or("1:1")
            .to_string(),
        seed: resolve_scalar(&parameters.seed, active, coord).as_i64(),
        batch_size: resolve_scalar(&parameters.batch_size, active, coord)
            .as_i64()
            .unwrap_or(1),
        use_polish: resolve_scalar(&parameters.use_polish, active, coord)
            .as_bool()
            .unwrap_or(false),
        is_lumina: resolve_scalar(&parameters.is_lumina, active, coord)
            .as_bool()
            .unwrap_or(false),
        lumina_model_name: resolve_scalar(&parameters.lumina_model_name, active, coord)
            .as_str()
            .map(str::to_string),
        lumina_cfg: resolve_scalar(&parameters.lumina_cfg, active, coord).as_f64(),
        lumina_step: resolve_scalar(&parameters.lumina_step, active, coord).as_i64(),
    };

    Subtask {
        id: Uuid::new_v4(),
        task_id,
        variable_indices: coord.to_vec(),
        prompts: materialized_prompts,
        params,
        status: SubtaskStatus::Pending,
        started_at: None,
        completed_at: None,
        error: None,
        result: None,
        timeout_retry_count: 0,
        error_retry_count: 0,
        rating: 0,
        evaluation: Vec::new(),
        created_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ParameterSpec, PromptSpec};

    fn constant_param(value: ScalarValue) -> ParameterSpec {
        ParameterSpec {
            is_variable: false,
            format: None,
            value: Some(value),
            variable_id: None,
            variable_name: None,
            variable_values: None,
        }
    }

    fn variable_param(id: &str, name: &str, values: Vec<ScalarValue>) -> ParameterSpec {
        ParameterSpec {
            is_variable: true,
            format: None,
            value: None,
            variable_id: Some(id.to_string()),
            variable_name: Some(name.to_string()),
            variable_values: Some(values),
        }
    }

    fn freetext(value: &str) -> PromptSpec {
        PromptSpec {
            kind: "freetext".to_string(),
            is_variable: false,
            value: Some(value.to_string()),
            weight: 1.0,
            uuid: None,
            name: None,
            img_url: None,
            variable_id: None,
            variable_name: None,
            variable_values: None,
        }
    }

    fn base_spec() -> TaskSpec {
        TaskSpec {
            name: None,
            priority: 1,
            prompts: vec![freetext("cat")],
            ratio: constant_param(ScalarValue::Str("1:1".to_string())),
            seed: constant_param(ScalarValue::Int(42)),
            batch_size: constant_param(ScalarValue::Int(1)),
            use_polish: constant_param(ScalarValue::Bool(false)),
            is_lumina: constant_param(ScalarValue::Bool(false)),
            lumina_model_name: constant_param(ScalarValue::Str(String::new())),
            lumina_cfg: constant_param(ScalarValue::Float(0.0)),
            lumina_step: constant_param(ScalarValue::Int(0)),
        }
    }

    #[test]
    fn s1_no_variables_yields_single_subtask() {
        let spec = base_spec();
        let (task, subtasks) = Expander::default()
            .expand(spec, "user-1".to_string(), Utc::now())
            .unwrap();
        assert_eq!(task.total_images, 1);
        assert_eq!(subtasks.len(), 1);
        assert_eq!(subtasks[0].variable_indices, Vec::<i32>::new());
        assert_eq!(subtasks[0].params.ratio, "1:1");
        assert_eq!(subtasks[0].params.seed, Some(42));
        assert_eq!(
            subtasks[0].prompts,
            vec![ConstantPrompt::Freetext {
                value: "cat".to_string(),
                weight: 1.0
            }]
        );
    }

    #[test]
    fn s2_one_prompt_variable_two_values() {
        let mut spec = base_spec();
        spec.prompts = vec![PromptSpec {
            kind: "freetext".to_string(),
            is_variable: true,
            value: None,
            weight: 1.0,
            uuid: None,
            name: None,
            img_url: None,
            variable_id: Some("color".to_string()),
            variable_name: Some("color".to_string()),
            variable_values: Some(vec![freetext("red"), freetext("blue")]),
        }];
        let (task, subtasks) = Expander::default()
            .expand(spec, "user-1".to_string(), Utc::now())
            .unwrap();
        assert_eq!(task.total_images, 2);
        assert_eq!(subtasks.len(), 2);
        assert_eq!(task.variables_map.get("0").unwrap().values.len(), 2);
        let mut coords: Vec<_> = subtasks.iter().map(|s| s.variable_indices.clone()).collect();
        coords.sort();
        assert_eq!(coords, vec![vec![0], vec![1]]);
    }

    #[test]
    fn s3_mixed_prompt_and_ratio_variable_covers_full_product() {
        let mut spec = base_spec();
        spec.prompts = vec![PromptSpec {
            kind: "freetext".to_string(),
            is_variable: true,
            value: None,
            weight: 1.0,
            uuid: None,
            name: None,
            img_url: None,
            variable_id: Some("p".to_string()),
            variable_name: Some("subject".to_string()),
            variable_values: Some(vec![freetext("a"), freetext("b")]),
        }];
        spec.ratio = variable_param(
            "r",
            "ratio",
            vec![
                ScalarValue::Str("1:1".to_string()),
                ScalarValue::Str("4:3".to_string()),
            ],
        );
        let (task, subtasks) = Expander::default()
            .expand(spec, "user-1".to_string(), Utc::now())
            .unwrap();
        assert_eq!(task.total_images, 4);
        assert_eq!(task.variables.len(), 2);
        assert_eq!(task.variables[0].variable_type, VariableType::Prompt);
        assert_eq!(task.variables[1].variable_type, VariableType::Ratio);
        let mut coords: Vec<_> = subtasks.iter().map(|s| s.variable_indices.clone()).collect();
        coords.sort();
        assert_eq!(coords, vec![vec![0, 0], vec![0, 1], vec![1, 0], vec![1, 1]]);
    }

    #[test]
    fn ids_are_normalized_to_decimal_dimension_indices() {
        let mut spec = base_spec();
        spec.ratio = variable_param(
            "totally-not-numeric",
            "ratio",
            vec![ScalarValue::Str("1:1".to_string())],
        );
        let (task, _) = Expander::default()
            .expand(spec, "user-1".to_string(), Utc::now())
            .unwrap();
        assert!(task.variables_map.contains_key("0"));
        assert_eq!(task.variables[0].variable_id, "0");
    }

    #[test]
    fn batch_size_cannot_be_declared_variable() {
        let mut spec = base_spec();
        spec.batch_size = variable_param("b", "batch", vec![ScalarValue::Int(1), ScalarValue::Int(2)]);
        assert!(Expander::default()
            .expand(spec, "user-1".to_string(), Utc::now())
            .is_err());
    }

    #[test]
    fn guard_rejects_combination_counts_above_configured_max() {
        let mut spec = base_spec();
        spec.ratio = variable_param(
            "r",
            "ratio",
            (0..5).map(|i| ScalarValue::Str(format!("{i}:1"))).collect(),
        );
        let expander = Expander { max_combinations: 3 };
        assert!(expander.expand(spec, "user-1".to_string(), Utc::now()).is_err());
    }
}
