//! Property tests for the Task Expansion Engine's Cartesian-product
//! invariants (spec §8 P1 Cardinality, P2 Coverage, P3 Dimension alignment,
//! P4 Id normalization), driven over randomized dimension shapes instead of
//! fixed examples.

use std::collections::BTreeSet;

use chrono::Utc;
use proptest::prelude::*;

use image_orchestrator::application::expansion::Expander;
use image_orchestrator::domain::models::{ParameterSpec, PromptSpec, ScalarValue, TaskSpec};

fn constant(value: ScalarValue) -> ParameterSpec {
    ParameterSpec {
        is_variable: false,
        format: None,
        value: Some(value),
        variable_id: None,
        variable_name: None,
        variable_values: None,
    }
}

fn constant_freetext(text: &str) -> PromptSpec {
    PromptSpec {
        kind: "freetext".to_string(),
        is_variable: false,
        value: Some(text.to_string()),
        weight: 1.0,
        uuid: None,
        name: None,
        img_url: None,
        variable_id: None,
        variable_name: None,
        variable_values: None,
    }
}

fn variable_prompt(count: usize) -> PromptSpec {
    PromptSpec {
        kind: "freetext".to_string(),
        is_variable: true,
        value: None,
        weight: 1.0,
        uuid: None,
        name: None,
        img_url: None,
        variable_id: Some("p".to_string()),
        variable_name: Some("subject".to_string()),
        variable_values: Some((0..count).map(|i| constant_freetext(&format!("v{i}"))).collect()),
    }
}

fn variable_scalar(id: &str, name: &str, count: usize) -> ParameterSpec {
    ParameterSpec {
        is_variable: true,
        format: None,
        value: None,
        variable_id: Some(id.to_string()),
        variable_name: Some(name.to_string()),
        variable_values: Some((0..count).map(|i| ScalarValue::Str(format!("{name}-{i}"))).collect()),
    }
}

/// Builds a spec with up to three active dimensions (prompt, ratio, seed),
/// each sized by one of `sizes` (a size of 1 leaves that dimension a
/// constant, i.e. inactive, per Design Notes §9's `active(S)` definition).
fn spec_with_dims(sizes: [usize; 3]) -> TaskSpec {
    let [prompt_n, ratio_n, seed_n] = sizes;

    let prompts = if prompt_n <= 1 {
        vec![constant_freetext("fixed")]
    } else {
        vec![variable_prompt(prompt_n)]
    };
    let ratio = if ratio_n <= 1 {
        constant(ScalarValue::Str("1:1".to_string()))
    } else {
        variable_scalar("ratio", "ratio", ratio_n)
    };
    let seed = if seed_n <= 1 {
        constant(ScalarValue::Int(1))
    } else {
        variable_scalar("seed", "seed", seed_n)
    };

    TaskSpec {
        name: Some("property".to_string()),
        priority: 1,
        prompts,
        ratio,
        seed,
        batch_size: constant(ScalarValue::Int(1)),
        use_polish: constant(ScalarValue::Bool(false)),
        is_lumina: constant(ScalarValue::Bool(false)),
        lumina_model_name: constant(ScalarValue::Str(String::new())),
        lumina_cfg: constant(ScalarValue::Float(0.0)),
        lumina_step: constant(ScalarValue::Int(0)),
    }
}

proptest! {
    /// P1 Cardinality, P2 Coverage, P3 Dimension alignment, P4 Id
    /// normalization, all checked against one randomly-shaped spec per case.
    #[test]
    fn cartesian_expansion_invariants(
        prompt_n in 1usize..=3,
        ratio_n in 1usize..=3,
        seed_n in 1usize..=3,
    ) {
        let sizes = [prompt_n, ratio_n, seed_n];
        let active_sizes: Vec<usize> = sizes.iter().copied().filter(|n| *n > 1).collect();
        let expected_total: usize = active_sizes.iter().product::<usize>().max(1);

        let (task, subtasks) = Expander::default()
            .expand(spec_with_dims(sizes), "prop-user".to_string(), Utc::now())
            .expect("expansion of a well-formed spec always succeeds");

        // P1
        prop_assert_eq!(task.total_images as usize, expected_total);
        prop_assert_eq!(subtasks.len(), expected_total);

        // P3: every subtask's coordinate vector has one entry per active dim.
        for st in &subtasks {
            prop_assert_eq!(st.variable_indices.len(), active_sizes.len());
        }

        // P2: the observed coordinate set is the full product, no duplicates.
        let coords: BTreeSet<Vec<i32>> = subtasks.iter().map(|s| s.variable_indices.clone()).collect();
        prop_assert_eq!(coords.len(), subtasks.len());
        for (dim, size) in active_sizes.iter().enumerate() {
            let observed: BTreeSet<i32> = coords.iter().map(|c| c[dim]).collect();
            let expected: BTreeSet<i32> = (0..*size as i32).collect();
            prop_assert_eq!(observed, expected);
        }

        // P4: variable ids are normalized to "0".."N-1" in submission order.
        prop_assert_eq!(task.variables.len(), active_sizes.len());
        for (i, dim) in task.variables.iter().enumerate() {
            prop_assert_eq!(dim.variable_id.as_str(), i.to_string().as_str());
            prop_assert!(task.variables_map.contains_key(&i.to_string()));
        }
    }
}
