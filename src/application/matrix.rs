//! Matrix Materializer (C8): reconstructs a fully populated coordinate ->
//! result map from a persisted task and its subtasks, for UI consumption
//! (§4.8).

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::domain::models::{Subtask, Task, VariableType};

/// `variables_map` key (`"v0"`, `"v1"`, ...). Orders by the parsed numeric
/// suffix rather than lexicographically, so `"v10"` sorts after `"v2"`
/// (§4.8: "ordered by numeric suffix").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionKey(String);

impl DimensionKey {
    fn new(dimension_index: u32) -> Self {
        Self(format!("v{dimension_index}"))
    }

    fn numeric_suffix(&self) -> u32 {
        self.0.trim_start_matches('v').parse().unwrap_or(0)
    }
}

impl PartialOrd for DimensionKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DimensionKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.numeric_suffix().cmp(&other.numeric_suffix())
    }
}

impl Serialize for DimensionKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl Borrow<str> for DimensionKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// `coordinates_by_indices` key (comma-joined `variable_indices`). Orders
/// by the parsed integer tuple rather than lexicographically, so `"2,0"`
/// sorts before `"10,0"` (§4.8: "numeric key order").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordKey(String);

impl CoordKey {
    fn new(key: String) -> Self {
        Self(key)
    }

    fn parts(&self) -> Vec<i32> {
        if self.0.is_empty() {
            return Vec::new();
        }
        self.0.split(',').map(|p| p.parse().unwrap_or(0)).collect()
    }
}

impl PartialOrd for CoordKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CoordKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.parts().cmp(&other.parts())
    }
}

impl Serialize for CoordKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl Borrow<str> for CoordKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MatrixValueEntry {
    pub id: usize,
    pub value: serde_json::Value,
    #[serde(rename = "type")]
    pub value_type: VariableType,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatrixVariable {
    pub name: String,
    #[serde(rename = "type")]
    pub var_type: VariableType,
    pub values: Vec<MatrixValueEntry>,
    pub values_count: usize,
    pub tag_id: String,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct MatrixCell {
    pub url: String,
    pub subtask_id: Option<Uuid>,
    pub status: Option<String>,
    pub rating: Option<u8>,
    pub evaluation: Vec<String>,
    pub variable_indices: Vec<i32>,
    pub created_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct ResultStatistics {
    pub with_result: usize,
    pub with_error: usize,
    pub empty: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatrixSummary {
    pub total_variables: usize,
    pub total_combinations: i64,
    pub total_subtasks: usize,
    pub mapped_coordinates: usize,
    pub result_statistics: ResultStatistics,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatrixView {
    pub task_id: Uuid,
    pub task_name: String,
    pub created_at: DateTime<Utc>,
    pub variables_map: BTreeMap<DimensionKey, MatrixVariable>,
    pub coordinates_by_indices: BTreeMap<CoordKey, MatrixCell>,
    pub summary: MatrixSummary,
}

/// Builds the `v0,v1,...` keyed, numeric-suffix-ordered `variables_map`
/// and the fully pre-seeded `coordinates_by_indices` grid, then overlays
/// every subtask carrying a fully populated coordinate.
pub fn materialize(task: &Task, subtasks: &[Subtask]) -> MatrixView {
    // variables is already in dimension-index order (C3 invariant); keys
    // are normalized to "v{d}" here for the UI, distinct from the task's
    // own "{d}" keys used internally in `variables_map`.
    let mut variables_map = BTreeMap::new();
    let mut cardinalities = Vec::with_capacity(task.variables.len());
    for dim in &task.variables {
        let entry = task
            .variables_map
            .get(&dim.dimension_index.to_string())
            .expect("variable dimension missing its variables_map entry");
        let values: Vec<MatrixValueEntry> = entry
            .values
            .iter()
            .enumerate()
            .map(|(i, v)| MatrixValueEntry {
                id: i,
                value: v.clone(),
                value_type: dim.variable_type,
            })
            .collect();
        cardinalities.push(values.len());
        variables_map.insert(
            DimensionKey::new(dim.dimension_index),
            MatrixVariable {
                name: dim.variable_name.clone(),
                var_type: dim.variable_type,
                values_count: values.len(),
                values,
                tag_id: dim.variable_id.clone(),
            },
        );
    }

    let mut coordinates_by_indices = BTreeMap::new();
    seed_coordinates(&cardinalities, &mut coordinates_by_indices);

    let mut with_result = 0usize;
    let mut with_error = 0usize;
    let mut empty = 0usize;

    for subtask in subtasks {
        if subtask.variable_indices.iter().any(|&i| i < 0) {
            continue;
        }
        let key = CoordKey::new(coordinate_key(&subtask.variable_indices));
        let url = match (&subtask.result, &subtask.error) {
            (Some(result), _) if !result.is_empty() => {
                with_result += 1;
                result.clone()
            }
            (_, Some(error)) if !error.is_empty() => {
                with_error += 1;
                format!("ERROR: {error}")
            }
            _ => {
                empty += 1;
                String::new()
            }
        };
        coordinates_by_indices.insert(
            key,
            MatrixCell {
                url,
                subtask_id: Some(subtask.id),
                status: Some(subtask.status.as_str().to_string()),
                rating: Some(subtask.rating),
                evaluation: subtask.evaluation.clone(),
                variable_indices: subtask.variable_indices.clone(),
                created_at: Some(subtask.created_at),
                completed_at: subtask.completed_at,
            },
        );
    }

    let total_combinations: i64 = cardinalities.iter().map(|&c| c as i64).product::<i64>().max(1);

    MatrixView {
        task_id: task.id,
        task_name: task.name.clone(),
        created_at: task.created_at,
        variables_map,
        coordinates_by_indices,
        summary: MatrixSummary {
            total_variables: task.variables.len(),
            total_combinations,
            total_subtasks: subtasks.len(),
            mapped_coordinates: subtasks.len(),
            result_statistics: ResultStatistics {
                with_result,
                with_error,
                empty,
            },
        },
    }
}

fn coordinate_key(indices: &[i32]) -> String {
    indices
        .iter()
        .take_while(|&&i| i >= 0)
        .map(i32::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn seed_coordinates(cardinalities: &[usize], out: &mut BTreeMap<CoordKey, MatrixCell>) {
    if cardinalities.is_empty() {
        out.insert(CoordKey::new(String::new()), MatrixCell::default());
        return;
    }
    let total: usize = cardinalities.iter().product();
    let mut counters = vec![0usize; cardinalities.len()];
    for _ in 0..total {
        let key = counters
            .iter()
            .map(usize::to_string)
            .collect::<Vec<_>>()
            .join(",");
        out.insert(CoordKey::new(key), MatrixCell::default());
        for d in (0..cardinalities.len()).rev() {
            counters[d] += 1;
            if counters[d] < cardinalities[d] {
                break;
            }
            counters[d] = 0;
        }
    }
}
