//! Dispatch Scheduler (C5): partitions a newly admitted task's subtasks by
//! `is_lumina` and hands each to the queue client with a cumulative
//! per-partition enqueue delay, smoothing downstream load (§4.3).

use std::sync::Arc;

use tracing::instrument;
use uuid::Uuid;

use crate::domain::errors::OrchestratorResult;
use crate::domain::models::Subtask;
use crate::domain::ports::{QueueClient, QueueName, SubtaskJob};

/// Per-subtask delay (seconds) at index `i` within the Normal partition.
fn normal_delay_secs(i: usize) -> f64 {
    if i == 0 {
        1.0
    } else {
        (1.0 - 0.01 * i as f64).max(0.2)
    }
}

/// Per-subtask delay (seconds) at index `i` within the Lumina partition.
fn lumina_delay_secs(i: usize) -> f64 {
    match i {
        0 => 0.0,
        1 => 90.0,
        2 => 12.0,
        _ => (12.0 - 0.01 * (i - 2) as f64).max(0.5),
    }
}

/// Cumulative enqueue delay (ms, rounded) for the `k`-th item of a
/// partition, per §4.3: `Σ_{i=0..=k} d(i)`.
fn cumulative_delays_ms(len: usize, delay_fn: impl Fn(usize) -> f64) -> Vec<u64> {
    let mut acc = 0.0;
    (0..len)
        .map(|i| {
            acc += delay_fn(i);
            (acc * 1000.0).round() as u64
        })
        .collect()
}

pub struct DispatchScheduler {
    queue: Arc<dyn QueueClient>,
}

impl DispatchScheduler {
    pub fn new(queue: Arc<dyn QueueClient>) -> Self {
        Self { queue }
    }

    /// Enqueue every subtask of `subtasks`, partitioned by `is_lumina`,
    /// each with its partition's cumulative delay curve.
    #[instrument(skip(self, subtasks), fields(count = subtasks.len()))]
    pub async fn dispatch(&self, task_id: Uuid, subtasks: &[Subtask]) -> OrchestratorResult<()> {
        let (lumina, normal): (Vec<&Subtask>, Vec<&Subtask>) =
            subtasks.iter().partition(|s| s.is_lumina());

        let normal_delays = cumulative_delays_ms(normal.len(), normal_delay_secs);
        for (subtask, delay_ms) in normal.into_iter().zip(normal_delays) {
            self.queue
                .enqueue(
                    QueueName::Normal,
                    &SubtaskJob {
                        actor_name: "run_subtask".to_string(),
                        subtask_id: subtask.id,
                        task_id,
                    },
                    Some(delay_ms),
                )
                .await?;
        }

        let lumina_delays = cumulative_delays_ms(lumina.len(), lumina_delay_secs);
        for (subtask, delay_ms) in lumina.into_iter().zip(lumina_delays) {
            self.queue
                .enqueue(
                    QueueName::Ops,
                    &SubtaskJob {
                        actor_name: "run_subtask".to_string(),
                        subtask_id: subtask.id,
                        task_id,
                    },
                    Some(delay_ms),
                )
                .await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s7_normal_cumulative_delay_schedule() {
        let delays = cumulative_delays_ms(5, normal_delay_secs);
        assert_eq!(delays, vec![1000, 1990, 2970, 3940, 4900]);
    }

    #[test]
    fn s7_lumina_cumulative_delay_schedule() {
        let delays = cumulative_delays_ms(5, lumina_delay_secs);
        assert_eq!(delays, vec![0, 90000, 102000, 113990, 125970]);
    }

    #[test]
    fn p8_delays_respect_piecewise_lower_bounds() {
        for i in 1..1000 {
            assert!(normal_delay_secs(i) >= 0.2);
        }
        for i in 3..1000 {
            assert!(lumina_delay_secs(i) >= 0.5);
        }
    }

    #[test]
    fn p8_cumulative_sequence_is_non_decreasing() {
        let delays = cumulative_delays_ms(50, normal_delay_secs);
        assert!(delays.windows(2).all(|w| w[1] >= w[0]));
        let delays = cumulative_delays_ms(50, lumina_delay_secs);
        assert!(delays.windows(2).all(|w| w[1] >= w[0]));
    }
}
