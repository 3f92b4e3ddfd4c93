use futures_util::stream::{self, StreamExt};
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use std::future::Future;

use super::Stage;
use crate::agents::StageAgent;
use crate::transform::TransformError;

/// An item that still failed after the transform's own retries
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("item {index} failed: {reason}")]
pub struct ItemFailure {
    pub index: usize,
    pub reason: String,
}

/// Outcome for one input of a parallel stage
pub type StageResult = Result<String, ItemFailure>;

/// Applies a transform to an ordered sequence with bounded parallelism.
///
/// The returned vector always has one entry per input, and entry `i` always
/// belongs to input `i`. A failing item never cancels its siblings.
#[derive(Debug, Clone)]
pub struct StageRunner {
    max_concurrency: usize,
    progress: Option<ProgressBar>,
}

impl StageRunner {
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
            progress: None,
        }
    }

    /// Tick `bar` once per finished item
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.progress = Some(bar);
        self
    }

    /// Run `op` over every input; `op` receives the index and an owned copy
    pub async fn run<F, Fut>(&self, stage: Stage, inputs: &[String], op: F) -> Vec<StageResult>
    where
        F: Fn(usize, String) -> Fut,
        Fut: Future<Output = Result<String, TransformError>>,
    {
        let op = &op;
        let progress = self.progress.as_ref();

        tracing::debug!(%stage, items = inputs.len(), max_concurrency = self.max_concurrency, "Dispatching stage");

        let mut finished: Vec<(usize, StageResult)> = stream::iter(inputs.iter().cloned().enumerate())
            .map(|(index, input)| async move {
                let outcome = op(index, input).await.map_err(|err| {
                    tracing::warn!(%stage, index, "Item failed: {}", err);
                    ItemFailure {
                        index,
                        reason: err.to_string(),
                    }
                });
                if let Some(bar) = progress {
                    bar.inc(1);
                }
                (index, outcome)
            })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        finished.sort_by_key(|(index, _)| *index);
        finished.into_iter().map(|(_, outcome)| outcome).collect()
    }

    /// Render each input with `render` and send it through `agent`
    pub async fn run_agent(
        &self,
        stage: Stage,
        inputs: &[String],
        agent: &StageAgent,
        render: fn(&str) -> String,
    ) -> Vec<StageResult> {
        self.run(stage, inputs, |_, input| async move { agent.run(&render(&input)).await })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::sleep;

    fn inputs(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("input-{}", i)).collect()
    }

    #[tokio::test]
    async fn test_results_follow_input_order() {
        let runner = StageRunner::new(4);
        let inputs = inputs(8);

        // Later items finish first
        let results = runner
            .run(Stage::Cleaning, &inputs, |index, input| async move {
                sleep(Duration::from_millis(5 * (8 - index as u64))).await;
                Ok(input.to_uppercase())
            })
            .await;

        assert_eq!(results.len(), 8);
        for (index, result) in results.iter().enumerate() {
            assert_eq!(result.as_deref(), Ok(format!("INPUT-{}", index).as_str()));
        }
    }

    #[tokio::test]
    async fn test_one_failure_does_not_affect_siblings() {
        let runner = StageRunner::new(3);
        let inputs = inputs(5);

        let results = runner
            .run(Stage::Summarizing, &inputs, |index, input| async move {
                if index == 3 {
                    Err(TransformError::Fatal("content filtered".into()))
                } else {
                    Ok(input)
                }
            })
            .await;

        assert_eq!(results.len(), 5);
        assert_eq!(
            results[3],
            Err(ItemFailure {
                index: 3,
                reason: "Backend call failed: content filtered".into()
            })
        );
        for index in [0, 1, 2, 4] {
            assert_eq!(results[index], Ok(format!("input-{}", index)));
        }
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let runner = StageRunner::new(2);
        let in_flight_count = AtomicUsize::new(0);
        let peak_count = AtomicUsize::new(0);
        let (in_flight, peak) = (&in_flight_count, &peak_count);

        let results = runner
            .run(Stage::Cleaning, &inputs(6), move |_, input| async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                sleep(Duration::from_millis(10)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(input)
            })
            .await;

        assert_eq!(results.len(), 6);
        assert!(peak_count.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_empty_input_runs_nothing() {
        let runner = StageRunner::new(2);
        let results = runner
            .run(Stage::Cleaning, &[], |_, _| async {
                Err::<String, _>(TransformError::Fatal("no items to run".into()))
            })
            .await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_progress_ticks_per_item() {
        let bar = ProgressBar::hidden();
        bar.set_length(4);
        let runner = StageRunner::new(2).with_progress(bar.clone());

        runner
            .run(Stage::Cleaning, &inputs(4), |_, input| async move { Ok(input) })
            .await;

        assert_eq!(bar.position(), 4);
    }
}
