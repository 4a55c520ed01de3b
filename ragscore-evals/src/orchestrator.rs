// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Runs the requested metrics for a sample and assembles the report.
//!
//! Every metric runs in its own task. A metric that fails, or whose evaluator
//! panics, is recorded as failed; the other metrics are unaffected.

use futures::{stream, FutureExt, StreamExt};
use ragscore_core::{
    EngineConfig, EvaluationReport, EvaluationSample, FailureKind, MetricName, MetricResult,
    UnknownMetric,
};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::evaluators::{
    ContextPrecisionEvaluator, FaithfulnessEvaluator, ResponseRelevancyEvaluator,
};
use crate::judge::{Judge, LlmJudge};
use crate::llm_client::{EmbeddingClient, LLMClient};
use crate::resilience::ProviderGuard;
use crate::{EvalError, Evaluator, EvaluatorMetadata, MetricScore};

/// RAG metric engine
///
/// All evaluators share one [`ProviderGuard`], so `max_concurrent_calls`
/// bounds provider traffic across metrics and across samples.
pub struct RagEvaluator {
    config: EngineConfig,
    evaluators: BTreeMap<MetricName, Arc<dyn Evaluator>>,
}

impl RagEvaluator {
    pub fn new(
        config: EngineConfig,
        judge: Arc<dyn Judge>,
        embedding_client: Arc<dyn EmbeddingClient>,
    ) -> Self {
        let guard = ProviderGuard::from_settings(&config.provider);

        let context_precision = ContextPrecisionEvaluator::new(Arc::clone(&judge), guard.clone());
        let response_relevancy =
            ResponseRelevancyEvaluator::new(Arc::clone(&judge), embedding_client, guard.clone())
                .with_num_questions(config.response_relevancy.num_questions);
        let faithfulness = FaithfulnessEvaluator::new(judge, guard)
            .with_zero_claims_policy(config.faithfulness.zero_claims);

        let mut evaluators: BTreeMap<MetricName, Arc<dyn Evaluator>> = BTreeMap::new();
        evaluators.insert(MetricName::ContextPrecision, Arc::new(context_precision));
        evaluators.insert(MetricName::ResponseRelevancy, Arc::new(response_relevancy));
        evaluators.insert(MetricName::Faithfulness, Arc::new(faithfulness));

        Self { config, evaluators }
    }

    /// Engine whose judge prompts `llm_client`
    pub fn with_llm(
        config: EngineConfig,
        llm_client: Arc<dyn LLMClient>,
        embedding_client: Arc<dyn EmbeddingClient>,
    ) -> Self {
        Self::new(config, Arc::new(LlmJudge::new(llm_client)), embedding_client)
    }

    /// Replace the evaluator registered for its metric
    pub fn with_evaluator(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
        self.evaluators.insert(evaluator.metric(), evaluator);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn metadata(&self) -> Vec<EvaluatorMetadata> {
        self.evaluators.values().map(|e| e.metadata()).collect()
    }

    /// Evaluate `sample` on each requested metric. Duplicates are evaluated once.
    ///
    /// The report has exactly one entry per distinct requested metric.
    pub async fn evaluate(
        &self,
        sample: &EvaluationSample,
        metrics: &[MetricName],
    ) -> EvaluationReport {
        let run_id = Uuid::new_v4();
        let requested: BTreeSet<MetricName> = metrics.iter().copied().collect();
        let tasks = self.spawn_metrics(sample, &requested, run_id);
        collect_report(tasks, run_id, &requested).await
    }

    /// Like [`evaluate`](Self::evaluate), but stops as soon as `token` is
    /// cancelled. Outstanding metric tasks are aborted, which drops their
    /// in-flight provider calls, and no partial report is returned.
    pub async fn evaluate_with_cancellation(
        &self,
        sample: &EvaluationSample,
        metrics: &[MetricName],
        token: CancellationToken,
    ) -> Result<EvaluationReport, EvalError> {
        if token.is_cancelled() {
            return Err(EvalError::Cancelled);
        }

        let run_id = Uuid::new_v4();
        let requested: BTreeSet<MetricName> = metrics.iter().copied().collect();
        let tasks = self.spawn_metrics(sample, &requested, run_id);

        tokio::select! {
            biased;
            _ = token.cancelled() => {
                // Dropping the collector drops the JoinSet, aborting every task
                warn!(%run_id, "evaluation cancelled");
                Err(EvalError::Cancelled)
            }
            report = collect_report(tasks, run_id, &requested) => Ok(report),
        }
    }

    /// Evaluate raw inputs against metrics given by name
    pub async fn evaluate_inputs(
        &self,
        user_input: &str,
        response: &str,
        retrieved_contexts: Vec<String>,
        metric_names: &[&str],
    ) -> Result<EvaluationReport, UnknownMetric> {
        let metrics = metric_names
            .iter()
            .map(|name| name.parse::<MetricName>())
            .collect::<Result<Vec<_>, _>>()?;

        let sample = EvaluationSample::new(user_input, response, retrieved_contexts);
        Ok(self.evaluate(&sample, &metrics).await)
    }

    /// Evaluate a dataset with at most `max_concurrent_samples` samples in
    /// flight. Reports come back in input order.
    pub async fn evaluate_batch(
        &self,
        samples: &[EvaluationSample],
        metrics: &[MetricName],
    ) -> Vec<EvaluationReport> {
        let limit = self.config.evaluation.max_concurrent_samples.max(1);
        info!(samples = samples.len(), limit, "starting batch evaluation");

        stream::iter(samples)
            .map(|sample| self.evaluate(sample, metrics))
            .buffered(limit)
            .collect()
            .await
    }

    fn spawn_metrics(
        &self,
        sample: &EvaluationSample,
        requested: &BTreeSet<MetricName>,
        run_id: Uuid,
    ) -> JoinSet<MetricResult> {
        let sample = Arc::new(sample.clone());
        let mut tasks = JoinSet::new();

        for &metric in requested {
            let Some(evaluator) = self.evaluators.get(&metric).map(Arc::clone) else {
                continue;
            };
            let sample = Arc::clone(&sample);
            let span = info_span!("metric", %run_id, metric = %metric, evaluator = evaluator.id());

            tasks.spawn(
                async move {
                    let start = Instant::now();
                    let outcome = AssertUnwindSafe(evaluator.evaluate(&sample))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|payload| Err(EvalError::Panic(panic_message(payload))));
                    let duration_ms = start.elapsed().as_millis() as u64;

                    to_metric_result(metric, outcome, duration_ms)
                }
                .instrument(span),
            );
        }

        tasks
    }
}

/// Wait for every metric task and build the report
async fn collect_report(
    mut tasks: JoinSet<MetricResult>,
    run_id: Uuid,
    requested: &BTreeSet<MetricName>,
) -> EvaluationReport {
    let mut report = EvaluationReport::new(run_id);

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(result) => report.insert(result),
            Err(e) => error!(%run_id, "metric task failed to complete: {}", e),
        }
    }

    // Never omit a requested metric
    for &metric in requested {
        if report.get(metric).is_none() {
            report.insert(MetricResult::failed(
                metric,
                FailureKind::Internal,
                "metric task did not complete",
            ));
        }
    }

    info!(
        %run_id,
        metrics = report.results.len(),
        failed = report.failures().len(),
        "evaluation finished"
    );
    report
}

fn to_metric_result(
    metric: MetricName,
    outcome: Result<MetricScore, EvalError>,
    duration_ms: u64,
) -> MetricResult {
    match outcome {
        Ok(score) => {
            info!(score = score.score, duration_ms, "metric scored");
            MetricResult::scored(metric, score.score)
                .with_explanation(score.explanation)
                .with_details(score.details)
                .with_duration_ms(duration_ms)
        }
        Err(e) => {
            error!(error = %e, kind = %e.kind(), duration_ms, "metric failed");
            MetricResult::failed(metric, e.kind(), e.to_string()).with_duration_ms(duration_ms)
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "evaluator panicked".to_string()
    }
}

/// Aggregate of one metric over a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    /// Mean over successful samples; `None` when every sample failed
    pub mean_score: Option<f64>,
    pub scored: usize,
    pub failed: usize,
}

/// Dataset-level view of a batch evaluation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub samples: usize,
    pub metrics: BTreeMap<MetricName, MetricSummary>,
}

impl BatchSummary {
    pub fn from_reports(reports: &[EvaluationReport]) -> Self {
        let mut sums: BTreeMap<MetricName, (f64, usize, usize)> = BTreeMap::new();

        for result in reports.iter().flat_map(|r| r.results.values()) {
            let entry = sums.entry(result.metric).or_insert((0.0, 0, 0));
            match result.score() {
                Some(score) => {
                    entry.0 += score;
                    entry.1 += 1;
                }
                None => entry.2 += 1,
            }
        }

        let metrics = sums
            .into_iter()
            .map(|(metric, (total, scored, failed))| {
                let mean_score = (scored > 0).then(|| total / scored as f64);
                (
                    metric,
                    MetricSummary {
                        mean_score,
                        scored,
                        failed,
                    },
                )
            })
            .collect();

        Self {
            samples: reports.len(),
            metrics,
        }
    }

    pub fn mean(&self, metric: MetricName) -> Option<f64> {
        self.metrics.get(&metric).and_then(|m| m.mean_score)
    }
}
