// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Context Precision: are the relevant chunks ranked near the top?
//!
//! Each retrieved chunk is judged for relevance against the user input alone
//! (one judge call per chunk, issued concurrently under the provider limit).
//! The score is the mean of Precision@k over the ranks judged relevant:
//!
//! ```text
//! score = Σ_k (Precision@k · v_k) / Σ_k v_k,   Precision@k = (v_1 + … + v_k) / k
//! ```
//!
//! With no relevant chunk the score is 0.0.

use async_trait::async_trait;
use futures::future::try_join_all;
use ragscore_core::{EvaluationSample, MetricName, RelevanceVerdict};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::to_metric_score;
use crate::judge::Judge;
use crate::resilience::ProviderGuard;
use crate::{EvalError, Evaluator, EvaluatorMetadata, MetricScore};

/// Detailed context precision result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextPrecisionResult {
    pub score: f64,
    /// One verdict per chunk, in rank order
    pub verdicts: Vec<RelevanceVerdict>,
    /// Precision@k for k = 1..=K
    pub precision_at_k: Vec<f64>,
    pub relevant_count: usize,
}

pub struct ContextPrecisionEvaluator {
    judge: Arc<dyn Judge>,
    guard: ProviderGuard,
}

impl ContextPrecisionEvaluator {
    pub fn new(judge: Arc<dyn Judge>, guard: ProviderGuard) -> Self {
        Self { judge, guard }
    }

    /// Precision@k for every rank
    pub fn precision_at_k(relevance: &[bool]) -> Vec<f64> {
        let mut hits = 0usize;
        relevance
            .iter()
            .enumerate()
            .map(|(i, &relevant)| {
                if relevant {
                    hits += 1;
                }
                hits as f64 / (i + 1) as f64
            })
            .collect()
    }

    /// Average precision over the relevant ranks; 0.0 when nothing is relevant
    pub fn average_precision(relevance: &[bool]) -> f64 {
        let relevant_count = relevance.iter().filter(|&&r| r).count();
        if relevant_count == 0 {
            return 0.0;
        }

        let weighted: f64 = Self::precision_at_k(relevance)
            .iter()
            .zip(relevance)
            .filter(|(_, &relevant)| relevant)
            .map(|(precision, _)| precision)
            .sum();

        weighted / relevant_count as f64
    }

    /// Judge every chunk and compute the score
    pub async fn evaluate_precision(
        &self,
        sample: &EvaluationSample,
    ) -> Result<ContextPrecisionResult, EvalError> {
        let contexts = sample.retrieved_contexts();
        if contexts.is_empty() {
            return Err(EvalError::DegenerateInput(
                "context precision requires at least one retrieved context".to_string(),
            ));
        }

        let user_input = sample.user_input();
        let judge = &self.judge;

        // Any chunk failing after retry fails the whole metric; the remaining
        // in-flight calls are dropped.
        let verdicts = try_join_all(contexts.iter().enumerate().map(|(i, chunk)| async move {
            let relevant = self
                .guard
                .call("judge_relevance", || async {
                    judge
                        .judge_relevance(user_input, chunk)
                        .await
                        .map_err(EvalError::from)
                })
                .await?;
            Ok::<_, EvalError>(RelevanceVerdict::new(i + 1, relevant))
        }))
        .await?;

        let relevance: Vec<bool> = verdicts.iter().map(|v| v.relevant).collect();

        Ok(ContextPrecisionResult {
            score: Self::average_precision(&relevance),
            precision_at_k: Self::precision_at_k(&relevance),
            relevant_count: relevance.iter().filter(|&&r| r).count(),
            verdicts,
        })
    }
}

#[async_trait]
impl Evaluator for ContextPrecisionEvaluator {
    fn id(&self) -> &str {
        "context_precision_v1"
    }

    fn metric(&self) -> MetricName {
        MetricName::ContextPrecision
    }

    async fn evaluate(&self, sample: &EvaluationSample) -> Result<MetricScore, EvalError> {
        let result = self.evaluate_precision(sample).await?;

        let explanation = format!(
            "Context Precision: {:.2} ({}/{} chunks relevant)",
            result.score,
            result.relevant_count,
            result.verdicts.len()
        );

        to_metric_score(result.score, explanation, &result)
    }

    fn metadata(&self) -> EvaluatorMetadata {
        EvaluatorMetadata {
            name: "Context Precision".to_string(),
            version: "1.0.0".to_string(),
            description: "Rank-weighted precision of retrieved chunks, judged for relevance to the user input one chunk at a time.".to_string(),
            uses_embeddings: false,
            tags: vec![
                "rag".to_string(),
                "retrieval".to_string(),
                "llm-as-judge".to_string(),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluators::test_support::{fast_guard, ScriptedJudge};
    use proptest::prelude::*;

    #[test]
    fn test_average_precision_mixed_relevance() {
        let precision = ContextPrecisionEvaluator::precision_at_k(&[true, false, true]);
        assert_eq!(precision[0], 1.0);
        assert_eq!(precision[1], 0.5);
        assert!((precision[2] - 2.0 / 3.0).abs() < 1e-12);

        let score = ContextPrecisionEvaluator::average_precision(&[true, false, true]);
        assert!((score - 0.8333).abs() < 1e-3);
    }

    #[test]
    fn test_average_precision_no_relevant_chunks() {
        assert_eq!(
            ContextPrecisionEvaluator::average_precision(&[false, false, false]),
            0.0
        );
        assert_eq!(ContextPrecisionEvaluator::average_precision(&[]), 0.0);
    }

    #[test]
    fn test_rank_order_matters() {
        let top = ContextPrecisionEvaluator::average_precision(&[true, false, false]);
        let bottom = ContextPrecisionEvaluator::average_precision(&[false, false, true]);
        assert_eq!(top, 1.0);
        assert!((bottom - 1.0 / 3.0).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn prop_average_precision_in_unit_interval(relevance in prop::collection::vec(any::<bool>(), 0..32)) {
            let score = ContextPrecisionEvaluator::average_precision(&relevance);
            prop_assert!((0.0..=1.0).contains(&score));
        }

        #[test]
        fn prop_all_relevant_scores_one(len in 1usize..32) {
            let score = ContextPrecisionEvaluator::average_precision(&vec![true; len]);
            prop_assert!((score - 1.0).abs() < 1e-12);
        }
    }

    #[tokio::test]
    async fn test_evaluate_uses_judge_per_chunk() {
        let judge = ScriptedJudge::default()
            .relevant_when("Ulm")
            .relevant_when("1879");
        let evaluator = ContextPrecisionEvaluator::new(Arc::new(judge), fast_guard());

        let sample = EvaluationSample::new(
            "When and where was Einstein born?",
            "Einstein was born in Ulm in 1879.",
            vec![
                "Einstein was born in Ulm.".to_string(),
                "Bananas are yellow.".to_string(),
                "He was born on 14 March 1879.".to_string(),
            ],
        );

        let result = evaluator.evaluate_precision(&sample).await.unwrap();
        assert_eq!(
            result.verdicts,
            vec![
                RelevanceVerdict::new(1, true),
                RelevanceVerdict::new(2, false),
                RelevanceVerdict::new(3, true),
            ]
        );
        assert!((result.score - 0.8333).abs() < 1e-3);
        assert_eq!(result.relevant_count, 2);
    }

    #[tokio::test]
    async fn test_empty_contexts_are_degenerate() {
        let evaluator =
            ContextPrecisionEvaluator::new(Arc::new(ScriptedJudge::default()), fast_guard());
        let sample = EvaluationSample::new("q", "r", vec![]);

        let err = evaluator.evaluate(&sample).await.unwrap_err();
        assert!(matches!(err, EvalError::DegenerateInput(_)));
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried_once() {
        let judge = ScriptedJudge::default()
            .relevant_when("Ulm")
            .fail_relevance_times(1);
        let evaluator = ContextPrecisionEvaluator::new(Arc::new(judge), fast_guard());
        let sample = EvaluationSample::new("q", "r", vec!["Ulm".to_string()]);

        let score = evaluator.evaluate(&sample).await.unwrap();
        assert_eq!(score.score, 1.0);
    }

    #[tokio::test]
    async fn test_persistent_failure_fails_metric() {
        let judge = ScriptedJudge::default().fail_relevance_times(usize::MAX);
        let evaluator = ContextPrecisionEvaluator::new(Arc::new(judge), fast_guard());
        let sample = EvaluationSample::new("q", "r", vec!["a".to_string(), "b".to_string()]);

        let err = evaluator.evaluate(&sample).await.unwrap_err();
        assert!(matches!(err, EvalError::ProviderUnavailable(_)));
    }
}
