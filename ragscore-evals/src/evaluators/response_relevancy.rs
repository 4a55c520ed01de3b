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

// ============================================================================
// Response Relevancy (reverse question generation)
// ============================================================================
//
// 1. Generate N questions the response would answer, each flagged noncommittal
//    when the response evades the question
// 2. Embed the user input once and every generated question
// 3. Score = mean cosine similarity, forced to 0.0 if any question is noncommittal

use async_trait::async_trait;
use ragscore_core::{EvaluationSample, GeneratedQuestion, MetricName};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::to_metric_score;
use crate::judge::Judge;
use crate::llm_client::EmbeddingClient;
use crate::resilience::ProviderGuard;
use crate::{EvalError, Evaluator, EvaluatorMetadata, MetricScore};

/// Cosine similarity of two embeddings.
///
/// Zero-norm vectors give 0.0. Vectors of different dimension mean the
/// provider broke its contract, which is reported as a schema violation.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> Result<f64, EvalError> {
    if a.len() != b.len() {
        return Err(EvalError::SchemaViolation(format!(
            "embedding dimensions differ: {} vs {}",
            a.len(),
            b.len()
        )));
    }

    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();

    if norm_a < 1e-12 || norm_b < 1e-12 {
        return Ok(0.0);
    }

    Ok((dot / (norm_a * norm_b)).clamp(-1.0, 1.0))
}

/// Detailed response relevancy result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseRelevancyResult {
    pub score: f64,
    pub generated_questions: Vec<GeneratedQuestion>,
    /// Cosine similarity of each generated question to the user input
    pub similarities: Vec<f64>,
    pub mean_similarity: f64,
    /// True when any generated question was flagged noncommittal
    pub noncommittal: bool,
}

pub struct ResponseRelevancyEvaluator {
    judge: Arc<dyn Judge>,
    embedding_client: Arc<dyn EmbeddingClient>,
    guard: ProviderGuard,
    num_questions: usize,
}

impl ResponseRelevancyEvaluator {
    pub fn new(
        judge: Arc<dyn Judge>,
        embedding_client: Arc<dyn EmbeddingClient>,
        guard: ProviderGuard,
    ) -> Self {
        Self {
            judge,
            embedding_client,
            guard,
            num_questions: 3,
        }
    }

    pub fn with_num_questions(mut self, n: usize) -> Self {
        self.num_questions = n.max(1);
        self
    }

    /// Generate questions; an empty list is a schema violation and retried.
    /// Extra questions beyond `num_questions` are discarded.
    async fn generate_questions(&self, response: &str) -> Result<Vec<GeneratedQuestion>, EvalError> {
        let judge = &self.judge;
        let n = self.num_questions;

        self.guard
            .call("generate_questions", || async {
                let mut questions = judge.generate_questions(response, n).await?;
                if questions.len() > n {
                    debug!(requested = n, returned = questions.len(), "judge over-generated questions");
                    questions.truncate(n);
                }
                if questions.is_empty() {
                    return Err(EvalError::SchemaViolation(
                        "judge generated no questions".to_string(),
                    ));
                }
                Ok::<_, EvalError>(questions)
            })
            .await
    }

    async fn embed_user_input(&self, user_input: &str) -> Result<Vec<f64>, EvalError> {
        let client = &self.embedding_client;
        self.guard
            .call("embed_user_input", || async {
                client.embed(user_input).await.map_err(EvalError::from)
            })
            .await
    }

    async fn embed_questions(&self, questions: &[String]) -> Result<Vec<Vec<f64>>, EvalError> {
        let client = &self.embedding_client;
        self.guard
            .call("embed_questions", || async {
                let vectors = client.embed_batch(questions).await?;
                if vectors.len() != questions.len() {
                    return Err(EvalError::SchemaViolation(format!(
                        "expected {} question embeddings, got {}",
                        questions.len(),
                        vectors.len()
                    )));
                }
                Ok::<_, EvalError>(vectors)
            })
            .await
    }

    /// Evaluate response relevancy using generated questions and embeddings
    pub async fn evaluate_relevancy(
        &self,
        sample: &EvaluationSample,
    ) -> Result<ResponseRelevancyResult, EvalError> {
        let generated_questions = self.generate_questions(sample.response()).await?;
        let texts: Vec<String> = generated_questions
            .iter()
            .map(|q| q.question.clone())
            .collect();

        // Any embedding failure is fatal: no partial average
        let (original, question_vectors) = tokio::try_join!(
            self.embed_user_input(sample.user_input()),
            self.embed_questions(&texts)
        )?;

        let similarities = question_vectors
            .iter()
            .map(|v| cosine_similarity(v, &original))
            .collect::<Result<Vec<f64>, EvalError>>()?;

        let mean_similarity = similarities.iter().sum::<f64>() / similarities.len() as f64;
        let noncommittal = generated_questions.iter().any(|q| q.noncommittal);

        let score = if noncommittal {
            debug!("noncommittal response, relevancy forced to 0");
            0.0
        } else {
            // Anti-correlated questions count as irrelevant
            mean_similarity.clamp(0.0, 1.0)
        };

        Ok(ResponseRelevancyResult {
            score,
            generated_questions,
            similarities,
            mean_similarity,
            noncommittal,
        })
    }
}

#[async_trait]
impl Evaluator for ResponseRelevancyEvaluator {
    fn id(&self) -> &str {
        "response_relevancy_v1"
    }

    fn metric(&self) -> MetricName {
        MetricName::ResponseRelevancy
    }

    async fn evaluate(&self, sample: &EvaluationSample) -> Result<MetricScore, EvalError> {
        let result = self.evaluate_relevancy(sample).await?;

        let explanation = if result.noncommittal {
            format!(
                "Response Relevancy: 0.00 (noncommittal response, mean similarity {:.2} over {} questions)",
                result.mean_similarity,
                result.generated_questions.len()
            )
        } else {
            format!(
                "Response Relevancy: {:.2} (mean similarity over {} generated questions)",
                result.score,
                result.generated_questions.len()
            )
        };

        to_metric_score(result.score, explanation, &result)
    }

    fn metadata(&self) -> EvaluatorMetadata {
        EvaluatorMetadata {
            name: "Response Relevancy".to_string(),
            version: "1.0.0".to_string(),
            description: "Reverse question generation: questions generated from the response are compared to the user input by cosine similarity. Noncommittal responses score 0.".to_string(),
            uses_embeddings: true,
            tags: vec![
                "relevance".to_string(),
                "embedding".to_string(),
                "reverse-qag".to_string(),
                "llm-as-judge".to_string(),
            ],
        }
    }
}
