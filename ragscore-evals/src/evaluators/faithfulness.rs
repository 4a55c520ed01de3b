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
// Faithfulness (decompose-then-verify)
// ============================================================================
//
// 1. Split the response into sentences and have the judge decompose each one
//    into standalone atomic claims
// 2. Verify every claim against the concatenated retrieved contexts
// 3. Faithfulness = supported claims / total claims
//
// Extraction is a barrier: verification starts only once all claims are known.

use async_trait::async_trait;
use futures::future::join_all;
use ragscore_core::{split_sentences, Claim, EvaluationSample, MetricName, ZeroClaimsPolicy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use super::to_metric_score;
use crate::judge::{ExtractedClaim, Judge};
use crate::resilience::ProviderGuard;
use crate::{EvalError, Evaluator, EvaluatorMetadata, MetricScore};

/// Detailed faithfulness result with claim-level breakdown
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaithfulnessResult {
    pub score: f64,
    pub sentences: Vec<String>,
    pub claims: Vec<Claim>,
    pub supported_claims: usize,
    /// Claims defaulted to unsupported because verification kept failing
    pub unverified_claims: usize,
}

impl FaithfulnessResult {
    pub fn total_claims(&self) -> usize {
        self.claims.len()
    }
}

pub struct FaithfulnessEvaluator {
    judge: Arc<dyn Judge>,
    guard: ProviderGuard,
    zero_claims: ZeroClaimsPolicy,
}

impl FaithfulnessEvaluator {
    pub fn new(judge: Arc<dyn Judge>, guard: ProviderGuard) -> Self {
        Self {
            judge,
            guard,
            zero_claims: ZeroClaimsPolicy::default(),
        }
    }

    pub fn with_zero_claims_policy(mut self, policy: ZeroClaimsPolicy) -> Self {
        self.zero_claims = policy;
        self
    }

    /// Extract claims; failures here are fatal to the metric
    async fn extract_claims(
        &self,
        user_input: &str,
        sentences: &[String],
    ) -> Result<Vec<ExtractedClaim>, EvalError> {
        if sentences.is_empty() {
            return Ok(Vec::new());
        }

        let judge = &self.judge;
        self.guard
            .call("extract_claims", || async {
                let claims = judge.extract_claims(user_input, sentences).await?;
                // Each claim must trace back to exactly one existing sentence
                if let Some(bad) = claims.iter().find(|c| c.sentence_index >= sentences.len()) {
                    return Err(EvalError::SchemaViolation(format!(
                        "claim refers to sentence {} but the response has {} sentences",
                        bad.sentence_index,
                        sentences.len()
                    )));
                }
                Ok::<_, EvalError>(claims)
            })
            .await
    }

    /// Verify one claim. Exhausted retries yield an unsupported claim, never a dropped one.
    async fn verify_claim(&self, extracted: ExtractedClaim, context: &str) -> Claim {
        let judge = &self.judge;
        let statement = extracted.statement.as_str();

        let verdict = self
            .guard
            .call("verify_claim", || async {
                judge
                    .verify_claim(statement, context)
                    .await
                    .map_err(EvalError::from)
            })
            .await;

        match verdict {
            Ok(verdict) => Claim::verified(extracted.sentence_index, extracted.statement, verdict),
            Err(e) => {
                warn!(
                    claim = %extracted.statement,
                    error = %e,
                    "claim verification failed, counting claim as unsupported"
                );
                Claim::unverifiable(extracted.sentence_index, extracted.statement)
            }
        }
    }

    /// Run full faithfulness evaluation
    pub async fn evaluate_faithfulness(
        &self,
        sample: &EvaluationSample,
    ) -> Result<FaithfulnessResult, EvalError> {
        let sentences = split_sentences(sample.response());

        // Step 1: extract claims
        let extracted = self.extract_claims(sample.user_input(), &sentences).await?;

        if extracted.is_empty() {
            return match self.zero_claims {
                ZeroClaimsPolicy::VacuouslyFaithful => {
                    debug!("response has no claims, vacuously faithful");
                    Ok(FaithfulnessResult {
                        score: 1.0,
                        sentences,
                        claims: Vec::new(),
                        supported_claims: 0,
                        unverified_claims: 0,
                    })
                }
                ZeroClaimsPolicy::Fail => Err(EvalError::DegenerateInput(
                    "response contains no verifiable claims".to_string(),
                )),
            };
        }

        // Step 2: verify each claim
        let context = sample.joined_context();
        let claims: Vec<Claim> = join_all(
            extracted
                .into_iter()
                .map(|claim| self.verify_claim(claim, &context)),
        )
        .await;

        // Step 3: calculate score
        let supported = claims.iter().filter(|c| c.verdict.is_supported()).count();
        let unverified = claims.iter().filter(|c| c.verification_failed).count();
        let score = supported as f64 / claims.len() as f64;

        Ok(FaithfulnessResult {
            score,
            sentences,
            claims,
            supported_claims: supported,
            unverified_claims: unverified,
        })
    }
}

#[async_trait]
impl Evaluator for FaithfulnessEvaluator {
    fn id(&self) -> &str {
        "faithfulness_v1"
    }

    fn metric(&self) -> MetricName {
        MetricName::Faithfulness
    }

    async fn evaluate(&self, sample: &EvaluationSample) -> Result<MetricScore, EvalError> {
        let result = self.evaluate_faithfulness(sample).await?;

        let mut explanation = format!(
            "Faithfulness: {:.2} ({}/{} claims supported)",
            result.score,
            result.supported_claims,
            result.total_claims()
        );
        if result.unverified_claims > 0 {
            explanation.push_str(&format!(
                ", {} could not be verified",
                result.unverified_claims
            ));
        }

        to_metric_score(result.score, explanation, &result)
    }

    fn metadata(&self) -> EvaluatorMetadata {
        EvaluatorMetadata {
            name: "Faithfulness".to_string(),
            version: "1.0.0".to_string(),
            description: "Decomposes the response into atomic claims per sentence and verifies each against the retrieved context.".to_string(),
            uses_embeddings: false,
            tags: vec![
                "faithfulness".to_string(),
                "rag".to_string(),
                "claim-verification".to_string(),
                "llm-as-judge".to_string(),
            ],
        }
    }
}
