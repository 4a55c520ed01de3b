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

//! Deterministic judge and embedding doubles for evaluator tests

use async_trait::async_trait;
use ragscore_core::{ClaimVerdict, GeneratedQuestion, RetryPolicy};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::judge::{ExtractedClaim, Judge, JudgeError};
use crate::llm_client::{EmbedError, EmbeddingClient, LLMError};
use crate::resilience::ProviderGuard;

/// Guard with a single fast retry
pub(crate) fn fast_guard() -> ProviderGuard {
    ProviderGuard::new(
        4,
        Duration::from_secs(1),
        RetryPolicy {
            max_attempts: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            multiplier: 2.0,
            jitter: 0.0,
        },
    )
}

/// Consume one scheduled failure, if any are left
fn take_failure(remaining: &AtomicUsize) -> bool {
    remaining
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

fn unavailable() -> JudgeError {
    JudgeError::Provider(LLMError::ApiError("judge unavailable".to_string()))
}

#[derive(Default)]
pub(crate) struct ScriptedJudge {
    relevant_keywords: Vec<String>,
    relevance_failures: AtomicUsize,
    questions: Vec<GeneratedQuestion>,
    question_failures: AtomicUsize,
    ignore_question_count: bool,
    claims: Vec<ExtractedClaim>,
    extraction_failures: AtomicUsize,
    supported_claims: HashSet<String>,
    broken_claims: HashSet<String>,
    pub(crate) verify_calls: AtomicUsize,
}

impl ScriptedJudge {
    /// Chunks containing `keyword` are relevant
    pub(crate) fn relevant_when(mut self, keyword: &str) -> Self {
        self.relevant_keywords.push(keyword.to_string());
        self
    }

    pub(crate) fn fail_relevance_times(self, n: usize) -> Self {
        self.relevance_failures.store(n, Ordering::SeqCst);
        self
    }

    pub(crate) fn question(mut self, question: &str, noncommittal: bool) -> Self {
        self.questions.push(GeneratedQuestion::new(question, noncommittal));
        self
    }

    /// Return every scripted question regardless of how many were requested
    pub(crate) fn ignoring_requested_count(mut self) -> Self {
        self.ignore_question_count = true;
        self
    }

    pub(crate) fn fail_questions_times(self, n: usize) -> Self {
        self.question_failures.store(n, Ordering::SeqCst);
        self
    }

    pub(crate) fn claim(mut self, sentence_index: usize, statement: &str, supported: bool) -> Self {
        self.claims.push(ExtractedClaim {
            sentence_index,
            statement: statement.to_string(),
        });
        if supported {
            self.supported_claims.insert(statement.to_string());
        }
        self
    }

    pub(crate) fn fail_extraction_times(self, n: usize) -> Self {
        self.extraction_failures.store(n, Ordering::SeqCst);
        self
    }

    /// Verification of `statement` always fails
    pub(crate) fn unverifiable(mut self, statement: &str) -> Self {
        self.broken_claims.insert(statement.to_string());
        self
    }
}

#[async_trait]
impl Judge for ScriptedJudge {
    async fn judge_relevance(&self, _user_input: &str, chunk: &str) -> Result<bool, JudgeError> {
        if take_failure(&self.relevance_failures) {
            return Err(unavailable());
        }
        Ok(self.relevant_keywords.iter().any(|k| chunk.contains(k.as_str())))
    }

    async fn generate_questions(
        &self,
        _response: &str,
        n: usize,
    ) -> Result<Vec<GeneratedQuestion>, JudgeError> {
        if take_failure(&self.question_failures) {
            return Err(unavailable());
        }
        let limit = if self.ignore_question_count { usize::MAX } else { n };
        Ok(self.questions.iter().take(limit).cloned().collect())
    }

    async fn extract_claims(
        &self,
        _user_input: &str,
        _sentences: &[String],
    ) -> Result<Vec<ExtractedClaim>, JudgeError> {
        if take_failure(&self.extraction_failures) {
            return Err(JudgeError::SchemaViolation("missing sentences array".to_string()));
        }
        Ok(self.claims.clone())
    }

    async fn verify_claim(&self, claim: &str, _context: &str) -> Result<ClaimVerdict, JudgeError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        if self.broken_claims.contains(claim) {
            return Err(unavailable());
        }
        Ok(ClaimVerdict::from_supported(self.supported_claims.contains(claim)))
    }
}

/// Embeddings from a fixed lookup table
#[derive(Default)]
pub(crate) struct TableEmbeddings {
    vectors: HashMap<String, Vec<f64>>,
    failing: bool,
}

impl TableEmbeddings {
    pub(crate) fn with(mut self, text: &str, vector: Vec<f64>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    pub(crate) fn failing() -> Self {
        Self {
            vectors: HashMap::new(),
            failing: true,
        }
    }
}

#[async_trait]
impl EmbeddingClient for TableEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f64>, EmbedError> {
        if self.failing {
            return Err(EmbedError::ApiError("embedding service down".to_string()));
        }
        self.vectors
            .get(text)
            .cloned()
            .ok_or_else(|| EmbedError::ApiError(format!("Text not found in mock: {text}")))
    }
}
