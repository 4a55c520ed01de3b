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

//! # Ragscore Evaluation Engine
//!
//! LLM-as-judge metrics for retrieval-augmented generation pipelines.
//!
//! ## Features
//!
//! - **Context precision**: rank-aware precision of the retrieved chunks
//! - **Response relevancy**: reverse question generation + embedding similarity
//! - **Faithfulness**: claim decomposition and per-claim verification
//! - **Failure isolation**: one failing metric never hides the others
//! - **Bounded provider concurrency**: shared limit, per-call timeout, retry with backoff
//!
//! ## Example
//!
//! ```rust,ignore
//! use ragscore_evals::{RagEvaluator, llm_client::OpenAIClient};
//! use ragscore_core::{EngineConfig, EvaluationSample, MetricName};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = Arc::new(OpenAIClient::new(
//!         std::env::var("OPENAI_API_KEY").unwrap(),
//!         "gpt-4o-mini".to_string(),
//!     ));
//!     let engine = RagEvaluator::with_llm(EngineConfig::default(), client.clone(), client);
//!
//!     let sample = EvaluationSample::new(
//!         "Where was Einstein born?",
//!         "Einstein was born in Germany.",
//!         vec!["Albert Einstein was born in Ulm, Germany.".to_string()],
//!     );
//!     let report = engine.evaluate(&sample, &MetricName::ALL).await;
//!     println!("{:?}", report.scores());
//! }
//! ```

use async_trait::async_trait;
use ragscore_core::{EvaluationSample, FailureKind, MetricName};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub mod evaluators;
pub mod judge;
pub mod llm_client;
pub mod orchestrator;
pub mod resilience;

pub use evaluators::{
    ContextPrecisionEvaluator, FaithfulnessEvaluator, ResponseRelevancyEvaluator,
};
pub use judge::{Judge, JudgeError, LlmJudge};
pub use orchestrator::{BatchSummary, MetricSummary, RagEvaluator};
pub use resilience::ProviderGuard;

/// Core trait that all metric evaluators implement
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Unique identifier for this evaluator (e.g., "faithfulness_v1")
    fn id(&self) -> &str;

    /// Metric this evaluator produces
    fn metric(&self) -> MetricName;

    /// Score a single sample
    async fn evaluate(&self, sample: &EvaluationSample) -> Result<MetricScore, EvalError>;

    /// Metadata about this evaluator (name, version, calls per sample, etc.)
    fn metadata(&self) -> EvaluatorMetadata;
}

/// Scalar score plus the breakdown that produced it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricScore {
    /// Always within [0, 1]
    pub score: f64,

    pub explanation: String,

    /// Serialized per-metric result (verdicts, questions, claims)
    pub details: serde_json::Value,
}

/// Metadata about an evaluator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatorMetadata {
    /// Human-readable name
    pub name: String,

    /// Version string (e.g., "1.0.0")
    pub version: String,

    /// Description of what this evaluator does
    pub description: String,

    /// Whether the evaluator calls the embedding provider
    pub uses_embeddings: bool,

    /// Tags for categorization
    pub tags: Vec<String>,
}

/// Errors that can occur during evaluation
#[derive(Debug, Clone, Error)]
pub enum EvalError {
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: String,
        after: Duration,
    },

    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    #[error("Rate limit exceeded: {0}")]
    ConcurrencyLimitExceeded(String),

    #[error("Evaluation cancelled")]
    Cancelled,

    #[error("Task panicked: {0}")]
    Panic(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EvalError {
    /// Failure category reported to the caller
    pub fn kind(&self) -> FailureKind {
        match self {
            EvalError::ProviderUnavailable(_) | EvalError::Timeout { .. } => {
                FailureKind::ProviderUnavailable
            }
            EvalError::SchemaViolation(_) => FailureKind::SchemaViolation,
            EvalError::DegenerateInput(_) => FailureKind::DegenerateInput,
            EvalError::ConcurrencyLimitExceeded(_) => FailureKind::ConcurrencyLimitExceeded,
            EvalError::Cancelled => FailureKind::Cancelled,
            EvalError::Panic(_) | EvalError::Internal(_) => FailureKind::Internal,
        }
    }

    /// Transient failures worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EvalError::ProviderUnavailable(_)
                | EvalError::Timeout { .. }
                | EvalError::SchemaViolation(_)
                | EvalError::ConcurrencyLimitExceeded(_)
        )
    }
}

impl From<llm_client::LLMError> for EvalError {
    fn from(e: llm_client::LLMError) -> Self {
        use llm_client::LLMError;
        match e {
            LLMError::RateLimitExceeded => {
                EvalError::ConcurrencyLimitExceeded("judge provider".to_string())
            }
            LLMError::InvalidResponse(msg) => EvalError::SchemaViolation(msg),
            LLMError::Json(e) => EvalError::SchemaViolation(e.to_string()),
            LLMError::ApiError(msg) => EvalError::ProviderUnavailable(msg),
            LLMError::Http(e) => EvalError::ProviderUnavailable(e.to_string()),
        }
    }
}

impl From<llm_client::EmbedError> for EvalError {
    fn from(e: llm_client::EmbedError) -> Self {
        use llm_client::EmbedError;
        match e {
            EmbedError::RateLimitExceeded => {
                EvalError::ConcurrencyLimitExceeded("embedding provider".to_string())
            }
            EmbedError::InvalidResponse(msg) => EvalError::SchemaViolation(msg),
            EmbedError::Json(e) => EvalError::SchemaViolation(e.to_string()),
            EmbedError::ApiError(msg) => EvalError::ProviderUnavailable(msg),
            EmbedError::Http(e) => EvalError::ProviderUnavailable(e.to_string()),
        }
    }
}

impl From<JudgeError> for EvalError {
    fn from(e: JudgeError) -> Self {
        match e {
            JudgeError::Provider(inner) => inner.into(),
            JudgeError::SchemaViolation(msg) => EvalError::SchemaViolation(msg),
        }
    }
}
