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

//! LLM-as-judge capability
//!
//! [`Judge`] has one method per judgment shape the metrics need. [`LlmJudge`]
//! implements it on top of any [`LLMClient`] by prompting for strict JSON and
//! parsing the answer into typed schemas. Anything that does not parse is a
//! [`JudgeError::SchemaViolation`], which callers treat as retryable.

use async_trait::async_trait;
use ragscore_core::{ClaimVerdict, GeneratedQuestion};
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::llm_client::{LLMClient, LLMError};

/// Errors from a judge call
#[derive(Debug, Error)]
pub enum JudgeError {
    #[error("Judge provider error: {0}")]
    Provider(#[from] LLMError),

    #[error("Judge output violates schema: {0}")]
    SchemaViolation(String),
}

/// A claim as returned by the extraction step, before verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedClaim {
    /// 0-indexed sentence of the response
    pub sentence_index: usize,
    pub statement: String,
}

/// Structured judgments used by the metrics
#[async_trait]
pub trait Judge: Send + Sync {
    /// Is `chunk` useful for answering `user_input`? Sees only the query and the chunk.
    async fn judge_relevance(&self, user_input: &str, chunk: &str) -> Result<bool, JudgeError>;

    /// Generate `n` questions the response would answer, each with a noncommittal flag
    async fn generate_questions(
        &self,
        response: &str,
        n: usize,
    ) -> Result<Vec<GeneratedQuestion>, JudgeError>;

    /// Decompose numbered sentences into standalone atomic claims
    async fn extract_claims(
        &self,
        user_input: &str,
        sentences: &[String],
    ) -> Result<Vec<ExtractedClaim>, JudgeError>;

    /// Is the claim directly inferable from the context?
    async fn verify_claim(&self, claim: &str, context: &str) -> Result<ClaimVerdict, JudgeError>;
}

/// Accepts `true`/`false`, `1`/`0` and `"yes"`/`"no"` style verdicts
fn flexible_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match &value {
        serde_json::Value::Bool(b) => Ok(*b),
        serde_json::Value::Number(n) => match n.as_f64() {
            Some(v) if v == 1.0 => Ok(true),
            Some(v) if v == 0.0 => Ok(false),
            _ => Err(de::Error::custom(format!("verdict out of range: {n}"))),
        },
        serde_json::Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" | "supported" | "relevant" => Ok(true),
            "false" | "no" | "0" | "unsupported" | "not_relevant" | "irrelevant" => Ok(false),
            other => Err(de::Error::custom(format!("unrecognised verdict: {other}"))),
        },
        other => Err(de::Error::custom(format!("unexpected verdict type: {other}"))),
    }
}

#[derive(Debug, Deserialize)]
struct RelevanceOutput {
    #[serde(deserialize_with = "flexible_bool")]
    verdict: bool,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QuestionsOutput {
    questions: Vec<QuestionItem>,
}

#[derive(Debug, Deserialize)]
struct QuestionItem {
    question: String,
    #[serde(deserialize_with = "flexible_bool")]
    noncommittal: bool,
}

#[derive(Debug, Deserialize)]
struct ClaimsOutput {
    sentences: Vec<SentenceClaims>,
}

#[derive(Debug, Deserialize)]
struct SentenceClaims {
    sentence_index: usize,
    #[serde(default)]
    claims: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct VerdictOutput {
    #[serde(deserialize_with = "flexible_bool")]
    verdict: bool,
    #[serde(default)]
    reason: Option<String>,
}

/// Strip a surrounding markdown code fence, if any
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the language tag on the opening fence line
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Substitute `{name}` placeholders in one pass over the template.
///
/// Substituted values are never rescanned, so caller text containing a
/// placeholder is passed through verbatim.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(
        template.len() + values.iter().map(|(_, v)| v.len()).sum::<usize>(),
    );
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open + 1..];
        let placeholder = values.iter().find(|(key, _)| {
            tail.strip_prefix(key)
                .map_or(false, |after| after.starts_with('}'))
        });
        match placeholder {
            Some((key, value)) => {
                out.push_str(value);
                rest = &tail[key.len() + 1..];
            }
            None => {
                // JSON braces in the template
                out.push('{');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

fn parse_output<T: DeserializeOwned>(content: &str, what: &str) -> Result<T, JudgeError> {
    serde_json::from_str(strip_code_fence(content))
        .map_err(|e| JudgeError::SchemaViolation(format!("{what}: {e}")))
}

/// [`Judge`] backed by an LLM prompted for JSON
pub struct LlmJudge {
    llm_client: Arc<dyn LLMClient>,
}

impl LlmJudge {
    const RELEVANCE_PROMPT: &'static str = r#"Decide whether the retrieved context is useful for answering the question.
Judge only against the question; there is no reference answer.

QUESTION:
{question}

CONTEXT:
{context}

Respond in JSON:
{
  "reason": "<one sentence>",
  "verdict": 1 if the context is useful for answering the question, otherwise 0
}
"#;

    const QUESTION_GEN_PROMPT: &'static str = r#"Generate {n} different questions that the following response is answering.
Also decide whether the response is noncommittal: evasive, vague or ambiguous
(for example "I don't know" or "I'm not sure"). Mark noncommittal as 1 for such
responses and 0 for substantive ones.

RESPONSE:
{response}

Respond in JSON:
{
  "questions": [
    {"question": "<question>", "noncommittal": 0 or 1},
    ...
  ]
}
"#;

    const CLAIM_EXTRACTION_PROMPT: &'static str = r#"Break each numbered sentence of the answer into one or more atomic factual claims.

QUESTION:
{question}

ANSWER SENTENCES:
{sentences}

Rules:
- Every claim must be fully understandable on its own: replace pronouns with the entity they refer to
- Decompose compound statements into atomic parts
- Skip sentences without factual content by giving them an empty claims list
- Use the sentence numbers exactly as given

Respond in JSON:
{
  "sentences": [
    {"sentence_index": 0, "claims": ["<claim>", ...]},
    ...
  ]
}
"#;

    const CLAIM_VERIFICATION_PROMPT: &'static str = r#"Decide whether the statement can be directly inferred from the context.

CONTEXT:
{context}

STATEMENT:
{claim}

Respond in JSON:
{
  "reason": "<one sentence>",
  "verdict": 1 if the statement is directly inferable from the context, otherwise 0
}
"#;

    pub fn new(llm_client: Arc<dyn LLMClient>) -> Self {
        Self { llm_client }
    }

    async fn ask(&self, operation: &str, prompt: String) -> Result<String, JudgeError> {
        let response = self.llm_client.evaluate(prompt).await?;
        debug!(
            operation,
            model = %response.model,
            total_tokens = response.usage.total_tokens,
            "judge call completed"
        );
        Ok(response.content)
    }
}

#[async_trait]
impl Judge for LlmJudge {
    async fn judge_relevance(&self, user_input: &str, chunk: &str) -> Result<bool, JudgeError> {
        let prompt = fill_template(
            Self::RELEVANCE_PROMPT,
            &[("question", user_input), ("context", chunk)],
        );
        let content = self.ask("judge_relevance", prompt).await?;
        let output: RelevanceOutput = parse_output(&content, "relevance verdict")?;
        debug!(verdict = output.verdict, reason = ?output.reason, "relevance verdict");
        Ok(output.verdict)
    }

    async fn generate_questions(
        &self,
        response: &str,
        n: usize,
    ) -> Result<Vec<GeneratedQuestion>, JudgeError> {
        let n = n.to_string();
        let prompt = fill_template(
            Self::QUESTION_GEN_PROMPT,
            &[("n", n.as_str()), ("response", response)],
        );
        let content = self.ask("generate_questions", prompt).await?;
        let output: QuestionsOutput = parse_output(&content, "generated questions")?;

        Ok(output
            .questions
            .into_iter()
            .filter(|q| !q.question.trim().is_empty())
            .map(|q| GeneratedQuestion::new(q.question.trim(), q.noncommittal))
            .collect())
    }

    async fn extract_claims(
        &self,
        user_input: &str,
        sentences: &[String],
    ) -> Result<Vec<ExtractedClaim>, JudgeError> {
        let numbered = sentences
            .iter()
            .enumerate()
            .map(|(i, s)| format!("{i}: {s}"))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = fill_template(
            Self::CLAIM_EXTRACTION_PROMPT,
            &[("question", user_input), ("sentences", numbered.as_str())],
        );
        let content = self.ask("extract_claims", prompt).await?;
        let output: ClaimsOutput = parse_output(&content, "claim list")?;

        Ok(output
            .sentences
            .into_iter()
            .flat_map(|s| {
                let index = s.sentence_index;
                s.claims.into_iter().map(move |claim| ExtractedClaim {
                    sentence_index: index,
                    statement: claim.trim().to_string(),
                })
            })
            .filter(|c| !c.statement.is_empty())
            .collect())
    }

    async fn verify_claim(&self, claim: &str, context: &str) -> Result<ClaimVerdict, JudgeError> {
        let prompt = fill_template(
            Self::CLAIM_VERIFICATION_PROMPT,
            &[("context", context), ("claim", claim)],
        );
        let content = self.ask("verify_claim", prompt).await?;
        let output: VerdictOutput = parse_output(&content, "claim verdict")?;
        debug!(verdict = output.verdict, reason = ?output.reason, "claim verdict");
        Ok(ClaimVerdict::from_supported(output.verdict))
    }
}
