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

//! LLM and embedding client abstractions used by the judge

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const JUDGE_SYSTEM_PROMPT: &str = "You are an expert evaluator. Respond only with valid JSON.";

/// Trait for LLM clients used as judges
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Send a prompt and get a JSON response back
    async fn evaluate(&self, prompt: String) -> Result<LLMResponse, LLMError>;

    /// Get model name
    fn model_name(&self) -> &str;
}

/// Response from LLM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMResponse {
    pub content: String,
    pub usage: TokenUsage,
    pub model: String,
}

impl LLMResponse {
    /// Parse response as JSON
    pub fn as_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.content)
    }
}

/// Token usage information
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Errors from LLM clients
#[derive(Debug, Error)]
pub enum LLMError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from embedding clients
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Trait for embedding clients used in evaluations
///
/// Dimensionality must stay fixed for the lifetime of a client.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Embed a single text string
    async fn embed(&self, text: &str) -> Result<Vec<f64>, EmbedError>;

    /// Embed a batch of texts, one vector per input in input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f64>>, EmbedError> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }
}

fn parse_usage(usage_data: &serde_json::Value, input_key: &str, output_key: &str) -> TokenUsage {
    let prompt_tokens = usage_data[input_key].as_u64().unwrap_or(0) as u32;
    let completion_tokens = usage_data[output_key].as_u64().unwrap_or(0) as u32;
    TokenUsage {
        prompt_tokens,
        completion_tokens,
        total_tokens: usage_data["total_tokens"]
            .as_u64()
            .map(|t| t as u32)
            .unwrap_or(prompt_tokens + completion_tokens),
    }
}

/// OpenAI-compatible client (chat completions + embeddings)
pub struct OpenAIClient {
    api_key: String,
    model: String,
    embedding_model: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAIClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            embedding_model: "text-embedding-3-small".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn with_embedding_model(mut self, embedding_model: String) -> Self {
        self.embedding_model = embedding_model;
        self
    }
}

#[async_trait]
impl EmbeddingClient for OpenAIClient {
    async fn embed(&self, text: &str) -> Result<Vec<f64>, EmbedError> {
        let embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::InvalidResponse("No embedding returned".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f64>>, EmbedError> {
        let request = serde_json::json!({
            "model": self.embedding_model,
            "input": texts
        });

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(EmbedError::RateLimitExceeded);
            }
            return Err(EmbedError::ApiError(error_text));
        }

        let response_data: serde_json::Value = response.json().await?;

        let data = response_data["data"]
            .as_array()
            .ok_or_else(|| EmbedError::InvalidResponse("Missing data array".to_string()))?;

        // The API may return items out of order; "index" is authoritative
        let mut indexed: Vec<(usize, Vec<f64>)> = Vec::with_capacity(data.len());
        for (position, item) in data.iter().enumerate() {
            let index = item["index"].as_u64().map(|i| i as usize).unwrap_or(position);
            let vector = item["embedding"]
                .as_array()
                .ok_or_else(|| EmbedError::InvalidResponse("Missing embedding".to_string()))?
                .iter()
                .map(|v| {
                    v.as_f64()
                        .ok_or_else(|| EmbedError::InvalidResponse("Non-numeric embedding".to_string()))
                })
                .collect::<Result<Vec<f64>, _>>()?;
            indexed.push((index, vector));
        }
        indexed.sort_by_key(|(index, _)| *index);

        if indexed.len() != texts.len() {
            return Err(EmbedError::InvalidResponse(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                indexed.len()
            )));
        }
        // After sorting, each position must hold its own index exactly once
        if let Some((position, (index, _))) = indexed
            .iter()
            .enumerate()
            .find(|(position, (index, _))| index != position)
        {
            return Err(EmbedError::InvalidResponse(format!(
                "Embedding index {index} at position {position}: indices must cover 0..{} exactly once",
                texts.len()
            )));
        }

        Ok(indexed.into_iter().map(|(_, v)| v).collect())
    }
}

#[async_trait]
impl LLMClient for OpenAIClient {
    async fn evaluate(&self, prompt: String) -> Result<LLMResponse, LLMError> {
        let request = serde_json::json!({
            "model": self.model,
            "messages": [
                {
                    "role": "system",
                    "content": JUDGE_SYSTEM_PROMPT
                },
                {
                    "role": "user",
                    "content": prompt
                }
            ],
            "temperature": 0.0,
            "response_format": { "type": "json_object" }
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(LLMError::RateLimitExceeded);
            }
            return Err(LLMError::ApiError(error_text));
        }

        let response_data: serde_json::Value = response.json().await?;

        let content = response_data["choices"][0]["message"]["content"]
            .as_str()
            .ok_or(LLMError::InvalidResponse("Missing content".to_string()))?
            .to_string();

        Ok(LLMResponse {
            content,
            usage: parse_usage(&response_data["usage"], "prompt_tokens", "completion_tokens"),
            model: self.model.clone(),
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Anthropic Claude client implementation
pub struct AnthropicClient {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl AnthropicClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            base_url: "https://api.anthropic.com/v1".to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }
}

#[async_trait]
impl LLMClient for AnthropicClient {
    async fn evaluate(&self, prompt: String) -> Result<LLMResponse, LLMError> {
        let request = serde_json::json!({
            "model": self.model,
            "max_tokens": 4096,
            "messages": [
                {
                    "role": "user",
                    "content": prompt
                }
            ],
            "system": JUDGE_SYSTEM_PROMPT,
            "temperature": 0.0
        });

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(LLMError::RateLimitExceeded);
            }
            return Err(LLMError::ApiError(error_text));
        }

        let response_data: serde_json::Value = response.json().await?;

        let content = response_data["content"][0]["text"]
            .as_str()
            .ok_or(LLMError::InvalidResponse("Missing content".to_string()))?
            .to_string();

        Ok(LLMResponse {
            content,
            usage: parse_usage(&response_data["usage"], "input_tokens", "output_tokens"),
            model: self.model.clone(),
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_openai_chat_completion() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "choices": [{"message": {"content": "{\"relevant\": true}"}}],
                    "usage": {"prompt_tokens": 12, "completion_tokens": 4, "total_tokens": 16}
                }"#,
            )
            .create_async()
            .await;

        let client = OpenAIClient::new("test-key".to_string(), "gpt-4o-mini".to_string())
            .with_base_url(server.url());
        let response = client.evaluate("Is it relevant?".to_string()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.as_json().unwrap()["relevant"], true);
        assert_eq!(response.usage.total_tokens, 16);
        assert_eq!(response.model, "gpt-4o-mini");
    }

    #[tokio::test]
    async fn test_openai_rate_limit() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_body("slow down")
            .create_async()
            .await;

        let client = OpenAIClient::new("k".to_string(), "gpt-4o-mini".to_string())
            .with_base_url(server.url());
        let err = client.evaluate("prompt".to_string()).await.unwrap_err();
        assert!(matches!(err, LLMError::RateLimitExceeded));
    }

    #[tokio::test]
    async fn test_openai_embeddings_respect_index_order() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/embeddings")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "data": [
                        {"index": 1, "embedding": [0.0, 1.0]},
                        {"index": 0, "embedding": [1.0, 0.0]}
                    ]
                }"#,
            )
            .create_async()
            .await;

        let client = OpenAIClient::new("k".to_string(), "gpt-4o-mini".to_string())
            .with_base_url(server.url());
        let vectors = client
            .embed_batch(&["first".to_string(), "second".to_string()])
            .await
            .unwrap();

        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn test_openai_embedding_count_mismatch() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/embeddings")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data": [{"index": 0, "embedding": [1.0]}]}"#)
            .create_async()
            .await;

        let client = OpenAIClient::new("k".to_string(), "m".to_string()).with_base_url(server.url());
        let err = client
            .embed_batch(&["a".to_string(), "b".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, EmbedError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_openai_embedding_duplicate_index() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/embeddings")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"data": [{"index": 0, "embedding": [1.0]}, {"index": 0, "embedding": [0.5]}]}"#,
            )
            .create_async()
            .await;

        let client = OpenAIClient::new("k".to_string(), "m".to_string()).with_base_url(server.url());
        let err = client
            .embed_batch(&["a".to_string(), "b".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, EmbedError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_openai_embedding_index_out_of_range() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/embeddings")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"data": [{"index": 0, "embedding": [1.0]}, {"index": 5, "embedding": [0.5]}]}"#,
            )
            .create_async()
            .await;

        let client = OpenAIClient::new("k".to_string(), "m".to_string()).with_base_url(server.url());
        let err = client
            .embed_batch(&["a".to_string(), "b".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, EmbedError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_anthropic_messages() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/messages")
            .match_header("x-api-key", "anthropic-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "content": [{"type": "text", "text": "{\"claims\": []}"}],
                    "usage": {"input_tokens": 30, "output_tokens": 5}
                }"#,
            )
            .create_async()
            .await;

        let client = AnthropicClient::new(
            "anthropic-key".to_string(),
            "claude-3-5-haiku-20241022".to_string(),
        )
        .with_base_url(server.url());
        let response = client.evaluate("Extract claims".to_string()).await.unwrap();

        assert_eq!(response.content, r#"{"claims": []}"#);
        assert_eq!(response.usage.total_tokens, 35);
    }
}
