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

use serde::{Deserialize, Serialize};

/// A single (query, response, retrieved contexts) triple to be scored.
///
/// Fields are private so a sample cannot change once it has been handed to
/// the evaluators. `retrieved_contexts` keeps retrieval rank order: index 0 is
/// rank 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationSample {
    user_input: String,
    response: String,
    #[serde(default)]
    retrieved_contexts: Vec<String>,
}

impl EvaluationSample {
    pub fn new(
        user_input: impl Into<String>,
        response: impl Into<String>,
        retrieved_contexts: Vec<String>,
    ) -> Self {
        Self {
            user_input: user_input.into(),
            response: response.into(),
            retrieved_contexts,
        }
    }

    pub fn user_input(&self) -> &str {
        &self.user_input
    }

    pub fn response(&self) -> &str {
        &self.response
    }

    /// Retrieved chunks in rank order
    pub fn retrieved_contexts(&self) -> &[String] {
        &self.retrieved_contexts
    }

    /// All contexts joined with blank lines, as shown to the claim verifier
    pub fn joined_context(&self) -> String {
        self.retrieved_contexts.join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_from_json() {
        let json = r#"{
            "user_input": "Where was Einstein born?",
            "response": "Einstein was born in Germany.",
            "retrieved_contexts": ["Albert Einstein was born in Ulm, Germany.", "He died in Princeton."]
        }"#;

        let sample: EvaluationSample = serde_json::from_str(json).unwrap();
        assert_eq!(sample.user_input(), "Where was Einstein born?");
        assert_eq!(sample.retrieved_contexts().len(), 2);
        assert_eq!(
            sample.joined_context(),
            "Albert Einstein was born in Ulm, Germany.\n\nHe died in Princeton."
        );
    }

    #[test]
    fn test_missing_contexts_default_to_empty() {
        let sample: EvaluationSample =
            serde_json::from_str(r#"{"user_input": "q", "response": "r"}"#).unwrap();
        assert!(sample.retrieved_contexts().is_empty());
    }
}
