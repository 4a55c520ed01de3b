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

//! Intermediate judgments produced while scoring one sample.
//!
//! None of these outlive a single evaluation call; they are kept serializable
//! so the metric breakdown can be attached to a result.

use serde::{Deserialize, Serialize};

/// Relevance of one retrieved chunk to the user input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelevanceVerdict {
    /// 1-indexed retrieval rank
    pub rank: usize,
    pub relevant: bool,
}

impl RelevanceVerdict {
    pub fn new(rank: usize, relevant: bool) -> Self {
        Self { rank, relevant }
    }
}

/// Question the judge believes the response answers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedQuestion {
    pub question: String,
    /// True when the response is evasive ("I don't know", "it depends", ...)
    #[serde(default)]
    pub noncommittal: bool,
}

impl GeneratedQuestion {
    pub fn new(question: impl Into<String>, noncommittal: bool) -> Self {
        Self {
            question: question.into(),
            noncommittal,
        }
    }
}

/// Binary support verdict for a claim. There is no partial credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimVerdict {
    Supported,
    Unsupported,
}

impl ClaimVerdict {
    pub fn from_supported(supported: bool) -> Self {
        if supported {
            ClaimVerdict::Supported
        } else {
            ClaimVerdict::Unsupported
        }
    }

    pub fn is_supported(&self) -> bool {
        matches!(self, ClaimVerdict::Supported)
    }
}

/// Atomic factual statement extracted from one sentence of the response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    /// 0-indexed sentence of the response this claim came from
    pub sentence_index: usize,
    pub statement: String,
    pub verdict: ClaimVerdict,
    /// Set when verification kept failing and the verdict defaulted to unsupported
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub verification_failed: bool,
}

impl Claim {
    pub fn verified(sentence_index: usize, statement: impl Into<String>, verdict: ClaimVerdict) -> Self {
        Self {
            sentence_index,
            statement: statement.into(),
            verdict,
            verification_failed: false,
        }
    }

    pub fn unverifiable(sentence_index: usize, statement: impl Into<String>) -> Self {
        Self {
            sentence_index,
            statement: statement.into(),
            verdict: ClaimVerdict::Unsupported,
            verification_failed: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unverifiable_claim_counts_as_unsupported() {
        let claim = Claim::unverifiable(0, "The sky is green");
        assert_eq!(claim.verdict, ClaimVerdict::Unsupported);
        assert!(claim.verification_failed);

        let json = serde_json::to_value(&claim).unwrap();
        assert_eq!(json["verdict"], "unsupported");
        assert_eq!(json["verification_failed"], true);
    }

    #[test]
    fn test_verified_claim_omits_failure_flag() {
        let claim = Claim::verified(1, "Paris is in France", ClaimVerdict::Supported);
        let json = serde_json::to_value(&claim).unwrap();
        assert!(json.get("verification_failed").is_none());
        assert!(claim.verdict.is_supported());
    }
}
