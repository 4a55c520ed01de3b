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

//! Failure taxonomy shared by every metric.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Category of a per-metric failure, as reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Network error or timeout talking to the judge or embedding provider
    ProviderUnavailable,
    /// Judge output did not match the expected schema
    SchemaViolation,
    /// Input for which the metric is undefined under the configured policy
    DegenerateInput,
    /// Provider rate limit / backpressure
    ConcurrencyLimitExceeded,
    /// Evaluation was cancelled by the caller
    Cancelled,
    /// Bug or panic inside the engine
    Internal,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::ProviderUnavailable => "provider_unavailable",
            FailureKind::SchemaViolation => "schema_violation",
            FailureKind::DegenerateInput => "degenerate_input",
            FailureKind::ConcurrencyLimitExceeded => "concurrency_limit_exceeded",
            FailureKind::Cancelled => "cancelled",
            FailureKind::Internal => "internal",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a metric name cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown metric: {0}")]
pub struct UnknownMetric(pub String);
