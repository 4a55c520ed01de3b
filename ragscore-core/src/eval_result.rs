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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{FailureKind, UnknownMetric};

/// The metrics the engine knows how to compute
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricName {
    ContextPrecision,
    ResponseRelevancy,
    Faithfulness,
}

impl MetricName {
    pub const ALL: [MetricName; 3] = [
        MetricName::ContextPrecision,
        MetricName::ResponseRelevancy,
        MetricName::Faithfulness,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::ContextPrecision => "context_precision",
            MetricName::ResponseRelevancy => "response_relevancy",
            MetricName::Faithfulness => "faithfulness",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricName {
    type Err = UnknownMetric;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "context_precision" => Ok(MetricName::ContextPrecision),
            "response_relevancy" | "answer_relevancy" | "answer_relevance" => {
                Ok(MetricName::ResponseRelevancy)
            }
            "faithfulness" => Ok(MetricName::Faithfulness),
            _ => Err(UnknownMetric(s.to_string())),
        }
    }
}

/// Either a score in [0, 1] or an explicit failure marker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MetricOutcome {
    Score { value: f64 },
    Failed { kind: FailureKind, reason: String },
}

/// Result for one metric on one sample
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricResult {
    pub metric: MetricName,

    pub outcome: MetricOutcome,

    /// Human-readable summary of how the score was reached
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,

    /// Per-metric breakdown (verdicts, generated questions, claims)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    /// Wall-clock duration of the metric in milliseconds
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

impl MetricResult {
    /// Successful result. The score is clamped into [0, 1].
    ///
    /// A NaN score is not a score: it yields an `internal` failure instead.
    pub fn scored(metric: MetricName, score: f64) -> Self {
        if score.is_nan() {
            return Self::failed(metric, FailureKind::Internal, "metric produced a NaN score");
        }
        let value = score.clamp(0.0, 1.0);
        Self {
            metric,
            outcome: MetricOutcome::Score { value },
            explanation: None,
            details: None,
            duration_ms: None,
        }
    }

    pub fn failed(metric: MetricName, kind: FailureKind, reason: impl Into<String>) -> Self {
        Self {
            metric,
            outcome: MetricOutcome::Failed {
                kind,
                reason: reason.into(),
            },
            explanation: None,
            details: None,
            duration_ms: None,
        }
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn score(&self) -> Option<f64> {
        match self.outcome {
            MetricOutcome::Score { value } => Some(value),
            MetricOutcome::Failed { .. } => None,
        }
    }

    pub fn failure(&self) -> Option<(FailureKind, &str)> {
        match &self.outcome {
            MetricOutcome::Failed { kind, reason } => Some((*kind, reason.as_str())),
            MetricOutcome::Score { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, MetricOutcome::Failed { .. })
    }
}

/// All metric results for one sample
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Correlates log lines of one evaluation call
    pub run_id: Uuid,
    pub evaluated_at: DateTime<Utc>,
    pub results: BTreeMap<MetricName, MetricResult>,
}

impl EvaluationReport {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            evaluated_at: Utc::now(),
            results: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, result: MetricResult) {
        self.results.insert(result.metric, result);
    }

    pub fn get(&self, metric: MetricName) -> Option<&MetricResult> {
        self.results.get(&metric)
    }

    pub fn score(&self, metric: MetricName) -> Option<f64> {
        self.get(metric).and_then(MetricResult::score)
    }

    /// Metric name to score, successes only
    pub fn scores(&self) -> HashMap<String, f64> {
        self.results
            .iter()
            .filter_map(|(name, result)| result.score().map(|s| (name.to_string(), s)))
            .collect()
    }

    pub fn failures(&self) -> Vec<&MetricResult> {
        self.results.values().filter(|r| r.is_failed()).collect()
    }

    /// True when every recorded metric produced a score
    pub fn is_complete(&self) -> bool {
        self.results.values().all(|r| !r.is_failed())
    }
}
