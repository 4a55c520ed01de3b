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

//! Built-in RAG metric evaluators

pub mod context_precision;
pub mod faithfulness;
pub mod response_relevancy;

#[cfg(test)]
pub(crate) mod test_support;

pub use context_precision::{ContextPrecisionEvaluator, ContextPrecisionResult};
pub use faithfulness::{FaithfulnessEvaluator, FaithfulnessResult};
pub use response_relevancy::{
    cosine_similarity, ResponseRelevancyEvaluator, ResponseRelevancyResult,
};

use crate::{EvalError, MetricScore};
use serde::Serialize;

/// Package a typed result as a [`MetricScore`]
pub(crate) fn to_metric_score<T: Serialize>(
    score: f64,
    explanation: String,
    result: &T,
) -> Result<MetricScore, EvalError> {
    if score.is_nan() {
        return Err(EvalError::Internal(format!("NaN score ({explanation})")));
    }
    let details = serde_json::to_value(result)
        .map_err(|e| EvalError::Internal(format!("serializing metric details: {e}")))?;
    Ok(MetricScore {
        score: score.clamp(0.0, 1.0),
        explanation,
        details,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragscore_core::FailureKind;

    #[test]
    fn test_nan_score_is_an_internal_error() {
        let err = to_metric_score(f64::NAN, "mean of nothing".to_string(), &()).unwrap_err();
        assert_eq!(err.kind(), FailureKind::Internal);

        let ok = to_metric_score(1.5, "over".to_string(), &()).unwrap();
        assert_eq!(ok.score, 1.0);
    }
}
