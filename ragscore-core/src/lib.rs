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

//! Ragscore Core
//!
//! Data model shared by the ragscore metric engine: evaluation samples,
//! judge verdicts, metric results, configuration and retry policy.

pub mod config;
pub mod error;
pub mod eval_result;
pub mod resilience;
pub mod sample;
pub mod sentences;
pub mod telemetry;
pub mod verdict;

pub use config::{
    EngineConfig, EvaluationSettings, FaithfulnessSettings, ProviderSettings,
    ResponseRelevancySettings, ZeroClaimsPolicy,
};
pub use error::{FailureKind, UnknownMetric};
pub use eval_result::{EvaluationReport, MetricName, MetricOutcome, MetricResult};
pub use resilience::RetryPolicy;
pub use sample::EvaluationSample;
pub use sentences::split_sentences;
pub use telemetry::init_tracing;
pub use verdict::{Claim, ClaimVerdict, GeneratedQuestion, RelevanceVerdict};
