//! Stage result payloads as produced by the council backend.
//!
//! The view passes these through to the stage sub-renderers unchanged; only the
//! label rewriting helpers below interpret their contents.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One council member's answer from the first stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage1Response {
    pub model: String,
    #[serde(default)]
    pub response: String,
}

/// One council member's peer evaluation from the second stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage2Ranking {
    pub model: String,
    #[serde(default)]
    pub ranking: String,
    /// Anonymous labels in ranked order, e.g. `["Response B", "Response A"]`.
    #[serde(default)]
    pub parsed_ranking: Vec<String>,
}

/// The chairman's final answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage3Synthesis {
    pub model: String,
    #[serde(default)]
    pub response: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRanking {
    pub model: String,
    pub average_rank: f64,
    #[serde(default)]
    pub rankings_count: u32,
}

/// Turn metadata consumed by the ranking view only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CouncilMetadata {
    #[serde(default)]
    pub label_to_model: BTreeMap<String, String>,
    #[serde(default)]
    pub aggregate_rankings: Vec<AggregateRanking>,
}

/// Second path segment of a model id: `openai/gpt-4o` becomes `gpt-4o`.
pub fn short_model_name(model: &str) -> &str {
    match model.split('/').nth(1) {
        Some(name) if !name.is_empty() => name,
        _ => model,
    }
}

/// Replaces anonymous response labels with the bold short name of the model behind them.
pub fn deanonymize(text: &str, label_to_model: &BTreeMap<String, String>) -> String {
    // Longer labels first so "Response A1" is never split by "Response A".
    let mut labels = label_to_model.iter().collect::<Vec<_>>();
    labels.sort_by(|(left, _), (right, _)| right.len().cmp(&left.len()));

    let mut result = text.to_string();
    for (label, model) in labels {
        result = result.replace(label.as_str(), &format!("**{}**", short_model_name(model)));
    }
    result
}
