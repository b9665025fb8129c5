use std::collections::BTreeMap;

use council_core::{
    AggregateRanking, Stage, Stage2Ranking, TurnId, deanonymize, short_model_name,
};
use gpui::prelude::FluentBuilder;
use gpui::*;
use gpui_component::{ActiveTheme, h_flex, label::Label, v_flex};

use super::{TabSelectHandler, clamp_tab, markdown, render_tabs, stage_card};

const EXPLANATION: &str = "Each model evaluated all responses (anonymized as Response A, B, C, etc.) and provided rankings. \
Below, model names are shown in bold for readability, but the original evaluation used anonymous labels.";

pub struct RankingInput<'a> {
    pub turn_id: TurnId,
    pub rankings: &'a [Stage2Ranking],
    pub label_to_model: Option<&'a BTreeMap<String, String>>,
    pub aggregate_rankings: &'a [AggregateRanking],
}

pub fn render(
    input: RankingInput<'_>,
    selected: usize,
    on_select: TabSelectHandler,
    cx: &App,
) -> AnyElement {
    let theme = cx.theme();
    let id_prefix = format!("stage2-{}", input.turn_id.0);
    let empty_labels = BTreeMap::new();
    let label_to_model = input.label_to_model.unwrap_or(&empty_labels);
    let selected = clamp_tab(selected, input.rankings.len());

    let evaluations = input.rankings.get(selected).map(|active| {
        let parsed = extracted_ranking(&active.parsed_ranking, label_to_model);

        v_flex()
            .w_full()
            .gap_3()
            .child(render_tabs(
                &id_prefix,
                input
                    .rankings
                    .iter()
                    .map(|ranking| short_model_name(&ranking.model).to_string())
                    .collect(),
                selected,
                on_select,
            ))
            .child(
                Label::new(active.model.clone())
                    .text_xs()
                    .text_color(theme.muted_foreground),
            )
            .child(markdown(
                ElementId::Name(SharedString::from(format!("{id_prefix}-evaluation"))),
                deanonymize(&active.ranking, label_to_model),
            ))
            .when(!parsed.is_empty(), |column| {
                column.child(
                    v_flex()
                        .gap_1()
                        .child(Label::new("Extracted Ranking:").text_sm())
                        .children(parsed.into_iter().enumerate().map(|(index, model)| {
                            Label::new(format!("{}. {model}", index + 1)).text_sm()
                        })),
                )
            })
    });

    let aggregate = (!input.aggregate_rankings.is_empty()).then(|| {
        v_flex()
            .w_full()
            .gap_2()
            .pt_3()
            .border_t_1()
            .border_color(theme.border)
            .child(Label::new("Aggregate Rankings (Street Cred)").text_sm())
            .child(
                Label::new("Combined results across all peer evaluations (lower score is better):")
                    .text_xs()
                    .text_color(theme.muted_foreground),
            )
            .children(
                input
                    .aggregate_rankings
                    .iter()
                    .enumerate()
                    .map(|(index, entry)| {
                        h_flex()
                            .w_full()
                            .gap_3()
                            .child(Label::new(format!("#{}", index + 1)).text_sm())
                            .child(
                                div()
                                    .flex_1()
                                    .child(Label::new(short_model_name(&entry.model).to_string()).text_sm()),
                            )
                            .child(
                                Label::new(aggregate_summary(entry))
                                    .text_xs()
                                    .text_color(theme.muted_foreground),
                            )
                    }),
            )
    });

    let body = v_flex()
        .w_full()
        .gap_3()
        .child(
            Label::new(EXPLANATION)
                .text_xs()
                .text_color(theme.muted_foreground),
        )
        .when_some(evaluations, |column, evaluations| column.child(evaluations))
        .when_some(aggregate, |column, aggregate| column.child(aggregate));

    stage_card(Stage::Ranking.title(), body, cx)
}

/// Ranked labels resolved to short model names; unknown labels are shown as is.
pub fn extracted_ranking(
    parsed_ranking: &[String],
    label_to_model: &BTreeMap<String, String>,
) -> Vec<String> {
    parsed_ranking
        .iter()
        .map(|label| match label_to_model.get(label) {
            Some(model) => short_model_name(model).to_string(),
            None => label.clone(),
        })
        .collect()
}

pub fn aggregate_summary(entry: &AggregateRanking) -> String {
    format!(
        "Avg: {:.2} ({} votes)",
        entry.average_rank, entry.rankings_count
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracted_ranking_resolves_known_labels() {
        let labels = BTreeMap::from([
            ("Response A".to_string(), "openai/gpt-4o".to_string()),
            ("Response B".to_string(), "google/gemini-pro".to_string()),
        ]);
        let parsed = vec![
            "Response B".to_string(),
            "Response A".to_string(),
            "Response C".to_string(),
        ];

        assert_eq!(
            extracted_ranking(&parsed, &labels),
            vec!["gemini-pro", "gpt-4o", "Response C"]
        );
    }

    #[test]
    fn aggregate_summary_uses_two_decimals() {
        let entry = AggregateRanking {
            model: "openai/gpt-4o".to_string(),
            average_rank: 1.666_666,
            rankings_count: 3,
        };
        assert_eq!(aggregate_summary(&entry), "Avg: 1.67 (3 votes)");
    }
}
