use crate::config::{
    ACTION_FIGURE_PROMPT_TEMPLATE, ACTION_FIGURE_PROMPT_WITH_IMAGE_TEMPLATE, PROMPT_PREFIX,
};
use crate::prompt::emotion::Emotion;
use crate::prompt::template::{build_prompt, PromptContext};
use crate::prompt::upstream::PromptDetails;

/// Final text handed to the image generator.
pub fn compose_prompt(
    emotion: Emotion,
    username: &str,
    details: &PromptDetails,
    person_features: Option<&str>,
) -> String {
    let person_features = person_features
        .map(str::trim)
        .filter(|features| !features.is_empty());

    if emotion == Emotion::ActionFigure {
        let template = if person_features.is_some() {
            ACTION_FIGURE_PROMPT_WITH_IMAGE_TEMPLATE
        } else {
            ACTION_FIGURE_PROMPT_TEMPLATE
        };
        let ctx = PromptContext {
            username: username.to_string(),
            figure_description: details.base_prompt.clone(),
            selection: details.selection.clone(),
            base_concept: details.base_prompt.clone(),
            person_features: person_features.map(str::to_string),
        };
        return build_prompt(template, &ctx);
    }

    let description = match person_features {
        Some(features) => format!(
            "{}, with features resembling: {features}.",
            details.base_prompt
        ),
        None => details.base_prompt.clone(),
    };
    format!("A {} {} {}", emotion.label(), PROMPT_PREFIX, description)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::selection::SelectionPair;
    use crate::prompt::template::leftover_placeholders;
    use crate::prompt::upstream::PromptSource;

    fn details() -> PromptDetails {
        PromptDetails {
            base_prompt: "a crab-gopher chimera".to_string(),
            languages: "Rust,Go".to_string(),
            github_url: "https://github.com/beth".to_string(),
            repo_count: Some(3),
            selection: vec![SelectionPair::new("crab", "for Rust")],
            source: PromptSource::Cache,
        }
    }

    #[test]
    fn action_figure_uses_plain_template_without_features() {
        let prompt = compose_prompt(Emotion::ActionFigure, "beth", &details(), None);
        assert!(prompt.contains("realistic human based on a crab-gopher chimera"));
        assert!(prompt.contains("(crab for Rust)"));
        assert!(leftover_placeholders(&prompt).is_empty());
    }

    #[test]
    fn action_figure_uses_image_template_with_features() {
        let prompt = compose_prompt(Emotion::ActionFigure, "beth", &details(), Some("female, glasses"));
        assert!(prompt.contains("subtly inspired by:\nfemale, glasses."));
        assert!(leftover_placeholders(&prompt).is_empty());
    }

    #[test]
    fn blank_features_count_as_missing() {
        let prompt = compose_prompt(Emotion::ActionFigure, "beth", &details(), Some("  "));
        assert!(!prompt.contains("subtly inspired by"));
    }

    #[test]
    fn other_emotions_prefix_the_style() {
        let prompt = compose_prompt(Emotion::Zombie, "beth", &details(), None);
        assert!(prompt.starts_with("A Zombie Kawaii bizarre chimera"));
        assert!(prompt.ends_with("a crab-gopher chimera"));
    }

    #[test]
    fn other_emotions_append_features() {
        let prompt = compose_prompt(Emotion::Legendary, "beth", &details(), Some("male, beard"));
        assert!(prompt.ends_with("a crab-gopher chimera, with features resembling: male, beard."));
    }
}
