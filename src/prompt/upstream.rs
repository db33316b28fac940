use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::prompt::sanitize::{clean_github_url, clean_languages, strip_prompt_label};
use crate::prompt::selection::{classify_upstream, normalize, SelectionPair};

const FIELD_DELIMITER: char = '|';
const MIN_FIELDS: usize = 4;
const REPO_COUNT_LABEL: &str = "num_repositories:";
const ANIMAL_SELECTION_LABEL: &str = "animal_selection:";

/// Fields pulled out of one pipe-delimited workflow message.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamRecord {
    pub raw_languages: String,
    pub prompt: String,
    pub raw_github_url: String,
    pub repo_count: Option<u32>,
    pub animal_selection: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamMessage {
    Record(UpstreamRecord),
    Unparseable { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptSource {
    Cache,
    Langflow,
    ImageAnalysis,
}

impl PromptSource {
    pub fn as_str(self) -> &'static str {
        match self {
            PromptSource::Cache => "cache",
            PromptSource::Langflow => "langflow",
            PromptSource::ImageAnalysis => "image_analysis",
        }
    }
}

/// Sanitized inputs for prompt composition.
#[derive(Debug, Clone)]
pub struct PromptDetails {
    pub base_prompt: String,
    pub languages: String,
    pub github_url: String,
    pub repo_count: Option<u32>,
    pub selection: Vec<SelectionPair>,
    pub source: PromptSource,
}

pub fn parse_upstream_message(raw: &str) -> UpstreamMessage {
    let parts: Vec<&str> = raw.split(FIELD_DELIMITER).map(str::trim).collect();
    if parts.len() < MIN_FIELDS {
        return UpstreamMessage::Unparseable {
            reason: format!(
                "expected at least {MIN_FIELDS} '|' separated fields, found {}",
                parts.len()
            ),
        };
    }

    let repo_count = find_labelled(&parts, REPO_COUNT_LABEL).and_then(parse_repo_count);
    let animal_selection =
        find_labelled(&parts, ANIMAL_SELECTION_LABEL).and_then(parse_animal_selection);

    UpstreamMessage::Record(UpstreamRecord {
        raw_languages: parts[0].to_string(),
        prompt: strip_prompt_label(parts[1]),
        raw_github_url: parts[2].to_string(),
        repo_count,
        animal_selection,
    })
}

fn find_labelled<'a>(parts: &[&'a str], label: &str) -> Option<&'a str> {
    parts
        .iter()
        .find_map(|part| part.strip_prefix(label))
        .map(str::trim)
}

fn parse_repo_count(value: &str) -> Option<u32> {
    let digits: String = value.chars().take_while(|ch| ch.is_ascii_digit()).collect();
    digits.parse::<u32>().ok()
}

fn parse_animal_selection(value: &str) -> Option<Value> {
    if !value.starts_with('[') {
        return None;
    }
    match serde_json::from_str::<Value>(&value.replace('\'', "\"")) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            warn!("Could not parse animal_selection {value:?}: {err}");
            None
        }
    }
}

impl UpstreamRecord {
    pub fn into_prompt_details(self, username: &str, source: PromptSource) -> PromptDetails {
        let selection = normalize(&classify_upstream(self.animal_selection.as_ref()));
        PromptDetails {
            base_prompt: self.prompt,
            languages: clean_languages(Some(&self.raw_languages)),
            github_url: clean_github_url(Some(&self.raw_github_url), username),
            repo_count: self.repo_count,
            selection,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESSAGE: &str = "languages: ['Rust','Go'] | prompt: a crab-gopher chimera | github_user_name_url: https://github.com/beth | num_repositories: 42 | animal_selection: [['crab', 'for Rust'], ['gopher', 'for Go']]";

    fn record(raw: &str) -> UpstreamRecord {
        match parse_upstream_message(raw) {
            UpstreamMessage::Record(record) => record,
            UpstreamMessage::Unparseable { reason } => panic!("unparseable: {reason}"),
        }
    }

    #[test]
    fn parses_labelled_fields() {
        let record = record(MESSAGE);
        assert_eq!(record.raw_languages, "languages: ['Rust','Go']");
        assert_eq!(record.prompt, "a crab-gopher chimera");
        assert_eq!(record.repo_count, Some(42));
        assert!(record.animal_selection.is_some());
    }

    #[test]
    fn too_few_fields_are_unparseable() {
        assert!(matches!(
            parse_upstream_message("languages: [] | prompt"),
            UpstreamMessage::Unparseable { .. }
        ));
        assert!(matches!(
            parse_upstream_message(""),
            UpstreamMessage::Unparseable { .. }
        ));
    }

    #[test]
    fn broken_optional_fields_degrade_to_none() {
        let record = record("langs | a fox | url | num_repositories: many | animal_selection: [oops");
        assert_eq!(record.repo_count, None);
        assert_eq!(record.animal_selection, None);
    }

    #[test]
    fn details_are_sanitized() {
        let details = record(MESSAGE).into_prompt_details("beth", PromptSource::Langflow);
        assert_eq!(details.languages, "Rust,Go");
        assert_eq!(details.github_url, "https://github.com/beth");
        assert_eq!(details.base_prompt, "a crab-gopher chimera");
        assert_eq!(
            details.selection,
            vec![
                SelectionPair::new("crab", "for Rust"),
                SelectionPair::new("gopher", "for Go"),
            ]
        );
        assert_eq!(details.source, PromptSource::Langflow);
    }

    #[test]
    fn one_element_pairs_keep_their_own_slot() {
        let details = record(
            "langs | a fox | url | num_repositories: 2 | animal_selection: [['crab for Rust'], ['gopher', 'for Go']]",
        )
        .into_prompt_details("beth", PromptSource::Langflow);
        assert_eq!(
            details.selection,
            vec![
                SelectionPair::single("crab for Rust"),
                SelectionPair::new("gopher", "for Go"),
            ]
        );
    }

    #[test]
    fn shapeless_selection_is_flattened_into_entries() {
        let details = record(
            "langs | a fox | url | num_repositories: 2 | animal_selection: [{'cat': 'for JS'}, 'dog for Go']",
        )
        .into_prompt_details("beth", PromptSource::Langflow);
        assert_eq!(
            details.selection,
            vec![
                SelectionPair::single("cat: for JS"),
                SelectionPair::single("dog for Go"),
            ]
        );
    }

    #[test]
    fn unusable_url_falls_back_to_username() {
        let details = record("l | p | none | num_repositories: 1")
            .into_prompt_details("Beth", PromptSource::Cache);
        assert_eq!(details.github_url, "https://github.com/beth");
        assert!(details.selection.is_empty());
    }
}
