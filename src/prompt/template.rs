use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::prompt::selection::{key_items, SelectionPair};

pub const NAME_TOKEN: &str = "[Name]";
pub const TITLE_TOKEN: &str = "[Title]";
pub const AGE_TOKEN: &str = "[X]";
pub const KEY_ITEMS_TOKEN: &str = "[key items]";
pub const CHARACTER_TOKEN: &str = "[character description]";
pub const PERSON_FEATURES_TOKEN: &str = "[person_features]";

pub const PLACEHOLDER_TOKENS: [&str; 6] = [
    NAME_TOKEN,
    TITLE_TOKEN,
    AGE_TOKEN,
    KEY_ITEMS_TOKEN,
    CHARACTER_TOKEN,
    PERSON_FEATURES_TOKEN,
];

static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| {
    let alternation = PLACEHOLDER_TOKENS
        .iter()
        .map(|token| regex::escape(token))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&alternation).expect("valid placeholder regex")
});

pub const BEAST_TITLE: &str = "Code Beast";
pub const AGE_LABEL: &str = "All";

#[derive(Debug, Clone, Default)]
pub struct PromptContext {
    pub username: String,
    pub figure_description: String,
    pub selection: Vec<SelectionPair>,
    pub base_concept: String,
    pub person_features: Option<String>,
}

/// First character ASCII-uppercased, the rest untouched.
pub fn display_name(username: &str) -> String {
    let mut chars = username.chars();
    match chars.next() {
        Some(first) => {
            let mut name = String::with_capacity(username.len());
            name.push(first.to_ascii_uppercase());
            name.push_str(chars.as_str());
            name
        }
        None => String::new(),
    }
}

/// Removes placeholder tokens from a value before it is inserted, repeating
/// until removal no longer exposes a new token.
fn strip_placeholders(value: &str) -> String {
    let mut cleaned = value.to_string();
    while PLACEHOLDER_RE.is_match(&cleaned) {
        cleaned = PLACEHOLDER_RE.replace_all(&cleaned, "").into_owned();
    }
    cleaned
}

/// Fills every placeholder occurrence in `template` in a single pass.
pub fn build_prompt(template: &str, ctx: &PromptContext) -> String {
    let description = if ctx.figure_description.trim().is_empty() {
        ctx.base_concept.as_str()
    } else {
        ctx.figure_description.as_str()
    };
    let description = strip_placeholders(description);
    let name = strip_placeholders(&display_name(&ctx.username));
    let items = strip_placeholders(&key_items(&ctx.selection));
    let features = strip_placeholders(
        ctx.person_features
            .as_deref()
            .map(str::trim)
            .unwrap_or_default(),
    )
    .trim()
    .to_string();

    PLACEHOLDER_RE
        .replace_all(template, |caps: &Captures| match &caps[0] {
            NAME_TOKEN => name.clone(),
            TITLE_TOKEN => BEAST_TITLE.to_string(),
            AGE_TOKEN => AGE_LABEL.to_string(),
            KEY_ITEMS_TOKEN => items.clone(),
            CHARACTER_TOKEN => description.clone(),
            PERSON_FEATURES_TOKEN => features.clone(),
            _ => String::new(),
        })
        .into_owned()
}

pub fn leftover_placeholders(prompt: &str) -> Vec<&'static str> {
    PLACEHOLDER_TOKENS
        .iter()
        .copied()
        .filter(|token| prompt.contains(token))
        .collect()
}
