use once_cell::sync::Lazy;
use regex::Regex;

pub const GITHUB_PROFILE_PREFIX: &str = "https://github.com/";

static LANGUAGES_NOISE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*languages:\s*\[?|[\[\]']").expect("valid languages cleanup regex")
});
static PROMPT_LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*prompt:\s*").expect("valid prompt label regex"));

/// Strips the `languages:` label, brackets and single quotes.
pub fn clean_languages(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return String::new();
    };
    LANGUAGES_NOISE_RE.replace_all(raw, "").trim().to_string()
}

/// Returns the part of `raw` starting at the GitHub profile prefix, or the
/// profile URL derived from `username` when no such prefix is present.
pub fn clean_github_url(raw: Option<&str>, username: &str) -> String {
    let fallback = format!("{GITHUB_PROFILE_PREFIX}{}", username.to_lowercase());
    let Some(raw) = raw else {
        return fallback;
    };
    match raw.find(GITHUB_PROFILE_PREFIX) {
        Some(index) => raw[index..].to_string(),
        None => fallback,
    }
}

pub fn strip_prompt_label(raw: &str) -> String {
    PROMPT_LABEL_RE.replace(raw, "").trim().to_string()
}
