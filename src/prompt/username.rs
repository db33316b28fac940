use once_cell::sync::Lazy;
use regex::Regex;

const MAX_USERNAME_LEN: usize = 39;

static USERNAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9]+(?:-[A-Za-z0-9]+)*$").expect("valid username regex")
});

/// ASCII alphanumerics with single internal hyphens, 1 to 39 characters.
pub fn is_valid_github_username(value: &str) -> bool {
    !value.is_empty() && value.len() <= MAX_USERNAME_LEN && USERNAME_RE.is_match(value)
}

pub fn normalize_username(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Validates the trimmed value and returns its normalized form.
pub fn parse_username(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if is_valid_github_username(trimmed) {
        Some(normalize_username(trimmed))
    } else {
        None
    }
}
