use serde::Serialize;
use serde_json::{Map, Value};

/// Marker that makes a selection string self-describing ("cat for JavaScript").
pub const SELECTION_SEPARATOR: &str = " for ";

const FALLBACK_JOINER: &str = ", ";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectionPair {
    pub item: String,
    pub qualifier: String,
}

impl SelectionPair {
    pub fn new(item: impl Into<String>, qualifier: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            qualifier: qualifier.into(),
        }
    }

    pub fn single(item: impl Into<String>) -> Self {
        Self::new(item, String::new())
    }

    /// Non-empty fields joined by a single space.
    pub fn display(&self) -> String {
        [self.item.as_str(), self.qualifier.as_str()]
            .into_iter()
            .filter(|field| !field.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// `[item]` when the qualifier is empty, `[item, qualifier]` otherwise.
    pub fn to_fields(&self) -> Vec<String> {
        if self.qualifier.is_empty() {
            vec![self.item.clone()]
        } else {
            vec![self.item.clone(), self.qualifier.clone()]
        }
    }
}

/// Every shape the upstream animal selection has been seen in.
#[derive(Debug, Clone, PartialEq)]
pub enum RawSelection {
    Absent,
    Pairs(Vec<Vec<String>>),
    Tagged(Vec<String>),
    Flat(Vec<String>),
    Text(String),
    Object(Map<String, Value>),
    Mixed(Vec<Value>),
}

impl RawSelection {
    pub fn from_json(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => RawSelection::Absent,
            Some(Value::String(text)) => {
                if text.trim().is_empty() {
                    RawSelection::Absent
                } else {
                    RawSelection::Text(text.clone())
                }
            }
            Some(Value::Object(map)) => RawSelection::Object(map.clone()),
            Some(Value::Array(items)) => classify_array(items),
            Some(other) => RawSelection::Mixed(vec![other.clone()]),
        }
    }

    /// Builds a selection from the output of [`filter_entries`].
    pub fn from_entries(entries: Option<Vec<String>>) -> Self {
        match entries {
            None => RawSelection::Absent,
            Some(entries) => classify_strings(entries),
        }
    }
}

fn pair_like(value: &Value) -> Option<Vec<String>> {
    let Value::Array(fields) = value else {
        return None;
    };
    if fields.is_empty() || fields.len() > 2 {
        return None;
    }
    fields
        .iter()
        .map(|field| field.as_str().map(str::to_string))
        .collect()
}

fn classify_array(items: &[Value]) -> RawSelection {
    if items.is_empty() {
        return RawSelection::Pairs(Vec::new());
    }

    let pairs: Option<Vec<Vec<String>>> = items.iter().map(pair_like).collect();
    if let Some(pairs) = pairs {
        return RawSelection::Pairs(pairs);
    }

    let strings: Option<Vec<String>> = items
        .iter()
        .map(|item| item.as_str().map(str::to_string))
        .collect();
    match strings {
        Some(strings) => classify_strings(strings),
        None => RawSelection::Mixed(items.to_vec()),
    }
}

fn classify_strings(strings: Vec<String>) -> RawSelection {
    if strings.is_empty() {
        return RawSelection::Pairs(Vec::new());
    }
    if strings
        .iter()
        .all(|entry| entry.contains(SELECTION_SEPARATOR))
    {
        return RawSelection::Tagged(strings);
    }
    if strings
        .iter()
        .all(|entry| !entry.contains(SELECTION_SEPARATOR))
    {
        return RawSelection::Flat(strings);
    }
    RawSelection::Mixed(strings.into_iter().map(Value::String).collect())
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        Value::Array(items) => items
            .iter()
            .map(render_value)
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
        Value::Object(map) => render_object(map).join(FALLBACK_JOINER),
        other => other.to_string(),
    }
}

fn render_object(map: &Map<String, Value>) -> Vec<String> {
    map.iter()
        .map(|(key, value)| format!("{key}: {}", render_value(value)))
        .collect()
}

fn fallback_pair(parts: Vec<String>) -> Vec<SelectionPair> {
    let joined = parts
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(FALLBACK_JOINER);
    vec![SelectionPair::single(joined)]
}

/// Maps any selection shape onto ordered `(item, qualifier)` pairs.
pub fn normalize(raw: &RawSelection) -> Vec<SelectionPair> {
    match raw {
        RawSelection::Absent => Vec::new(),
        RawSelection::Pairs(pairs) => pairs
            .iter()
            .map(|fields| {
                let item = fields.first().cloned().unwrap_or_default();
                let qualifier = fields.get(1).cloned().unwrap_or_default();
                SelectionPair::new(item, qualifier)
            })
            .collect(),
        // The separator belongs to the payload, so these are never split.
        RawSelection::Tagged(entries) => entries
            .iter()
            .map(|entry| SelectionPair::single(entry.clone()))
            .collect(),
        RawSelection::Flat(entries) => entries
            .chunks(2)
            .map(|chunk| {
                SelectionPair::new(chunk[0].clone(), chunk.get(1).cloned().unwrap_or_default())
            })
            .collect(),
        RawSelection::Text(text) => vec![SelectionPair::single(text.trim())],
        RawSelection::Object(map) => fallback_pair(render_object(map)),
        RawSelection::Mixed(items) => fallback_pair(items.iter().map(render_value).collect()),
    }
}

/// Flattens one level, trims strings, drops blanks and expands objects into
/// `"key: value"` entries. Returns `None` when nothing usable is present.
pub fn filter_entries(raw: Option<&Value>) -> Option<Vec<String>> {
    match raw? {
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(vec![trimmed.to_string()])
            }
        }
        Value::Array(items) => {
            let mut entries = Vec::new();
            for item in flatten_once(items) {
                match item {
                    Value::String(text) => {
                        let trimmed = text.trim();
                        if !trimmed.is_empty() {
                            entries.push(trimmed.to_string());
                        }
                    }
                    Value::Object(map) => entries.extend(render_object(map)),
                    _ => {}
                }
            }
            Some(entries)
        }
        _ => None,
    }
}

/// Classifies a decoded upstream value, flattening it through
/// [`filter_entries`] only when it has no recognizable shape of its own.
pub fn classify_upstream(value: Option<&Value>) -> RawSelection {
    match RawSelection::from_json(value) {
        RawSelection::Object(_) | RawSelection::Mixed(_) => {
            RawSelection::from_entries(filter_entries(value))
        }
        classified => classified,
    }
}

fn flatten_once(items: &[Value]) -> Vec<&Value> {
    let mut flattened = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::Array(inner) => flattened.extend(inner.iter()),
            other => flattened.push(other),
        }
    }
    flattened
}

/// Comma-joined key items for the prompt template.
pub fn key_items(selection: &[SelectionPair]) -> String {
    selection
        .iter()
        .map(SelectionPair::display)
        .filter(|entry| !entry.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn normalize_json(value: Value) -> Vec<SelectionPair> {
        normalize(&RawSelection::from_json(Some(&value)))
    }

    #[test]
    fn pairs_are_returned_unchanged() {
        let pairs = normalize_json(json!([["cat", "for JS"], ["dog", "for Python"]]));
        assert_eq!(
            pairs,
            vec![
                SelectionPair::new("cat", "for JS"),
                SelectionPair::new("dog", "for Python"),
            ]
        );
    }

    #[test]
    fn strings_with_separator_become_single_element_pairs() {
        let pairs = normalize_json(json!(["cat for JS", "dog for Python"]));
        assert_eq!(
            pairs,
            vec![
                SelectionPair::single("cat for JS"),
                SelectionPair::single("dog for Python"),
            ]
        );
        assert_eq!(pairs[0].to_fields(), vec!["cat for JS".to_string()]);
    }

    #[test]
    fn flat_strings_are_grouped_in_order() {
        let pairs = normalize_json(json!(["cat", "JS", "dog", "Python"]));
        assert_eq!(
            pairs,
            vec![
                SelectionPair::new("cat", "JS"),
                SelectionPair::new("dog", "Python"),
            ]
        );
    }

    #[test]
    fn odd_flat_list_leaves_last_qualifier_empty() {
        let pairs = normalize_json(json!(["cat", "JS", "dog"]));
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[1], SelectionPair::new("dog", ""));
    }

    #[test]
    fn two_plain_strings_form_one_pair() {
        assert_eq!(
            normalize_json(json!(["cat", "42"])),
            vec![SelectionPair::new("cat", "42")]
        );
    }

    #[test]
    fn absent_selection_is_empty() {
        assert!(normalize(&RawSelection::from_json(None)).is_empty());
        assert!(normalize_json(Value::Null).is_empty());
        assert!(normalize_json(json!([])).is_empty());
    }

    #[test]
    fn mixed_shapes_collapse_into_one_pair() {
        let pairs = normalize_json(json!(["cat", {"dog": "for Python"}, 7]));
        assert_eq!(
            pairs,
            vec![SelectionPair::single("cat, dog: for Python, 7")]
        );
    }

    #[test]
    fn separator_mixed_with_plain_strings_falls_back() {
        let raw = RawSelection::from_json(Some(&json!(["cat for JS", "dog"])));
        assert!(matches!(raw, RawSelection::Mixed(_)));
        assert_eq!(
            normalize(&raw),
            vec![SelectionPair::single("cat for JS, dog")]
        );
    }

    #[test]
    fn single_string_becomes_one_pair() {
        assert_eq!(
            normalize_json(json!("  cat for JS ")),
            vec![SelectionPair::single("cat for JS")]
        );
    }

    #[test]
    fn filter_expands_objects_and_drops_blanks() {
        let entries = filter_entries(Some(&json!([{"cat": "for JS"}, {"dog": "for Python"}])));
        assert_eq!(
            entries,
            Some(vec!["cat: for JS".to_string(), "dog: for Python".to_string()])
        );

        let entries = filter_entries(Some(&json!(["cat", "", "  dog  "])));
        assert_eq!(entries, Some(vec!["cat".to_string(), "dog".to_string()]));
    }

    #[test]
    fn filter_flattens_one_level() {
        let entries = filter_entries(Some(&json!([["cat", "for JS"], ["dog", "for Python"]])));
        assert_eq!(
            entries,
            Some(vec![
                "cat".to_string(),
                "for JS".to_string(),
                "dog".to_string(),
                "for Python".to_string()
            ])
        );
    }

    #[test]
    fn filter_rejects_empty_and_scalar_input() {
        assert_eq!(filter_entries(Some(&json!(""))), None);
        assert_eq!(filter_entries(Some(&json!(12))), None);
        assert_eq!(filter_entries(None), None);
        assert_eq!(filter_entries(Some(&json!([]))), Some(Vec::new()));
    }

    #[test]
    fn filtered_pairs_normalize_back_to_pairs() {
        let raw = json!([["cat", "for JavaScript"], ["dog", "for Python"]]);
        let selection = normalize(&RawSelection::from_entries(filter_entries(Some(&raw))));
        assert_eq!(key_items(&selection), "cat for JavaScript, dog for Python");
    }

    #[test]
    fn key_items_skip_empty_fields() {
        let selection = vec![
            SelectionPair::new("cat", "for JavaScript"),
            SelectionPair::single("dog for Python"),
            SelectionPair::new("", ""),
        ];
        assert_eq!(key_items(&selection), "cat for JavaScript, dog for Python");
    }

    #[test]
    fn normalize_is_idempotent() {
        let raw = RawSelection::from_json(Some(&json!(["cat", "JS", "dog"])));
        assert_eq!(normalize(&raw), normalize(&raw));
    }
}
