use crate::models::{FieldValue, Record};
use crate::selector::collapse_whitespace;
use crate::utils::resolve_url;

const URL_HINTS: &[&str] = &["url", "link", "href", "src", "image", "img", "photo", "thumbnail"];
const PRICE_HINTS: &[&str] = &["price", "cost", "amount", "fee"];
const ZERO_WIDTH: &[char] = &['\u{200b}', '\u{200c}', '\u{200d}', '\u{feff}'];

/// Post-extraction value cleanup. Never adds or removes records.
pub struct Normalizer {
    base_url: String,
}

fn hinted(name: &str, hints: &[&str]) -> bool {
    let name = name.to_lowercase();
    hints.iter().any(|hint| name.contains(hint))
}

pub fn clean_text(text: &str) -> String {
    let stripped: String = text
        .chars()
        .filter(|c| !ZERO_WIDTH.contains(c))
        .map(|c| match c {
            '\u{201c}' | '\u{201d}' => '"',
            '\u{2018}' | '\u{2019}' => '\'',
            other => other,
        })
        .collect();
    collapse_whitespace(&stripped)
}

impl Normalizer {
    /// `base_url` is the page the records came from
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
        }
    }

    fn normalize_text(&self, field: &str, text: &str) -> Option<String> {
        let mut value = clean_text(text);
        if value.is_empty() {
            return None;
        }

        if hinted(field, URL_HINTS) {
            let lower = value.to_ascii_lowercase();
            let absolute = ["http://", "https://", "data:", "javascript:", "mailto:"]
                .iter()
                .any(|scheme| lower.starts_with(scheme));
            if !absolute {
                if let Some(resolved) = resolve_url(&self.base_url, &value) {
                    value = resolved;
                }
            }
        }

        if hinted(field, PRICE_HINTS) {
            value.retain(|c| !c.is_whitespace());
        }

        Some(value)
    }

    pub fn normalize_record(&self, record: &mut Record) {
        for (name, value) in record.iter_mut() {
            let normalized = match &*value {
                FieldValue::Text(text) => match self.normalize_text(name, text) {
                    Some(text) => FieldValue::Text(text),
                    None => FieldValue::Null,
                },
                FieldValue::List(items) => FieldValue::List(
                    items
                        .iter()
                        .filter_map(|item| self.normalize_text(name, item))
                        .collect(),
                ),
                FieldValue::Null => FieldValue::Null,
            };
            *value = normalized;
        }
    }

    pub fn normalize_records(&self, records: &mut [Record]) {
        for record in records.iter_mut() {
            self.normalize_record(record);
        }
    }
}
