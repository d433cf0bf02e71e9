use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use url::Url;

use crate::error::ScrapeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorType {
    #[default]
    Css,
    Xpath,
}

impl fmt::Display for SelectorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectorType::Css => f.write_str("css"),
            SelectorType::Xpath => f.write_str("xpath"),
        }
    }
}

/// Strategy requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScraperType {
    #[default]
    Auto,
    Static,
    Dynamic,
}

impl ScraperType {
    /// The concrete strategy, or `None` when detection has to decide
    pub fn explicit(self) -> Option<Strategy> {
        match self {
            ScraperType::Auto => None,
            ScraperType::Static => Some(Strategy::Static),
            ScraperType::Dynamic => Some(Strategy::Dynamic),
        }
    }
}

/// Strategy that actually fetched the pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Static,
    Dynamic,
}

impl Strategy {
    pub fn other(self) -> Self {
        match self {
            Strategy::Static => Strategy::Dynamic,
            Strategy::Dynamic => Strategy::Static,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Static => f.write_str("static"),
            Strategy::Dynamic => f.write_str("dynamic"),
        }
    }
}

/// One declarative extraction rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub selector: String,
    #[serde(default)]
    pub selector_type: SelectorType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    #[serde(default)]
    pub multiple: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl FieldSpec {
    pub fn css(name: &str, selector: &str) -> Self {
        Self {
            name: name.to_string(),
            selector: selector.to_string(),
            selector_type: SelectorType::Css,
            attribute: None,
            multiple: false,
            default: None,
        }
    }

    pub fn xpath(name: &str, expression: &str) -> Self {
        Self {
            selector_type: SelectorType::Xpath,
            ..Self::css(name, expression)
        }
    }

    pub fn attribute(mut self, attribute: &str) -> Self {
        self.attribute = Some(attribute.to_string());
        self
    }

    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    pub fn with_default(mut self, default: &str) -> Self {
        self.default = Some(default.to_string());
        self
    }
}

fn default_max_pages() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginationSpec {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub next_page_selector: Option<String>,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

impl Default for PaginationSpec {
    fn default() -> Self {
        Self {
            enabled: false,
            next_page_selector: None,
            max_pages: default_max_pages(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRequest {
    pub url: String,
    #[serde(default)]
    pub scraper_type: ScraperType,
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub container_selector: Option<String>,
    #[serde(default)]
    pub wait_for_selector: Option<String>,
    /// Per-fetch timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default)]
    pub pagination: Option<PaginationSpec>,
    /// Clean values and resolve relative URLs after extraction
    #[serde(default)]
    pub normalize: bool,
    /// Retry with the other strategy when the first page cannot be fetched
    #[serde(default)]
    pub fallback: bool,
}

impl ExtractionRequest {
    pub fn new(url: &str, fields: Vec<FieldSpec>) -> Self {
        Self {
            url: url.to_string(),
            scraper_type: ScraperType::Auto,
            fields,
            container_selector: None,
            wait_for_selector: None,
            timeout: default_timeout(),
            pagination: None,
            normalize: false,
            fallback: false,
        }
    }

    pub fn pagination_enabled(&self) -> bool {
        self.pagination.as_ref().is_some_and(|p| p.enabled)
    }

    /// Page cap; 1 whenever pagination is off
    pub fn max_pages(&self) -> u32 {
        match &self.pagination {
            Some(p) if p.enabled => p.max_pages,
            _ => 1,
        }
    }

    pub fn next_page_selector(&self) -> Option<&str> {
        self.pagination
            .as_ref()
            .filter(|p| p.enabled)
            .and_then(|p| p.next_page_selector.as_deref())
            .filter(|s| !s.trim().is_empty())
    }

    pub fn validate(&self) -> Result<(), ScrapeError> {
        validate_url(&self.url).map_err(ScrapeError::Validation)?;

        if self.fields.is_empty() {
            return Err(ScrapeError::Validation(
                "at least one extraction field is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for (i, field) in self.fields.iter().enumerate() {
            if field.name.trim().is_empty() {
                return Err(ScrapeError::Validation(format!("field {}: name is required", i + 1)));
            }
            if field.selector.trim().is_empty() {
                return Err(ScrapeError::Validation(format!(
                    "field '{}': selector is required",
                    field.name
                )));
            }
            if !seen.insert(field.name.to_lowercase()) {
                return Err(ScrapeError::Validation(format!(
                    "duplicate field name: {}",
                    field.name
                )));
            }
        }

        if self.timeout == 0 {
            return Err(ScrapeError::Validation("timeout must be a positive number of seconds".to_string()));
        }

        if let Some(pagination) = &self.pagination {
            if pagination.max_pages == 0 {
                return Err(ScrapeError::Validation("max_pages must be at least 1".to_string()));
            }
        }

        Ok(())
    }
}

/// Accepts absolute http(s) URLs with a host
pub fn validate_url(raw: &str) -> Result<Url, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("URL is required".to_string());
    }
    if !(raw.starts_with("http://") || raw.starts_with("https://")) {
        return Err("URL must start with http:// or https://".to_string());
    }
    let parsed = Url::parse(raw).map_err(|e| format!("invalid URL format: {}", e))?;
    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(parsed),
        _ => Err("URL must include a domain".to_string()),
    }
}

/// Value of one field inside a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
    Null,
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }
}

/// Field name → value, kept in field-spec order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    entries: Vec<(String, FieldValue)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces; a replaced field keeps its original position
    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut FieldValue)> {
        self.entries.iter_mut().map(|(n, v)| (n.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RecordVisitor;

        impl<'de> Visitor<'de> for RecordVisitor {
            type Value = Record;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of field names to string, list or null values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Record, A::Error> {
                let mut record = Record::new();
                while let Some((name, value)) = access.next_entry::<String, FieldValue>()? {
                    record.insert(name, value);
                }
                Ok(record)
            }
        }

        deserializer.deserialize_map(RecordVisitor)
    }
}

impl<S: Into<String>> FromIterator<(S, FieldValue)> for Record {
    fn from_iter<I: IntoIterator<Item = (S, FieldValue)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (name, value) in iter {
            record.insert(name, value);
        }
        record
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub recommended_scraper: Strategy,
    pub confidence: f64,
    pub indicators: Vec<String>,
}

impl DetectionResult {
    pub fn is_dynamic(&self) -> bool {
        self.recommended_scraper == Strategy::Dynamic
    }
}

/// Outcome of a completed (possibly partial) scrape
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionResult {
    pub url: String,
    pub scraper_used: Strategy,
    pub data: Vec<Record>,
    pub total_items: usize,
    pub pages_scraped: u32,
    /// Seconds, rounded to two decimals
    pub elapsed_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection: Option<DetectionResult>,
}

impl ExtractionResult {
    pub fn new(
        url: &str,
        scraper_used: Strategy,
        data: Vec<Record>,
        pages_scraped: u32,
        elapsed_secs: f64,
        detection: Option<DetectionResult>,
    ) -> Self {
        Self {
            url: url.to_string(),
            scraper_used,
            total_items: data.len(),
            data,
            pages_scraped,
            elapsed_time: (elapsed_secs * 100.0).round() / 100.0,
            detection,
        }
    }
}

/// Reusable container + fields bundle for a website category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub container_selector: Option<String>,
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub suitable_for: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}
