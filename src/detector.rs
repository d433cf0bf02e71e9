use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::models::{DetectionResult, Strategy};
use crate::selector::visible_text;

pub const NO_SIGNAL_INDICATOR: &str = "no strong signal detected";

/// Weights and thresholds for page-type detection (`[detector]` in the config file)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Score added by each URL signal
    pub url_weight: f64,
    /// Score added by each markup pattern
    pub markup_weight: f64,
    pub low_density_chars: usize,
    pub low_density_weight: f64,
    pub high_density_chars: usize,
    pub high_density_weight: f64,
    /// More script tags than this, with little text, reads as client-rendered
    pub script_heavy_count: usize,
    pub script_heavy_weight: f64,
    pub confidence_floor: f64,
    pub max_confidence: f64,
    pub no_signal_confidence: f64,
    /// Host prefixes that usually serve single-page apps
    pub dynamic_hosts: Vec<String>,
    /// Timeout for the sample fetch used by `auto`
    pub sample_timeout_secs: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            url_weight: 1.0,
            markup_weight: 1.0,
            low_density_chars: 500,
            low_density_weight: 2.0,
            high_density_chars: 2000,
            high_density_weight: 1.0,
            script_heavy_count: 15,
            script_heavy_weight: 1.0,
            confidence_floor: 0.3,
            max_confidence: 0.95,
            no_signal_confidence: 0.3,
            dynamic_hosts: vec!["app.".to_string(), "dashboard.".to_string(), "portal.".to_string()],
            sample_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Side {
    Dynamic,
    Static,
}

impl Side {
    fn prefix(self) -> &'static str {
        match self {
            Side::Dynamic => "dynamic",
            Side::Static => "static",
        }
    }
}

struct MarkupSignal {
    pattern: Regex,
    description: &'static str,
    side: Side,
}

const MARKUP_PATTERNS: &[(&str, &str, Side)] = &[
    (r"__NEXT_DATA__", "Next.js data payload", Side::Dynamic),
    (r"__NUXT__", "Nuxt.js state", Side::Dynamic),
    (r"ng-app|ng-controller|ng-version", "Angular markers", Side::Dynamic),
    (r"data-reactroot|data-react", "React root", Side::Dynamic),
    (r"data-v-[a-f0-9]", "Vue scoped attributes", Side::Dynamic),
    (r"ember-view", "Ember views", Side::Dynamic),
    (r"<noscript>.*enable javascript", "noscript asks to enable JavaScript", Side::Dynamic),
    (r#"loading["\s>]|spinner"#, "loading indicator", Side::Dynamic),
    (r#"<div id="(app|root|main)">\s*</div>"#, "empty app container", Side::Dynamic),
    (r"<main[^>]*>\s*</main>", "empty main container", Side::Dynamic),
    (r"window\.__INITIAL_STATE__", "injected initial state", Side::Dynamic),
    (r"window\.__DATA__", "injected data", Side::Dynamic),
    (r"<article", "article element", Side::Static),
    (r"<p>[\w\s]{50,}", "substantial paragraph", Side::Static),
    (r"<table[\s\S]*?<td", "data table", Side::Static),
    (r"<ul[\s\S]*?<li[\s\S]*?<li", "list with several items", Side::Static),
    (r#"class="[^"]*content[^"]*"[\s\S]{100,}"#, "content section", Side::Static),
];

const DOCUMENT_EXTENSIONS: &[&str] = &[".html", ".htm", ".php", ".asp", ".aspx", ".jsp"];
const DOCUMENT_SECTIONS: &[&str] = &["wiki", "docs", "blog"];

/// Recommends a fetch strategy from URL and markup heuristics
pub struct PageTypeDetector {
    config: DetectorConfig,
    signals: Vec<MarkupSignal>,
}

#[derive(Default)]
struct Tally {
    dynamic: f64,
    static_: f64,
    indicators: Vec<String>,
}

impl Tally {
    fn add(&mut self, side: Side, weight: f64, description: &str) {
        match side {
            Side::Dynamic => self.dynamic += weight,
            Side::Static => self.static_ += weight,
        }
        self.indicators.push(format!("{}: {}", side.prefix(), description));
    }
}

impl Default for PageTypeDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

impl PageTypeDetector {
    pub fn new(config: DetectorConfig) -> Self {
        let signals = MARKUP_PATTERNS
            .iter()
            .filter_map(|(pattern, description, side)| match Regex::new(&format!("(?i){}", pattern)) {
                Ok(regex) => Some(MarkupSignal {
                    pattern: regex,
                    description: *description,
                    side: *side,
                }),
                Err(e) => {
                    log::error!("Skipping detector pattern '{}': {}", pattern, e);
                    None
                }
            })
            .collect();

        Self { config, signals }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn detect(&self, url: &str, sample: Option<&str>) -> DetectionResult {
        let mut tally = Tally::default();

        self.url_signals(url, &mut tally);
        if let Some(html) = sample {
            self.markup_signals(html, &mut tally);
        }

        let total = tally.dynamic + tally.static_;
        if total <= 0.0 {
            return DetectionResult {
                recommended_scraper: Strategy::Static,
                confidence: self.config.no_signal_confidence.clamp(0.0, 1.0),
                indicators: vec![NO_SIGNAL_INDICATOR.to_string()],
            };
        }

        let recommended_scraper = if tally.dynamic > tally.static_ {
            Strategy::Dynamic
        } else {
            Strategy::Static
        };
        let raw = (tally.dynamic - tally.static_).abs() / total + self.config.confidence_floor;
        let confidence = raw.min(self.config.max_confidence).clamp(0.0, 1.0);

        DetectionResult {
            recommended_scraper,
            confidence: (confidence * 100.0).round() / 100.0,
            indicators: tally.indicators,
        }
    }

    fn url_signals(&self, url: &str, tally: &mut Tally) {
        let Ok(parsed) = Url::parse(url.trim()) else {
            return;
        };
        let weight = self.config.url_weight;
        let host = parsed.host_str().unwrap_or_default().to_lowercase();
        let path = parsed.path().to_lowercase();

        if let Some(fragment) = parsed.fragment() {
            if fragment.starts_with('/') || fragment.starts_with('!') {
                tally.add(Side::Dynamic, weight, "hash-based client routing in URL");
            }
        }
        if self.config.dynamic_hosts.iter().any(|prefix| host.starts_with(prefix.as_str())) {
            tally.add(Side::Dynamic, weight, "application host");
        }
        if path.starts_with("/app/") || path == "/app" || path.contains("/dashboard") {
            tally.add(Side::Dynamic, weight, "application path");
        }

        if DOCUMENT_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
            tally.add(Side::Static, weight, "server-rendered document extension");
        }
        let in_document_section = DOCUMENT_SECTIONS.iter().any(|section| {
            host.starts_with(&format!("{}.", section)) || path.split('/').any(|segment| segment == *section)
        });
        if in_document_section {
            tally.add(Side::Static, weight, "documentation, wiki or blog URL");
        }
    }

    fn markup_signals(&self, html: &str, tally: &mut Tally) {
        let weight = self.config.markup_weight;
        for signal in &self.signals {
            if signal.pattern.is_match(html) {
                tally.add(signal.side, weight, signal.description);
            }
        }

        let (text_len, scripts) = text_and_scripts(html);

        if text_len < self.config.low_density_chars {
            tally.add(
                Side::Dynamic,
                self.config.low_density_weight,
                &format!("low text density ({} chars)", text_len),
            );
        } else if text_len > self.config.high_density_chars {
            tally.add(
                Side::Static,
                self.config.high_density_weight,
                &format!("high text density ({} chars)", text_len),
            );
        }

        if scripts > self.config.script_heavy_count && text_len < self.config.high_density_chars {
            tally.add(
                Side::Dynamic,
                self.config.script_heavy_weight,
                &format!("script-heavy page ({} script tags)", scripts),
            );
        }
    }
}

fn text_and_scripts(html: &str) -> (usize, usize) {
    let document = Html::parse_document(html);
    let text_len = visible_text(document.root_element())
        .map(|t| t.chars().count())
        .unwrap_or(0);
    let scripts = Selector::parse("script")
        .map(|sel| document.select(&sel).count())
        .unwrap_or(0);
    (text_len, scripts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> PageTypeDetector {
        PageTypeDetector::default()
    }

    #[test]
    fn test_no_signal_defaults_to_static() {
        let result = detector().detect("https://example.com/catalogue", None);
        assert_eq!(result.recommended_scraper, Strategy::Static);
        assert_eq!(result.confidence, 0.3);
        assert_eq!(result.indicators, vec![NO_SIGNAL_INDICATOR.to_string()]);
    }

    #[test]
    fn test_spa_shell_is_dynamic() {
        let html = r#"<html><head><script id="__NEXT_DATA__">{}</script></head>
            <body><div id="root"></div></body></html>"#;
        let result = detector().detect("https://shop.example.com/", Some(html));

        assert!(result.is_dynamic());
        assert!(result.confidence > 0.5 && result.confidence <= 0.95);
        assert_eq!(result.indicators[0], "dynamic: Next.js data payload");
        assert!(result.indicators.iter().any(|i| i.starts_with("dynamic: low text density")));
    }

    #[test]
    fn test_article_page_is_static() {
        let paragraph = "This sentence carries enough plain words to count as real content. ".repeat(40);
        let html = format!(
            "<html><body><article><p>{}</p></article><ul><li>a</li><li>b</li></ul></body></html>",
            paragraph
        );
        let result = detector().detect("https://example.com/blog/post.html", Some(&html));

        assert_eq!(result.recommended_scraper, Strategy::Static);
        assert!(result.indicators.iter().all(|i| i.starts_with("static:")));
        assert_eq!(result.confidence, 0.95);
    }

    #[test]
    fn test_url_signals() {
        let result = detector().detect("https://app.example.com/#/inbox", None);
        assert!(result.is_dynamic());
        assert_eq!(
            result.indicators,
            vec!["dynamic: hash-based client routing in URL", "dynamic: application host"]
        );

        let result = detector().detect("https://docs.example.com/guide/index.html", None);
        assert_eq!(result.recommended_scraper, Strategy::Static);
    }

    #[test]
    fn test_ties_go_static() {
        // one dynamic url signal against one static url signal
        let result = detector().detect("https://app.example.com/page.php", None);
        assert_eq!(result.recommended_scraper, Strategy::Static);
        assert_eq!(result.confidence, 0.3);
    }

    #[test]
    fn test_thresholds_come_from_config() {
        let config = DetectorConfig {
            low_density_chars: 0,
            high_density_chars: 5,
            ..DetectorConfig::default()
        };
        let result = PageTypeDetector::new(config).detect(
            "https://example.com/",
            Some("<html><body>plenty of text here</body></html>"),
        );
        assert_eq!(result.recommended_scraper, Strategy::Static);
        assert!(result.indicators[0].starts_with("static: high text density"));
    }
}
