use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use url::Url;

use crate::models::Preset;

fn default_keywords() -> BTreeMap<String, Vec<String>> {
    let table: &[(&str, &[&str])] = &[
        ("news", &["news", "article", "journal", "press"]),
        ("ecommerce", &["shop", "store", "buy", "product", "cart", "checkout"]),
        ("blog", &["blog", "post", "article"]),
        ("jobs", &["job", "career", "hiring", "recruit"]),
        ("real_estate", &["property", "realty", "house", "home", "rent", "sale"]),
        ("social", &["social", "twitter", "facebook", "reddit", "instagram"]),
        ("forum", &["forum", "discussion", "board", "community"]),
        ("directory", &["directory", "listing", "yellow", "business"]),
        ("video", &["video", "youtube", "vimeo", "watch"]),
    ];

    table
        .iter()
        .map(|(category, words)| {
            (
                category.to_string(),
                words.iter().map(|w| w.to_string()).collect(),
            )
        })
        .collect()
}

/// Scoring knobs (`[suggest]` in the config file)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestConfig {
    pub host_weight: u32,
    pub path_weight: u32,
    pub keyword_weight: u32,
    pub limit: usize,
    /// Category id → URL keywords hinting at that category
    pub keywords: BTreeMap<String, Vec<String>>,
}

impl Default for SuggestConfig {
    fn default() -> Self {
        Self {
            host_weight: 3,
            path_weight: 2,
            keyword_weight: 1,
            limit: 5,
            keywords: default_keywords(),
        }
    }
}

/// Ranks presets by how well a URL matches their tags and category keywords
#[derive(Debug, Clone, Default)]
pub struct PresetScorer {
    config: SuggestConfig,
}

struct UrlParts {
    host: String,
    rest: String,
}

fn split_url(url: &str) -> UrlParts {
    let lower = url.trim().to_lowercase();
    match Url::parse(&lower) {
        Ok(parsed) => {
            let mut rest = parsed.path().to_string();
            if let Some(query) = parsed.query() {
                rest.push('?');
                rest.push_str(query);
            }
            UrlParts {
                host: parsed.host_str().unwrap_or_default().to_string(),
                rest,
            }
        }
        Err(_) => UrlParts {
            host: String::new(),
            rest: lower,
        },
    }
}

fn contains_term(haystack: &str, term: &str) -> bool {
    haystack.contains(term) || (term.contains('_') && haystack.contains(&term.replace('_', "-")))
}

impl PresetScorer {
    pub fn new(config: SuggestConfig) -> Self {
        Self { config }
    }

    fn score_parts(&self, parts: &UrlParts, preset: &Preset) -> u32 {
        let mut seen = HashSet::new();
        let mut score = 0;

        let tags = preset.suitable_for.iter().map(|t| (t, true));
        let keywords = self
            .config
            .keywords
            .get(&preset.category)
            .into_iter()
            .flatten()
            .map(|k| (k, false));

        for (term, is_tag) in tags.chain(keywords) {
            let term = term.trim().to_lowercase();
            if term.is_empty() || !seen.insert(term.clone()) {
                continue;
            }

            if contains_term(&parts.host, &term) {
                score += self.config.host_weight;
            } else if contains_term(&parts.rest, &term) {
                score += if is_tag {
                    self.config.path_weight
                } else {
                    self.config.keyword_weight
                };
            }
        }

        score
    }

    pub fn score(&self, url: &str, preset: &Preset) -> u32 {
        self.score_parts(&split_url(url), preset)
    }

    /// Matching presets with their scores, best first
    pub fn ranked<'a>(&self, url: &str, catalog: &'a [Preset]) -> Vec<(&'a Preset, u32)> {
        let parts = split_url(url);
        let mut scored: Vec<(&Preset, u32)> = catalog
            .iter()
            .map(|preset| (preset, self.score_parts(&parts, preset)))
            .filter(|(_, score)| *score > 0)
            .collect();

        // stable: ties keep catalog order
        scored.sort_by(|a, b| b.1.cmp(&a.1));
        if self.config.limit > 0 {
            scored.truncate(self.config.limit);
        }
        scored
    }

    pub fn suggest<'a>(&self, url: &str, catalog: &'a [Preset]) -> Vec<&'a Preset> {
        self.ranked(url, catalog).into_iter().map(|(preset, _)| preset).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets::PresetStore;

    fn preset(id: &str, category: &str, tags: &[&str]) -> Preset {
        Preset {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            category: category.to_string(),
            container_selector: None,
            fields: vec![],
            suitable_for: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn test_host_beats_path() {
        let scorer = PresetScorer::default();
        let shop = preset("shop", "ecommerce", &["shop"]);
        // tag + "shop" keyword count once
        assert_eq!(scorer.score("https://shop.example.com/", &shop), 3);
        assert_eq!(scorer.score("https://example.com/shop/", &shop), 2);
        // keyword only, in the path
        assert_eq!(scorer.score("https://example.com/cart", &shop), 1);
        assert_eq!(scorer.score("https://example.com/", &shop), 0);
    }

    #[test]
    fn test_suggest_against_builtin_catalog() {
        let store = PresetStore::builtin().unwrap();
        let scorer = PresetScorer::default();

        let suggestions = scorer.suggest("https://news.ycombinator.com/news", store.catalog());
        assert_eq!(suggestions[0].id, "news_articles");
        assert!(suggestions.len() <= 5);

        let jobs = scorer.suggest("https://example.com/careers/jobs?page=2", store.catalog());
        assert_eq!(jobs[0].id, "job_listings");
    }

    #[test]
    fn test_no_match_is_empty() {
        let store = PresetStore::builtin().unwrap();
        let scorer = PresetScorer::default();
        assert!(scorer.suggest("https://qqq.zz/", store.catalog()).is_empty());
    }

    #[test]
    fn test_ties_keep_catalog_order_and_limit() {
        let catalog = vec![
            preset("first", "misc", &["alpha"]),
            preset("second", "misc", &["alpha"]),
            preset("third", "misc", &["alpha", "beta"]),
        ];
        let scorer = PresetScorer::new(SuggestConfig {
            limit: 2,
            ..SuggestConfig::default()
        });

        let ids: Vec<&str> = scorer
            .suggest("https://example.com/alpha/beta", &catalog)
            .iter()
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(ids, vec!["third", "first"]);
    }
}
