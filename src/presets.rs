use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::PresetError;
use crate::models::{Category, Preset};

const BUILTIN_CATALOG: &str = include_str!("../presets/builtin.json");

#[derive(Deserialize)]
struct Catalog {
    categories: Vec<Category>,
    presets: Vec<Preset>,
}

/// Listing entry for a preset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresetSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
}

impl From<&Preset> for PresetSummary {
    fn from(preset: &Preset) -> Self {
        Self {
            id: preset.id.clone(),
            name: preset.name.clone(),
            description: preset.description.clone(),
            category: preset.category.clone(),
        }
    }
}

/// Read-only catalog of presets and categories
#[derive(Debug, Clone, Default)]
pub struct PresetStore {
    presets: Vec<Preset>,
    categories: Vec<Category>,
}

impl PresetStore {
    pub fn builtin() -> Result<Self> {
        let catalog: Catalog =
            serde_json::from_str(BUILTIN_CATALOG).context("Built-in preset catalog is malformed")?;
        Ok(Self {
            presets: catalog.presets,
            categories: catalog.categories,
        })
    }

    /// Built-in catalog plus every preset file found in `dir`
    pub fn load(dir: Option<&Path>) -> Result<Self> {
        let mut store = Self::builtin()?;
        if let Some(dir) = dir {
            store.load_dir(dir)?;
        }
        Ok(store)
    }

    pub fn load_dir(&mut self, dir: &Path) -> Result<usize> {
        if !dir.is_dir() {
            log::warn!("Preset directory {} does not exist; using built-in presets only", dir.display());
            return Ok(0);
        }

        let mut paths: Vec<PathBuf> = fs::read_dir(dir)
            .with_context(|| format!("Failed to read preset directory {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && preset_format(path).is_some())
            .collect();
        paths.sort();

        let mut loaded = 0;
        for path in paths {
            match load_file(&path) {
                Ok(preset) => {
                    log::info!("Loaded preset '{}' from {}", preset.id, path.display());
                    self.insert(preset);
                    loaded += 1;
                }
                Err(e) => log::warn!("Skipping preset file: {}", e),
            }
        }
        Ok(loaded)
    }

    /// Adds a preset, replacing one with the same id
    pub fn insert(&mut self, preset: Preset) {
        if !self.categories.iter().any(|c| c.id == preset.category) {
            self.categories.push(Category {
                id: preset.category.clone(),
                name: preset.category.clone(),
                description: String::new(),
            });
        }

        match self.presets.iter_mut().find(|p| p.id == preset.id) {
            Some(existing) => *existing = preset,
            None => self.presets.push(preset),
        }
    }

    pub fn list(&self, category: Option<&str>) -> Vec<PresetSummary> {
        self.presets
            .iter()
            .filter(|p| category.is_none_or(|c| p.category == c))
            .map(PresetSummary::from)
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&Preset> {
        self.presets.iter().find(|p| p.id == id)
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn catalog(&self) -> &[Preset] {
        &self.presets
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PresetFormat {
    Json,
    Yaml,
    Toml,
}

fn preset_format(path: &Path) -> Option<PresetFormat> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "json" => Some(PresetFormat::Json),
        "yaml" | "yml" => Some(PresetFormat::Yaml),
        "toml" => Some(PresetFormat::Toml),
        _ => None,
    }
}

/// Reads one preset file; the file stem becomes the preset id
pub fn load_file(path: &Path) -> Result<Preset, PresetError> {
    let format = preset_format(path).ok_or_else(|| PresetError::Invalid {
        path: path.to_path_buf(),
        message: "unsupported file extension".to_string(),
    })?;

    let raw = fs::read_to_string(path).map_err(|source| PresetError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let parse_error = |message: String| PresetError::Parse {
        path: path.to_path_buf(),
        message,
    };
    let mut preset: Preset = match format {
        PresetFormat::Json => serde_json::from_str(&raw).map_err(|e| parse_error(e.to_string()))?,
        PresetFormat::Yaml => serde_yaml::from_str(&raw).map_err(|e| parse_error(e.to_string()))?,
        PresetFormat::Toml => toml::from_str(&raw).map_err(|e| parse_error(e.to_string()))?,
    };

    if preset.name.trim().is_empty() {
        return Err(PresetError::Invalid {
            path: path.to_path_buf(),
            message: "name is empty".to_string(),
        });
    }
    if preset.category.trim().is_empty() {
        return Err(PresetError::MissingCategory(path.to_path_buf()));
    }
    if preset.fields.is_empty() {
        return Err(PresetError::Invalid {
            path: path.to_path_buf(),
            message: "no fields declared".to_string(),
        });
    }

    preset.id = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    Ok(preset)
}
