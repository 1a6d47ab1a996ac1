use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::node::ItemVariant;

static DEFAULT_CONFIG: &str = include_str!("default_config.toml");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    Read {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    Parse {
        config_path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub numbering: NumberingConfig,
    pub elements: ElementsConfig,
    pub parser: ParserConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct NumberingConfig {
    /// Level assigned to items of a top-level list.
    pub level_base: usize,
    /// Use numerals written in the source as display numbers.
    pub honor_source_numerals: bool,
    /// Drop a leading numeral that the item's visible text repeats.
    pub strip_numeral_prefix: bool,
}

impl Default for NumberingConfig {
    fn default() -> Self {
        Self {
            level_base: 1,
            honor_source_numerals: true,
            strip_numeral_prefix: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ElementsConfig {
    pub list_item: String,
    pub problem_intuition: String,
    pub feature: String,
    /// Element names for type tags other than the built-in ones.
    pub custom: BTreeMap<String, String>,
}

impl Default for ElementsConfig {
    fn default() -> Self {
        Self {
            list_item: "ListItem".to_string(),
            problem_intuition: "ProblemIntuitionItem".to_string(),
            feature: "FeatureItem".to_string(),
            custom: BTreeMap::new(),
        }
    }
}

impl ElementsConfig {
    /// Element name the presentation layer should use for an item variant.
    pub fn name_for(&self, variant: &ItemVariant) -> &str {
        match variant {
            ItemVariant::Plain => &self.list_item,
            ItemVariant::ProblemIntuition => &self.problem_intuition,
            ItemVariant::Feature => &self.feature,
            ItemVariant::Custom(tag) => self
                .custom
                .get(tag)
                .map(String::as_str)
                .unwrap_or(&self.list_item),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ParserConfig {
    pub strip_frontmatter: bool,
    /// Apply attributes of `<Element attr="...">` wrapper blocks to the lists they enclose.
    pub jsx_wrappers: bool,
    pub tasklists: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            strip_frontmatter: true,
            jsx_wrappers: true,
            tasklists: true,
        }
    }
}

impl Config {
    /// The configuration bundled with the crate.
    pub fn compiled_default() -> Self {
        // Validated by build.rs
        toml::from_str(DEFAULT_CONFIG).unwrap_or_default()
    }

    /// Load config from a TOML file, or return the compiled default if it does not exist.
    pub fn load(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            log::debug!(
                "No config at {}, using compiled default",
                config_path.display()
            );
            return Ok(Self::compiled_default());
        }

        let content = fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
            config_path: config_path.to_path_buf(),
            source,
        })?;

        Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            config_path: config_path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        let config: Config = toml::from_str(content)?;
        if config.elements.list_item.trim().is_empty() {
            log::warn!("elements.list_item is empty; list items will have no element name");
        }
        Ok(config)
    }
}
