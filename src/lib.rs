mod config;
mod node;
mod numbering;
mod outline;
mod parser;

pub use config::{Config, ConfigError, ElementsConfig, NumberingConfig, ParserConfig};
pub use node::{Data, Element, ItemVariant, List, ListItem, Node, Point, Position};
pub use numbering::{CounterStack, Numeral, attach_source, lists, number_lists, parse_numeral};

use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid tree JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Parse markdown text into a tree using default config.
pub fn parse(markdown: &str) -> Node {
    parse_with_config(markdown, &Config::compiled_default())
}

/// Parse markdown text into a tree with custom config.
pub fn parse_with_config(markdown: &str, config: &Config) -> Node {
    parser::parse(markdown, &config.parser)
}

/// Parse markdown and number its lists using default config.
pub fn number(markdown: &str) -> Node {
    number_with_config(markdown, &Config::compiled_default())
}

/// Parse markdown and number its lists with custom config.
pub fn number_with_config(markdown: &str, config: &Config) -> Node {
    let mut root = parse_with_config(markdown, config);
    number_lists(&mut root, config);
    root
}

/// Number the lists of an mdast JSON tree. `source` is the text its positions refer to.
pub fn number_json_tree(json: &str, source: Option<&str>, config: &Config) -> Result<Node, Error> {
    let mut root: Node = serde_json::from_str(json)?;
    if let Some(source) = source {
        attach_source(&mut root, source);
    }
    number_lists(&mut root, config);
    Ok(root)
}

/// Number the lists of an mdast JSON value, returning it with the annotations added.
///
/// Fields the typed tree does not model are carried over from the input unchanged.
pub fn number_json_value(tree: Value, source: Option<&str>, config: &Config) -> Result<Value, Error> {
    let mut root: Node = serde_json::from_value(tree.clone())?;
    if let Some(source) = source {
        attach_source(&mut root, source);
    }
    number_lists(&mut root, config);
    let annotated = serde_json::to_value(&root)?;
    Ok(node::restore_unmodeled(tree, annotated))
}

/// Convert markdown to a numbered tree serialized as pretty JSON.
pub fn markdown_to_json(markdown: &str, config: &Config) -> Result<String, Error> {
    let root = number_with_config(markdown, config);
    Ok(serde_json::to_string_pretty(&root)?)
}

/// Convert markdown to a plain-text outline of its numbered lists.
pub fn markdown_to_outline(markdown: &str, config: &Config) -> String {
    let root = number_with_config(markdown, config);
    outline::to_outline(&root, config)
}

/// Render an already numbered tree as a plain-text outline.
pub fn tree_to_outline(root: &Node, config: &Config) -> String {
    outline::to_outline(root, config)
}
