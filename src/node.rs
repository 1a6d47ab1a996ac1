use std::collections::BTreeMap;

use serde::de::{Deserializer, Error as _};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A location in the source text (mdast convention: 1-based line/column, 0-based byte offset)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

/// Source span of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub start: Point,
    pub end: Point,
}

/// Side-channel attributes attached to a node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Data {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub h_properties: BTreeMap<String, Value>,
}

impl Data {
    pub fn is_empty(&self) -> bool {
        self.h_properties.is_empty()
    }

    /// The item type tag, if one is attached.
    pub fn type_tag(&self) -> Option<&str> {
        self.h_properties
            .get("type")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
    }
}

/// Presentation variant of a list item, resolved from its type tag
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItemVariant {
    #[default]
    Plain,
    ProblemIntuition,
    Feature,
    Custom(String),
}

impl ItemVariant {
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag {
            None => ItemVariant::Plain,
            Some("problem-intuition") => ItemVariant::ProblemIntuition,
            Some("feature") => ItemVariant::Feature,
            Some(other) => ItemVariant::Custom(other.to_string()),
        }
    }

    pub fn is_plain(&self) -> bool {
        matches!(self, ItemVariant::Plain)
    }
}

/// A single list item, which can contain nested blocks and lists
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, tag = "type", rename = "listItem", rename_all = "camelCase")]
pub struct ListItem {
    pub children: Vec<Node>,
    /// First source line of the item, marker included.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(skip_serializing_if = "Data::is_empty")]
    pub data: Data,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,

    // Written by the numbering pass
    #[serde(skip_serializing_if = "ItemVariant::is_plain")]
    pub variant: ItemVariant,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explicit_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_number: Option<String>,
}

impl ListItem {
    pub fn new(children: Vec<Node>) -> Self {
        Self {
            children,
            ..Self::default()
        }
    }

    /// Concatenated text of the item's own content, nested lists excluded.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            if !matches!(child, Node::List(_)) {
                child.collect_text(&mut out);
            }
        }
        out
    }

    pub fn nested_lists(&self) -> impl Iterator<Item = &List> {
        self.children.iter().filter_map(|child| match child {
            Node::List(list) => Some(list),
            _ => None,
        })
    }
}

/// A list (ordered or unordered)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct List {
    pub ordered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<u64>,
    pub spread: bool,
    pub children: Vec<ListItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    /// Depth among list ancestors, 0-based. Written by the numbering pass.
    pub nesting_level: usize,
}

impl List {
    pub fn ordered(start: Option<u64>, children: Vec<ListItem>) -> Self {
        Self {
            ordered: true,
            start,
            children,
            ..Self::default()
        }
    }

    pub fn unordered(children: Vec<ListItem>) -> Self {
        Self {
            children,
            ..Self::default()
        }
    }

    pub fn display_numbers(&self) -> Vec<Option<&str>> {
        self.children
            .iter()
            .map(|item| item.display_number.as_deref())
            .collect()
    }
}

/// mdast-shaped document node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Node {
    Root {
        children: Vec<Node>,
    },
    Heading {
        depth: u8,
        children: Vec<Node>,
    },
    Paragraph {
        children: Vec<Node>,
    },
    Text {
        value: String,
    },
    Strong {
        children: Vec<Node>,
    },
    Emphasis {
        children: Vec<Node>,
    },
    InlineCode {
        value: String,
    },
    Link {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        children: Vec<Node>,
    },
    Image {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default)]
        alt: String,
    },
    Code {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lang: Option<String>,
        value: String,
    },
    Html {
        value: String,
    },
    ThematicBreak,
    Break,
    List(List),
    /// Any other node type, kept as written
    #[serde(untagged)]
    Element(Element),
}

/// A node of a type the tree does not model (`blockquote`, `mdxJsxFlowElement`, ...).
///
/// All fields survive a round trip; `children` is parsed as nodes when it can be,
/// so lists inside still get numbered.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub kind: String,
    pub children: Option<Vec<Node>>,
    pub fields: Map<String, Value>,
}

impl Serialize for Element {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("type", &self.kind)?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        if let Some(children) = &self.children {
            map.serialize_entry("children", children)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Element {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut fields = Map::deserialize(deserializer)?;
        let kind = match fields.remove("type") {
            Some(Value::String(kind)) => kind,
            _ => return Err(D::Error::custom("node without a string `type`")),
        };
        let children = match fields.remove("children") {
            Some(raw) => match serde_json::from_value::<Vec<Node>>(raw.clone()) {
                Ok(children) => Some(children),
                Err(e) => {
                    log::debug!("keeping children of `{}` unparsed: {}", kind, e);
                    fields.insert("children".to_string(), raw);
                    None
                }
            },
            None => None,
        };
        Ok(Element {
            kind,
            children,
            fields,
        })
    }
}

impl Node {
    pub fn text(value: impl Into<String>) -> Self {
        Node::Text {
            value: value.into(),
        }
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Node::Paragraph {
            children: vec![Node::text(text)],
        }
    }

    pub fn children(&self) -> &[Node] {
        match self {
            Node::Root { children }
            | Node::Heading { children, .. }
            | Node::Paragraph { children }
            | Node::Strong { children }
            | Node::Emphasis { children }
            | Node::Link { children, .. } => children,
            Node::Element(element) => element.children.as_deref().unwrap_or(&[]),
            _ => &[],
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<Node>> {
        match self {
            Node::Root { children }
            | Node::Heading { children, .. }
            | Node::Paragraph { children }
            | Node::Strong { children }
            | Node::Emphasis { children }
            | Node::Link { children, .. } => Some(children),
            Node::Element(element) => element.children.as_mut(),
            _ => None,
        }
    }

    /// Append the visible text of this node and its descendants to `out`.
    pub fn collect_text(&self, out: &mut String) {
        match self {
            Node::Text { value } | Node::InlineCode { value } => out.push_str(value),
            Node::Break => out.push(' '),
            Node::List(list) => {
                for item in &list.children {
                    for child in &item.children {
                        child.collect_text(out);
                    }
                }
            }
            _ => {
                for child in self.children() {
                    child.collect_text(out);
                }
            }
        }
    }
}

/// Keys the numbering pass owns on list items; never restored from the input.
const ANNOTATION_KEYS: [&str; 5] = ["variant", "explicitNumber", "name", "level", "displayNumber"];

/// Copy fields present in `original` but absent from `annotated` back into it.
///
/// Both values must describe the same tree; arrays are matched element-wise.
pub(crate) fn restore_unmodeled(original: Value, annotated: Value) -> Value {
    match (original, annotated) {
        (Value::Object(original), Value::Object(mut annotated)) => {
            let is_item = annotated.get("type").and_then(Value::as_str) == Some("listItem");
            for (key, value) in original {
                if is_item && ANNOTATION_KEYS.contains(&key.as_str()) {
                    continue;
                }
                let restored = match annotated.remove(&key) {
                    Some(current) => restore_unmodeled(value, current),
                    None => value,
                };
                annotated.insert(key, restored);
            }
            Value::Object(annotated)
        }
        (Value::Array(original), Value::Array(annotated)) if original.len() == annotated.len() => {
            Value::Array(
                original
                    .into_iter()
                    .zip(annotated)
                    .map(|(original, annotated)| restore_unmodeled(original, annotated))
                    .collect(),
            )
        }
        (_, annotated) => annotated,
    }
}
