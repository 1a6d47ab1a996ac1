use crate::config::Config;
use crate::node::{List, ListItem, Node};

/// Render a numbered tree as a plain-text outline
pub fn to_outline(root: &Node, config: &Config) -> String {
    let mut out = String::new();
    for block in root.children() {
        emit_block(block, config, &mut out);
    }
    out
}

fn emit_block(block: &Node, config: &Config, out: &mut String) {
    match block {
        Node::Heading { depth, .. } => {
            for _ in 0..*depth {
                out.push('#');
            }
            out.push(' ');
            push_inline(block, out);
            out.push('\n');
        }
        Node::List(list) => list_to_outline(list, config, out),
        Node::Code { value, .. } => {
            out.push_str(value);
            if !value.ends_with('\n') {
                out.push('\n');
            }
        }
        Node::ThematicBreak => out.push_str("---\n"),
        Node::Html { .. } => {}
        Node::Element(_) => {
            for child in block.children() {
                emit_block(child, config, out);
            }
        }
        _ => {
            push_inline(block, out);
            out.push('\n');
        }
    }
}

fn push_inline(node: &Node, out: &mut String) {
    let mut text = String::new();
    node.collect_text(&mut text);
    out.push_str(text.replace('\n', " ").trim());
}

fn list_to_outline(list: &List, config: &Config, out: &mut String) {
    for item in &list.children {
        item_to_outline(item, config, out);
        for nested in item.nested_lists() {
            list_to_outline(nested, config, out);
        }
    }
}

fn item_to_outline(item: &ListItem, config: &Config, out: &mut String) {
    let level = item.level.unwrap_or(config.numbering.level_base);
    let indent = level.saturating_sub(config.numbering.level_base);
    out.push_str(&"  ".repeat(indent));

    match &item.display_number {
        Some(number) => {
            out.push_str(number);
            out.push('.');
        }
        None => out.push('-'),
    }
    match item.checked {
        Some(true) => out.push_str(" [x]"),
        Some(false) => out.push_str(" [ ]"),
        None => {}
    }
    if let Some(name) = &item.name {
        if *name != config.elements.list_item {
            out.push_str(" [");
            out.push_str(name);
            out.push(']');
        }
    }

    let text = item.text();
    let text = text.trim();
    if !text.is_empty() {
        out.push(' ');
        out.push_str(text);
    }
    out.push('\n');
}
