use std::collections::BTreeMap;
use std::ops::Range;

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use serde_json::Value;

use crate::config::ParserConfig;
use crate::node::{Data, List, ListItem, Node, Point, Position};

/// Strip YAML frontmatter from the beginning of markdown content.
///
/// The opening line must be exactly `---` with frontmatter on the very next
/// line, and the closing line exactly `---`; anything else is a thematic break.
fn strip_frontmatter(markdown: &str) -> &str {
    let Some(body) = markdown
        .strip_prefix("---\n")
        .or_else(|| markdown.strip_prefix("---\r\n"))
    else {
        return markdown;
    };
    if body.trim_end_matches(['\r', '\n']).is_empty() || body.starts_with(['\r', '\n']) {
        return markdown;
    }

    let mut offset = 0;
    for line in body.split_inclusive('\n') {
        offset += line.len();
        if line.trim_end_matches(['\r', '\n']) == "---" {
            // Skip past the closing --- and any blank lines after it
            return body[offset..].trim_start_matches(['\r', '\n']);
        }
    }
    markdown
}

/// Parse markdown text into a root node
pub fn parse(markdown: &str, config: &ParserConfig) -> Node {
    let body = if config.strip_frontmatter {
        strip_frontmatter(markdown)
    } else {
        markdown
    };
    // `body` is always a suffix of `markdown`
    let base = markdown.len() - body.len();

    let mut options = Options::empty();
    if config.tasklists {
        options.insert(Options::ENABLE_TASKLISTS);
    }
    let parser = Parser::new_ext(body, options).into_offset_iter();

    let mut state = ParseState {
        source: body,
        base,
        lines: LineIndex::new(markdown),
        jsx_wrappers: config.jsx_wrappers,
        ..ParseState::default()
    };
    let mut blocks = Vec::new();

    for (event, range) in parser {
        process_event(event, range, &mut state, &mut blocks);
    }

    Node::Root { children: blocks }
}

/// Byte offset to line/column lookup
#[derive(Default)]
struct LineIndex<'a> {
    text: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    fn new(text: &'a str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self { text, line_starts }
    }

    fn point(&self, offset: usize) -> Point {
        let line = self.line_starts.partition_point(|&start| start <= offset);
        let line_start = self.line_starts[line.saturating_sub(1)];
        let column = self
            .text
            .get(line_start..offset)
            .map(|prefix| prefix.chars().count())
            .unwrap_or(offset - line_start)
            + 1;
        Point {
            line,
            column,
            offset,
        }
    }
}

#[derive(Default)]
struct ParseState<'a> {
    source: &'a str,
    // Offset of `source` within the original text
    base: usize,
    lines: LineIndex<'a>,
    jsx_wrappers: bool,

    // Current inline content being built
    spans: Vec<Node>,
    // Nested span buffers for formatting
    span_stack: Vec<Vec<Node>>,

    // Current heading level (if in a heading)
    heading_level: Option<u8>,
    in_paragraph: bool,

    // Code block state
    in_code_block: bool,
    code_language: Option<String>,
    code_content: String,

    // Destination and title of open links and images
    link_targets: Vec<(String, Option<String>)>,

    // HTML block state
    html_content: String,
    // Attributes of open JSX-like wrapper elements, outermost first
    wrappers: Vec<WrapperFrame>,

    // List state
    list_stack: Vec<ListBuilder>,
}

/// An open `<Component attr="...">` element
#[derive(Debug, Clone, PartialEq)]
struct WrapperFrame {
    name: String,
    attrs: BTreeMap<String, String>,
}

struct ListBuilder {
    list: List,
    h_properties: BTreeMap<String, Value>,
    current_item: Option<ListItem>,
}

impl ParseState<'_> {
    fn position(&self, range: &Range<usize>) -> Position {
        Position {
            start: self.lines.point(self.base + range.start),
            end: self.lines.point(self.base + range.end),
        }
    }

    fn open_item(&mut self) -> Option<&mut ListItem> {
        self.list_stack
            .last_mut()
            .and_then(|list| list.current_item.as_mut())
    }

    /// Move loose inline content of a tight list item into a paragraph.
    fn flush_inline(&mut self) {
        if self.in_paragraph || self.heading_level.is_some() || self.spans.is_empty() {
            return;
        }
        let content = std::mem::take(&mut self.spans);
        if let Some(item) = self.open_item() {
            item.children.push(Node::Paragraph { children: content });
        }
    }

    fn push_span(&mut self, span: Node) {
        if let (Some(Node::Text { value }), Node::Text { value: more }) =
            (self.spans.last_mut(), &span)
        {
            value.push_str(more);
            return;
        }
        self.spans.push(span);
    }

    fn merged_wrapper_attrs(&self) -> BTreeMap<String, Value> {
        let mut merged = BTreeMap::new();
        for frame in &self.wrappers {
            merged.extend(
                frame
                    .attrs
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone()))),
            );
        }
        merged
    }
}

fn push_block(state: &mut ParseState, blocks: &mut Vec<Node>, node: Node) {
    match state.open_item() {
        Some(item) => item.children.push(node),
        None => blocks.push(node),
    }
}

fn process_event(event: Event, range: Range<usize>, state: &mut ParseState, blocks: &mut Vec<Node>) {
    match event {
        // Headings
        Event::Start(Tag::Heading { level, .. }) => {
            state.flush_inline();
            state.heading_level = Some(heading_level_to_u8(level));
        }
        Event::End(TagEnd::Heading(_)) => {
            if let Some(depth) = state.heading_level.take() {
                let children = std::mem::take(&mut state.spans);
                push_block(state, blocks, Node::Heading { depth, children });
            }
        }

        // Paragraphs
        Event::Start(Tag::Paragraph) => {
            state.flush_inline();
            state.in_paragraph = true;
            if let Some(list) = state.list_stack.last_mut() {
                if list.current_item.is_some() {
                    list.list.spread = true;
                }
            }
        }
        Event::End(TagEnd::Paragraph) => {
            state.in_paragraph = false;
            let children = std::mem::take(&mut state.spans);
            if !children.is_empty() {
                push_block(state, blocks, Node::Paragraph { children });
            }
        }

        // Text content
        Event::Text(text) => {
            if state.in_code_block {
                state.code_content.push_str(&text);
            } else {
                state.push_span(Node::text(text.into_string()));
            }
        }

        // Inline code
        Event::Code(code) => {
            state.push_span(Node::InlineCode {
                value: code.into_string(),
            });
        }

        // Bold, italic and links buffer their content
        Event::Start(Tag::Strong) | Event::Start(Tag::Emphasis) => {
            state.span_stack.push(std::mem::take(&mut state.spans));
        }
        Event::Start(Tag::Link {
            dest_url, title, ..
        })
        | Event::Start(Tag::Image {
            dest_url, title, ..
        }) => {
            let title = if title.is_empty() {
                None
            } else {
                Some(title.into_string())
            };
            state.link_targets.push((dest_url.into_string(), title));
            state.span_stack.push(std::mem::take(&mut state.spans));
        }
        Event::End(end @ (TagEnd::Strong | TagEnd::Emphasis | TagEnd::Link | TagEnd::Image)) => {
            let children = std::mem::take(&mut state.spans);
            if let Some(parent) = state.span_stack.pop() {
                state.spans = parent;
                let node = match end {
                    TagEnd::Strong => Node::Strong { children },
                    TagEnd::Emphasis => Node::Emphasis { children },
                    TagEnd::Image => {
                        let (url, title) = state.link_targets.pop().unwrap_or_default();
                        let mut alt = String::new();
                        for child in &children {
                            child.collect_text(&mut alt);
                        }
                        Node::Image { url, title, alt }
                    }
                    _ => {
                        let (url, title) = state.link_targets.pop().unwrap_or_default();
                        Node::Link {
                            url,
                            title,
                            children,
                        }
                    }
                };
                state.spans.push(node);
            }
        }

        // Code blocks
        Event::Start(Tag::CodeBlock(kind)) => {
            state.flush_inline();
            state.in_code_block = true;
            state.code_language = match kind {
                CodeBlockKind::Fenced(lang) => {
                    let lang = lang.into_string();
                    if lang.is_empty() { None } else { Some(lang) }
                }
                CodeBlockKind::Indented => None,
            };
            state.code_content.clear();
        }
        Event::End(TagEnd::CodeBlock) => {
            state.in_code_block = false;
            let value = std::mem::take(&mut state.code_content);
            let lang = state.code_language.take();
            push_block(state, blocks, Node::Code { lang, value });
        }

        // HTML blocks, including JSX-like wrapper elements
        Event::Start(Tag::HtmlBlock) => {
            state.flush_inline();
            state.html_content.clear();
        }
        Event::Html(html) => {
            state.html_content.push_str(&html);
        }
        Event::End(TagEnd::HtmlBlock) => {
            let value = std::mem::take(&mut state.html_content);
            if !(state.jsx_wrappers && apply_wrapper_tags(&value, &mut state.wrappers)) {
                push_block(state, blocks, Node::Html { value });
            }
        }
        Event::InlineHtml(html) => {
            state.push_span(Node::Html {
                value: html.into_string(),
            });
        }

        // Lists
        Event::Start(Tag::List(first_number)) => {
            state.flush_inline();
            let position = state.position(&range);
            let h_properties = state.merged_wrapper_attrs();
            state.list_stack.push(ListBuilder {
                list: List {
                    ordered: first_number.is_some(),
                    start: first_number,
                    position: Some(position),
                    ..List::default()
                },
                h_properties,
                current_item: None,
            });
        }
        Event::End(TagEnd::List(_)) => {
            if let Some(builder) = state.list_stack.pop() {
                push_block(state, blocks, Node::List(builder.list));
            }
        }

        Event::Start(Tag::Item) => {
            let position = state.position(&range);
            let raw_text = state
                .source
                .get(range.clone())
                .and_then(|raw| raw.lines().next())
                .map(|line| line.trim().to_string());
            if let Some(list) = state.list_stack.last_mut() {
                list.current_item = Some(ListItem {
                    raw_text,
                    position: Some(position),
                    data: Data {
                        h_properties: list.h_properties.clone(),
                    },
                    ..ListItem::default()
                });
            }
        }
        Event::End(TagEnd::Item) => {
            state.flush_inline();
            if let Some(list) = state.list_stack.last_mut() {
                if let Some(item) = list.current_item.take() {
                    list.list.children.push(item);
                }
            }
        }

        // Task list checkboxes
        Event::TaskListMarker(checked) => {
            if let Some(item) = state.open_item() {
                item.checked = Some(checked);
            }
        }

        // Horizontal rule
        Event::Rule => {
            state.flush_inline();
            push_block(state, blocks, Node::ThematicBreak);
        }

        // Soft/hard breaks
        Event::SoftBreak => {
            state.push_span(Node::text(" "));
        }
        Event::HardBreak => {
            state.spans.push(Node::Break);
        }

        // Ignore other events
        _ => {}
    }
}

/// Track `<Component ...>` / `</Component>` lines of an HTML block.
///
/// Returns false, leaving `wrappers` untouched, if the block holds anything
/// other than component tags or closes a component that is not innermost.
fn apply_wrapper_tags(html: &str, wrappers: &mut Vec<WrapperFrame>) -> bool {
    let lines: Vec<&str> = html
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    if lines.is_empty() {
        return false;
    }

    let mut frames = wrappers.clone();
    for line in &lines {
        if let Some(name) = parse_close_tag(line) {
            match frames.last() {
                Some(frame) if frame.name == name => {
                    frames.pop();
                }
                _ => return false,
            }
        } else if let Some(frame) = parse_open_tag(line) {
            frames.push(frame);
        } else {
            return false;
        }
    }

    *wrappers = frames;
    true
}

/// Component names start with an uppercase letter; lowercase tags are plain HTML.
fn component_name_len(text: &str) -> Option<usize> {
    if !text.starts_with(|c: char| c.is_ascii_uppercase()) {
        return None;
    }
    Some(
        text.find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | ':' | '_')))
            .unwrap_or(text.len()),
    )
}

/// Name of a closing tag such as `</List>`.
fn parse_close_tag(line: &str) -> Option<&str> {
    let inner = line.strip_prefix("</")?.strip_suffix('>')?.trim_end();
    let name_len = component_name_len(inner)?;
    if name_len != inner.len() {
        return None;
    }
    Some(inner)
}

/// Name and attributes of an opening component tag such as `<List type="feature">`.
fn parse_open_tag(line: &str) -> Option<WrapperFrame> {
    let inner = line.strip_prefix('<')?.strip_suffix('>')?;
    if inner.ends_with('/') {
        return None;
    }
    let name_end = component_name_len(inner)?;
    let name = inner[..name_end].to_string();
    let mut rest = &inner[name_end..];
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }

    let mut attrs = BTreeMap::new();
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            return Some(WrapperFrame { name, attrs });
        }
        let key_end = rest
            .find(|c: char| c.is_whitespace() || c == '=')
            .unwrap_or(rest.len());
        let key = &rest[..key_end];
        if key.is_empty() {
            return None;
        }
        rest = rest[key_end..].trim_start();

        let value = if let Some(after_eq) = rest.strip_prefix('=') {
            let after_eq = after_eq.trim_start();
            let quote = after_eq.chars().next()?;
            if quote == '"' || quote == '\'' {
                let body = &after_eq[1..];
                let end = body.find(quote)?;
                rest = &body[end + 1..];
                body[..end].to_string()
            } else {
                let end = after_eq.find(char::is_whitespace).unwrap_or(after_eq.len());
                rest = &after_eq[end..];
                after_eq[..end].to_string()
            }
        } else {
            "true".to_string()
        };
        attrs.insert(key.to_string(), value);
    }
}

fn heading_level_to_u8(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse_default(markdown: &str) -> Node {
        parse(markdown, &ParserConfig::default())
    }

    fn top_level_lists(root: &Node) -> Vec<&List> {
        root.children()
            .iter()
            .filter_map(|node| match node {
                Node::List(list) => Some(list),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn empty_input_has_no_blocks() {
        assert_eq!(parse_default(""), Node::Root { children: vec![] });
    }

    #[test]
    fn ordered_list_records_start_and_raw_text() {
        let root = parse_default("5. Start at five\n6. Continue normally\n");
        let lists = top_level_lists(&root);
        assert_eq!(lists.len(), 1);
        let list = lists[0];
        assert!(list.ordered);
        assert_eq!(list.start, Some(5));
        assert!(!list.spread);
        let raw: Vec<_> = list
            .children
            .iter()
            .map(|item| item.raw_text.as_deref())
            .collect();
        assert_eq!(raw, vec![Some("5. Start at five"), Some("6. Continue normally")]);
        assert_eq!(list.children[0].text(), "Start at five");
    }

    #[test]
    fn positions_are_line_and_column_based() {
        let root = parse_default("intro\n\n- a\n- b\n");
        let list = top_level_lists(&root)[0];
        let second = list.children[1].position.unwrap();
        assert_eq!(second.start.line, 4);
        assert_eq!(second.start.column, 1);
        assert_eq!(second.start.offset, 11);
    }

    #[test]
    fn tight_item_with_nested_list_keeps_both() {
        let root = parse_default("1. outer\n   - inner\n2. next\n");
        let list = top_level_lists(&root)[0];
        let first = &list.children[0];
        assert_eq!(first.children.len(), 2);
        assert_eq!(first.children[0], Node::paragraph("outer"));
        let nested: Vec<_> = first.nested_lists().collect();
        assert_eq!(nested.len(), 1);
        assert!(!nested[0].ordered);
        assert_eq!(nested[0].children[0].text(), "inner");
    }

    #[test]
    fn loose_list_is_spread() {
        let root = parse_default("- a\n\n- b\n");
        assert!(top_level_lists(&root)[0].spread);
    }

    #[test]
    fn frontmatter_is_skipped_but_offsets_kept() {
        let source = "---\ntitle: x\n---\n- item\n";
        let root = parse_default(source);
        let list = top_level_lists(&root)[0];
        let position = list.children[0].position.unwrap();
        assert_eq!(position.start.line, 4);
        assert_eq!(&source[position.start.offset..position.start.offset + 6], "- item");
    }

    #[test]
    fn wrapper_attributes_reach_items() {
        let source = "<List type=\"feature\" tone='calm'>\n\n- one\n- two\n\n</List>\n\n- plain\n";
        let root = parse_default(source);
        let lists = top_level_lists(&root);
        assert_eq!(lists.len(), 2);
        assert_eq!(lists[0].children[0].data.type_tag(), Some("feature"));
        assert_eq!(
            lists[0].children[1].data.h_properties.get("tone").and_then(Value::as_str),
            Some("calm")
        );
        assert!(lists[1].children[0].data.is_empty());
        assert!(!root.children().iter().any(|n| matches!(n, Node::Html { .. })));
    }

    #[test]
    fn wrappers_disabled_keeps_html() {
        let config = ParserConfig {
            jsx_wrappers: false,
            ..ParserConfig::default()
        };
        let root = parse("<List type=\"feature\">\n\n- one\n\n</List>\n", &config);
        let lists = top_level_lists(&root);
        assert!(lists[0].children[0].data.is_empty());
        assert!(root.children().iter().any(|n| matches!(n, Node::Html { .. })));
    }

    #[test]
    fn task_markers_are_recorded() {
        let root = parse_default("- [x] done\n- [ ] todo\n");
        let list = top_level_lists(&root)[0];
        assert_eq!(list.children[0].checked, Some(true));
        assert_eq!(list.children[1].checked, Some(false));
        assert_eq!(list.children[1].text(), "todo");
    }

    #[test]
    fn open_tag_parsing() {
        let frame = parse_open_tag("<List type=\"problem-intuition\" compact>").unwrap();
        assert_eq!(frame.name, "List");
        assert_eq!(frame.attrs.get("type").map(String::as_str), Some("problem-intuition"));
        assert_eq!(frame.attrs.get("compact").map(String::as_str), Some("true"));
        assert!(parse_open_tag("<List />").is_none());
        assert!(parse_open_tag("<1abc>").is_none());
        assert!(parse_open_tag("<img src=\"a.png\">").is_none());
        assert!(parse_open_tag("<List type=\"unterminated>").is_none());
        assert_eq!(parse_close_tag("</List>"), Some("List"));
        assert_eq!(parse_close_tag("</div>"), None);
    }

    #[test]
    fn leading_thematic_break_is_not_frontmatter() {
        let source = "---\n\n1. a\n2. b\n\n---\n\nend\n";
        assert_eq!(strip_frontmatter(source), source);
        let root = parse_default(source);
        assert_eq!(top_level_lists(&root).len(), 1);
        assert_eq!(root.children()[0], Node::ThematicBreak);
    }

    #[test]
    fn frontmatter_needs_exact_closing_line() {
        assert_eq!(strip_frontmatter("---\ntitle: x\n---\nbody\n"), "body\n");
        assert_eq!(
            strip_frontmatter("---\ntitle: x\n--- not closed\n"),
            "---\ntitle: x\n--- not closed\n"
        );
        assert_eq!(strip_frontmatter("----\ntitle: x\n---\n"), "----\ntitle: x\n---\n");
    }

    #[test]
    fn plain_html_is_kept_and_does_not_tag_lists() {
        let root = parse_default("<img src=\"a.png\" alt=\"pic\">\n\n1. one\n\n- two\n");
        let lists = top_level_lists(&root);
        assert_eq!(lists.len(), 2);
        assert!(lists.iter().all(|list| list.children[0].data.is_empty()));
        assert!(matches!(&root.children()[0], Node::Html { value } if value.contains("a.png")));
    }

    #[test]
    fn mismatched_close_keeps_wrapper_open() {
        let source = "<Steps type=\"feature\">\n\n</Other>\n\n- one\n\n</Steps>\n\n- two\n";
        let root = parse_default(source);
        let lists = top_level_lists(&root);
        assert_eq!(lists[0].children[0].data.type_tag(), Some("feature"));
        assert!(lists[1].children[0].data.is_empty());
        let html: Vec<_> = root
            .children()
            .iter()
            .filter_map(|n| match n {
                Node::Html { value } => Some(value.trim()),
                _ => None,
            })
            .collect();
        assert_eq!(html, vec!["</Other>"]);
    }

    #[test]
    fn images_keep_url_and_alt() {
        let root = parse_default("![alt text](x.png \"Title\")\n");
        assert_eq!(
            root.children()[0],
            Node::Paragraph {
                children: vec![Node::Image {
                    url: "x.png".to_string(),
                    title: Some("Title".to_string()),
                    alt: "alt text".to_string(),
                }]
            }
        );
    }
}
