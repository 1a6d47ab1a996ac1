//! Hierarchical numbering of list items.
//!
//! A single depth-first, pre-order walk annotates every list item with its
//! nesting `level`, an element `name` chosen from its type tag and, for ordered
//! lists, a `display_number`. Numerals written in the source (`5.`, `1.1.`)
//! take precedence over the running counter and reset it.

use crate::config::Config;
use crate::node::{ItemVariant, List, ListItem, Node};

/// Next sequential number for each list nesting level.
#[derive(Debug, Default)]
pub struct CounterStack {
    next: Vec<u64>,
}

impl CounterStack {
    /// Start a list at `depth`, discarding counters of deeper levels.
    fn enter(&mut self, depth: usize, start: Option<u64>) {
        self.next.truncate(depth);
        self.next.resize(depth, 1);
        self.next.push(start.unwrap_or(1));
    }

    fn advance(&mut self, depth: usize) -> u64 {
        match self.next.get_mut(depth) {
            Some(next) => {
                let current = *next;
                *next = current.saturating_add(1);
                current
            }
            None => 1,
        }
    }

    fn reset(&mut self, depth: usize, value: u64) {
        if let Some(next) = self.next.get_mut(depth) {
            *next = value.saturating_add(1);
        }
    }
}

/// A leading numeral such as `5.`, `3)` or `1.2.`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Numeral {
    /// Components joined with dots, without the trailing delimiter.
    pub display: String,
    /// First component, used to continue the running counter.
    pub leading: u64,
    /// Bytes covered by the numeral, its delimiter and following whitespace.
    pub len: usize,
}

/// Parse the numeral at the start of `text`, ignoring leading whitespace.
///
/// A single component needs a `.` or `)` delimiter; dotted forms may omit it.
/// The numeral must be followed by whitespace or the end of the text.
pub fn parse_numeral(text: &str) -> Option<Numeral> {
    let indent = text.len() - text.trim_start().len();
    let rest = &text[indent..];
    let bytes = rest.as_bytes();

    let mut components = Vec::new();
    let mut pos = 0;
    let mut delimited = false;
    loop {
        let digits = bytes[pos..].iter().take_while(|b| b.is_ascii_digit()).count();
        if digits == 0 {
            if components.is_empty() {
                return None;
            }
            break;
        }
        components.push(&rest[pos..pos + digits]);
        pos += digits;
        delimited = false;
        match bytes.get(pos) {
            Some(b'.') => {
                pos += 1;
                delimited = true;
            }
            Some(b')') => {
                pos += 1;
                delimited = true;
                break;
            }
            _ => break,
        }
    }

    if components.len() == 1 && !delimited {
        return None;
    }
    let after = &rest[pos..];
    if !(after.is_empty() || after.starts_with(char::is_whitespace)) {
        return None;
    }

    let leading = match components[0].parse::<u64>() {
        Ok(value) => value,
        Err(_) => {
            log::debug!("numeral {:?} out of range, ignoring", components[0]);
            return None;
        }
    };
    let whitespace = after.len() - after.trim_start().len();

    Some(Numeral {
        display: components.join("."),
        leading,
        len: indent + pos + whitespace,
    })
}

/// Number every list in the tree.
pub fn number_lists(root: &mut Node, config: &Config) {
    let mut counters = CounterStack::default();
    walk(root, 0, &mut counters, config);
}

fn walk(node: &mut Node, depth: usize, counters: &mut CounterStack, config: &Config) {
    match node {
        Node::List(list) => number_list(list, depth, counters, config),
        _ => {
            if let Some(children) = node.children_mut() {
                for child in children {
                    walk(child, depth, counters, config);
                }
            }
        }
    }
}

fn number_list(list: &mut List, depth: usize, counters: &mut CounterStack, config: &Config) {
    list.nesting_level = depth;
    counters.enter(depth, list.start);
    if list.children.is_empty() {
        log::debug!("empty list at depth {}", depth);
    }

    for item in &mut list.children {
        annotate_item(item, list.ordered, depth, counters, config);
        for child in &mut item.children {
            walk(child, depth + 1, counters, config);
        }
    }
}

fn annotate_item(
    item: &mut ListItem,
    ordered: bool,
    depth: usize,
    counters: &mut CounterStack,
    config: &Config,
) {
    let variant = ItemVariant::from_tag(item.data.type_tag());
    item.name = Some(config.elements.name_for(&variant).to_string());
    item.variant = variant;
    item.level = Some(depth + config.numbering.level_base);

    if !ordered {
        item.explicit_number = None;
        item.display_number = None;
        return;
    }

    let numeral = if config.numbering.honor_source_numerals {
        source_numeral(item)
    } else {
        None
    };
    item.explicit_number = numeral.as_ref().map(|numeral| numeral.display.clone());

    let display = match numeral {
        Some(numeral) => {
            log::debug!("explicit numeral {} at depth {}", numeral.display, depth);
            counters.reset(depth, numeral.leading);
            numeral.display
        }
        None => counters.advance(depth).to_string(),
    };

    if config.numbering.strip_numeral_prefix {
        strip_numeral_prefix(&mut item.children, &display);
    }
    log::trace!(
        "item {:?} -> level {:?}, number {}",
        item.raw_text,
        item.level,
        display
    );
    item.display_number = Some(display);
}

/// The numeral an item was written with, if its source is known.
fn source_numeral(item: &ListItem) -> Option<Numeral> {
    if item.position.is_none() {
        log::trace!("item without position, numbering sequentially");
        return None;
    }
    parse_numeral(item.raw_text.as_deref()?)
}

/// Drop `display` from the start of the item's visible text when it is repeated there.
fn strip_numeral_prefix(children: &mut [Node], display: &str) {
    let Some(text) = first_text_mut(children) else {
        return;
    };
    if let Some(numeral) = parse_numeral(text) {
        if numeral.display == display {
            text.replace_range(..numeral.len, "");
        }
    }
}

fn first_text_mut(children: &mut [Node]) -> Option<&mut String> {
    match children.first_mut()? {
        Node::Text { value } => Some(value),
        Node::List(_) => None,
        node => first_text_mut(node.children_mut()?),
    }
}

/// Fill in `raw_text` of positioned items from the text their positions refer to.
pub fn attach_source(root: &mut Node, source: &str) {
    match root {
        Node::List(list) => {
            for item in &mut list.children {
                if item.raw_text.is_none() {
                    item.raw_text = item
                        .position
                        .and_then(|p| source.get(p.start.offset..p.end.offset))
                        .and_then(|raw| raw.lines().next())
                        .map(|line| line.trim().to_string());
                }
                for child in &mut item.children {
                    attach_source(child, source);
                }
            }
        }
        node => {
            if let Some(children) = node.children_mut() {
                for child in children {
                    attach_source(child, source);
                }
            }
        }
    }
}

/// All lists in document order, nested ones after their parent.
pub fn lists(root: &Node) -> Vec<&List> {
    let mut out = Vec::new();
    collect_lists(root, &mut out);
    out
}

fn collect_lists<'a>(node: &'a Node, out: &mut Vec<&'a List>) {
    match node {
        Node::List(list) => {
            out.push(list);
            for item in &list.children {
                for child in &item.children {
                    collect_lists(child, out);
                }
            }
        }
        _ => {
            for child in node.children() {
                collect_lists(child, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Data, Point, Position};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn positioned(raw: &str) -> ListItem {
        let point = Point {
            line: 1,
            column: 1,
            offset: 0,
        };
        ListItem {
            raw_text: Some(raw.to_string()),
            position: Some(Position {
                start: point,
                end: point,
            }),
            ..ListItem::new(vec![Node::paragraph(raw)])
        }
    }

    fn numbered(list: List) -> List {
        let mut root = Node::Root {
            children: vec![Node::List(list)],
        };
        number_lists(&mut root, &Config::default());
        match root {
            Node::Root { mut children } => match children.remove(0) {
                Node::List(list) => list,
                other => panic!("expected list, got {:?}", other),
            },
            _ => unreachable!(),
        }
    }

    #[rstest]
    #[case("5. Start", Some("5"), 5, 3)]
    #[case("1.1. Sub", Some("1.1"), 1, 5)]
    #[case("1.2 Sub", Some("1.2"), 1, 4)]
    #[case("3) Paren", Some("3"), 3, 3)]
    #[case("  7.", Some("7"), 7, 4)]
    #[case("12.3.4. deep", Some("12.3.4"), 12, 8)]
    fn parses_numerals(
        #[case] text: &str,
        #[case] display: Option<&str>,
        #[case] leading: u64,
        #[case] len: usize,
    ) {
        let numeral = parse_numeral(text).unwrap();
        assert_eq!(Some(numeral.display.as_str()), display);
        assert_eq!(numeral.leading, leading);
        assert_eq!(numeral.len, len);
    }

    #[rstest]
    #[case("")]
    #[case("- bullet")]
    #[case("42 apples")]
    #[case("5.5kg")]
    #[case("v1.2")]
    #[case("99999999999999999999999. huge")]
    fn rejects_non_numerals(#[case] text: &str) {
        assert_eq!(parse_numeral(text), None);
    }

    #[test]
    fn sequential_numbering_without_positions() {
        let list = numbered(List::ordered(
            Some(3),
            vec![
                ListItem::new(vec![Node::paragraph("a")]),
                ListItem::new(vec![Node::paragraph("b")]),
                ListItem::new(vec![Node::paragraph("c")]),
            ],
        ));
        assert_eq!(list.display_numbers(), vec![Some("3"), Some("4"), Some("5")]);
        assert!(list.children.iter().all(|item| item.level == Some(1)));
    }

    #[test]
    fn unpositioned_item_ignores_raw_numeral() {
        let mut item = positioned("9. nine");
        item.position = None;
        let list = numbered(List::ordered(None, vec![item, ListItem::default()]));
        assert_eq!(list.display_numbers(), vec![Some("1"), Some("2")]);
        assert_eq!(list.children[0].explicit_number, None);
    }

    #[test]
    fn explicit_numerals_restart_counter() {
        let list = numbered(List::ordered(
            Some(1),
            vec![
                positioned("1. a"),
                positioned("2. b"),
                positioned("1. c"),
                ListItem::new(vec![Node::paragraph("d")]),
            ],
        ));
        assert_eq!(
            list.display_numbers(),
            vec![Some("1"), Some("2"), Some("1"), Some("2")]
        );
    }

    #[test]
    fn dotted_numeral_kept_verbatim_and_continues_from_leading() {
        let list = numbered(List::ordered(
            None,
            vec![
                positioned("1.1. first"),
                ListItem::new(vec![Node::paragraph("second")]),
            ],
        ));
        assert_eq!(list.display_numbers(), vec![Some("1.1"), Some("2")]);
        assert_eq!(list.children[0].text(), "first");
    }

    #[test]
    fn unordered_items_get_level_only() {
        let list = numbered(List::unordered(vec![
            positioned("- a"),
            ListItem::new(vec![Node::paragraph("b")]),
        ]));
        assert_eq!(list.display_numbers(), vec![None, None]);
        assert!(list.children.iter().all(|item| item.level == Some(1)));
        assert_eq!(list.children[0].name.as_deref(), Some("ListItem"));
    }

    #[test]
    fn empty_list_stays_valid() {
        let list = numbered(List::ordered(None, vec![]));
        assert!(list.children.is_empty());
        assert_eq!(list.nesting_level, 0);
    }

    #[test]
    fn nested_counters_do_not_leak() {
        let nested = |n: usize| {
            Node::List(List::ordered(
                None,
                (0..n)
                    .map(|_| ListItem::new(vec![Node::paragraph("child")]))
                    .collect(),
            ))
        };
        let list = numbered(List::ordered(
            None,
            vec![
                ListItem::new(vec![Node::paragraph("a"), nested(3)]),
                ListItem::new(vec![Node::paragraph("b"), nested(2)]),
                ListItem::new(vec![Node::paragraph("c")]),
            ],
        ));
        assert_eq!(list.display_numbers(), vec![Some("1"), Some("2"), Some("3")]);

        let inner: Vec<_> = list
            .children
            .iter()
            .flat_map(|item| item.nested_lists())
            .collect();
        assert_eq!(inner[0].display_numbers(), vec![Some("1"), Some("2"), Some("3")]);
        assert_eq!(inner[1].display_numbers(), vec![Some("1"), Some("2")]);
        assert_eq!(inner[0].nesting_level, 1);
        assert!(inner[1].children.iter().all(|item| item.level == Some(2)));
    }

    #[test]
    fn variant_names_follow_type_tag() {
        let tagged = |tag: &str| ListItem {
            data: Data {
                h_properties: [("type".to_string(), serde_json::Value::from(tag))].into(),
            },
            ..ListItem::default()
        };
        let list = numbered(List::unordered(vec![
            tagged("problem-intuition"),
            tagged("feature"),
            tagged("aside"),
        ]));
        let names: Vec<_> = list.children.iter().map(|i| i.name.as_deref()).collect();
        assert_eq!(
            names,
            vec![
                Some("ProblemIntuitionItem"),
                Some("FeatureItem"),
                Some("ListItem")
            ]
        );
        assert_eq!(list.children[2].variant, ItemVariant::Custom("aside".into()));
        assert_eq!(list.children[2].data.type_tag(), Some("aside"));
    }

    #[test]
    fn level_base_zero() {
        let mut root = Node::Root {
            children: vec![Node::List(List::unordered(vec![ListItem::default()]))],
        };
        let mut config = Config::default();
        config.numbering.level_base = 0;
        number_lists(&mut root, &config);
        assert_eq!(lists(&root)[0].children[0].level, Some(0));
    }

    #[test]
    fn source_numerals_can_be_ignored() {
        let mut root = Node::Root {
            children: vec![Node::List(List::ordered(
                Some(1),
                vec![positioned("1. a"), positioned("1. b")],
            ))],
        };
        let mut config = Config::default();
        config.numbering.honor_source_numerals = false;
        number_lists(&mut root, &config);
        assert_eq!(lists(&root)[0].display_numbers(), vec![Some("1"), Some("2")]);
    }

    #[test]
    fn attach_source_fills_raw_text() {
        let source = "intro\n3. three\n";
        let item = ListItem {
            position: Some(Position {
                start: Point {
                    line: 2,
                    column: 1,
                    offset: 6,
                },
                end: Point {
                    line: 2,
                    column: 9,
                    offset: 14,
                },
            }),
            ..ListItem::default()
        };
        let mut root = Node::Root {
            children: vec![Node::List(List::ordered(Some(3), vec![item]))],
        };
        attach_source(&mut root, source);
        number_lists(&mut root, &Config::default());
        let list = lists(&root)[0];
        assert_eq!(list.children[0].raw_text.as_deref(), Some("3. three"));
        assert_eq!(list.children[0].explicit_number.as_deref(), Some("3"));
    }
}
