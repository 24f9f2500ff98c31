//! A subset of CSS selectors.
//!
//! Supported: type (`button`, `*`), id (`#start`), class (`.hint`),
//! attribute presence and equality (`[data-i18n]`, `[type="radio"]`),
//! compound selectors (`input.small[type=range]`), descendant and child
//! combinators, and comma separated lists.

use crate::{Document, NodeId};
use robopaint_core::{BridgeError, BridgeResult};

/// A parsed, comma separated selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList(Vec<ComplexSelector>);

#[derive(Debug, Clone, PartialEq, Eq)]
struct ComplexSelector {
    /// Rightmost compound first.
    parts: Vec<(CompoundSelector, Combinator)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct CompoundSelector {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, Option<String>)>,
}

impl CompoundSelector {
    fn is_empty(&self) -> bool {
        self.tag.is_none() && self.id.is_none() && self.classes.is_empty() && self.attrs.is_empty()
    }

    fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let element = doc.element(node);
        if let Some(tag) = &self.tag {
            if tag != "*" && tag != element.tag() {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if element.id() != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.iter().all(|c| element.has_class(c)) {
            return false;
        }
        self.attrs.iter().all(|(name, value)| match (element.attr(name), value) {
            (Some(_), None) => true,
            (Some(actual), Some(expected)) => actual == expected,
            (None, _) => false,
        })
    }
}

impl SelectorList {
    /// Parses a selector list.
    pub fn parse(input: &str) -> BridgeResult<Self> {
        let groups = split_top_level(input);
        let mut selectors = Vec::with_capacity(groups.len());
        for group in groups {
            selectors.push(parse_complex(group).map_err(|message| BridgeError::Selector {
                selector: input.to_string(),
                message,
            })?);
        }
        Ok(Self(selectors))
    }

    /// Checks whether `node` matches any selector of the list.
    #[must_use]
    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        self.0.iter().any(|selector| selector.matches(doc, node))
    }
}

impl ComplexSelector {
    fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let Some(((last, _), rest)) = self.parts.split_first() else {
            return false;
        };
        last.matches(doc, node) && match_ancestors(doc, node, rest, self.parts[0].1)
    }
}

/// Matches the remaining compounds (rightmost first) against the ancestors
/// of `node`, where `combinator` links `node` to the next compound.
fn match_ancestors(doc: &Document, node: NodeId, rest: &[(CompoundSelector, Combinator)], combinator: Combinator) -> bool {
    let Some(((compound, next_combinator), remaining)) = rest.split_first() else {
        return true;
    };
    let mut current = doc.element(node).parent();
    while let Some(ancestor) = current {
        if compound.matches(doc, ancestor) && match_ancestors(doc, ancestor, remaining, *next_combinator) {
            return true;
        }
        if combinator == Combinator::Child {
            return false;
        }
        current = doc.element(ancestor).parent();
    }
    false
}

fn split_top_level(input: &str) -> Vec<&str> {
    let mut groups = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        match (c, quote) {
            ('"' | '\'', None) => quote = Some(c),
            (c, Some(q)) if c == q => quote = None,
            ('[', None) => depth += 1,
            (']', None) => depth = depth.saturating_sub(1),
            (',', None) if depth == 0 => {
                groups.push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    groups.push(&input[start..]);
    groups
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

fn parse_complex(input: &str) -> Result<ComplexSelector, String> {
    let chars: Vec<char> = input.trim().chars().collect();
    if chars.is_empty() {
        return Err("empty selector".to_string());
    }

    // Left to right: (compound, combinator linking it to the previous one).
    let mut parsed: Vec<(CompoundSelector, Combinator)> = Vec::new();
    let mut current = CompoundSelector::default();
    let mut pending = Combinator::Descendant;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '>' => {
                let mut combinator = Combinator::Descendant;
                while i < chars.len() && matches!(chars[i], ' ' | '\t' | '\n' | '>') {
                    if chars[i] == '>' {
                        combinator = Combinator::Child;
                    }
                    i += 1;
                }
                if current.is_empty() {
                    return Err(format!("combinator without a left-hand selector at {}", i));
                }
                parsed.push((std::mem::take(&mut current), pending));
                pending = combinator;
                continue;
            }
            '#' | '.' => {
                let (ident, next) = read_ident(&chars, i + 1);
                if ident.is_empty() {
                    return Err(format!("expected a name after '{}'", c));
                }
                if c == '#' {
                    current.id = Some(ident);
                } else {
                    current.classes.push(ident);
                }
                i = next;
            }
            '[' => {
                let (attr, next) = parse_attr(&chars, i + 1)?;
                current.attrs.push(attr);
                i = next;
            }
            '*' => {
                current.tag = Some("*".to_string());
                i += 1;
            }
            c if is_ident_char(c) => {
                let (ident, next) = read_ident(&chars, i);
                current.tag = Some(ident.to_ascii_lowercase());
                i = next;
            }
            other => return Err(format!("unexpected character '{}'", other)),
        }
    }

    if current.is_empty() {
        return Err("selector ends with a combinator".to_string());
    }
    parsed.push((current, pending));

    // Rightmost first; each entry keeps the combinator linking it to the
    // compound on its left.
    parsed.reverse();
    Ok(ComplexSelector { parts: parsed })
}

fn read_ident(chars: &[char], start: usize) -> (String, usize) {
    let mut end = start;
    while end < chars.len() && is_ident_char(chars[end]) {
        end += 1;
    }
    (chars[start..end].iter().collect(), end)
}

fn parse_attr(chars: &[char], start: usize) -> Result<((String, Option<String>), usize), String> {
    let (name, mut i) = read_ident(chars, start);
    if name.is_empty() {
        return Err("expected an attribute name".to_string());
    }
    match chars.get(i) {
        Some(']') => return Ok(((name, None), i + 1)),
        Some('=') => i += 1,
        _ => return Err(format!("malformed attribute selector for '{}'", name)),
    }

    let value = match chars.get(i) {
        Some(q @ ('"' | '\'')) => {
            let q = *q;
            let begin = i + 1;
            let end = chars[begin..]
                .iter()
                .position(|c| *c == q)
                .map(|offset| begin + offset)
                .ok_or_else(|| "unterminated quoted value".to_string())?;
            i = end + 1;
            chars[begin..end].iter().collect()
        }
        _ => {
            let (value, next) = read_ident(chars, i);
            i = next;
            value
        }
    };

    if chars.get(i) != Some(&']') {
        return Err(format!("expected ']' after attribute '{}'", name));
    }
    Ok(((name, Some(value)), i + 1))
}
