//! Selector subset understood by the in-memory page
//!
//! Supported: selector lists, descendant and child combinators, type and
//! universal selectors, `#id`, `.class`, attribute selectors with
//! `= ^= $= *= ~=` (optionally case-insensitive), `:checked`, `:disabled`,
//! `:enabled` and `:not(<compound>)`.

use super::DomTree;
use crate::port::NodeId;

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct SelectorList(Vec<Complex>);

#[derive(Clone, Debug, PartialEq)]
struct Complex {
    compounds: Vec<Compound>,
    /// `combinators[i]` sits between `compounds[i]` and `compounds[i + 1]`.
    combinators: Vec<Combinator>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Clone, Debug, Default, PartialEq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrSelector>,
    pseudos: Vec<Pseudo>,
}

#[derive(Clone, Debug, PartialEq)]
struct AttrSelector {
    name: String,
    op: AttrOp,
    value: String,
    case_insensitive: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum AttrOp {
    Exists,
    Equals,
    Prefix,
    Suffix,
    Contains,
    Includes,
}

#[derive(Clone, Debug, PartialEq)]
enum Pseudo {
    Checked,
    Disabled,
    Enabled,
    Not(Box<Compound>),
}

impl SelectorList {
    pub(crate) fn parse(input: &str) -> Result<Self, String> {
        let mut list = Vec::new();
        for part in split_top_level(input, ',') {
            let part = part.trim();
            if part.is_empty() {
                return Err(format!("empty selector in '{}'", input));
            }
            list.push(parse_complex(part)?);
        }
        if list.is_empty() {
            return Err("empty selector".to_string());
        }
        Ok(Self(list))
    }

    pub(crate) fn matches(&self, tree: &DomTree, node: NodeId) -> bool {
        self.0.iter().any(|complex| complex.matches(tree, node))
    }
}

impl Complex {
    fn matches(&self, tree: &DomTree, node: NodeId) -> bool {
        self.matches_at(tree, node, self.compounds.len() - 1)
    }

    fn matches_at(&self, tree: &DomTree, node: NodeId, index: usize) -> bool {
        if !self.compounds[index].matches(tree, node) {
            return false;
        }
        if index == 0 {
            return true;
        }
        match self.combinators[index - 1] {
            Combinator::Child => tree
                .parent_element(node)
                .map(|parent| self.matches_at(tree, parent, index - 1))
                .unwrap_or(false),
            Combinator::Descendant => {
                let mut current = tree.parent_element(node);
                while let Some(ancestor) = current {
                    if self.matches_at(tree, ancestor, index - 1) {
                        return true;
                    }
                    current = tree.parent_element(ancestor);
                }
                false
            }
        }
    }
}

impl Compound {
    fn matches(&self, tree: &DomTree, node: NodeId) -> bool {
        let Some(tag) = tree.tag(node) else {
            return false;
        };
        if let Some(expected) = &self.tag {
            if expected != tag {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if tree.attr(node, "id") != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let class_attr = tree.attr(node, "class").unwrap_or_default();
            let present: Vec<&str> = class_attr.split_whitespace().collect();
            if !self.classes.iter().all(|c| present.contains(&c.as_str())) {
                return false;
            }
        }
        for attr in &self.attrs {
            if !attr.matches(tree.attr(node, &attr.name)) {
                return false;
            }
        }
        self.pseudos.iter().all(|pseudo| match pseudo {
            Pseudo::Checked => tree.is_checked(node),
            Pseudo::Disabled => tree.is_disabled(node),
            Pseudo::Enabled => !tree.is_disabled(node),
            Pseudo::Not(inner) => !inner.matches(tree, node),
        })
    }
}

impl AttrSelector {
    fn matches(&self, actual: Option<&str>) -> bool {
        let Some(actual) = actual else {
            return false;
        };
        let (actual, expected) = if self.case_insensitive {
            (actual.to_lowercase(), self.value.to_lowercase())
        } else {
            (actual.to_string(), self.value.clone())
        };
        match self.op {
            AttrOp::Exists => true,
            AttrOp::Equals => actual == expected,
            AttrOp::Prefix => !expected.is_empty() && actual.starts_with(&expected),
            AttrOp::Suffix => !expected.is_empty() && actual.ends_with(&expected),
            AttrOp::Contains => !expected.is_empty() && actual.contains(&expected),
            AttrOp::Includes => actual.split_whitespace().any(|word| word == expected),
        }
    }
}

fn split_top_level(input: &str, separator: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    for ch in input.chars() {
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            current.push(ch);
            continue;
        }
        match ch {
            '"' | '\'' => {
                quote = Some(ch);
                current.push(ch);
            }
            '[' | '(' => {
                depth += 1;
                current.push(ch);
            }
            ']' | ')' => {
                depth -= 1;
                current.push(ch);
            }
            c if c == separator && depth == 0 => {
                parts.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    parts.push(current);
    parts
}

struct Cursor<'a> {
    chars: Vec<char>,
    pos: usize,
    source: &'a str,
}

impl<'a> Cursor<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            source,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn ident(&mut self) -> Result<String, String> {
        let mut out = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '-' || ch == '_' || !ch.is_ascii() {
                out.push(ch);
                self.pos += 1;
            } else if ch == '\\' {
                self.pos += 1;
                if let Some(escaped) = self.bump() {
                    out.push(escaped);
                }
            } else {
                break;
            }
        }
        if out.is_empty() {
            Err(self.error("expected identifier"))
        } else {
            Ok(out)
        }
    }

    fn error(&self, message: &str) -> String {
        format!("{} at {} in '{}'", message, self.pos, self.source)
    }
}

fn parse_complex(input: &str) -> Result<Complex, String> {
    let mut cursor = Cursor::new(input);
    let mut compounds = Vec::new();
    let mut combinators = Vec::new();

    cursor.skip_whitespace();
    loop {
        compounds.push(parse_compound(&mut cursor)?);
        let had_space = cursor.skip_whitespace();
        match cursor.peek() {
            None => break,
            Some('>') => {
                cursor.bump();
                cursor.skip_whitespace();
                combinators.push(Combinator::Child);
            }
            Some('+') | Some('~') => return Err(cursor.error("sibling combinators unsupported")),
            Some(_) if had_space => combinators.push(Combinator::Descendant),
            Some(_) => return Err(cursor.error("unexpected character")),
        }
    }

    Ok(Complex {
        compounds,
        combinators,
    })
}

fn parse_compound(cursor: &mut Cursor<'_>) -> Result<Compound, String> {
    let mut compound = Compound::default();
    let mut consumed = false;

    if cursor.eat('*') {
        consumed = true;
    } else if matches!(cursor.peek(), Some(c) if c.is_alphabetic()) {
        compound.tag = Some(cursor.ident()?.to_ascii_lowercase());
        consumed = true;
    }

    loop {
        match cursor.peek() {
            Some('#') => {
                cursor.bump();
                compound.id = Some(cursor.ident()?);
            }
            Some('.') => {
                cursor.bump();
                compound.classes.push(cursor.ident()?);
            }
            Some('[') => {
                cursor.bump();
                compound.attrs.push(parse_attr(cursor)?);
            }
            Some(':') => {
                cursor.bump();
                compound.pseudos.push(parse_pseudo(cursor)?);
            }
            _ => break,
        }
        consumed = true;
    }

    if consumed {
        Ok(compound)
    } else {
        Err(cursor.error("expected selector"))
    }
}

fn parse_attr(cursor: &mut Cursor<'_>) -> Result<AttrSelector, String> {
    cursor.skip_whitespace();
    let name = cursor.ident()?.to_ascii_lowercase();
    cursor.skip_whitespace();

    let op = match cursor.peek() {
        Some(']') => {
            cursor.bump();
            return Ok(AttrSelector {
                name,
                op: AttrOp::Exists,
                value: String::new(),
                case_insensitive: false,
            });
        }
        Some('=') => AttrOp::Equals,
        Some('^') => AttrOp::Prefix,
        Some('$') => AttrOp::Suffix,
        Some('*') => AttrOp::Contains,
        Some('~') => AttrOp::Includes,
        _ => return Err(cursor.error("expected attribute operator")),
    };
    cursor.bump();
    if op != AttrOp::Equals && !cursor.eat('=') {
        return Err(cursor.error("expected '='"));
    }
    cursor.skip_whitespace();

    let value = match cursor.peek() {
        Some(q @ '"') | Some(q @ '\'') => {
            cursor.bump();
            let mut out = String::new();
            loop {
                match cursor.bump() {
                    Some(c) if c == q => break,
                    Some('\\') => {
                        if let Some(escaped) = cursor.bump() {
                            out.push(escaped);
                        }
                    }
                    Some(c) => out.push(c),
                    None => return Err(cursor.error("unterminated string")),
                }
            }
            out
        }
        _ => cursor.ident()?,
    };

    cursor.skip_whitespace();
    let mut case_insensitive = false;
    if matches!(cursor.peek(), Some('i') | Some('I')) {
        cursor.bump();
        case_insensitive = true;
        cursor.skip_whitespace();
    }
    if !cursor.eat(']') {
        return Err(cursor.error("expected ']'"));
    }

    Ok(AttrSelector {
        name,
        op,
        value,
        case_insensitive,
    })
}

fn parse_pseudo(cursor: &mut Cursor<'_>) -> Result<Pseudo, String> {
    let name = cursor.ident()?.to_ascii_lowercase();
    match name.as_str() {
        "checked" => Ok(Pseudo::Checked),
        "disabled" => Ok(Pseudo::Disabled),
        "enabled" => Ok(Pseudo::Enabled),
        "not" => {
            if !cursor.eat('(') {
                return Err(cursor.error("expected '('"));
            }
            cursor.skip_whitespace();
            let inner = parse_compound(cursor)?;
            cursor.skip_whitespace();
            if !cursor.eat(')') {
                return Err(cursor.error("expected ')'"));
            }
            Ok(Pseudo::Not(Box::new(inner)))
        }
        other => Err(cursor.error(&format!("unsupported pseudo-class :{}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lists_and_combinators() {
        let list = SelectorList::parse("fieldset > label, input[type=\"checkbox\"]:checked").unwrap();
        assert_eq!(list.0.len(), 2);
        assert_eq!(list.0[0].combinators, vec![Combinator::Child]);
        assert_eq!(list.0[1].compounds[0].pseudos, vec![Pseudo::Checked]);
    }

    #[test]
    fn rejects_garbage() {
        assert!(SelectorList::parse("div +").is_err());
        assert!(SelectorList::parse("").is_err());
        assert!(SelectorList::parse("a:hover").is_err());
        assert!(SelectorList::parse("[data-x").is_err());
    }

    #[test]
    fn attribute_operators() {
        let attr = |op, value: &str| AttrSelector {
            name: "x".into(),
            op,
            value: value.into(),
            case_insensitive: false,
        };
        assert!(attr(AttrOp::Prefix, "up").matches(Some("upload")));
        assert!(attr(AttrOp::Suffix, "load").matches(Some("upload")));
        assert!(attr(AttrOp::Contains, "plo").matches(Some("upload")));
        assert!(attr(AttrOp::Includes, "b").matches(Some("a b c")));
        assert!(!attr(AttrOp::Equals, "a").matches(None));
    }
}
