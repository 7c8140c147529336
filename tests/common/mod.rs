//! Shared helpers for integration tests: a minimal DOM built with quick-xml,
//! used to check that written markup parses back to the text that was
//! written.

#![allow(dead_code)]

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Concatenated character data of all descendants, CDATA included.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                Node::Element(element) => element.collect_text(out),
                Node::Text(text) => out.push_str(text),
                Node::Comment(_) => {}
            }
        }
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|child| match child {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    pub fn comments(&self) -> impl Iterator<Item = &str> {
        self.children.iter().filter_map(|child| match child {
            Node::Comment(text) => Some(text.as_str()),
            _ => None,
        })
    }
}

/// Parses a document with exactly one root element.
pub fn parse(xml: &str) -> Result<Element, String> {
    let mut root = parse_nodes(xml)?;
    let mut elements = root.children.drain(..).filter_map(|child| match child {
        Node::Element(element) => Some(element),
        _ => None,
    });
    let first = elements.next().ok_or("no root element")?;
    if elements.next().is_some() {
        return Err("more than one root element".to_string());
    }
    Ok(first)
}

/// Parses a fragment that may contain text and several elements at the top
/// level. The result is a synthetic element holding the top level nodes.
pub fn parse_fragment(xml: &str) -> Result<Element, String> {
    let wrapped = format!("<fragment>{xml}</fragment>");
    parse(&wrapped)
}

fn parse_nodes(xml: &str) -> Result<Element, String> {
    let mut reader = Reader::from_str(xml);
    let mut stack = vec![Element::default()];

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => stack.push(start_element(&e)?),
            Ok(Event::Empty(e)) => {
                let element = start_element(&e)?;
                push_child(&mut stack, Node::Element(element));
            }
            Ok(Event::End(_)) => {
                if stack.len() < 2 {
                    return Err("unbalanced end tag".to_string());
                }
                let element = stack.pop().ok_or("empty stack")?;
                push_child(&mut stack, Node::Element(element));
            }
            Ok(Event::Text(e)) => push_text(&mut stack, &String::from_utf8_lossy(e.as_ref())),
            Ok(Event::CData(e)) => push_text(&mut stack, &String::from_utf8_lossy(e.as_ref())),
            Ok(Event::GeneralRef(e)) => {
                let entity = String::from_utf8_lossy(e.as_ref());
                let resolved =
                    resolve_entity(&entity).ok_or_else(|| format!("unknown entity &{entity};"))?;
                push_text(&mut stack, &resolved);
            }
            Ok(Event::Comment(e)) => {
                push_child(&mut stack, Node::Comment(String::from_utf8_lossy(e.as_ref()).into_owned()))
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(format!("{e} in {xml:?}")),
        }
    }

    if stack.len() != 1 {
        return Err(format!("{} unclosed elements in {xml:?}", stack.len() - 1));
    }
    stack.pop().ok_or_else(|| "empty stack".to_string())
}

fn start_element(e: &BytesStart<'_>) -> Result<Element, String> {
    let mut element = Element {
        name: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
        ..Element::default()
    };
    for attr in e.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        let raw = String::from_utf8_lossy(&attr.value);
        let value = quick_xml::escape::unescape(&raw).map_err(|e| e.to_string())?;
        element.attributes.push((
            String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
            value.into_owned(),
        ));
    }
    Ok(element)
}

fn push_child(stack: &mut [Element], node: Node) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    }
}

fn push_text(stack: &mut [Element], text: &str) {
    let Some(parent) = stack.last_mut() else {
        return;
    };
    if let Some(Node::Text(existing)) = parent.children.last_mut() {
        existing.push_str(text);
    } else {
        parent.children.push(Node::Text(text.to_string()));
    }
}

fn resolve_entity(entity: &str) -> Option<String> {
    match entity {
        "apos" => return Some("'".to_string()),
        "quot" => return Some("\"".to_string()),
        "lt" => return Some("<".to_string()),
        "gt" => return Some(">".to_string()),
        "amp" => return Some("&".to_string()),
        _ => {}
    }

    let code = if let Some(hex) = entity.strip_prefix("#x") {
        u32::from_str_radix(hex, 16).ok()?
    } else {
        entity.strip_prefix('#')?.parse::<u32>().ok()?
    };
    char::from_u32(code).map(|c| c.to_string())
}

/// Decodes a complete single-quoted script string literal.
pub fn unquote_script_string(literal: &str) -> Result<String, String> {
    let body = literal
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
        .ok_or_else(|| format!("not a quoted literal: {literal:?}"))?;

    let mut out = String::new();
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('\\') => out.push('\\'),
                Some('\'') => out.push('\''),
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some('t') => out.push('\t'),
                Some('u') => {
                    let hex: String = chars.by_ref().take(4).collect();
                    let code = u32::from_str_radix(&hex, 16).map_err(|e| e.to_string())?;
                    out.push(char::from_u32(code).ok_or("invalid escape")?);
                }
                other => return Err(format!("unknown escape {other:?}")),
            },
            '\'' => return Err("unescaped quote inside literal".to_string()),
            '\n' | '\r' => return Err("line break inside literal".to_string()),
            c => out.push(c),
        }
    }
    Ok(out)
}
