//! Document trees described as JSON, rendered through a [`MarkupWriter`].
//!
//! ```
//! use tagstream::MarkupWriter;
//! use tagstream::tree::parse_document;
//!
//! let nodes = parse_document(r#"
//!     {"type": "element", "name": "p", "classes": ["lead"],
//!      "children": [{"type": "text", "text": "Fish & Chips"}]}
//! "#)?;
//! let mut w = MarkupWriter::in_memory();
//! tagstream::tree::render_all(&nodes, &mut w)?;
//! assert_eq!(w.into_string()?, r#"<p class="lead">Fish &amp; Chips</p>"#);
//! # Ok::<(), tagstream::Error>(())
//! ```

use std::collections::BTreeMap;
use std::io::Write;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::writer::MarkupWriter;

/// One node of a document tree.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Node {
    Element {
        name: String,
        /// Attribute values: strings, numbers and booleans are written,
        /// `null` skips the attribute.
        #[serde(default)]
        attributes: BTreeMap<String, Value>,
        #[serde(default)]
        classes: Vec<String>,
        #[serde(default)]
        children: Vec<Node>,
    },
    Text {
        text: String,
    },
    Comment {
        text: String,
    },
    Cdata {
        text: String,
    },
    /// A `<script>` element with the given source.
    Script {
        source: String,
    },
    /// Children serialized and embedded as CDATA text.
    Quoted {
        #[serde(default)]
        children: Vec<Node>,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Document {
    Many(Vec<Node>),
    One(Node),
}

/// Parses a document: a single node or an array of nodes.
pub fn parse_document(json: &str) -> Result<Vec<Node>> {
    let document: Document =
        serde_json::from_str(json).map_err(|e| Error::InvalidDocument(e.to_string()))?;
    Ok(match document {
        Document::Many(nodes) => nodes,
        Document::One(node) => vec![node],
    })
}

/// Renders `nodes` in order.
pub fn render_all<W: Write>(nodes: &[Node], out: &mut MarkupWriter<W>) -> Result<()> {
    for node in nodes {
        node.render(out)?;
    }
    Ok(())
}

impl Node {
    pub fn render<W: Write>(&self, out: &mut MarkupWriter<W>) -> Result<()> {
        match self {
            Node::Element {
                name,
                attributes,
                classes,
                children,
            } => {
                out.open_tag_header(name)?;
                for (attribute, value) in attributes {
                    write_attribute(out, attribute, value)?;
                }
                if !classes.is_empty() {
                    out.open_class_list()?;
                    for class in classes {
                        out.write_text(class)?;
                    }
                    out.close_class_list()?;
                }
                if children.is_empty() {
                    return out.close_tag_header_empty();
                }
                out.close_tag_header_open()?;
                render_all(children, out)?;
                out.close_tag(name)
            }
            Node::Text { text } => out.write_text(text),
            Node::Comment { text } => out.write_comment(text),
            Node::Cdata { text } => {
                out.open_char_data()?;
                out.write_char_data(text)?;
                out.close_char_data()
            }
            Node::Script { source } => {
                out.open_script()?;
                out.write_script(source)?;
                out.close_script()
            }
            Node::Quoted { children } => {
                out.open_quoted_subtree()?;
                render_all(children, out)?;
                out.close_quoted_subtree()
            }
        }
    }
}

fn write_attribute<W: Write>(out: &mut MarkupWriter<W>, name: &str, value: &Value) -> Result<()> {
    match value {
        Value::Null => out.write_attribute(name, None::<&str>),
        Value::Bool(b) => out.write_attribute(name, *b),
        Value::String(s) => out.write_attribute(name, s.as_str()),
        Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => out.write_attribute(name, i),
            (None, Some(u), _) => out.write_attribute(name, u),
            (None, None, Some(f)) => out.write_attribute(name, f),
            (None, None, None) => out.write_attribute(name, n.to_string()),
        },
        Value::Array(_) | Value::Object(_) => Err(Error::InvalidDocument(format!(
            "attribute {name:?} must be a string, number, boolean or null"
        ))),
    }
}
