//! The streaming markup writer.
//!
//! [`MarkupWriter`] emits XML/XHTML text to a byte sink while tracking which
//! syntactic context it is in, and escapes every piece of caller text for
//! that context. Element names are kept on a stack so end tags can be
//! checked, and every open construct can be closed in one call with
//! [`MarkupWriter::close_all`].
//!
//! # Example
//!
//! ```
//! use tagstream::MarkupWriter;
//!
//! let mut w = MarkupWriter::in_memory();
//! w.open_tag_header("a")?;
//! w.write_attribute("href", "?x=1&y=2")?;
//! w.close_tag_header_open()?;
//! w.write_text("Tom & Jerry")?;
//! w.close_tag("a")?;
//! assert_eq!(w.into_string()?, r#"<a href="?x=1&amp;y=2">Tom &amp; Jerry</a>"#);
//! # Ok::<(), tagstream::Error>(())
//! ```

mod config;
mod state;
mod value;


pub use config::WriterConfig;
pub use state::{OpenNode, State};
pub use value::{MarkupValue, ScriptLiteral};

use std::fmt;
use std::io::Write;

use crate::error::{Error, Result};
use crate::escape::{
    self, CDATA_BEGIN, CDATA_END, CharDataEscaper, ScriptHost, escape_attribute, escape_content,
    escape_script_string,
};
use crate::io::EncodedSink;

const COMMENT_BEGIN: &str = "<!-- ";
const COMMENT_END: &str = " -->";
const SCRIPT_TAG: &str = "script";

/// Name of the attribute a class list is written to unless another one is
/// given.
pub const CLASS_ATTRIBUTE: &str = "class";

/// Hands the call to the nested writer while a quoted subtree is open.
macro_rules! forward_quoted {
    ($self:ident . $method:ident ( $($arg:expr),* )) => {
        if let Some(inner) = $self.quoted.as_deref_mut() {
            return inner.$method($($arg),*);
        }
    };
}

/// Streaming writer for XML and XHTML markup.
///
/// All `write_*`, `open_*` and `close_*` operations check the current
/// [`State`] first. An operation that is not allowed fails with a usage
/// error and emits nothing.
pub struct MarkupWriter<W: Write> {
    out: EncodedSink<W>,
    state: State,
    stack: Vec<String>,
    /// Name of the streamed attribute or class list that is open.
    attribute: Option<String>,
    /// Attribute names written to the current start tag.
    written_attributes: Vec<String>,
    char_data: CharDataEscaper,
    comment_after_hyphen: bool,
    indent: usize,
    newline: String,
    indent_step: usize,
    /// Written `indent` times for each indented line.
    indent_whitespace: String,
    indenting: bool,
    /// Nested writer collecting a quoted subtree.
    quoted: Option<Box<MarkupWriter<Vec<u8>>>>,
}

impl MarkupWriter<Vec<u8>> {
    /// A writer that collects UTF-8 output in memory.
    pub fn in_memory() -> Self {
        Self::new(Vec::new())
    }

    /// Finishes the writer and returns the collected text.
    ///
    /// Only meaningful for UTF-8 output; other encodings are not decoded.
    pub fn into_string(self) -> Result<String> {
        Ok(String::from_utf8(self.finish()?)?)
    }
}

impl<W: Write> MarkupWriter<W> {
    /// A writer over `out` with the default configuration: UTF-8, no
    /// automatic indentation.
    pub fn new(out: W) -> Self {
        Self::with_config(out, WriterConfig::default())
    }

    /// A writer over `out` configured by `config`.
    pub fn with_config(out: W, config: WriterConfig) -> Self {
        Self {
            out: EncodedSink::new(out, config.encoding),
            state: State::Initial,
            stack: Vec::new(),
            attribute: None,
            written_attributes: Vec::new(),
            char_data: CharDataEscaper::new(),
            comment_after_hyphen: false,
            indent: config.initial_indent,
            newline: config.newline,
            indent_step: config.indent_step,
            indent_whitespace: indent_whitespace(config.indent_whitespace),
            indenting: config.indenting,
            quoted: None,
        }
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// The state of this writer. While a quoted subtree is open this is
    /// [`State::QuotedSubtree`]; see [`MarkupWriter::active_state`].
    pub fn state(&self) -> State {
        self.state
    }

    /// The state of the innermost writer, the one operations go to.
    pub fn active_state(&self) -> State {
        match self.quoted.as_deref() {
            Some(inner) => inner.active_state(),
            None => self.state,
        }
    }

    /// Number of open elements, counting each open quoted subtree as one
    /// level plus the elements open inside it.
    pub fn depth(&self) -> usize {
        self.stack.len() + self.quoted.as_deref().map_or(0, |inner| 1 + inner.depth())
    }

    /// The open elements from outermost to innermost.
    pub fn open_elements(&self) -> Vec<OpenNode> {
        let mut nodes: Vec<OpenNode> = self.stack.iter().cloned().map(OpenNode::Element).collect();
        if let Some(inner) = self.quoted.as_deref() {
            nodes.push(OpenNode::QuotedSubtree);
            nodes.extend(inner.open_elements());
        }
        nodes
    }

    /// Current indent in characters.
    pub fn indent(&self) -> usize {
        match self.quoted.as_deref() {
            Some(inner) => inner.indent(),
            None => self.indent,
        }
    }

    pub fn is_indenting(&self) -> bool {
        self.indenting
    }

    /// The output encoding.
    pub fn encoding(&self) -> &'static encoding_rs::Encoding {
        self.out.encoding()
    }

    pub fn get_ref(&self) -> &W {
        self.out.get_ref()
    }

    // =========================================================================
    // Tags
    // =========================================================================

    /// Writes `<name` and enters [`State::TagHeaderOpen`].
    pub fn open_tag_header(&mut self, name: &str) -> Result<()> {
        forward_quoted!(self.open_tag_header(name));
        self.require("open_tag_header", State::is_content, "Initial or ElementContent")?;
        check_name(name)?;

        if self.indenting {
            self.emit_indent()?;
        }
        self.emit("<")?;
        self.emit(name)?;

        self.stack.push(name.to_owned());
        self.written_attributes.clear();
        self.indent += self.indent_step;
        self.state = State::TagHeaderOpen;
        Ok(())
    }

    /// Writes `>`, ending the start tag.
    pub fn close_tag_header_open(&mut self) -> Result<()> {
        forward_quoted!(self.close_tag_header_open());
        self.require_state("close_tag_header_open", State::TagHeaderOpen)?;
        self.emit(">")?;
        self.state = State::ElementContent;
        Ok(())
    }

    /// Writes `/>`, ending the element that was opened by the last start tag.
    pub fn close_tag_header_empty(&mut self) -> Result<()> {
        forward_quoted!(self.close_tag_header_empty());
        self.require_state("close_tag_header_empty", State::TagHeaderOpen)?;
        self.emit("/>")?;
        self.stack.pop();
        self.indent = self.indent.saturating_sub(self.indent_step);
        self.state = self.content_state();
        Ok(())
    }

    /// Writes a complete start tag without attributes.
    pub fn open_tag(&mut self, name: &str) -> Result<()> {
        self.open_tag_header(name)?;
        self.close_tag_header_open()
    }

    /// Writes a complete start tag with the given attributes.
    pub fn open_tag_with(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<()> {
        self.open_tag_header(name)?;
        for &(attribute, value) in attributes {
            self.write_attribute(attribute, value)?;
        }
        self.close_tag_header_open()
    }

    /// Writes `<name/>`.
    pub fn empty_tag(&mut self, name: &str) -> Result<()> {
        self.open_tag_header(name)?;
        self.close_tag_header_empty()
    }

    /// Writes an empty element with the given attributes.
    pub fn empty_tag_with(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<()> {
        self.open_tag_header(name)?;
        for &(attribute, value) in attributes {
            self.write_attribute(attribute, value)?;
        }
        self.close_tag_header_empty()
    }

    /// Writes `</name>` for the innermost open element.
    ///
    /// Fails with [`Error::MismatchedEndTag`] if `name` is not the innermost
    /// open element, leaving the stack untouched.
    pub fn close_tag(&mut self, name: &str) -> Result<()> {
        forward_quoted!(self.close_tag(name));
        self.require("close_tag", State::is_content, "ElementContent")?;
        match self.stack.last() {
            None => {
                return Err(Error::NoOpenElement {
                    found: name.to_owned(),
                });
            }
            Some(open) if open != name => {
                return Err(Error::MismatchedEndTag {
                    expected: open.clone(),
                    found: name.to_owned(),
                });
            }
            Some(_) => {}
        }

        self.indent = self.indent.saturating_sub(self.indent_step);
        if self.indenting {
            self.emit_indent()?;
        }
        self.emit("</")?;
        self.emit(name)?;
        self.emit(">")?;

        self.stack.pop();
        self.state = self.content_state();
        Ok(())
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    /// Writes ` name="value"` into the open start tag.
    ///
    /// A value without textual form (`None`) writes nothing.
    pub fn write_attribute<V: MarkupValue>(&mut self, name: &str, value: V) -> Result<()> {
        forward_quoted!(self.write_attribute(name, value));
        self.require_state("write_attribute", State::TagHeaderOpen)?;
        self.check_attribute(name)?;

        let mut text = String::new();
        if !value.format_into(&mut text) {
            return Ok(());
        }
        self.written_attributes.push(name.to_owned());
        let escaped = escape_attribute(&text);
        let mut buf = String::with_capacity(name.len() + escaped.len() + 4);
        buf.push(' ');
        buf.push_str(name);
        buf.push_str("=\"");
        buf.push_str(&escaped);
        buf.push('"');
        self.emit(&buf)
    }

    /// Opens an attribute whose value is streamed with the `write_*`
    /// operations.
    ///
    /// The attribute name is written together with the first piece of the
    /// value, so an attribute that receives no value leaves no trace.
    pub fn open_attribute(&mut self, name: &str) -> Result<()> {
        forward_quoted!(self.open_attribute(name));
        self.require_state("open_attribute", State::TagHeaderOpen)?;
        self.check_attribute(name)?;
        self.attribute = Some(name.to_owned());
        self.state = State::AttributeHeaderOpen;
        Ok(())
    }

    /// Writes the closing quote of the streamed attribute and returns to the
    /// start tag. An attribute that received no value writes nothing.
    pub fn close_attribute(&mut self) -> Result<()> {
        forward_quoted!(self.close_attribute());
        match self.state {
            State::AttributeBody => self.emit("\"")?,
            State::AttributeHeaderOpen => {}
            _ => return Err(self.illegal("close_attribute", "AttributeHeaderOpen or AttributeBody")),
        }
        self.attribute = None;
        self.state = State::TagHeaderOpen;
        Ok(())
    }

    /// Opens the `class` attribute as a class list.
    ///
    /// Every piece of text written to a class list is one class name;
    /// surrounding whitespace is trimmed, empty names are skipped and the
    /// names are separated by single spaces.
    pub fn open_class_list(&mut self) -> Result<()> {
        self.open_class_list_named(CLASS_ATTRIBUTE)
    }

    /// Opens a class list written to the attribute `name`.
    pub fn open_class_list_named(&mut self, name: &str) -> Result<()> {
        forward_quoted!(self.open_class_list_named(name));
        self.require_state("open_class_list", State::TagHeaderOpen)?;
        self.check_attribute(name)?;
        self.attribute = Some(name.to_owned());
        self.state = State::ClassListHeaderOpen;
        Ok(())
    }

    /// Ends the class list. Without any class name nothing is written.
    pub fn close_class_list(&mut self) -> Result<()> {
        forward_quoted!(self.close_class_list());
        match self.state {
            State::ClassListBody => self.emit("\"")?,
            State::ClassListHeaderOpen => {}
            _ => return Err(self.illegal("close_class_list", "ClassListHeaderOpen or ClassListBody")),
        }
        self.attribute = None;
        self.state = State::TagHeaderOpen;
        Ok(())
    }

    // =========================================================================
    // Text
    // =========================================================================

    /// Writes text, escaped for the current context.
    ///
    /// In element content markup specials become entity references, in an
    /// attribute quotes are escaped as well, in a comment hyphen runs
    /// collapse, in a CDATA section `]]>` is split, in a script body text is
    /// written unchanged and in a script string it is escaped as a script
    /// string literal body.
    pub fn write_text(&mut self, text: &str) -> Result<()> {
        forward_quoted!(self.write_text(text));
        match self.state {
            State::Initial | State::ElementContent => self.emit(&escape_content(text)),
            State::AttributeHeaderOpen => {
                let escaped = escape_attribute(text);
                self.start_attribute(State::AttributeBody)?;
                self.emit(&escaped)
            }
            State::AttributeBody => self.emit(&escape_attribute(text)),
            State::ClassListHeaderOpen | State::ClassListBody => self.write_class(text),
            State::CommentBody => {
                let mut buf = String::with_capacity(text.len());
                self.comment_after_hyphen =
                    escape::escape_comment_into(&mut buf, text, self.comment_after_hyphen);
                self.emit(&buf)
            }
            State::CharDataBody => {
                let mut buf = String::with_capacity(text.len());
                self.char_data.push(text, &mut buf);
                self.emit(&buf)
            }
            State::ScriptBody => self.emit(text),
            State::ScriptStringInAttribute | State::ScriptStringInContent => {
                self.emit(&escape_script_string(text, ScriptHost::Markup))
            }
            State::ScriptStringInCharData | State::ScriptStringInScript => {
                self.emit(&escape_script_string(text, ScriptHost::Raw))
            }
            State::TagHeaderOpen | State::QuotedSubtree => {
                Err(self.illegal("write_text", "a state accepting text"))
            }
        }
    }

    /// Writes a single character.
    ///
    /// In a class list a whitespace character is ignored and any other
    /// character is rejected, since a single character cannot be told apart
    /// from a fragment of a class name.
    pub fn write_char(&mut self, c: char) -> Result<()> {
        forward_quoted!(self.write_char(c));
        if matches!(self.state, State::ClassListHeaderOpen | State::ClassListBody) {
            return if c.is_whitespace() {
                Ok(())
            } else {
                Err(Error::SingleCharClass(c))
            };
        }
        self.write_text(c.encode_utf8(&mut [0; 4]))
    }

    /// Writes the textual form of `value`, escaped for the current context.
    /// A value without textual form writes nothing.
    pub fn write_value<V: MarkupValue>(&mut self, value: V) -> Result<()> {
        let mut text = String::new();
        if !value.format_into(&mut text) {
            return Ok(());
        }
        self.write_text(&text)
    }

    /// Supports `write!(writer, ...)`, escaping the formatted text for the
    /// current context.
    pub fn write_fmt(&mut self, args: fmt::Arguments<'_>) -> Result<()> {
        match args.as_str() {
            Some(text) => self.write_text(text),
            None => self.write_text(&args.to_string()),
        }
    }

    /// Writes `text` without escaping, as element content or as raw
    /// attributes into an open start tag.
    ///
    /// The caller is responsible for the text being well-formed markup.
    pub fn write_content_raw(&mut self, text: &str) -> Result<()> {
        forward_quoted!(self.write_content_raw(text));
        self.require(
            "write_content_raw",
            |state| state.is_content() || state == State::TagHeaderOpen,
            "Initial, ElementContent or TagHeaderOpen",
        )?;
        if self.state == State::TagHeaderOpen && !text.starts_with(char::is_whitespace) {
            self.emit(" ")?;
        }
        self.emit(text)
    }

    /// Writes the XML declaration. Only allowed at the top level.
    pub fn write_xml_header(&mut self) -> Result<()> {
        forward_quoted!(self.write_xml_header());
        self.require_state("write_xml_header", State::Initial)?;
        let header = format!(
            "<?xml version=\"1.0\" encoding=\"{}\"?>{}",
            self.out.encoding().name(),
            self.newline
        );
        self.emit(&header)
    }

    // =========================================================================
    // Comments
    // =========================================================================

    /// Writes `<!-- ` and enters [`State::CommentBody`].
    pub fn open_comment(&mut self) -> Result<()> {
        forward_quoted!(self.open_comment());
        self.require("open_comment", State::is_content, "Initial or ElementContent")?;
        self.emit(COMMENT_BEGIN)?;
        self.comment_after_hyphen = false;
        self.state = State::CommentBody;
        Ok(())
    }

    /// Writes comment text. Hyphen runs collapse to a single hyphen, also
    /// across calls.
    pub fn write_comment_body(&mut self, text: &str) -> Result<()> {
        forward_quoted!(self.write_comment_body(text));
        self.require_state("write_comment_body", State::CommentBody)?;
        self.write_text(text)
    }

    /// Writes ` -->`.
    pub fn close_comment(&mut self) -> Result<()> {
        forward_quoted!(self.close_comment());
        self.require_state("close_comment", State::CommentBody)?;
        self.emit(COMMENT_END)?;
        self.state = self.content_state();
        Ok(())
    }

    /// Writes a complete comment, on its own line when indenting.
    pub fn write_comment(&mut self, text: &str) -> Result<()> {
        forward_quoted!(self.write_comment(text));
        self.require("write_comment", State::is_content, "Initial or ElementContent")?;
        if self.indenting {
            self.emit_indent()?;
        }
        self.open_comment()?;
        self.write_text(text)?;
        self.close_comment()
    }

    /// Writes `<!--text-->` without padding.
    ///
    /// Fails with [`Error::InvalidComment`] if `text` starts or ends with a
    /// hyphen or contains `--`.
    pub fn write_comment_literal(&mut self, text: &str) -> Result<()> {
        forward_quoted!(self.write_comment_literal(text));
        self.require("write_comment_literal", State::is_content, "Initial or ElementContent")?;
        escape::check_comment_literal(text)?;
        let mut buf = String::with_capacity(text.len() + 7);
        buf.push_str("<!--");
        buf.push_str(text);
        buf.push_str("-->");
        self.emit(&buf)
    }

    // =========================================================================
    // CDATA
    // =========================================================================

    /// Writes `<![CDATA[` and enters [`State::CharDataBody`].
    pub fn open_char_data(&mut self) -> Result<()> {
        forward_quoted!(self.open_char_data());
        self.require("open_char_data", State::is_content, "Initial or ElementContent")?;
        self.emit(CDATA_BEGIN)?;
        self.char_data = CharDataEscaper::new();
        self.state = State::CharDataBody;
        Ok(())
    }

    /// Writes CDATA text. A `]]>` in the text is split, even if it is spread
    /// over several calls.
    pub fn write_char_data(&mut self, text: &str) -> Result<()> {
        forward_quoted!(self.write_char_data(text));
        self.require_state("write_char_data", State::CharDataBody)?;
        self.write_text(text)
    }

    /// Writes any withheld `]` characters and `]]>`.
    pub fn close_char_data(&mut self) -> Result<()> {
        forward_quoted!(self.close_char_data());
        self.require_state("close_char_data", State::CharDataBody)?;
        let mut buf = String::new();
        self.char_data.flush(&mut buf);
        buf.push_str(CDATA_END);
        self.emit(&buf)?;
        self.state = self.content_state();
        Ok(())
    }

    // =========================================================================
    // Scripts
    // =========================================================================

    /// Opens a `<script>` element whose body is wrapped in a commented CDATA
    /// section, and enters [`State::ScriptBody`].
    pub fn open_script(&mut self) -> Result<()> {
        forward_quoted!(self.open_script());
        self.require("open_script", State::is_content, "Initial or ElementContent")?;
        self.open_tag_header(SCRIPT_TAG)?;
        self.write_attribute("type", "text/javascript")?;
        self.close_tag_header_open()?;

        let mut buf = String::new();
        buf.push_str(&self.newline);
        buf.push_str("// ");
        buf.push_str(CDATA_BEGIN);
        buf.push_str(&self.newline);
        self.emit(&buf)?;
        self.state = State::ScriptBody;
        Ok(())
    }

    /// Ends the commented CDATA section and writes `</script>`.
    pub fn close_script(&mut self) -> Result<()> {
        forward_quoted!(self.close_script());
        self.require_state("close_script", State::ScriptBody)?;

        let mut buf = String::new();
        buf.push_str(&self.newline);
        buf.push_str("// ");
        buf.push_str(CDATA_END);
        buf.push_str(&self.newline);
        self.emit(&buf)?;
        self.state = State::ElementContent;
        self.close_tag(SCRIPT_TAG)
    }

    /// Writes script code.
    ///
    /// Allowed in a script body, where the code is written unchanged, and in
    /// attributes, element content and CDATA sections, where it is escaped
    /// like any other text of that context.
    pub fn write_script(&mut self, code: &str) -> Result<()> {
        forward_quoted!(self.write_script(code));
        self.require("write_script", State::allows_script, "a state accepting script code")?;
        self.write_text(code)
    }

    /// Writes `'` and enters the script string state for the current
    /// context.
    ///
    /// On an attribute that has not received a value yet, the attribute is
    /// started first.
    pub fn open_script_string(&mut self) -> Result<()> {
        forward_quoted!(self.open_script_string());
        let next = match self.state {
            State::AttributeHeaderOpen => {
                self.start_attribute(State::AttributeBody)?;
                State::ScriptStringInAttribute
            }
            State::AttributeBody => State::ScriptStringInAttribute,
            State::Initial | State::ElementContent => State::ScriptStringInContent,
            State::CharDataBody => {
                let mut buf = String::new();
                self.char_data.flush(&mut buf);
                self.emit(&buf)?;
                State::ScriptStringInCharData
            }
            State::ScriptBody => State::ScriptStringInScript,
            State::TagHeaderOpen
            | State::ClassListHeaderOpen
            | State::ClassListBody
            | State::CommentBody
            | State::ScriptStringInAttribute
            | State::ScriptStringInContent
            | State::ScriptStringInCharData
            | State::ScriptStringInScript
            | State::QuotedSubtree => {
                return Err(self.illegal("open_script_string", "a state accepting script code"));
            }
        };
        self.emit("'")?;
        self.state = next;
        Ok(())
    }

    /// Writes text into the open script string.
    pub fn write_script_string(&mut self, text: &str) -> Result<()> {
        forward_quoted!(self.write_script_string(text));
        self.require("write_script_string", State::is_script_string, "a script string")?;
        self.write_text(text)
    }

    /// Writes `'` and returns to the context the string was opened in.
    pub fn close_script_string(&mut self) -> Result<()> {
        forward_quoted!(self.close_script_string());
        let next = match self.state {
            State::ScriptStringInAttribute => State::AttributeBody,
            State::ScriptStringInContent => self.content_state(),
            State::ScriptStringInCharData => State::CharDataBody,
            State::ScriptStringInScript => State::ScriptBody,
            State::Initial
            | State::ElementContent
            | State::TagHeaderOpen
            | State::AttributeHeaderOpen
            | State::AttributeBody
            | State::ClassListHeaderOpen
            | State::ClassListBody
            | State::CommentBody
            | State::CharDataBody
            | State::ScriptBody
            | State::QuotedSubtree => {
                return Err(self.illegal("close_script_string", "a script string"));
            }
        };
        self.emit("'")?;
        self.state = next;
        Ok(())
    }

    /// Writes a script literal: `null`, a boolean, a number or a quoted
    /// string.
    pub fn write_script_literal<'a>(&mut self, literal: impl Into<ScriptLiteral<'a>>) -> Result<()> {
        forward_quoted!(self.write_script_literal(literal));
        self.require("write_script_literal", State::allows_script, "a state accepting script code")?;
        match literal.into() {
            ScriptLiteral::Null => self.write_text("null"),
            ScriptLiteral::Bool(value) => self.write_value(value),
            ScriptLiteral::Int(value) => self.write_value(value),
            ScriptLiteral::Number(value) => self.write_value(value),
            ScriptLiteral::Str(text) => {
                self.open_script_string()?;
                self.write_text(text)?;
                self.close_script_string()
            }
        }
    }

    // =========================================================================
    // Quoted subtrees
    // =========================================================================

    /// Starts collecting a subtree that is written as CDATA text once it is
    /// closed.
    ///
    /// Until [`MarkupWriter::close_quoted_subtree`], all operations go to a
    /// nested writer with its own state and element stack. Quoted subtrees
    /// nest.
    pub fn open_quoted_subtree(&mut self) -> Result<()> {
        forward_quoted!(self.open_quoted_subtree());
        self.require("open_quoted_subtree", State::is_content, "Initial or ElementContent")?;

        let config = WriterConfig {
            newline: self.newline.clone(),
            indent_step: self.indent_step,
            indent_whitespace: self.indent_whitespace.clone(),
            initial_indent: self.indent,
            indenting: self.indenting,
            encoding: encoding_rs::UTF_8,
        };
        self.quoted = Some(Box::new(MarkupWriter::with_config(Vec::new(), config)));
        self.state = State::QuotedSubtree;
        Ok(())
    }

    /// Closes the innermost quoted subtree and writes its text as a CDATA
    /// section to the enclosing writer.
    ///
    /// Fails with [`Error::UnclosedQuotedSubtree`] if the subtree still has
    /// open constructs.
    pub fn close_quoted_subtree(&mut self) -> Result<()> {
        let Some(inner) = self.quoted.as_deref_mut() else {
            return Err(self.illegal("close_quoted_subtree", "QuotedSubtree"));
        };
        if inner.quoted.is_some() {
            return inner.close_quoted_subtree();
        }
        if !inner.state.is_content() || !inner.stack.is_empty() {
            return Err(Error::UnclosedQuotedSubtree {
                depth: inner.depth(),
                state: inner.state,
            });
        }

        let Some(inner) = self.quoted.take() else {
            return Err(self.illegal("close_quoted_subtree", "QuotedSubtree"));
        };
        let text = inner.into_string()?;
        log::trace!(target: "tagstream::writer", "closing quoted subtree of {} bytes", text.len());

        let escaped = escape::escape_cdata(&text);
        let mut buf = String::with_capacity(escaped.len() + CDATA_BEGIN.len() + CDATA_END.len());
        buf.push_str(CDATA_BEGIN);
        buf.push_str(&escaped);
        buf.push_str(CDATA_END);
        self.state = self.content_state();
        self.emit(&buf)
    }

    // =========================================================================
    // Whitespace and indentation
    // =========================================================================

    /// Writes a line separator.
    pub fn nl(&mut self) -> Result<&mut Self> {
        if let Some(inner) = self.quoted.as_deref_mut() {
            inner.nl()?;
            return Ok(self);
        }
        self.require("nl", State::allows_whitespace, "a state accepting whitespace")?;
        let newline = self.newline.clone();
        self.emit_whitespace(&newline)?;
        Ok(self)
    }

    /// Writes the current indent as spaces.
    pub fn indented(&mut self) -> Result<&mut Self> {
        if let Some(inner) = self.quoted.as_deref_mut() {
            inner.indented()?;
            return Ok(self);
        }
        self.require("indented", State::allows_whitespace, "a state accepting whitespace")?;
        let whitespace = self.indent_whitespace.repeat(self.indent);
        self.emit_whitespace(&whitespace)?;
        Ok(self)
    }

    /// Writes a line separator followed by the current indent.
    pub fn write_indent(&mut self) -> Result<()> {
        forward_quoted!(self.write_indent());
        self.require("write_indent", State::allows_whitespace, "a state accepting whitespace")?;
        self.emit_indent()
    }

    pub fn increase_indent(&mut self) {
        forward_quoted!(self.increase_indent());
        self.indent += self.indent_step;
    }

    pub fn decrease_indent(&mut self) {
        forward_quoted!(self.decrease_indent());
        self.indent = self.indent.saturating_sub(self.indent_step);
    }

    pub fn newline(&self) -> &str {
        &self.newline
    }

    /// Replaces the line separator written by [`MarkupWriter::nl`] and
    /// automatic indentation.
    pub fn set_newline(&mut self, newline: impl Into<String>) {
        let newline = newline.into();
        if let Some(inner) = self.quoted.as_deref_mut() {
            inner.set_newline(newline.clone());
        }
        self.newline = newline;
    }

    pub fn indent_whitespace(&self) -> &str {
        &self.indent_whitespace
    }

    /// Replaces the text written once per indent character, e.g. `"\t"`
    /// together with an indent step of 1. Characters other than space and
    /// tab are dropped.
    pub fn set_indent_whitespace(&mut self, whitespace: impl Into<String>) {
        let whitespace = indent_whitespace(whitespace.into());
        if let Some(inner) = self.quoted.as_deref_mut() {
            inner.set_indent_whitespace(whitespace.clone());
        }
        self.indent_whitespace = whitespace;
    }

    /// Switches automatic indentation of tags on or off and returns the
    /// previous setting.
    pub fn set_indent(&mut self, indenting: bool) -> bool {
        if let Some(inner) = self.quoted.as_deref_mut() {
            inner.set_indent(indenting);
        }
        std::mem::replace(&mut self.indenting, indenting)
    }

    // =========================================================================
    // Closing
    // =========================================================================

    /// Closes every open construct, including quoted subtrees.
    pub fn close_all(&mut self) -> Result<()> {
        self.close_all_to(0)
    }

    /// Closes open constructs until [`MarkupWriter::depth`] is `depth`.
    ///
    /// Open script strings, class lists, attributes, start tags, comments,
    /// CDATA sections and script bodies at the innermost level are closed
    /// first, then elements are closed innermost first.
    pub fn close_all_to(&mut self, depth: usize) -> Result<()> {
        let before = self.depth();

        if let Some(inner) = self.quoted.as_deref_mut() {
            let own = self.stack.len();
            if depth > own {
                return inner.close_all_to(depth - own - 1);
            }
            inner.close_all_to(0)?;
            self.close_quoted_subtree()?;
        }

        loop {
            match self.state {
                State::ScriptStringInAttribute
                | State::ScriptStringInContent
                | State::ScriptStringInCharData
                | State::ScriptStringInScript => self.close_script_string()?,
                State::ClassListHeaderOpen | State::ClassListBody => self.close_class_list()?,
                State::AttributeHeaderOpen | State::AttributeBody => self.close_attribute()?,
                State::TagHeaderOpen => self.close_tag_header_open()?,
                State::CommentBody => self.close_comment()?,
                State::CharDataBody => self.close_char_data()?,
                State::ScriptBody => self.close_script()?,
                State::Initial | State::ElementContent | State::QuotedSubtree => break,
            }
        }

        while self.stack.len() > depth {
            let Some(name) = self.stack.last().cloned() else {
                break;
            };
            self.close_tag(&name)?;
        }

        log::debug!(
            target: "tagstream::writer",
            "closed down to depth {depth}, {} levels closed",
            before.saturating_sub(self.depth())
        );
        Ok(())
    }

    /// Flushes the underlying sink. Withheld CDATA characters stay withheld.
    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    /// Finishes the output and returns the sink.
    ///
    /// Open constructs are not closed; call [`MarkupWriter::close_all`]
    /// first for complete output. Withheld CDATA characters and pending
    /// encoder state are written.
    pub fn finish(mut self) -> Result<W> {
        if self.quoted.is_some() {
            log::warn!(target: "tagstream::writer", "finishing with an open quoted subtree, its content is lost");
        }
        if self.char_data.held() > 0 {
            let mut buf = String::new();
            self.char_data.flush(&mut buf);
            self.emit(&buf)?;
        }
        Ok(self.out.finish()?)
    }

    /// Finishes the output and releases the sink.
    pub fn close(self) -> Result<()> {
        self.finish().map(drop)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn emit(&mut self, text: &str) -> Result<()> {
        self.out.write_str(text)?;
        Ok(())
    }

    /// Writes whitespace in the current context. Whitespace ends a hyphen
    /// run in a comment and cannot be part of a CDATA terminator.
    fn emit_whitespace(&mut self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        match self.state {
            State::CommentBody => self.comment_after_hyphen = false,
            State::CharDataBody if self.char_data.held() > 0 => {
                let mut buf = String::new();
                self.char_data.flush(&mut buf);
                self.emit(&buf)?;
            }
            _ => {}
        }
        self.emit(text)
    }

    fn emit_indent(&mut self) -> Result<()> {
        let mut buf = String::with_capacity(self.newline.len() + self.indent);
        buf.push_str(&self.newline);
        buf.push_str(&self.indent_whitespace.repeat(self.indent));
        self.emit_whitespace(&buf)
    }

    fn content_state(&self) -> State {
        if self.stack.is_empty() {
            State::Initial
        } else {
            State::ElementContent
        }
    }

    /// Writes ` name="` for the open streamed attribute or class list, and
    /// records the name as written.
    fn start_attribute(&mut self, body: State) -> Result<()> {
        let name = self.attribute.clone().unwrap_or_else(|| CLASS_ATTRIBUTE.to_owned());
        let mut buf = String::with_capacity(name.len() + 3);
        buf.push(' ');
        buf.push_str(&name);
        buf.push_str("=\"");
        self.written_attributes.push(name);
        self.emit(&buf)?;
        self.state = body;
        Ok(())
    }

    fn write_class(&mut self, text: &str) -> Result<()> {
        let class = text.trim();
        if class.is_empty() {
            return Ok(());
        }
        let escaped = escape_attribute(class);
        if self.state == State::ClassListHeaderOpen {
            self.start_attribute(State::ClassListBody)?;
        } else {
            self.emit(" ")?;
        }
        self.emit(&escaped)
    }

    /// Fails if `name` is not a valid name or was already written to the
    /// open start tag.
    fn check_attribute(&self, name: &str) -> Result<()> {
        check_name(name)?;
        if self.written_attributes.iter().any(|written| written == name) {
            return Err(Error::DuplicateAttribute(name.to_owned()));
        }
        Ok(())
    }

    fn require(&self, operation: &'static str, allowed: impl Fn(State) -> bool, expected: &'static str) -> Result<()> {
        if allowed(self.state) {
            Ok(())
        } else {
            Err(self.illegal(operation, expected))
        }
    }

    fn require_state(&self, operation: &'static str, state: State) -> Result<()> {
        self.require(operation, |current| current == state, state.name())
    }

    fn illegal(&self, operation: &'static str, expected: &'static str) -> Error {
        log::debug!(target: "tagstream::writer", "{operation} rejected in state {}", self.state);
        Error::IllegalState {
            operation,
            state: self.state,
            expected,
        }
    }
}

/// Lets a writer be handed to code that formats into any [`fmt::Write`].
/// Text is escaped for the current context like [`MarkupWriter::write_text`];
/// a usage or sink error surfaces as [`fmt::Error`].
impl<W: Write> fmt::Write for MarkupWriter<W> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write_text(s).map_err(|_| fmt::Error)
    }

    fn write_char(&mut self, c: char) -> fmt::Result {
        MarkupWriter::write_char(self, c).map_err(|_| fmt::Error)
    }
}

/// Keeps the characters of `whitespace` that may be written in every
/// context accepting whitespace.
fn indent_whitespace(mut whitespace: String) -> String {
    whitespace.retain(|c| matches!(c, ' ' | '\t'));
    whitespace
}

/// Checks that `name` can be written as an element or attribute name
/// without breaking the markup.
fn check_name(name: &str) -> Result<()> {
    let valid = name
        .chars()
        .next()
        .is_some_and(|first| !first.is_ascii_digit() && !matches!(first, '-' | '.'))
        && name.chars().all(|c| {
            escape::is_xml_char(c)
                && !c.is_whitespace()
                && !c.is_control()
                && !matches!(c, '<' | '>' | '&' | '"' | '\'' | '/' | '=' | '!' | '?' | '`')
        });
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidName(name.to_owned()))
    }
}
