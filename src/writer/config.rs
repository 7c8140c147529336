use encoding_rs::{Encoding, UTF_8};

/// Configuration for a [`MarkupWriter`](super::MarkupWriter).
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Line separator written by `nl` and automatic indentation (default `"\n"`).
    pub newline: String,
    /// Characters added to the indent per open element (default 2).
    pub indent_step: usize,
    /// Text written once per indent character (default `" "`). Only spaces
    /// and tabs are kept.
    pub indent_whitespace: String,
    /// Indent to start from, for writers embedded in already indented output.
    pub initial_indent: usize,
    /// Whether start and end tags are placed on their own indented lines.
    /// Can be toggled while writing with `set_indent`.
    pub indenting: bool,
    /// Output encoding (default UTF-8).
    pub encoding: &'static Encoding,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            newline: "\n".to_string(),
            indent_step: 2,
            indent_whitespace: " ".to_string(),
            initial_indent: 0,
            indenting: false,
            encoding: UTF_8,
        }
    }
}

impl WriterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_newline(mut self, newline: impl Into<String>) -> Self {
        self.newline = newline.into();
        self
    }

    pub fn with_indent_step(mut self, step: usize) -> Self {
        self.indent_step = step;
        self
    }

    pub fn with_indent_whitespace(mut self, whitespace: impl Into<String>) -> Self {
        self.indent_whitespace = whitespace.into();
        self
    }

    pub fn with_initial_indent(mut self, indent: usize) -> Self {
        self.initial_indent = indent;
        self
    }

    pub fn with_indenting(mut self, indenting: bool) -> Self {
        self.indenting = indenting;
        self
    }

    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }
}
