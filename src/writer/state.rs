use std::fmt;

/// The syntactic context the writer is currently in.
///
/// Every public writer operation checks the state before emitting anything
/// and fails with [`Error::IllegalState`](crate::Error::IllegalState) if the
/// operation is not permitted there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Top level, no element open.
    Initial,
    /// Inside an element, after its start tag.
    ElementContent,
    /// Start tag opened, attributes may follow.
    TagHeaderOpen,
    /// Attribute opened for streaming, name not yet written.
    AttributeHeaderOpen,
    /// Attribute value being streamed.
    AttributeBody,
    /// Class list opened, no class written yet.
    ClassListHeaderOpen,
    /// Class list value being streamed.
    ClassListBody,
    CommentBody,
    /// Inside a CDATA section.
    CharDataBody,
    /// Inside a `<script>` element.
    ScriptBody,
    ScriptStringInAttribute,
    ScriptStringInContent,
    ScriptStringInCharData,
    ScriptStringInScript,
    /// A quoted subtree is being written; operations go to the nested writer.
    QuotedSubtree,
}

impl State {
    /// Element content, or the top level.
    pub fn is_content(self) -> bool {
        matches!(self, State::Initial | State::ElementContent)
    }

    /// Whether newlines and indentation may be written.
    pub fn allows_whitespace(self) -> bool {
        matches!(
            self,
            State::Initial
                | State::ElementContent
                | State::TagHeaderOpen
                | State::CommentBody
                | State::CharDataBody
                | State::ScriptBody
        )
    }

    /// Whether raw script code or a script string may start here.
    pub fn allows_script(self) -> bool {
        matches!(
            self,
            State::Initial
                | State::ElementContent
                | State::AttributeHeaderOpen
                | State::AttributeBody
                | State::CharDataBody
                | State::ScriptBody
        )
    }

    pub fn is_script_string(self) -> bool {
        matches!(
            self,
            State::ScriptStringInAttribute
                | State::ScriptStringInContent
                | State::ScriptStringInCharData
                | State::ScriptStringInScript
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            State::Initial => "Initial",
            State::ElementContent => "ElementContent",
            State::TagHeaderOpen => "TagHeaderOpen",
            State::AttributeHeaderOpen => "AttributeHeaderOpen",
            State::AttributeBody => "AttributeBody",
            State::ClassListHeaderOpen => "ClassListHeaderOpen",
            State::ClassListBody => "ClassListBody",
            State::CommentBody => "CommentBody",
            State::CharDataBody => "CharDataBody",
            State::ScriptBody => "ScriptBody",
            State::ScriptStringInAttribute => "ScriptStringInAttribute",
            State::ScriptStringInContent => "ScriptStringInContent",
            State::ScriptStringInCharData => "ScriptStringInCharData",
            State::ScriptStringInScript => "ScriptStringInScript",
            State::QuotedSubtree => "QuotedSubtree",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One entry of [`MarkupWriter::open_elements`](super::MarkupWriter::open_elements).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenNode {
    Element(String),
    /// Boundary of a quoted subtree; entries after it belong to the
    /// nested writer.
    QuotedSubtree,
}
