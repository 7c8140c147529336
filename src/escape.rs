//! Pure escaping functions, one per output context.
//!
//! Each function turns arbitrary caller text into text that is safe to place
//! verbatim inside one syntactic context of the output: element content,
//! attribute values, comments, CDATA sections and single-quoted script
//! string literals. Characters that are not allowed in XML at all are
//! dropped in every markup context.
//!
//! The functions return [`Cow`] so that the common case of text that needs no
//! escaping does not allocate.

use std::borrow::Cow;
use std::fmt::Write as _;

use memchr::memmem;

use crate::error::{Error, Result};

/// Opening delimiter of a CDATA section.
pub const CDATA_BEGIN: &str = "<![CDATA[";

/// Closing delimiter of a CDATA section.
pub const CDATA_END: &str = "]]>";

/// Inserted between the `]]` and the `>` of a literal `]]>` inside CDATA,
/// ending the section and immediately starting a new one.
const CDATA_SPLIT: &str = "]]><![CDATA[";

/// Whether `c` may appear in an XML 1.0 document.
///
/// ```
/// use tagstream::escape::is_xml_char;
///
/// assert!(is_xml_char('\t'));
/// assert!(is_xml_char('ä'));
/// assert!(!is_xml_char('\u{0}'));
/// assert!(!is_xml_char('\u{FFFE}'));
/// ```
pub fn is_xml_char(c: char) -> bool {
    matches!(
        c,
        '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}'
    )
}

/// What happens to one input character.
enum Segment {
    Literal,
    Drop,
    Escape(&'static str),
}

/// Copies `text`, replacing characters according to `rule`.
///
/// Runs of literal characters are copied as slices; nothing is allocated if
/// every character is literal.
fn escape_with(text: &str, rule: fn(char) -> Segment) -> Cow<'_, str> {
    let mut out = String::new();
    let mut start = 0;
    let mut changed = false;

    for (i, c) in text.char_indices() {
        let segment = rule(c);
        if let Segment::Literal = segment {
            continue;
        }
        if !changed {
            out.reserve(text.len() + 16);
            changed = true;
        }
        out.push_str(&text[start..i]);
        if let Segment::Escape(replacement) = segment {
            out.push_str(replacement);
        }
        start = i + c.len_utf8();
    }

    if !changed {
        return Cow::Borrowed(text);
    }
    out.push_str(&text[start..]);
    Cow::Owned(out)
}

fn content_segment(c: char) -> Segment {
    match c {
        '&' => Segment::Escape("&amp;"),
        '<' => Segment::Escape("&lt;"),
        '>' => Segment::Escape("&gt;"),
        c if !is_xml_char(c) => Segment::Drop,
        _ => Segment::Literal,
    }
}

fn attribute_segment(c: char) -> Segment {
    match c {
        '&' => Segment::Escape("&amp;"),
        '<' => Segment::Escape("&lt;"),
        '"' => Segment::Escape("&quot;"),
        '\t' => Segment::Escape("&#9;"),
        '\n' => Segment::Escape("&#10;"),
        '\r' => Segment::Escape("&#13;"),
        c if !is_xml_char(c) => Segment::Drop,
        _ => Segment::Literal,
    }
}

fn valid_segment(c: char) -> Segment {
    if is_xml_char(c) {
        Segment::Literal
    } else {
        Segment::Drop
    }
}

/// Escapes text for element content.
///
/// `&`, `<` and `>` become entity references. Tab, newline and carriage
/// return pass through.
///
/// ```
/// use tagstream::escape::escape_content;
///
/// assert_eq!(escape_content("a < b && c"), "a &lt; b &amp;&amp; c");
/// assert_eq!(escape_content("'quoted'"), "'quoted'");
/// ```
pub fn escape_content(text: &str) -> Cow<'_, str> {
    escape_with(text, content_segment)
}

/// Escapes text for a double-quoted attribute value.
///
/// `&`, `<` and `"` become entity references. Tab, newline and carriage
/// return become character references so that they survive attribute value
/// normalization. `>` and `'` stay literal.
///
/// ```
/// use tagstream::escape::escape_attribute;
///
/// assert_eq!(escape_attribute("\"x\""), "&quot;x&quot;");
/// assert_eq!(escape_attribute("'x' > y"), "'x' > y");
/// assert_eq!(escape_attribute("a\nb"), "a&#10;b");
/// ```
pub fn escape_attribute(text: &str) -> Cow<'_, str> {
    escape_with(text, attribute_segment)
}

/// Removes characters that cannot appear in XML.
pub fn strip_invalid(text: &str) -> Cow<'_, str> {
    escape_with(text, valid_segment)
}

/// Escapes comment body text, assuming the comment delimiters are padded
/// with a space on the inside.
///
/// Every run of hyphens collapses to a single hyphen, so the result never
/// contains `--`.
///
/// ```
/// use tagstream::escape::escape_comment;
///
/// assert_eq!(escape_comment("a -- b"), "a - b");
/// assert_eq!(escape_comment("123---"), "123-");
/// ```
pub fn escape_comment(text: &str) -> Cow<'_, str> {
    if memmem::find(text.as_bytes(), b"--").is_none() && text.chars().all(is_xml_char) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len());
    escape_comment_into(&mut out, text, false);
    Cow::Owned(out)
}

/// Streaming form of [`escape_comment`].
///
/// `after_hyphen` tells whether the last character written to the comment
/// was a hyphen. Returns the updated flag for the next chunk, so that hyphen
/// runs spanning chunk borders collapse as well.
pub fn escape_comment_into(out: &mut String, text: &str, mut after_hyphen: bool) -> bool {
    for c in text.chars() {
        if c == '-' {
            if after_hyphen {
                continue;
            }
            after_hyphen = true;
        } else {
            if !is_xml_char(c) {
                continue;
            }
            after_hyphen = false;
        }
        out.push(c);
    }
    after_hyphen
}

/// Validates text meant to be written between unpadded `<!--` and `-->`.
///
/// Such text must not start or end with a hyphen and must not contain `--`.
///
/// ```
/// use tagstream::escape::check_comment_literal;
///
/// assert!(check_comment_literal("1-2-3").is_ok());
/// assert!(check_comment_literal("1--2").is_err());
/// assert!(check_comment_literal("-1").is_err());
/// ```
pub fn check_comment_literal(text: &str) -> Result<()> {
    let valid = !text.starts_with('-')
        && !text.ends_with('-')
        && memmem::find(text.as_bytes(), b"--").is_none()
        && text.chars().all(is_xml_char);
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidComment(text.to_owned()))
    }
}

/// Escapes a complete CDATA section body.
///
/// Every `]]>` is split as `]]` `]]><![CDATA[` `>`, which ends the section
/// before the `>` and reopens it immediately.
///
/// ```
/// use tagstream::escape::escape_cdata;
///
/// assert_eq!(escape_cdata("a]]>b"), "a]]]]><![CDATA[>b");
/// assert_eq!(escape_cdata("a]]b"), "a]]b");
/// ```
pub fn escape_cdata(text: &str) -> Cow<'_, str> {
    let cleaned = strip_invalid(text);
    if memmem::find(cleaned.as_bytes(), CDATA_END.as_bytes()).is_none() {
        return cleaned;
    }
    let mut out = String::with_capacity(cleaned.len() + 16);
    split_terminators(&mut out, &cleaned);
    Cow::Owned(out)
}

fn split_terminators(out: &mut String, text: &str) {
    let mut start = 0;
    for pos in memmem::find_iter(text.as_bytes(), CDATA_END.as_bytes()) {
        out.push_str(&text[start..pos + 2]);
        out.push_str(CDATA_SPLIT);
        start = pos + 2;
    }
    out.push_str(&text[start..]);
}

/// Chunked CDATA escaping.
///
/// Trailing `]` characters of a chunk are withheld (at most two) until the
/// next chunk shows whether they start a `]]>`. The escaped output is the
/// same no matter how the body is split into chunks.
///
/// ```
/// use tagstream::escape::{CharDataEscaper, escape_cdata};
///
/// let mut escaper = CharDataEscaper::new();
/// let mut out = String::new();
/// escaper.push("x]", &mut out);
/// escaper.push("]", &mut out);
/// escaper.push(">y", &mut out);
/// escaper.flush(&mut out);
/// assert_eq!(out, escape_cdata("x]]>y"));
/// ```
#[derive(Debug, Default, Clone)]
pub struct CharDataEscaper {
    held: usize,
}

impl CharDataEscaper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of withheld `]` characters.
    pub fn held(&self) -> usize {
        self.held
    }

    /// Escapes `chunk`, appending everything that can already be committed
    /// to `out`.
    pub fn push(&mut self, chunk: &str, out: &mut String) {
        let cleaned = strip_invalid(chunk);
        if cleaned.is_empty() {
            return;
        }

        let mut joined = String::with_capacity(self.held + cleaned.len());
        joined.extend(std::iter::repeat_n(']', self.held));
        joined.push_str(&cleaned);

        let keep = joined.bytes().rev().take(2).take_while(|&b| b == b']').count();
        split_terminators(out, &joined[..joined.len() - keep]);
        self.held = keep;
    }

    /// Commits withheld characters.
    ///
    /// Called when the section closes or when something that cannot be part
    /// of a terminator is written next.
    pub fn flush(&mut self, out: &mut String) {
        out.extend(std::iter::repeat_n(']', self.held));
        self.held = 0;
    }
}

/// The context a script string literal is embedded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptHost {
    /// Inside a script body or a CDATA section, where markup is not parsed.
    Raw,
    /// Inside an attribute value or element content. The literal is decoded
    /// by the markup parser before the script engine sees it, so markup
    /// specials are escaped as script escapes as well.
    Markup,
}

/// Escapes text for the inside of a single-quoted script string literal.
///
/// Backslash, quote, carriage return, newline and tab use their short
/// escapes. `<`, `>`, other control characters and the line and paragraph
/// separators become `\uXXXX` escapes. With [`ScriptHost::Markup`], `&` and
/// `"` are escaped the same way, so the result can be placed into markup
/// without a second escaping pass.
///
/// ```
/// use tagstream::escape::{ScriptHost, escape_script_string};
///
/// assert_eq!(escape_script_string("it's", ScriptHost::Raw), "it\\'s");
/// assert_eq!(escape_script_string("</script>", ScriptHost::Raw), "\\u003C/script\\u003E");
/// assert_eq!(escape_script_string("a&b", ScriptHost::Markup), "a\\u0026b");
/// assert_eq!(escape_script_string("a&b", ScriptHost::Raw), "a&b");
/// ```
pub fn escape_script_string(text: &str, host: ScriptHost) -> Cow<'_, str> {
    if !text.chars().any(|c| needs_script_escape(c, host)) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 16);
    escape_script_string_into(&mut out, text, host);
    Cow::Owned(out)
}

fn needs_script_escape(c: char, host: ScriptHost) -> bool {
    match c {
        '\\' | '\'' | '<' | '>' | '\u{2028}' | '\u{2029}' | '\u{FFFE}' | '\u{FFFF}' => true,
        '&' | '"' => host == ScriptHost::Markup,
        c => c < '\u{20}',
    }
}

/// Appending form of [`escape_script_string`].
pub fn escape_script_string_into(out: &mut String, text: &str, host: ScriptHost) {
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c if needs_script_escape(c, host) => {
                let _ = write!(out, "\\u{:04X}", c as u32);
            }
            c => out.push(c),
        }
    }
}

/// Formats `text` as a complete single-quoted script string literal, or
/// `null` when there is no text.
///
/// ```
/// use tagstream::escape::{ScriptHost, quote_script_string};
///
/// assert_eq!(quote_script_string(Some("a'b"), ScriptHost::Raw), "'a\\'b'");
/// assert_eq!(quote_script_string(None, ScriptHost::Raw), "null");
/// ```
pub fn quote_script_string(text: Option<&str>, host: ScriptHost) -> String {
    let Some(text) = text else {
        return "null".to_string();
    };
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    escape_script_string_into(&mut out, text, host);
    out.push('\'');
    out
}
