//! # tagstream
//!
//! A streaming writer for XML and XHTML markup with context-sensitive
//! escaping.
//!
//! ## Features
//!
//! - Tracks the syntactic context (element content, attribute values,
//!   comments, CDATA sections, script bodies and script strings) and escapes
//!   caller text for it
//! - Checks that end tags match the open elements
//! - Streams attribute values and class lists without buffering
//! - Quotes whole subtrees as CDATA text
//! - Closes every open construct in one call, e.g. after an error
//! - Writes UTF-8 or any encoding supported by `encoding_rs`
//!
//! ## Quick Start
//!
//! ```
//! use tagstream::MarkupWriter;
//!
//! let mut w = MarkupWriter::in_memory();
//! w.open_tag("p")?;
//! w.write_text("1 < 2")?;
//! w.open_tag_header("span")?;
//! w.open_class_list()?;
//! w.write_text("note")?;
//! w.write_text("  ")?;
//! w.write_text("small")?;
//! w.close_class_list()?;
//! w.close_tag_header_empty()?;
//! w.close_tag("p")?;
//!
//! assert_eq!(w.into_string()?, r#"<p>1 &lt; 2<span class="note small"/></p>"#);
//! # Ok::<(), tagstream::Error>(())
//! ```
//!
//! ## Recovering from errors
//!
//! ```
//! use tagstream::MarkupWriter;
//!
//! let mut w = MarkupWriter::in_memory();
//! w.open_tag("div")?;
//! let depth = w.depth();
//! w.open_tag("ul")?;
//! w.open_tag("li")?;
//! w.open_comment()?;
//! // Something fails while rendering the list...
//! w.close_all_to(depth)?;
//! w.close_tag("div")?;
//!
//! assert_eq!(w.into_string()?, "<div><ul><li><!--  --></li></ul></div>");
//! # Ok::<(), tagstream::Error>(())
//! ```

pub mod error;
pub mod escape;
pub mod io;
pub mod writer;

#[cfg(feature = "cli")]
pub mod tree;

pub use error::{Error, Result};
pub use writer::{MarkupValue, MarkupWriter, OpenNode, ScriptLiteral, State, WriterConfig};
