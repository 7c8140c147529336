//! Round-trip tests: markup written by `MarkupWriter` parses back, with
//! quick-xml, to the text that went in.

mod common;

use proptest::prelude::*;
use tagstream::{MarkupWriter, OpenNode, State};

use common::{parse, parse_fragment, unquote_script_string};

/// Characters XML can carry, excluding CR. A raw CR in element content is
/// normalized away by XML parsers.
const CONTENT_TEXT: &str = "[\\t\\n\\x20-\\x{D7FF}\\x{E000}-\\x{FFFD}\\x{10000}-\\x{10FFFF}]{0,40}";

/// Attribute values escape tab, LF and CR as character references.
const ATTRIBUTE_TEXT: &str = "[\\t\\n\\r\\x20-\\x{D7FF}\\x{E000}-\\x{FFFD}\\x{10000}-\\x{10FFFF}]{0,40}";

fn write(build: impl FnOnce(&mut MarkupWriter<Vec<u8>>) -> tagstream::Result<()>) -> String {
    let mut w = MarkupWriter::in_memory();
    build(&mut w).unwrap();
    w.into_string().unwrap()
}

// ============================================================================
// Deterministic round trips
// ============================================================================

#[test]
fn test_document_with_every_construct_parses() {
    let out = write(|w| {
        w.write_xml_header()?;
        w.open_tag_header("html")?;
        w.write_attribute("xmlns", "http://www.w3.org/1999/xhtml")?;
        w.close_tag_header_open()?;
        w.open_tag("body")?;
        w.open_tag_header("p")?;
        w.open_class_list()?;
        w.write_text("lead")?;
        w.write_text(" first ")?;
        w.close_class_list()?;
        w.open_attribute("onclick")?;
        w.write_script("alert(")?;
        w.write_script_literal("it's <b>\"bold\"</b>")?;
        w.write_script(")")?;
        w.close_attribute()?;
        w.close_tag_header_open()?;
        w.write_text("a < b && c > d")?;
        w.close_tag("p")?;
        w.write_comment("-- not a --> terminator --")?;
        w.open_tag("pre")?;
        w.open_char_data()?;
        w.write_char_data("x]]>y")?;
        w.close_char_data()?;
        w.close_tag("pre")?;
        w.open_script()?;
        w.write_script("var s = ")?;
        w.write_script_literal("</script>")?;
        w.write_script(";")?;
        w.close_script()?;
        w.close_all()
    });

    let html = parse(&out).unwrap();
    assert_eq!(html.name, "html");
    assert_eq!(html.attribute("xmlns"), Some("http://www.w3.org/1999/xhtml"));

    let body = html.elements().next().unwrap();
    let p = body.elements().find(|e| e.name == "p").unwrap();
    assert_eq!(p.attribute("class"), Some("lead first"));
    let onclick = p.attribute("onclick").unwrap();
    let literal = onclick.strip_prefix("alert(").unwrap().strip_suffix(')').unwrap();
    assert_eq!(unquote_script_string(literal).unwrap(), "it's <b>\"bold\"</b>");
    assert_eq!(p.text(), "a < b && c > d");

    let comment = body.comments().next().unwrap();
    assert!(!comment.contains("--"));

    let pre = body.elements().find(|e| e.name == "pre").unwrap();
    assert_eq!(pre.text(), "x]]>y");

    let script = body.elements().find(|e| e.name == "script").unwrap();
    let code = script.text();
    let start = code.find("var s = ").unwrap() + "var s = ".len();
    let end = code.rfind(';').unwrap();
    assert_eq!(unquote_script_string(&code[start..end]).unwrap(), "</script>");
}

#[test]
fn test_markup_nested_in_attribute_survives_two_parses() {
    let inner = write(|w| {
        w.open_tag_header("c")?;
        w.write_attribute("y", "<&\"quoted\"&>")?;
        w.close_tag_header_open()?;
        w.open_char_data()?;
        w.write_char_data("]]>")?;
        w.close_char_data()?;
        w.close_tag("c")
    });
    let outer = write(|w| {
        w.open_tag_header("b")?;
        w.write_attribute("x", &inner)?;
        w.close_tag_header_empty()
    });

    let b = parse(&outer).unwrap();
    assert_eq!(b.attribute("x"), Some(inner.as_str()));
    let c = parse(b.attribute("x").unwrap()).unwrap();
    assert_eq!(c.attribute("y"), Some("<&\"quoted\"&>"));
    assert_eq!(c.text(), "]]>");
}

#[test]
fn test_quoted_subtree_parses_back_to_its_markup() {
    let out = write(|w| {
        w.open_tag("outer")?;
        w.open_quoted_subtree()?;
        w.open_tag("inner")?;
        w.open_char_data()?;
        w.write_char_data("keep ]]> this")?;
        w.close_char_data()?;
        w.open_quoted_subtree()?;
        w.empty_tag_with("deepest", &[("q", "\"")])?;
        w.close_quoted_subtree()?;
        w.close_tag("inner")?;
        w.close_quoted_subtree()?;
        w.close_tag("outer")
    });

    let outer = parse(&out).unwrap();
    assert!(outer.elements().next().is_none());
    let inner = parse(&outer.text()).unwrap();
    assert_eq!(inner.name, "inner");
    let text = inner.text();
    assert!(text.starts_with("keep ]]> this"));
    let deepest = parse(&text["keep ]]> this".len()..]).unwrap();
    assert_eq!(deepest.name, "deepest");
    assert_eq!(deepest.attribute("q"), Some("\""));
}

// ============================================================================
// Properties
// ============================================================================

/// A writer operation, with names drawn from small fixed sets so that close
/// operations have a chance to match.
#[derive(Debug, Clone)]
enum Op {
    OpenTag(usize),
    OpenTagHeader(usize),
    CloseTagHeaderOpen,
    CloseTagHeaderEmpty,
    CloseTag,
    Attribute(usize, String),
    OpenAttribute(usize),
    CloseAttribute,
    OpenClassList,
    CloseClassList,
    Text(String),
    Char(char),
    OpenComment,
    CloseComment,
    OpenCharData,
    CloseCharData,
    OpenScript,
    CloseScript,
    OpenScriptString,
    CloseScriptString,
    OpenQuoted,
    CloseQuoted,
    Newline,
    Indented,
    ToggleIndent,
}

const ELEMENTS: [&str; 3] = ["a", "b", "c"];
const ATTRIBUTES: [&str; 3] = ["x", "y", "z"];

fn op() -> impl Strategy<Value = Op> {
    // ']' is left out: a script body is written unchanged and could end
    // its CDATA wrapper.
    let text = "[a-z <>&'\"\\-]{0,6}";
    prop_oneof![
        (0..ELEMENTS.len()).prop_map(Op::OpenTag),
        (0..ELEMENTS.len()).prop_map(Op::OpenTagHeader),
        Just(Op::CloseTagHeaderOpen),
        Just(Op::CloseTagHeaderEmpty),
        Just(Op::CloseTag),
        ((0..ATTRIBUTES.len()), text).prop_map(|(i, v)| Op::Attribute(i, v)),
        (0..ATTRIBUTES.len()).prop_map(Op::OpenAttribute),
        Just(Op::CloseAttribute),
        Just(Op::OpenClassList),
        Just(Op::CloseClassList),
        text.prop_map(Op::Text),
        prop::sample::select(vec!['a', ' ', '<', '-', '\'']).prop_map(Op::Char),
        Just(Op::OpenComment),
        Just(Op::CloseComment),
        Just(Op::OpenCharData),
        Just(Op::CloseCharData),
        Just(Op::OpenScript),
        Just(Op::CloseScript),
        Just(Op::OpenScriptString),
        Just(Op::CloseScriptString),
        Just(Op::OpenQuoted),
        Just(Op::CloseQuoted),
        Just(Op::Newline),
        Just(Op::Indented),
        Just(Op::ToggleIndent),
    ]
}

/// Applies `op`, ignoring usage errors.
fn apply(w: &mut MarkupWriter<Vec<u8>>, op: &Op) {
    let _ = match op {
        Op::OpenTag(i) => w.open_tag(ELEMENTS[*i]),
        Op::OpenTagHeader(i) => w.open_tag_header(ELEMENTS[*i]),
        Op::CloseTagHeaderOpen => w.close_tag_header_open(),
        Op::CloseTagHeaderEmpty => w.close_tag_header_empty(),
        Op::CloseTag => match w.open_elements().last() {
            Some(OpenNode::Element(name)) => w.close_tag(name),
            _ => w.close_tag("a"),
        },
        Op::Attribute(i, value) => w.write_attribute(ATTRIBUTES[*i], value.as_str()),
        Op::OpenAttribute(i) => w.open_attribute(ATTRIBUTES[*i]),
        Op::CloseAttribute => w.close_attribute(),
        Op::OpenClassList => w.open_class_list(),
        Op::CloseClassList => w.close_class_list(),
        Op::Text(text) => w.write_text(text),
        Op::Char(c) => w.write_char(*c),
        Op::OpenComment => w.open_comment(),
        Op::CloseComment => w.close_comment(),
        Op::OpenCharData => w.open_char_data(),
        Op::CloseCharData => w.close_char_data(),
        Op::OpenScript => w.open_script(),
        Op::CloseScript => w.close_script(),
        Op::OpenScriptString => w.open_script_string(),
        Op::CloseScriptString => w.close_script_string(),
        Op::OpenQuoted => w.open_quoted_subtree(),
        Op::CloseQuoted => w.close_quoted_subtree(),
        Op::Newline => w.nl().map(drop),
        Op::Indented => w.indented().map(drop),
        Op::ToggleIndent => {
            let on = w.is_indenting();
            w.set_indent(!on);
            Ok(())
        }
    };
}

/// A piece of a streamed comment or CDATA body.
#[derive(Debug, Clone)]
enum Piece {
    Text(String),
    Newline,
    Indented,
}

fn piece(text: &'static str) -> impl Strategy<Value = Piece> {
    prop_oneof![
        3 => text.prop_map(Piece::Text),
        1 => Just(Piece::Newline),
        1 => Just(Piece::Indented),
    ]
}

/// The text `pieces` write with the default newline and an indent of 0.
fn joined_text(pieces: &[Piece]) -> String {
    pieces
        .iter()
        .map(|piece| match piece {
            Piece::Text(text) => text.as_str(),
            Piece::Newline => "\n",
            Piece::Indented => "",
        })
        .collect()
}

proptest! {
    #[test]
    fn prop_content_text_round_trips(text in CONTENT_TEXT) {
        let out = write(|w| {
            w.open_tag("r")?;
            w.write_text(&text)?;
            w.close_tag("r")
        });
        let r = parse(&out).map_err(TestCaseError::fail)?;
        prop_assert_eq!(r.text(), text);
    }

    #[test]
    fn prop_attribute_value_round_trips(value in ATTRIBUTE_TEXT) {
        let out = write(|w| {
            w.open_tag_header("r")?;
            w.write_attribute("v", value.as_str())?;
            w.close_tag_header_empty()
        });
        let r = parse(&out).map_err(TestCaseError::fail)?;
        prop_assert_eq!(r.attribute("v"), Some(value.as_str()));
    }

    #[test]
    fn prop_chunked_char_data_round_trips(
        pieces in prop::collection::vec(piece("[\\]>a ]{0,5}"), 0..10),
    ) {
        // At the top level the indent is 0, so `indented` writes nothing.
        let chunked = write(|w| {
            w.open_char_data()?;
            for piece in &pieces {
                match piece {
                    Piece::Text(text) => w.write_char_data(text)?,
                    Piece::Newline => {
                        w.nl()?;
                    }
                    Piece::Indented => {
                        w.indented()?;
                    }
                }
            }
            w.close_char_data()
        });
        let joined = joined_text(&pieces);
        let whole = write(|w| {
            w.open_char_data()?;
            w.write_char_data(&joined)?;
            w.close_char_data()
        });
        prop_assert_eq!(&chunked, &whole);
        let fragment = parse_fragment(&chunked).map_err(TestCaseError::fail)?;
        prop_assert_eq!(fragment.text(), joined);
    }

    #[test]
    fn prop_comment_stays_a_single_comment(
        pieces in prop::collection::vec(piece("[-a>]{0,6}"), 0..10),
    ) {
        let out = write(|w| {
            w.open_comment()?;
            for piece in &pieces {
                match piece {
                    Piece::Text(text) => w.write_comment_body(text)?,
                    Piece::Newline => {
                        w.nl()?;
                    }
                    Piece::Indented => {
                        w.indented()?;
                    }
                }
            }
            w.close_comment()
        });
        let body = &out["<!-- ".len()..out.len() - " -->".len()];
        prop_assert!(!body.contains("--"), "double hyphen in {:?}", out);
        let fragment = parse_fragment(&out).map_err(TestCaseError::fail)?;
        prop_assert_eq!(fragment.comments().count(), 1);
        prop_assert!(fragment.elements().next().is_none());
    }

    #[test]
    fn prop_script_string_in_char_data_round_trips(text in ATTRIBUTE_TEXT) {
        let out = write(|w| {
            w.open_tag("r")?;
            w.open_char_data()?;
            w.write_script_literal(text.as_str())?;
            w.close_char_data()?;
            w.close_tag("r")
        });
        let r = parse(&out).map_err(TestCaseError::fail)?;
        let decoded = unquote_script_string(&r.text()).map_err(TestCaseError::fail)?;
        prop_assert_eq!(decoded, text);
    }

    #[test]
    fn prop_script_string_in_content_round_trips(text in ATTRIBUTE_TEXT) {
        let out = write(|w| {
            w.open_tag("r")?;
            w.write_script_literal(text.as_str())?;
            w.close_tag("r")
        });
        let r = parse(&out).map_err(TestCaseError::fail)?;
        let decoded = unquote_script_string(&r.text()).map_err(TestCaseError::fail)?;
        prop_assert_eq!(decoded, text);
    }

    #[test]
    fn prop_script_string_in_attribute_round_trips(text in ATTRIBUTE_TEXT) {
        let out = write(|w| {
            w.open_tag_header("r")?;
            w.open_attribute("onclick")?;
            w.write_script_literal(text.as_str())?;
            w.close_attribute()?;
            w.close_tag_header_empty()
        });
        let r = parse(&out).map_err(TestCaseError::fail)?;
        let literal = r.attribute("onclick").unwrap_or_default();
        let decoded = unquote_script_string(literal).map_err(TestCaseError::fail)?;
        prop_assert_eq!(decoded, text);
    }

    #[test]
    fn prop_script_string_in_script_round_trips(text in ATTRIBUTE_TEXT) {
        let out = write(|w| {
            w.open_script()?;
            w.write_script("f(")?;
            w.write_script_literal(text.as_str())?;
            w.write_script(")")?;
            w.close_script()
        });
        let script = parse(&out).map_err(TestCaseError::fail)?;
        let code = script.text();
        let start = code.find("f(").map(|i| i + 2).unwrap_or_default();
        let end = code.rfind(')').unwrap_or_default();
        let decoded = unquote_script_string(&code[start..end]).map_err(TestCaseError::fail)?;
        prop_assert_eq!(decoded, text);
    }

    #[test]
    fn prop_close_all_yields_well_formed_markup(
        ops in prop::collection::vec(op(), 0..40),
    ) {
        let mut w = MarkupWriter::in_memory();
        for op in &ops {
            apply(&mut w, op);
            prop_assert_eq!(w.depth(), w.open_elements().len());
        }
        w.close_all().map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(w.depth(), 0);
        prop_assert_eq!(w.state(), State::Initial);

        let out = w.into_string().map_err(|e| TestCaseError::fail(e.to_string()))?;
        parse_fragment(&out).map_err(TestCaseError::fail)?;
    }
}
