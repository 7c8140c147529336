//! tagstream - Render and escape markup from the command line

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use quick_xml::Reader;
use quick_xml::events::Event;

use tagstream::escape::{self, ScriptHost};
use tagstream::{MarkupWriter, WriterConfig, tree};

#[derive(Parser)]
#[command(name = "tagstream")]
#[command(version, about = "Streaming markup writer", long_about = None)]
#[command(after_help = "EXAMPLES:
    tagstream escape --context attribute 'a \"quoted\" value'
    tagstream render page.json -o page.xhtml --indent
    tagstream render page.json --encoding iso-8859-1 --xml-header")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Escape text for one markup context
    Escape {
        /// Context the text is escaped for
        #[arg(short, long, value_enum, default_value_t = Context::Content)]
        context: Context,

        /// Text to escape (read from stdin if omitted)
        text: Option<String>,
    },
    /// Render a JSON document tree as markup
    Render {
        /// JSON document (a node or an array of nodes)
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Put tags on their own indented lines
        #[arg(long)]
        indent: bool,

        /// Indent step in spaces
        #[arg(long, default_value_t = 2)]
        indent_step: usize,

        /// Line separator
        #[arg(long, value_enum, default_value_t = Newline::Lf)]
        newline: Newline,

        /// Output encoding label
        #[arg(long, default_value = "utf-8")]
        encoding: String,

        /// Start with an XML declaration
        #[arg(long)]
        xml_header: bool,

        /// Parse the result again and fail if it is not well-formed
        #[arg(long)]
        check: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Context {
    Content,
    Attribute,
    Comment,
    Cdata,
    ScriptString,
}

#[derive(Clone, Copy, ValueEnum)]
enum Newline {
    Lf,
    Crlf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Escape { context, text } => escape_text(context, text),
        Command::Render {
            input,
            output,
            indent,
            indent_step,
            newline,
            encoding,
            xml_header,
            check,
        } => {
            let newline = match newline {
                Newline::Lf => "\n",
                Newline::Crlf => "\r\n",
            };
            let options = RenderOptions {
                indent,
                indent_step,
                newline,
                encoding: &encoding,
                xml_header,
                check,
            };
            render(&input, output.as_deref(), &options)
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn escape_text(context: Context, text: Option<String>) -> Result<(), String> {
    let text = match text {
        Some(text) => text,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf).map_err(|e| e.to_string())?;
            buf
        }
    };

    let escaped = match context {
        Context::Content => escape::escape_content(&text),
        Context::Attribute => escape::escape_attribute(&text),
        Context::Comment => escape::escape_comment(&text),
        Context::Cdata => escape::escape_cdata(&text),
        Context::ScriptString => escape::escape_script_string(&text, ScriptHost::Raw),
    };
    println!("{escaped}");
    Ok(())
}

struct RenderOptions<'a> {
    indent: bool,
    indent_step: usize,
    newline: &'a str,
    encoding: &'a str,
    xml_header: bool,
    check: bool,
}

fn render(input: &Path, output: Option<&Path>, options: &RenderOptions<'_>) -> Result<(), String> {
    let encoding = encoding_rs::Encoding::for_label(options.encoding.as_bytes())
        .ok_or_else(|| format!("unknown encoding: {}", options.encoding))?;

    let json = std::fs::read_to_string(input).map_err(|e| format!("{}: {e}", input.display()))?;
    let nodes = tree::parse_document(&json).map_err(|e| e.to_string())?;

    let config = WriterConfig::new()
        .with_newline(options.newline)
        .with_indent_step(options.indent_step)
        .with_indenting(options.indent)
        .with_encoding(encoding);
    let mut writer = MarkupWriter::with_config(Vec::new(), config);
    if options.xml_header {
        writer.write_xml_header().map_err(|e| e.to_string())?;
    }
    tree::render_all(&nodes, &mut writer).map_err(|e| e.to_string())?;
    let output_encoding = writer.encoding();
    let bytes = writer.finish().map_err(|e| e.to_string())?;

    if options.check {
        let (text, _, _) = output_encoding.decode(&bytes);
        check_well_formed(&text)?;
    }

    match output {
        Some(path) => std::fs::write(path, &bytes).map_err(|e| format!("{}: {e}", path.display())),
        None => io::stdout().write_all(&bytes).map_err(|e| e.to_string()),
    }
}

fn check_well_formed(markup: &str) -> Result<(), String> {
    let mut reader = Reader::from_str(markup);
    let mut depth = 0usize;
    loop {
        match reader.read_event() {
            Ok(Event::Start(_)) => depth += 1,
            Ok(Event::End(_)) => depth = depth.saturating_sub(1),
            Ok(Event::Eof) if depth == 0 => return Ok(()),
            Ok(Event::Eof) => return Err(format!("output ends with {depth} unclosed elements")),
            Ok(_) => {}
            Err(e) => return Err(format!("output is not well-formed: {e}")),
        }
    }
}
