//! Command-line `XPath` evaluation over XML files.
//!
//! Parses each input file and evaluates the given expressions against the
//! document node. Without expressions the parsed document is written back
//! out.

use std::fs;
use std::io::{self, Read};
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use xmlweave::reader::{parse_bytes, ParseOptions};
use xmlweave::serial::{to_xml, to_xml_with_options, WriteOptions};
use xmlweave::tree::{Document, NodeId, NodeKind};
use xmlweave::xpath::{format_number, XPath, XPathValue};

/// xmlweave -- query XML files with `XPath` 1.0.
#[derive(Parser, Debug)]
#[command(name = "xmlweave", version, about, long_about = None)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// XML files to process (use `-` for stdin).
    #[arg(required = true)]
    files: Vec<String>,

    /// `XPath` expression to evaluate. May be given more than once.
    #[arg(short = 'x', long = "xpath", value_name = "EXPR")]
    expressions: Vec<String>,

    /// Print the string value of each result instead of serialized nodes.
    #[arg(long, conflicts_with_all = ["count", "paths"])]
    value: bool,

    /// Print the number of selected nodes.
    #[arg(long, conflicts_with = "paths")]
    count: bool,

    /// Print a unique path for each selected node.
    #[arg(long)]
    paths: bool,

    /// Bind a namespace prefix for the expressions.
    #[arg(long = "ns", value_name = "PREFIX=URI", value_parser = parse_binding)]
    namespaces: Vec<(String, String)>,

    /// Bind a string variable for the expressions.
    #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_binding)]
    variables: Vec<(String, String)>,

    /// Trim text and drop whitespace-only text nodes while parsing.
    #[arg(long)]
    strip_whitespace: bool,

    /// Indent serialized output.
    #[arg(long)]
    format: bool,

    /// Log debug information to stderr. `RUST_LOG` is used otherwise.
    #[arg(long)]
    verbose: bool,
}

const EXIT_SUCCESS: u8 = 0;
const EXIT_PARSE_ERROR: u8 = 1;
const EXIT_XPATH_ERROR: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let expressions = match compile(&cli) {
        Ok(expressions) => expressions,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::from(EXIT_XPATH_ERROR);
        }
    };

    let mut worst_exit = EXIT_SUCCESS;
    for file in &cli.files {
        worst_exit = worst_exit.max(process_file(&cli, &expressions, file));
    }
    ExitCode::from(worst_exit)
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn parse_binding(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_owned(), value.to_owned())),
        _ => Err(format!("expected NAME=VALUE, got '{s}'")),
    }
}

fn compile(cli: &Cli) -> Result<Vec<XPath>, String> {
    cli.expressions
        .iter()
        .map(|source| {
            let mut xpath = XPath::compile(source).map_err(|e| format!("{source}: {e}"))?;
            for (prefix, uri) in &cli.namespaces {
                xpath = xpath.with_namespace(prefix, uri);
            }
            for (name, value) in &cli.variables {
                xpath = xpath.with_variable(name, value.as_str());
            }
            Ok(xpath)
        })
        .collect()
}

/// Processes a single input file and returns an exit code.
fn process_file(cli: &Cli, expressions: &[XPath], filename: &str) -> u8 {
    let input = match read_input(filename) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("{filename}: failed to read: {e}");
            return EXIT_PARSE_ERROR;
        }
    };

    let options = ParseOptions::default().trim_text(cli.strip_whitespace);
    let doc = match parse_bytes(&input, &options) {
        Ok(doc) => doc,
        Err(e) => {
            eprintln!("{filename}: {e}");
            return EXIT_PARSE_ERROR;
        }
    };

    if expressions.is_empty() {
        let options = WriteOptions::default().indent(cli.format).xml_declaration(true);
        print!("{}", to_xml_with_options(&doc, doc.root(), &options));
        return EXIT_SUCCESS;
    }

    let mut exit_code = EXIT_SUCCESS;
    for xpath in expressions {
        match xpath.evaluate(&doc, doc.root()) {
            Ok(value) => print_result(cli, &doc, value),
            Err(e) => {
                eprintln!("{filename}: {xpath}: {e}");
                exit_code = EXIT_XPATH_ERROR;
            }
        }
    }
    exit_code
}

/// Reads input from a file or stdin (when filename is `-`).
fn read_input(filename: &str) -> io::Result<Vec<u8>> {
    if filename == "-" {
        let mut buf = Vec::new();
        io::stdin().read_to_end(&mut buf)?;
        Ok(buf)
    } else {
        fs::read(filename)
    }
}

fn print_result(cli: &Cli, doc: &Document, value: XPathValue) {
    let nodes = match value {
        XPathValue::NodeSet(nodes) => nodes,
        XPathValue::String(s) => {
            println!("{s}");
            return;
        }
        XPathValue::Number(n) => {
            println!("{}", format_number(n));
            return;
        }
        XPathValue::Boolean(b) => {
            println!("{b}");
            return;
        }
    };
    if cli.count {
        println!("{}", nodes.len());
        return;
    }
    for node in nodes {
        if cli.paths {
            println!("{}", doc.unique_path(node));
        } else if cli.value {
            println!("{}", doc.string_value(node));
        } else {
            println!("{}", render(doc, node));
        }
    }
}

fn render(doc: &Document, node: NodeId) -> String {
    match doc.kind(node) {
        NodeKind::Attribute { .. } => format!("{}=\"{}\"", doc.name(node), doc.string_value(node)),
        NodeKind::Namespace { namespace } => match namespace.prefix() {
            Some(prefix) => format!("xmlns:{prefix}=\"{}\"", namespace.uri()),
            None => format!("xmlns=\"{}\"", namespace.uri()),
        },
        _ => to_xml(doc, node),
    }
}
