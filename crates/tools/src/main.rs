//! htmlmin - minify an HTML file from the command line
//!
//! ```text
//! htmlmin page.html -c settings.json -o page.min.html
//! curl -s https://example.com | htmlmin --all --report
//! htmlmin page.html --all --dump-tree > tree.json
//! ```

use clap::{ArgAction, Parser};
use minifier::{PassConfig, minify_with_report};
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use tracing::Level;

/// CLI flags
#[derive(Parser)]
#[command(name = "htmlmin", author, version, about)]
struct Cli {
    /// Input file (default: stdin)
    input: Option<PathBuf>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON settings file with one flag per pass
    #[arg(short, long, value_name = "SETTINGS")]
    config: Option<PathBuf>,

    /// Enable every pass; applied on top of --config
    #[arg(long, action = ArgAction::SetTrue)]
    all: bool,

    /// Print a JSON report to stderr
    #[arg(long, action = ArgAction::SetTrue)]
    report: bool,

    /// Write the document tree of the minified page as JSON instead of markup
    #[arg(long, action = ArgAction::SetTrue)]
    dump_tree: bool,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn pass_config(&self) -> Result<PassConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => PassConfig::from_json(&fs::read_to_string(path)?)?,
            None => PassConfig::new(),
        };
        if self.all {
            // List settings from the file survive
            for spec in minifier::REGISTRY {
                config.set_enabled(spec.name, true);
            }
        }
        Ok(config)
    }

    fn log_level(&self) -> Level {
        match self.verbose {
            0 => Level::WARN,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }
}

/// The tree a parser builds from `markup`, as pretty JSON
fn dump_tree(markup: &str) -> Result<String, dom::DomError> {
    dom::parse(markup)?.to_json()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level())
        .with_writer(io::stderr)
        .init();

    let config = cli.pass_config()?;

    let raw = match &cli.input {
        Some(path) => fs::read_to_string(path)?,
        None => {
            let mut raw = String::new();
            io::stdin().read_to_string(&mut raw)?;
            raw
        }
    };

    let (output, report) = minify_with_report(&raw, &config);
    tracing::debug!(
        input = report.input_len,
        output = report.output_len,
        passes = report.passes_run.len(),
        "Minified"
    );

    let output = if cli.dump_tree {
        dump_tree(&output)?
    } else {
        output
    };

    match &cli.output {
        Some(path) => fs::write(path, &output)?,
        None => io::stdout().write_all(output.as_bytes())?,
    }

    if cli.report {
        eprintln!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}
