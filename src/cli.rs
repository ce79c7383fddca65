use crate::indexer::Language;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "symscan",
    version,
    about = "Symbol, call and import extraction for Python, JavaScript/TypeScript and C#",
    after_help = r#"Examples:
  symscan scan --repo . --resolve
  symscan scan --repo src --language python,typescript --exclude generated
  symscan file src/app/main.py --repo .
  symscan schema
"#
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Extract every supported file under a directory.
    Scan {
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        /// Restrict extraction to specific languages (default: all).
        #[arg(long = "language", value_delimiter = ',')]
        languages: Vec<Language>,
        /// Resolve call targets across files.
        #[arg(long)]
        resolve: bool,
        /// Extra directory names to skip, on top of the configured ones.
        #[arg(long = "exclude")]
        exclude: Vec<String>,
        /// Honor .gitignore and .ignore files.
        #[arg(long)]
        respect_gitignore: bool,
    },
    /// Extract a single file with the extractor chosen by its extension.
    File {
        path: PathBuf,
        /// Root the recorded path is made relative to.
        #[arg(long, default_value = ".")]
        repo: PathBuf,
    },
    /// Print the JSON Schema Roslyn output is validated against.
    Schema,
}
