use anyhow::{Context, Result, bail};
use clap::Parser;
use serde_json::json;
use symscan::config::Config;
use symscan::indexer::{self, RepositoryOptions, scan::ScanOptions};
use symscan::{cli, util};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    let config = Config::get();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.as_str().into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let args = cli::Args::parse();

    match args.command {
        cli::Command::Scan {
            repo,
            languages,
            resolve,
            exclude,
            respect_gitignore,
        } => {
            if !repo.is_dir() {
                bail!("not a directory: {}", repo.display());
            }
            let mut scan = ScanOptions::default();
            scan.exclude_dirs.extend(exclude);
            scan.respect_ignore_files = respect_gitignore;
            let options = RepositoryOptions {
                languages,
                scan,
                resolve_calls: resolve,
            };
            let result = indexer::extract_repository(&repo, &options)?;
            let output = json!({ "summary": result.summary(), "result": result });
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        cli::Command::File { path, repo } => {
            let Some(mut extractor) = indexer::extractor_for_path(&path)? else {
                bail!("unsupported file type: {}", path.display());
            };
            let rel_path = match util::normalize_rel_path(&repo, &path) {
                Ok(rel_path) => rel_path,
                Err(_) if path.is_relative() => util::normalize_path(&path),
                Err(_) => util::display_path(&path),
            };
            let result = extractor.extract_file(&path, &rel_path);
            let output = json!({ "summary": result.summary(), "result": result });
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        cli::Command::Schema => {
            let schema = indexer::roslyn::output_schema();
            println!(
                "{}",
                serde_json::to_string_pretty(&schema).context("encode schema")?
            );
            Ok(())
        }
    }
}
