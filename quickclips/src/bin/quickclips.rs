//! Command-line front end for the Quick Clips engine
//!
//! Run with: cargo run --bin quickclips -- --db quickclips.sqlite scan "mail me at a@b.io"
//!
//! Without `--db` everything lives in memory for the duration of the command.
//! Logging goes to stderr and is controlled by RUST_LOG (default: warn).

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use quickclips::scanner::{self, ScanLimits};
use quickclips::{
    MemoryStorage, QuickClipsApi, QuickClipsConfig, QuickClipsError, QuickClipsStore, UrlOpener,
};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::process::Command as Process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// SQLite database holding search terms, tools and templates
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// JSON file with engine settings (missing keys use defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan text ("-" reads stdin) with every enabled search term
    Scan { text: String },

    /// Try a pattern against sample text without saving it
    TestPattern { pattern: String, text: String },

    /// Check a tool URL against its capture groups
    ValidateUrl {
        url: String,
        #[arg(long = "group")]
        groups: Vec<String>,
    },

    /// Render a stored template
    Generate {
        template_id: String,
        /// Clip contents, in order ({c1}, {c2}, ...)
        #[arg(long = "clip")]
        clips: Vec<String>,
        /// Named capture as key=value
        #[arg(long = "capture", value_parser = parse_key_value)]
        captures: Vec<(String, String)>,
    },

    /// Scan text and open tools for the matches
    Open {
        text: String,
        /// Tool ids to open (default: every tool)
        #[arg(long = "tool")]
        tools: Vec<String>,
        /// Print the URLs instead of opening them
        #[arg(long)]
        dry_run: bool,
    },

    /// Print all search terms, tools and templates as JSON
    Export,

    /// Merge a previously exported JSON file
    Import { file: PathBuf },

    AddTerm { name: String, pattern: String },

    AddTool {
        name: String,
        url: String,
        #[arg(long = "group")]
        groups: Vec<String>,
    },

    AddTemplate { name: String, content: String },
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))
}

/// Opens URLs with the platform's default handler
struct SystemUrlOpener;

impl UrlOpener for SystemUrlOpener {
    fn open_url(&self, url: String) -> Result<(), QuickClipsError> {
        let mut command = if cfg!(target_os = "macos") {
            let mut c = Process::new("open");
            c.arg(&url);
            c
        } else if cfg!(target_os = "windows") {
            let mut c = Process::new("cmd");
            c.args(["/C", "start", "", &url]);
            c
        } else {
            let mut c = Process::new("xdg-open");
            c.arg(&url);
            c
        };

        let status = command
            .status()
            .map_err(|e| QuickClipsError::OpenFailed(e.to_string()))?;
        if !status.success() {
            return Err(QuickClipsError::OpenFailed(format!("opener exited with {}", status)));
        }
        Ok(())
    }
}

/// Prints URLs instead of opening them
struct DryRunOpener;

impl UrlOpener for DryRunOpener {
    fn open_url(&self, url: String) -> Result<(), QuickClipsError> {
        println!("{}", url);
        Ok(())
    }
}

fn read_text(text: String) -> Result<String> {
    if text != "-" {
        return Ok(text);
    }
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("Failed to read stdin")?;
    Ok(buf)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Result<QuickClipsConfig> {
    let Some(path) = path else {
        return Ok(QuickClipsConfig::default());
    };
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid config {}", path.display()))
}

fn open_store(args: &Args, opener: Arc<dyn UrlOpener>) -> Result<QuickClipsStore> {
    let config = load_config(args.config.as_ref())?;
    let store = match &args.db {
        Some(path) => {
            let path = path.to_str().context("Database path is not valid UTF-8")?;
            QuickClipsStore::new(path.to_string(), opener, Some(config))
                .context("Failed to open database")?
        }
        None => QuickClipsStore::with_storage(Arc::new(MemoryStorage::new()), opener, config)?,
    };
    Ok(store)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let opener: Arc<dyn UrlOpener> = match &args.command {
        Command::Open { dry_run: true, .. } => Arc::new(DryRunOpener),
        _ => Arc::new(SystemUrlOpener),
    };
    let store = open_store(&args, opener)?;

    match args.command {
        Command::Scan { text } => {
            let text = read_text(text)?;
            let matches = store.quick_clips_scan_text(text).await?;
            print_json(&matches)?;
        }
        Command::TestPattern { pattern, text } => {
            let limits = ScanLimits::from(&store.config());
            let matches = scanner::test_pattern(&pattern, &read_text(text)?, &limits)?;
            print_json(&matches)?;
        }
        Command::ValidateUrl { url, groups } => {
            let validation = store.quick_tools_validate_url(url, groups);
            print_json(&validation)?;
            if !validation.is_valid {
                std::process::exit(1);
            }
        }
        Command::Generate {
            template_id,
            clips,
            captures,
        } => {
            let captures: HashMap<String, String> = captures.into_iter().collect();
            let text = store.templates_generate_text(template_id, clips, Some(captures))?;
            println!("{}", text);
        }
        Command::Open { text, tools, .. } => {
            let matches = store.quick_clips_scan_text(read_text(text)?).await?;
            let tool_ids = if tools.is_empty() {
                store.quick_tools_get_all().into_iter().map(|t| t.id).collect()
            } else {
                tools
            };
            let report = store.quick_clips_open_tools(matches, tool_ids);
            if !report.failures.is_empty() {
                eprintln!("{}", serde_json::to_string_pretty(&report.failures)?);
            }
            if report.opened.is_empty() && !report.failures.is_empty() {
                bail!("No tool could be opened");
            }
        }
        Command::Export => {
            println!("{}", store.quick_clips_export_config()?);
        }
        Command::Import { file } => {
            let json = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let summary = store.quick_clips_import_config(json)?;
            print_json(&summary)?;
        }
        Command::AddTerm { name, pattern } => {
            print_json(&store.search_terms_create(name, pattern)?)?;
        }
        Command::AddTool { name, url, groups } => {
            let validation = store.quick_tools_validate_url(url.clone(), groups.clone());
            for error in &validation.errors {
                eprintln!("warning: {}", error);
            }
            print_json(&store.quick_tools_create(name, url, groups)?)?;
        }
        Command::AddTemplate { name, content } => {
            print_json(&store.templates_create(name, content)?)?;
        }
    }

    store.flush().context("Failed to write changes")?;
    Ok(())
}
