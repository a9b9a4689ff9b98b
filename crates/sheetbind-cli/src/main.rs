//! sheetbind CLI - fill spreadsheet templates from JSON job files

mod job;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sheetbind::prelude::*;
use std::path::{Path, PathBuf};

use crate::job::Job;

#[derive(Parser)]
#[command(name = "sheetbind")]
#[command(author, version, about = "Spreadsheet template filling tool")]
struct Cli {
    /// Log what the engine does
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a template as described by a JSON job file
    Render {
        /// Job file
        job: PathBuf,

        /// Directory templates are looked up in
        #[arg(short, long, default_value = ".")]
        templates: PathBuf,

        /// Output file (default: the job's output name)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the defined names of a workbook
    Names {
        /// Input spreadsheet file
        input: PathBuf,
    },

    /// List all sheets in a workbook
    Sheets {
        /// Input spreadsheet file
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match cli.command {
        Commands::Render {
            job,
            templates,
            output,
        } => render(&job, &templates, output.as_deref()),
        Commands::Names { input } => list_names(&input),
        Commands::Sheets { input } => list_sheets(&input),
    }
}

fn render(job_path: &Path, templates: &Path, output: Option<&Path>) -> Result<()> {
    let text = std::fs::read_to_string(job_path)
        .with_context(|| format!("Failed to read '{}'", job_path.display()))?;
    let job = Job::from_json(&text)
        .with_context(|| format!("Invalid job file '{}'", job_path.display()))?;

    let renderer = Renderer::new(DirectorySource::new(templates));
    let rendered = renderer
        .render(&job.template, &job.output, |wb| job.fill(wb))
        .with_context(|| format!("Failed to render '{}'", job.template))?;

    let target = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(&rendered.filename));
    std::fs::write(&target, &rendered.bytes)
        .with_context(|| format!("Failed to write '{}'", target.display()))?;

    eprintln!(
        "Wrote {} ({} bytes, {})",
        target.display(),
        rendered.bytes.len(),
        rendered.media_type
    );
    Ok(())
}

fn list_names(input: &Path) -> Result<()> {
    let workbook =
        Workbook::open(input).with_context(|| format!("Failed to open '{}'", input.display()))?;

    let mut names: Vec<_> = workbook.named_ranges().iter().collect();
    names.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));

    for name in names {
        let scope = match name.scope {
            sheetbind::NameScope::Workbook => "workbook".to_string(),
            sheetbind::NameScope::Sheet(i) => workbook
                .worksheet(i)
                .map(|s| s.name().to_string())
                .unwrap_or_else(|| format!("#{}", i)),
        };
        println!("{}\t{}\t{}", name.name, scope, name.refers_to);
    }

    Ok(())
}

fn list_sheets(input: &Path) -> Result<()> {
    let workbook =
        Workbook::open(input).with_context(|| format!("Failed to open '{}'", input.display()))?;

    for (i, sheet) in workbook.worksheets().enumerate() {
        let used = match sheet.used_range() {
            Some(range) => format!("{} rows x {} columns", range.end.row + 1, range.end.col + 1),
            None => "empty".to_string(),
        };
        println!("{}\t{}\t{}", i, sheet.name(), used);
    }

    Ok(())
}
