use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use rmerge_common::{
    default_output_dir, ensure_config, load_config, Diagnostic, FileKind, FileOutcome, InputFile,
    MergeReport, MergeResult, MergeStats, RMergeError, TabularResult,
};
use rmerge_core::{render, MergeEngine};
use serde::Serialize;
use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const TABLE_PREVIEW_ROWS: usize = 10;
const LINE_PREVIEW_ROWS: usize = 20;
const MAX_CELL_WIDTH: usize = 30;

#[derive(Parser)]
#[command(name = "rmerge")]
#[command(author = "RMerge Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Merge CSV or text files and remove duplicate entries", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge files of one type and remove duplicates
    Merge {
        /// Input files (all CSV or all text)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output file (defaults to merged_result.csv / merged_result.txt)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// How to interpret the input files
        #[arg(short, long, value_enum, default_value_t = Mode::Auto)]
        mode: Mode,

        /// Number of merged rows/lines to preview
        #[arg(short, long)]
        preview: Option<usize>,

        /// Do not prefix CSV output with a UTF-8 byte-order mark
        #[arg(long)]
        no_bom: bool,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the detected type of a file
    Detect {
        /// File to inspect
        file: PathBuf,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the configuration, optionally writing a default one
    Config {
        /// Write the default configuration if none exists
        #[arg(long)]
        init: bool,

        /// Use the portable location next to the executable
        #[arg(long)]
        portable: bool,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Detect from file names and content
    Auto,
    /// Treat every file as a delimited table
    Tabular,
    /// Treat every file as one entry per line
    Lines,
}

fn main() {
    // Initialize tracing to stderr (so JSON output can go cleanly to stdout)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Merge {
            files,
            output,
            mode,
            preview,
            no_bom,
            json,
        } => run_merge(files, output, mode, preview, no_bom, json)
            .map_err(|e| format!("Merge failed: {}", e)),
        Commands::Detect { file, json } => {
            run_detect(&file, json).map_err(|e| format!("Detection failed: {}", e))
        }
        Commands::Config {
            init,
            portable,
            json,
        } => run_config(init, portable, json).map_err(|e| format!("Config failed: {}", e)),
    };

    if let Err(message) = outcome {
        error!("{}", message);
        std::process::exit(1);
    }
}

fn run_merge(
    files: Vec<PathBuf>,
    output: Option<PathBuf>,
    mode: Mode,
    preview: Option<usize>,
    no_bom: bool,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let loaded = load_config(false)?;
    let config = &loaded.config;
    let engine = MergeEngine::from_config(config)?;

    let batch = read_inputs(&files)?;

    let report = match mode {
        Mode::Auto => engine.merge(&batch)?,
        Mode::Tabular => engine.merge_as(FileKind::Tabular, &batch)?,
        Mode::Lines => engine.merge_as(FileKind::Lines, &batch)?,
    };
    info!("Detected file type: {}", report.kind.label());

    for diagnostic in report.skipped() {
        warn!("{}", diagnostic);
    }

    let Some(result) = report.result.as_ref() else {
        if json {
            let output = serde_json::to_string_pretty(&build_json_report(&batch, &report, None))?;
            println!("{output}");
        }
        return Err(RMergeError::NoData { files: batch.len() }.into());
    };

    let output_path = output.unwrap_or_else(|| {
        default_output_dir(config, loaded.portable, &loaded.path)
            .join(result.kind().default_output_name())
    });
    let payload = render(result, config.write_bom && !no_bom)?;
    fs::write(&output_path, payload)?;
    info!("Wrote {}", output_path.display());

    if json {
        let output = serde_json::to_string_pretty(&build_json_report(
            &batch,
            &report,
            Some(&output_path),
        ))?;
        println!("{output}");
        return Ok(());
    }

    println!("\n{}", "=".repeat(80));
    println!("Merge Results");
    println!("{}", "=".repeat(80));
    println!("Detected file type: {}", report.kind.label());

    println!("\nInput files:");
    for line in format_file_list(&batch) {
        println!("  {}", line);
    }

    println!();
    for diagnostic in &report.diagnostics {
        let mark = if diagnostic.is_skipped() { "FAIL" } else { " OK " };
        println!("  [{}] {}", mark, diagnostic);
    }

    let stats = result.stats();
    println!("\n{}", "=".repeat(80));
    println!("Summary:");
    for line in format_summary(&stats) {
        println!("  {}", line);
    }

    match result {
        MergeResult::Tabular(table) => {
            let rows = preview.unwrap_or(TABLE_PREVIEW_ROWS);
            println!("\nPreview (first {} rows):", rows);
            for line in format_table_preview(table, rows) {
                println!("  {}", line);
            }
        }
        MergeResult::Lines(lines) => {
            let rows = preview.unwrap_or(LINE_PREVIEW_ROWS);
            println!("\nPreview (first {} lines):", rows);
            for line in lines.lines.iter().take(rows) {
                println!("  {}", line);
            }
        }
    }

    println!("\nOutput written to: {}", output_path.display());
    println!("{}", "=".repeat(80));

    Ok(())
}

fn run_detect(path: &Path, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !path.is_file() {
        return Err(format!("Input file does not exist: {}", path.display()).into());
    }

    let loaded = load_config(false)?;
    let engine = MergeEngine::from_config(&loaded.config)?;
    let file = InputFile::from_path(path)?;
    let kind = engine.detector().detect(&file);

    if json {
        let output = serde_json::to_string_pretty(&JsonDetect {
            file: file.name,
            kind,
        })?;
        println!("{output}");
    } else {
        println!("{}: {} ({})", file.name, kind, kind.label());
    }

    Ok(())
}

fn run_config(init: bool, portable: bool, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let loaded = if init {
        ensure_config(portable)?
    } else {
        load_config(portable)?
    };
    let created = init && !loaded.exists;

    if json {
        let output = serde_json::to_string_pretty(&JsonConfig {
            path: loaded.path.to_string_lossy().to_string(),
            exists: loaded.exists || created,
            created,
            portable: loaded.portable,
            config: &loaded.config,
        })?;
        println!("{output}");
        return Ok(());
    }

    println!("Config file: {}", loaded.path.display());
    if created {
        println!("Created default configuration");
    } else if !loaded.exists {
        println!("(not present, using defaults)");
    }
    println!("{}", serde_json::to_string_pretty(&loaded.config)?);

    Ok(())
}

fn read_inputs(paths: &[PathBuf]) -> Result<Vec<InputFile>, Box<dyn std::error::Error>> {
    let progress = if std::io::stderr().is_terminal() {
        let bar = ProgressBar::new(paths.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}")?
                .progress_chars("=> "),
        );
        bar
    } else {
        ProgressBar::hidden()
    };

    let mut batch = Vec::with_capacity(paths.len());
    for path in paths {
        progress.set_message(path.display().to_string());
        if !path.is_file() {
            progress.abandon();
            return Err(format!("Input file does not exist: {}", path.display()).into());
        }
        batch.push(InputFile::from_path(path)?);
        progress.inc(1);
    }
    progress.finish_and_clear();

    Ok(batch)
}

#[derive(Serialize)]
struct JsonReport<'a> {
    mode: FileKind,
    files: Vec<JsonFile>,
    stats: Option<JsonStats>,
    diagnostics: &'a [Diagnostic],
    output: Option<String>,
}

#[derive(Serialize)]
struct JsonFile {
    name: String,
    size_bytes: usize,
    records: Option<usize>,
}

#[derive(Serialize)]
struct JsonStats {
    original: usize,
    deduped: usize,
    reduction: usize,
}

#[derive(Serialize)]
struct JsonDetect {
    file: String,
    kind: FileKind,
}

#[derive(Serialize)]
struct JsonConfig<'a> {
    path: String,
    exists: bool,
    created: bool,
    portable: bool,
    config: &'a rmerge_common::AppConfig,
}

fn build_json_report<'a>(
    batch: &[InputFile],
    report: &'a MergeReport,
    output: Option<&Path>,
) -> JsonReport<'a> {
    let files = batch
        .iter()
        .zip(&report.diagnostics)
        .map(|(file, diagnostic)| JsonFile {
            name: file.name.clone(),
            size_bytes: file.bytes.len(),
            records: match diagnostic.outcome {
                FileOutcome::Loaded { count, .. } => Some(count),
                FileOutcome::Skipped { .. } => None,
            },
        })
        .collect();

    JsonReport {
        mode: report.kind,
        files,
        stats: report.stats().map(|stats| JsonStats {
            original: stats.original,
            deduped: stats.deduped,
            reduction: stats.reduction(),
        }),
        diagnostics: &report.diagnostics,
        output: output.map(|path| path.to_string_lossy().to_string()),
    }
}

fn format_file_list(batch: &[InputFile]) -> Vec<String> {
    let width = batch
        .iter()
        .map(|file| file.name.chars().count())
        .max()
        .unwrap_or(0)
        .max("File".len());

    let mut lines = vec![format!("{:<width$}  {:>12}", "File", "Size", width = width)];
    for file in batch {
        lines.push(format!(
            "{:<width$}  {:>12}",
            file.name,
            format!("{:.2} KB", file.size_kb()),
            width = width
        ));
    }
    lines
}

fn format_summary(stats: &MergeStats) -> Vec<String> {
    let mut lines = vec![
        format!("Rows before merge:  {}", stats.original),
        format!("Rows after dedupe:  {}", stats.deduped),
    ];
    if stats.reduction() > 0 {
        lines.push(format!("Removed {} duplicates", stats.reduction()));
    }
    lines
}

fn format_table_preview(table: &TabularResult, rows: usize) -> Vec<String> {
    let shown: Vec<Vec<String>> = table
        .rows
        .iter()
        .take(rows)
        .map(|row| {
            row.iter()
                .map(|value| truncate_cell(value.as_deref().unwrap_or(""), MAX_CELL_WIDTH))
                .collect()
        })
        .collect();
    let header: Vec<String> = table
        .columns
        .iter()
        .map(|column| truncate_cell(column, MAX_CELL_WIDTH))
        .collect();

    let widths: Vec<usize> = (0..header.len())
        .map(|idx| {
            shown
                .iter()
                .map(|row| row[idx].chars().count())
                .chain(std::iter::once(header[idx].chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let format_row = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{:<width$}", cell, width = width))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut lines = vec![format_row(&header)];
    lines.push(
        widths
            .iter()
            .map(|&width| "-".repeat(width))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    lines.extend(shown.iter().map(|row| format_row(row)));
    lines
}

fn truncate_cell(value: &str, max_len: usize) -> String {
    if value.chars().count() <= max_len {
        return value.to_string();
    }

    // Use char indices to avoid splitting UTF-8 characters
    let keep: String = value.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", keep)
}
