use crate::{RMergeError, Result};
use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// A named file supplied by the caller for one merge run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl InputFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, keeping only its file name
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        Ok(Self { name, bytes })
    }

    /// Lowercased extension of the file name, if any
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
    }

    pub fn size_kb(&self) -> f64 {
        self.bytes.len() as f64 / 1024.0
    }
}

/// How the files of a batch are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    /// Delimited, header-first table
    Tabular,
    /// One datum per line
    Lines,
}

impl FileKind {
    pub fn label(&self) -> &'static str {
        match self {
            FileKind::Tabular => "CSV",
            FileKind::Lines => "TXT",
        }
    }

    /// File name used for the merged payload when the caller gives none
    pub fn default_output_name(&self) -> &'static str {
        match self {
            FileKind::Tabular => "merged_result.csv",
            FileKind::Lines => "merged_result.txt",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileKind::Tabular => write!(f, "tabular"),
            FileKind::Lines => write!(f, "lines"),
        }
    }
}

/// Counts before and after duplicate removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    pub original: usize,
    pub deduped: usize,
}

impl MergeStats {
    pub fn reduction(&self) -> usize {
        self.original.saturating_sub(self.deduped)
    }
}

/// Merged table. Every row has exactly `columns.len()` cells; `None` is a missing value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TabularResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
    pub original_row_count: usize,
    pub deduped_row_count: usize,
}

impl TabularResult {
    pub fn stats(&self) -> MergeStats {
        MergeStats {
            original: self.original_row_count,
            deduped: self.deduped_row_count,
        }
    }

    /// Value of `column` in row `row`, `None` when missing or out of range
    pub fn value(&self, row: usize, column: &str) -> Option<&str> {
        let index = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(index)?.as_deref()
    }
}

/// Merged lines, sorted and unique
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineResult {
    pub lines: Vec<String>,
    pub original_line_count: usize,
    pub deduped_line_count: usize,
}

impl LineResult {
    pub fn stats(&self) -> MergeStats {
        MergeStats {
            original: self.original_line_count,
            deduped: self.deduped_line_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MergeResult {
    Tabular(TabularResult),
    Lines(LineResult),
}

impl MergeResult {
    pub fn kind(&self) -> FileKind {
        match self {
            MergeResult::Tabular(_) => FileKind::Tabular,
            MergeResult::Lines(_) => FileKind::Lines,
        }
    }

    pub fn stats(&self) -> MergeStats {
        match self {
            MergeResult::Tabular(table) => table.stats(),
            MergeResult::Lines(lines) => lines.stats(),
        }
    }
}

/// Per-file outcome of a merge run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    /// File was read; `count` is its row or raw line count
    Loaded { count: usize, encoding: String },
    /// File contributed nothing to the result
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub file: String,
    pub outcome: FileOutcome,
}

impl Diagnostic {
    pub fn loaded(file: &str, count: usize, encoding: &str) -> Self {
        Self {
            file: file.to_string(),
            outcome: FileOutcome::Loaded {
                count,
                encoding: encoding.to_string(),
            },
        }
    }

    pub fn skipped(file: &str, reason: impl fmt::Display) -> Self {
        Self {
            file: file.to_string(),
            outcome: FileOutcome::Skipped {
                reason: reason.to_string(),
            },
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, FileOutcome::Skipped { .. })
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            FileOutcome::Loaded { count, encoding } => {
                write!(f, "read {} ({} records, {})", self.file, count, encoding)
            }
            FileOutcome::Skipped { reason } => {
                write!(f, "could not read {}: {}", self.file, reason)
            }
        }
    }
}

/// Everything a merge run hands back to its caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub kind: FileKind,
    /// `None` when no file of the batch could be read
    pub result: Option<MergeResult>,
    pub diagnostics: Vec<Diagnostic>,
}

impl MergeReport {
    pub fn stats(&self) -> Option<MergeStats> {
        self.result.as_ref().map(MergeResult::stats)
    }

    pub fn skipped(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_skipped())
    }

    /// The merged result, or `NoData` when every file was skipped
    pub fn into_result(self) -> Result<MergeResult> {
        let files = self.diagnostics.len();
        self.result.ok_or(RMergeError::NoData { files })
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Extensions classified as tabular without looking at the content
    #[serde(default = "default_tabular_extensions")]
    pub tabular_extensions: Vec<String>,

    /// Extensions classified as line files without looking at the content
    #[serde(default = "default_line_extensions")]
    pub line_extensions: Vec<String>,

    /// Field delimiter per tabular extension; unlisted extensions use a comma
    #[serde(default = "default_delimiters")]
    pub delimiters: BTreeMap<String, char>,

    /// Encodings tried in order when decoding a file
    #[serde(default = "default_encodings")]
    pub encodings: Vec<String>,

    /// Directory the merged file is written to when no output path is given
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Prefix merged CSV output with a UTF-8 byte-order mark
    #[serde(default = "default_write_bom")]
    pub write_bom: bool,

    /// Enable portable mode (config alongside binary)
    #[serde(default)]
    pub portable_mode: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tabular_extensions: default_tabular_extensions(),
            line_extensions: default_line_extensions(),
            delimiters: default_delimiters(),
            encodings: default_encodings(),
            output_dir: None,
            write_bom: default_write_bom(),
            portable_mode: false,
        }
    }
}

fn default_tabular_extensions() -> Vec<String> {
    vec!["csv".to_string(), "tsv".to_string()]
}

fn default_line_extensions() -> Vec<String> {
    ["txt", "text", "log", "lst"]
        .iter()
        .map(|ext| ext.to_string())
        .collect()
}

fn default_delimiters() -> BTreeMap<String, char> {
    BTreeMap::from([("tsv".to_string(), '\t')])
}

fn default_encodings() -> Vec<String> {
    ["utf-8", "gbk", "gb18030", "latin-1"]
        .iter()
        .map(|name| name.to_string())
        .collect()
}

fn default_write_bom() -> bool {
    true
}
