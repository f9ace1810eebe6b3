use crate::decode::{DecodeChain, DecodeStrategy};
use csv::{ReaderBuilder, StringRecord};
use rmerge_common::{DecodeError, Diagnostic, InputFile, TabularResult};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{info, warn};

/// One successfully parsed input table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTable {
    /// Unique column names in header order
    pub columns: Vec<String>,
    /// Rows padded to `columns.len()`; empty fields are `None`
    pub rows: Vec<Vec<Option<String>>>,
}

/// Engine for merging delimited files and dropping duplicate rows
#[derive(Debug, Clone)]
pub struct TabularMerger {
    chain: DecodeChain,
    /// Field delimiter keyed by lowercase extension
    delimiters: BTreeMap<String, u8>,
}

impl Default for TabularMerger {
    fn default() -> Self {
        Self::new(DecodeChain::default())
    }
}

impl TabularMerger {
    pub fn new(chain: DecodeChain) -> Self {
        Self {
            chain,
            delimiters: BTreeMap::from([("tsv".to_string(), b'\t')]),
        }
    }

    /// Replace the extension → delimiter table
    pub fn with_delimiters(mut self, delimiters: BTreeMap<String, u8>) -> Self {
        self.delimiters = delimiters
            .into_iter()
            .map(|(ext, delimiter)| (ext.trim_start_matches('.').to_lowercase(), delimiter))
            .collect();
        self
    }

    /// Field delimiter for a file: the one configured for its extension,
    /// comma otherwise
    pub fn delimiter_for(&self, file: &InputFile) -> u8 {
        file.extension()
            .and_then(|ext| self.delimiters.get(&ext).copied())
            .unwrap_or(b',')
    }

    /// Parse every file of `batch` and merge the tables that could be read.
    /// Returns `None` when no file parsed.
    pub fn merge(&self, batch: &[InputFile]) -> (Option<TabularResult>, Vec<Diagnostic>) {
        let mut tables = Vec::with_capacity(batch.len());
        let mut diagnostics = Vec::with_capacity(batch.len());

        for file in batch {
            let delimiter = self.delimiter_for(file);
            let parsed = self.chain.decode_with(&file.bytes, |text, strategy| {
                parse_table(text, delimiter, strategy)
            });

            match parsed {
                Ok((table, strategy)) => {
                    info!("Read {} ({} rows, {})", file.name, table.rows.len(), strategy);
                    diagnostics.push(Diagnostic::loaded(
                        &file.name,
                        table.rows.len(),
                        strategy.name(),
                    ));
                    tables.push(table);
                }
                Err(e) => {
                    warn!("Skipping {}: {}", file.name, e);
                    diagnostics.push(Diagnostic::skipped(&file.name, e));
                }
            }
        }

        if tables.is_empty() {
            return (None, diagnostics);
        }

        (Some(combine(tables)), diagnostics)
    }
}

/// Concatenate tables aligning columns by name, then drop rows equal to an
/// earlier row across every column. Missing values compare equal.
pub fn combine(tables: Vec<ParsedTable>) -> TabularResult {
    let mut columns: Vec<String> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for table in &tables {
        for column in &table.columns {
            if !index.contains_key(column) {
                index.insert(column.clone(), columns.len());
                columns.push(column.clone());
            }
        }
    }

    let mut seen: HashSet<Vec<Option<String>>> = HashSet::new();
    let mut rows = Vec::new();
    let mut original_row_count = 0;

    for table in tables {
        let positions: Vec<usize> = table.columns.iter().map(|c| index[c]).collect();

        for source in table.rows {
            original_row_count += 1;

            let mut row = vec![None; columns.len()];
            for (value, &pos) in source.into_iter().zip(&positions) {
                row[pos] = value;
            }

            if seen.insert(row.clone()) {
                rows.push(row);
            }
        }
    }

    TabularResult {
        deduped_row_count: rows.len(),
        columns,
        rows,
        original_row_count,
    }
}

/// Parse `text` as a header-first delimited table
pub fn parse_table(
    text: &str,
    delimiter: u8,
    encoding: DecodeStrategy,
) -> Result<ParsedTable, DecodeError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| malformed(encoding, e.to_string()))?
        .clone();

    if headers.is_empty() {
        return Err(DecodeError::MissingHeader);
    }

    let columns = unique_column_names(&headers);
    let mut rows = Vec::new();

    for (idx, result) in reader.records().enumerate() {
        let record = result.map_err(|e| malformed(encoding, e.to_string()))?;

        // Short records are padded; extra fields have no column to land in.
        if record.len() > columns.len() {
            return Err(malformed(
                encoding,
                format!(
                    "expected {} fields in record {}, saw {}",
                    columns.len(),
                    idx + 1,
                    record.len()
                ),
            ));
        }

        let mut row: Vec<Option<String>> = record.iter().map(cell).collect();
        row.resize(columns.len(), None);
        rows.push(row);
    }

    Ok(ParsedTable { columns, rows })
}

fn cell(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn malformed(encoding: DecodeStrategy, message: String) -> DecodeError {
    DecodeError::Malformed {
        encoding: encoding.name().to_string(),
        message,
    }
}

fn unique_column_names(headers: &StringRecord) -> Vec<String> {
    let mut used = HashSet::new();
    let mut columns = Vec::with_capacity(headers.len());

    for (idx, name) in headers.iter().enumerate() {
        let base = if name.is_empty() {
            format!("Unnamed: {}", idx)
        } else {
            name.to_string()
        };

        let mut candidate = base.clone();
        let mut suffix = 0;
        while used.contains(&candidate) {
            suffix += 1;
            candidate = format!("{}.{}", base, suffix);
        }

        used.insert(candidate.clone());
        columns.push(candidate);
    }

    columns
}
