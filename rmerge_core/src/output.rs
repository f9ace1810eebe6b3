use csv::{Terminator, WriterBuilder};
use rmerge_common::{LineResult, MergeResult, RMergeError, TabularResult};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Serialize a merged table as CSV: optional BOM, header row first, one
/// record per `\n`-terminated line, missing values as empty fields.
pub fn render_tabular(table: &TabularResult, write_bom: bool) -> Result<Vec<u8>, RMergeError> {
    let mut buffer = Vec::new();
    if write_bom {
        buffer.extend_from_slice(UTF8_BOM);
    }

    let mut writer = WriterBuilder::new()
        .terminator(Terminator::Any(b'\n'))
        .from_writer(buffer);

    writer
        .write_record(&table.columns)
        .map_err(|e| RMergeError::Output(e.to_string()))?;

    for row in &table.rows {
        writer
            .write_record(row.iter().map(|value| value.as_deref().unwrap_or("")))
            .map_err(|e| RMergeError::Output(e.to_string()))?;
    }

    writer
        .into_inner()
        .map_err(|e| RMergeError::Output(e.to_string()))
}

/// Join merged lines with `\n`
pub fn render_lines(lines: &LineResult) -> String {
    lines.lines.join("\n")
}

/// Serialize any merge result into the bytes of its download payload
pub fn render(result: &MergeResult, write_bom: bool) -> Result<Vec<u8>, RMergeError> {
    match result {
        MergeResult::Tabular(table) => render_tabular(table, write_bom),
        MergeResult::Lines(lines) => Ok(render_lines(lines).into_bytes()),
    }
}
