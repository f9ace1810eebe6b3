use crate::decode::DecodeChain;
use crate::detect::TypeDetector;
use crate::lines::LineMerger;
use crate::tabular::TabularMerger;
use rmerge_common::{
    AppConfig, FileKind, InputFile, MergeReport, MergeResult, RMergeError, Result,
};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Entry point for one merge run: detect the batch type, then merge and dedupe
#[derive(Debug, Clone, Default)]
pub struct MergeEngine {
    detector: TypeDetector,
    tabular: TabularMerger,
    lines: LineMerger,
}

impl MergeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an engine honoring the configured extensions, delimiters and encodings
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let chain = DecodeChain::from_names(&config.encodings)?;
        let delimiters = byte_delimiters(&config.delimiters)?;
        Ok(Self {
            detector: TypeDetector::with_chain(config, chain.clone()),
            tabular: TabularMerger::new(chain.clone()).with_delimiters(delimiters),
            lines: LineMerger::new(chain),
        })
    }

    pub fn detector(&self) -> &TypeDetector {
        &self.detector
    }

    /// Detect the batch type and merge it. Fails on an empty batch or when
    /// the files do not all share one type.
    pub fn merge(&self, batch: &[InputFile]) -> Result<MergeReport> {
        let kind = self.detector.detect_batch(batch)?;
        info!("Detected {} batch of {} file(s)", kind, batch.len());
        self.merge_as(kind, batch)
    }

    /// Merge `batch` as `kind` without checking that every file matches it
    pub fn merge_as(&self, kind: FileKind, batch: &[InputFile]) -> Result<MergeReport> {
        if batch.is_empty() {
            return Err(RMergeError::EmptyBatch);
        }

        let (result, diagnostics) = match kind {
            FileKind::Tabular => {
                let (table, diagnostics) = self.tabular.merge(batch);
                (table.map(MergeResult::Tabular), diagnostics)
            }
            FileKind::Lines => {
                let (lines, diagnostics) = self.lines.merge(batch);
                (lines.map(MergeResult::Lines), diagnostics)
            }
        };

        match result.as_ref().map(MergeResult::stats) {
            Some(stats) => debug!(
                "Merged {} -> {} ({} duplicates removed)",
                stats.original,
                stats.deduped,
                stats.reduction()
            ),
            None => debug!("No file of the batch could be read"),
        }

        Ok(MergeReport {
            kind,
            result,
            diagnostics,
        })
    }
}

/// The csv reader splits on a single byte, so delimiters must be ASCII
fn byte_delimiters(delimiters: &BTreeMap<String, char>) -> Result<BTreeMap<String, u8>> {
    delimiters
        .iter()
        .map(|(ext, &delimiter)| {
            u8::try_from(delimiter)
                .ok()
                .filter(u8::is_ascii)
                .map(|byte| (ext.clone(), byte))
                .ok_or_else(|| {
                    RMergeError::Config(format!(
                        "Delimiter for .{} must be a single ASCII character, got {:?}",
                        ext, delimiter
                    ))
                })
        })
        .collect()
}
