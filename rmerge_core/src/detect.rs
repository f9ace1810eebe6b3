use crate::decode::DecodeChain;
use crate::lines::split_lines;
use rmerge_common::{AppConfig, FileKind, InputFile, RMergeError};

/// Classifies files as tabular or line-oriented
#[derive(Debug, Clone)]
pub struct TypeDetector {
    tabular_extensions: Vec<String>,
    line_extensions: Vec<String>,
    chain: DecodeChain,
}

impl TypeDetector {
    pub fn new() -> Self {
        Self::with_chain(&AppConfig::default(), DecodeChain::default())
    }

    pub fn with_chain(config: &AppConfig, chain: DecodeChain) -> Self {
        Self {
            tabular_extensions: normalize(&config.tabular_extensions),
            line_extensions: normalize(&config.line_extensions),
            chain,
        }
    }

    /// Classify a single file: by extension first, then by whether its first
    /// line contains a comma. Anything undecodable counts as lines.
    pub fn detect(&self, file: &InputFile) -> FileKind {
        if let Some(ext) = file.extension() {
            if self.tabular_extensions.contains(&ext) {
                return FileKind::Tabular;
            }
            if self.line_extensions.contains(&ext) {
                return FileKind::Lines;
            }
        }

        match self.chain.decode(&file.bytes) {
            Ok((text, _)) => {
                let first_line = split_lines(&text).into_iter().next().unwrap_or("");
                if first_line.contains(',') {
                    FileKind::Tabular
                } else {
                    FileKind::Lines
                }
            }
            Err(_) => FileKind::Lines,
        }
    }

    /// Classify a batch from its first file and reject members that disagree
    pub fn detect_batch(&self, batch: &[InputFile]) -> Result<FileKind, RMergeError> {
        let first = batch.first().ok_or(RMergeError::EmptyBatch)?;
        let expected = self.detect(first);

        for file in &batch[1..] {
            let found = self.detect(file);
            if found != expected {
                return Err(RMergeError::MixedBatch {
                    file: file.name.clone(),
                    expected,
                    found,
                });
            }
        }

        Ok(expected)
    }
}

impl Default for TypeDetector {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(extensions: &[String]) -> Vec<String> {
    extensions
        .iter()
        .map(|ext| ext.trim_start_matches('.').to_lowercase())
        .collect()
}
