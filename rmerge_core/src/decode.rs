use encoding_rs::{Encoding, GB18030, GBK, UTF_8};
use rmerge_common::{DecodeError, RMergeError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// One entry of the ordered encoding fallback list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecodeStrategy {
    /// UTF-8, with a leading byte-order mark stripped
    Utf8,
    /// GBK (also accepts GB2312 content); four-byte GB18030 sequences are rejected
    Gbk,
    /// GB18030
    Gb18030,
    /// ISO-8859-1; maps every byte to a char, so it never fails
    Latin1,
}

impl DecodeStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            DecodeStrategy::Utf8 => "utf-8",
            DecodeStrategy::Gbk => "gbk",
            DecodeStrategy::Gb18030 => "gb18030",
            DecodeStrategy::Latin1 => "latin-1",
        }
    }

    /// Decode `bytes` strictly; any malformed sequence yields `None`
    pub fn decode(&self, bytes: &[u8]) -> Option<String> {
        match self {
            DecodeStrategy::Utf8 => strict(UTF_8, bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes)),
            DecodeStrategy::Gbk => {
                if has_four_byte_sequence(bytes) {
                    None
                } else {
                    strict(GBK, bytes)
                }
            }
            DecodeStrategy::Gb18030 => strict(GB18030, bytes),
            DecodeStrategy::Latin1 => Some(bytes.iter().map(|&b| char::from(b)).collect()),
        }
    }
}

impl fmt::Display for DecodeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DecodeStrategy {
    type Err = RMergeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Ok(DecodeStrategy::Utf8),
            "gbk" | "gb2312" | "cp936" => Ok(DecodeStrategy::Gbk),
            "gb18030" => Ok(DecodeStrategy::Gb18030),
            "latin-1" | "latin1" | "iso-8859-1" => Ok(DecodeStrategy::Latin1),
            other => Err(RMergeError::Config(format!("Unsupported encoding: {}", other))),
        }
    }
}

fn strict(encoding: &'static Encoding, bytes: &[u8]) -> Option<String> {
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|text| text.into_owned())
}

/// `encoding_rs` decodes GBK with the full GB18030 decoder, so plain GBK has
/// to refuse the four-byte form (lead 0x81-0xFE, second byte 0x30-0x39).
fn has_four_byte_sequence(bytes: &[u8]) -> bool {
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            0x81..=0xFE => {
                if matches!(bytes.get(i + 1), Some(0x30..=0x39)) {
                    return true;
                }
                i += 2;
            }
            _ => i += 1,
        }
    }
    false
}

/// Ordered list of decode strategies tried until one succeeds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeChain {
    strategies: Vec<DecodeStrategy>,
}

impl DecodeChain {
    pub fn new(strategies: Vec<DecodeStrategy>) -> Self {
        Self { strategies }
    }

    /// Build a chain from encoding names such as `"utf-8"` or `"gbk"`
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, RMergeError> {
        let strategies = names
            .iter()
            .map(|name| name.as_ref().parse())
            .collect::<Result<Vec<DecodeStrategy>, _>>()?;

        if strategies.is_empty() {
            return Err(RMergeError::Config(
                "At least one encoding must be configured".to_string(),
            ));
        }

        Ok(Self { strategies })
    }

    pub fn strategies(&self) -> &[DecodeStrategy] {
        &self.strategies
    }

    /// Decode `bytes` as plain text with the first strategy that accepts them
    pub fn decode(&self, bytes: &[u8]) -> Result<(String, DecodeStrategy), DecodeError> {
        self.decode_with(bytes, |text, _| Ok(text.to_string()))
    }

    /// Decode `bytes` and hand the text to `parse`; a strategy wins only when
    /// both steps succeed. When every strategy fails, the last parse error is
    /// returned, or `Undecodable` if no strategy could decode the bytes at all.
    pub fn decode_with<T, F>(
        &self,
        bytes: &[u8],
        mut parse: F,
    ) -> Result<(T, DecodeStrategy), DecodeError>
    where
        F: FnMut(&str, DecodeStrategy) -> Result<T, DecodeError>,
    {
        let mut last_error = None;

        for &strategy in &self.strategies {
            let Some(text) = strategy.decode(bytes) else {
                debug!("{} cannot decode input", strategy);
                continue;
            };

            match parse(&text, strategy) {
                Ok(value) => return Ok((value, strategy)),
                Err(e) => {
                    debug!("{} decoded input but parsing failed: {}", strategy, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| DecodeError::Undecodable {
            tried: self
                .strategies
                .iter()
                .map(DecodeStrategy::name)
                .collect::<Vec<_>>()
                .join(", "),
        }))
    }
}

impl Default for DecodeChain {
    fn default() -> Self {
        Self::new(vec![
            DecodeStrategy::Utf8,
            DecodeStrategy::Gbk,
            DecodeStrategy::Gb18030,
            DecodeStrategy::Latin1,
        ])
    }
}
