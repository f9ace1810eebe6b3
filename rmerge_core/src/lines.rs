use crate::decode::DecodeChain;
use rmerge_common::{Diagnostic, InputFile, LineResult};
use std::collections::BTreeSet;
use tracing::{info, warn};

/// Merges line files into a sorted set of unique, trimmed, non-empty lines
#[derive(Debug, Clone, Default)]
pub struct LineMerger {
    chain: DecodeChain,
}

impl LineMerger {
    pub fn new(chain: DecodeChain) -> Self {
        Self { chain }
    }

    /// Merge every decodable file of `batch`. Returns `None` when no file
    /// could be decoded; skipped files are reported in the diagnostics.
    pub fn merge(&self, batch: &[InputFile]) -> (Option<LineResult>, Vec<Diagnostic>) {
        let mut unique = BTreeSet::new();
        let mut original_line_count = 0;
        let mut decoded_files = 0;
        let mut diagnostics = Vec::with_capacity(batch.len());

        for file in batch {
            let (text, strategy) = match self.chain.decode(&file.bytes) {
                Ok(decoded) => decoded,
                Err(e) => {
                    warn!("Skipping {}: {}", file.name, e);
                    diagnostics.push(Diagnostic::skipped(&file.name, e));
                    continue;
                }
            };

            let lines = split_lines(&text);
            original_line_count += lines.len();
            decoded_files += 1;

            for line in &lines {
                let line = trim_line(line);
                if !line.is_empty() {
                    unique.insert(line.to_string());
                }
            }

            info!("Read {} ({} lines, {})", file.name, lines.len(), strategy);
            diagnostics.push(Diagnostic::loaded(&file.name, lines.len(), strategy.name()));
        }

        if decoded_files == 0 {
            return (None, diagnostics);
        }

        let lines: Vec<String> = unique.into_iter().collect();
        let result = LineResult {
            deduped_line_count: lines.len(),
            lines,
            original_line_count,
        };

        (Some(result), diagnostics)
    }
}

/// Trim Unicode whitespace plus the ASCII separator controls (FS, GS, RS, US),
/// which also count as blank at either end of a line
fn trim_line(line: &str) -> &str {
    line.trim_matches(|c: char| c.is_whitespace() || ('\u{1c}'..='\u{1f}').contains(&c))
}

/// Split `text` on line boundaries. A trailing line break does not start a
/// new line, and `\r\n` counts as a single break.
pub fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        if !is_line_break(c) {
            continue;
        }

        lines.push(&text[start..idx]);
        let mut end = idx + c.len_utf8();
        if c == '\r' {
            if let Some(&(_, '\n')) = chars.peek() {
                chars.next();
                end += 1;
            }
        }
        start = end;
    }

    if start < text.len() {
        lines.push(&text[start..]);
    }

    lines
}

fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r'
            | '\u{0b}'
            | '\u{0c}'
            | '\u{1c}'
            | '\u{1d}'
            | '\u{1e}'
            | '\u{85}'
            | '\u{2028}'
            | '\u{2029}'
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmerge_common::FileOutcome;

    fn merge(files: &[(&str, &str)]) -> LineResult {
        let batch: Vec<InputFile> = files
            .iter()
            .map(|(name, content)| InputFile::new(*name, *content))
            .collect();
        LineMerger::default().merge(&batch).0.unwrap()
    }

    #[test]
    fn test_split_lines() {
        assert_eq!(split_lines("a\nb"), vec!["a", "b"]);
        assert_eq!(split_lines("a\nb\n"), vec!["a", "b"]);
        assert_eq!(split_lines("a\r\nb\rc"), vec!["a", "b", "c"]);
        assert_eq!(split_lines("\n\n"), vec!["", ""]);
        assert_eq!(split_lines("x\u{2028}y"), vec!["x", "y"]);
        assert!(split_lines("").is_empty());
    }

    #[test]
    fn test_merge_two_files() {
        let result = merge(&[("one.txt", "b\na\na\n"), ("two.txt", "c\nb\n")]);

        assert_eq!(result.lines, vec!["a", "b", "c"]);
        assert_eq!(result.original_line_count, 5);
        assert_eq!(result.deduped_line_count, 3);
        assert_eq!(result.stats().reduction(), 2);
    }

    #[test]
    fn test_blank_only_file() {
        let result = merge(&[("blank.txt", "\n   \n\t\n")]);

        assert!(result.lines.is_empty());
        assert_eq!(result.original_line_count, 3);
        assert_eq!(result.deduped_line_count, 0);
    }

    #[test]
    fn test_lines_are_trimmed_and_case_sensitive() {
        let result = merge(&[("a.txt", "  Apple \napple\r\n\tApple\n")]);

        assert_eq!(result.lines, vec!["Apple", "apple"]);
        assert_eq!(result.original_line_count, 3);
    }

    #[test]
    fn test_unit_separator_is_trimmed() {
        let result = merge(&[("a.txt", "abc\x1f\n\x1f abc\n\x1f\n")]);

        assert_eq!(result.lines, vec!["abc"]);
        assert_eq!(result.original_line_count, 3);
        assert_eq!(trim_line("\u{3000}x\u{1f}"), "x");
        assert_eq!(trim_line("a\u{1f}b"), "a\u{1f}b");
    }

    #[test]
    fn test_output_sorted_by_code_point() {
        let result = merge(&[("a.txt", "é\nz\nB\na\n10\n9\n")]);
        assert_eq!(result.lines, vec!["10", "9", "B", "a", "z", "é"]);
    }

    #[test]
    fn test_undecodable_file_is_skipped() {
        let merger = LineMerger::new(DecodeChain::from_names(&["utf-8"]).unwrap());
        let batch = vec![
            InputFile::new("good.txt", "x\ny\n"),
            InputFile::new("bad.txt", b"\xff\xfe\n".to_vec()),
        ];

        let (result, diagnostics) = merger.merge(&batch);
        let result = result.unwrap();

        assert_eq!(result.lines, vec!["x", "y"]);
        assert_eq!(result.original_line_count, 2);
        assert_eq!(diagnostics.len(), 2);
        assert!(!diagnostics[0].is_skipped());
        assert!(diagnostics[1].is_skipped());
        assert_eq!(diagnostics[1].file, "bad.txt");
    }

    #[test]
    fn test_nothing_decodable() {
        let merger = LineMerger::new(DecodeChain::from_names(&["utf-8"]).unwrap());
        let (result, diagnostics) = merger.merge(&[InputFile::new("bad.txt", b"\xff".to_vec())]);

        assert!(result.is_none());
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_gbk_lines() {
        let (bytes, _, _) = encoding_rs::GBK.encode("苹果\n香蕉\n苹果\n");
        let (result, diagnostics) =
            LineMerger::default().merge(&[InputFile::new("fruit.txt", bytes.into_owned())]);
        let result = result.unwrap();

        assert_eq!(result.deduped_line_count, 2);
        assert!(result.lines.contains(&"苹果".to_string()));
        assert_eq!(
            diagnostics[0].outcome,
            FileOutcome::Loaded {
                count: 3,
                encoding: "gbk".to_string()
            }
        );
    }

    #[test]
    fn test_merge_is_idempotent() {
        let first = merge(&[("a.txt", "q\nw\nq\n e \n"), ("b.txt", "w\nr")]);
        let joined = first.lines.join("\n");
        let second = merge(&[("merged.txt", joined.as_str())]);

        assert_eq!(second.lines, first.lines);
        assert_eq!(second.stats().reduction(), 0);
    }

    #[test]
    fn test_joined_output_round_trips() {
        let result = merge(&[("a.txt", "delta\nalpha\n\ncharlie\nalpha\n")]);
        let joined = result.lines.join("\n");
        let resplit: Vec<String> = split_lines(&joined).into_iter().map(String::from).collect();
        assert_eq!(resplit, result.lines);
    }
}
