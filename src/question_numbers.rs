use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::LazyLock;

/// `1.`, `01)`, `12 .`
static NUMBER_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})\s*[.)]").expect("valid number marker regex"));

/// OCR sometimes doubles a two-digit marker: `0101.` means question 01
static DOUBLED_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{2})(\d{2})\s*\.").expect("valid doubled marker regex"));

static LOOSE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{1,2}\b[.)\s]").expect("valid loose marker regex"));

static LINE_LEADING_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*\d{1,2}\s*[.)]").expect("valid line marker regex"));

/// Question numbers detected in a page of OCR text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionNumbers {
    /// Every matched marker, in match order, as written
    pub raw_numbers: Vec<String>,
    /// Distinct in-range numbers, ascending
    pub normalized_numbers: Vec<u32>,
}

impl QuestionNumbers {
    pub fn is_empty(&self) -> bool {
        self.normalized_numbers.is_empty()
    }

    pub fn joined(&self) -> String {
        self.normalized_numbers
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

pub fn extract_question_numbers(text: &str, min: u32, max: u32) -> QuestionNumbers {
    if text.trim().is_empty() {
        return QuestionNumbers::default();
    }

    let mut raw_numbers: Vec<String> = NUMBER_MARKER
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect();

    raw_numbers.extend(
        DOUBLED_MARKER
            .captures_iter(text)
            .filter(|caps| caps[1] == caps[2])
            .map(|caps| caps[2].to_string()),
    );

    let normalized_numbers = raw_numbers
        .iter()
        .filter_map(|s| s.parse::<u32>().ok())
        .filter(|n| (min..=max).contains(n))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    QuestionNumbers {
        raw_numbers,
        normalized_numbers,
    }
}

/// Loose count of anything that looks like a question marker
pub fn count_question_patterns(text: &str) -> usize {
    LOOSE_MARKER.find_iter(text).count()
}

/// Count of markers that start a line
pub fn count_line_leading_numbers(text: &str) -> usize {
    LINE_LEADING_MARKER.find_iter(text).count()
}

/// Byte offset of the first marker for each number, ascending by offset.
/// Doubled markers count the same as plain ones.
pub(crate) fn marker_offsets(text: &str, numbers: &[u32]) -> Vec<(u32, usize)> {
    let plain = NUMBER_MARKER.captures_iter(text);
    let doubled = DOUBLED_MARKER
        .captures_iter(text)
        .filter(|caps| caps[1] == caps[2]);

    let mut hits: Vec<(u32, usize)> = plain
        .chain(doubled)
        .filter_map(|caps| {
            let number = caps[1].parse::<u32>().ok()?;
            Some((number, caps.get(0)?.start()))
        })
        .filter(|(number, _)| numbers.contains(number))
        .collect();
    hits.sort_by_key(|(_, offset)| *offset);

    let mut offsets: Vec<(u32, usize)> = Vec::new();
    for (number, offset) in hits {
        if !offsets.iter().any(|(n, _)| *n == number) {
            offsets.push((number, offset));
        }
    }
    offsets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_markers() {
        let text = "18. What is the purpose?\n① a ② b\n19) Which is NOT true?\n20 . blank";
        let numbers = extract_question_numbers(text, 1, 50);
        assert_eq!(numbers.normalized_numbers, vec![18, 19, 20]);
        assert_eq!(numbers.joined(), "18, 19, 20");
    }

    #[test]
    fn test_doubled_markers() {
        let numbers = extract_question_numbers("0101. first\n0202. second", 1, 50);
        assert_eq!(numbers.normalized_numbers, vec![1, 2]);
        assert!(numbers.raw_numbers.contains(&"01".to_string()));
    }

    #[test]
    fn test_non_repeated_four_digit_token_is_ignored() {
        let numbers = extract_question_numbers("In 1234. nothing", 1, 50);
        assert!(numbers.is_empty());
    }

    #[test]
    fn test_out_of_range_and_duplicates() {
        let numbers = extract_question_numbers("0. zero 51. high 7. seven 7) again", 1, 50);
        assert_eq!(numbers.normalized_numbers, vec![7]);
        assert_eq!(numbers.raw_numbers.len(), 4);
    }

    #[test]
    fn test_blank_text() {
        assert!(extract_question_numbers("   \n", 1, 50).is_empty());
    }

    #[test]
    fn test_pattern_counts() {
        let text = "1. a\n 2) b\nsee 3 more";
        assert_eq!(count_line_leading_numbers(text), 2);
        assert_eq!(count_question_patterns(text), 3);
    }

    #[test]
    fn test_marker_offsets_keep_first_occurrence() {
        let text = "21. first 22. second 21) repeated";
        let offsets = marker_offsets(text, &[21, 22]);
        assert_eq!(offsets, vec![(21, 0), (22, 10)]);
    }

    #[test]
    fn test_marker_offsets_include_doubled_markers() {
        let text = "0101. first 2. second 0303. third";
        let offsets = marker_offsets(text, &[1, 2, 3]);
        assert_eq!(offsets, vec![(1, 0), (2, 12), (3, 22)]);
    }
}
