use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::LazyLock;

pub const STOP_TOKEN: &str = "XURTH";

/// `12: B`, `Q12. (b)`, `**12)** C`, `12 - ③`, `12: n/a`
static ANSWER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:[-*]\s*)?(?:q(?:uestion)?\s*)?(\d{1,2})\s*[:.)\-]\s*(?:answer\s*[:=]?\s*)?[\(\[]?\s*([a-e①②③④⑤]|n/?a)\s*[\)\]]?(?:[\s.,;]|$)",
    )
    .expect("valid answer line regex")
});

static UNSURE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*unsure\s*:\s*(.*)$").expect("valid unsure regex"));

/// Multiple-choice option letter
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Letter {
    A,
    B,
    C,
    D,
    E,
}

impl Letter {
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim() {
            "A" | "a" | "①" => Some(Letter::A),
            "B" | "b" | "②" => Some(Letter::B),
            "C" | "c" | "③" => Some(Letter::C),
            "D" | "d" | "④" => Some(Letter::D),
            "E" | "e" | "⑤" => Some(Letter::E),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Letter::A => "A",
            Letter::B => "B",
            Letter::C => "C",
            Letter::D => "D",
            Letter::E => "E",
        }
    }
}

impl fmt::Display for Letter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Answers read out of one model response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedAnswers {
    pub answers: BTreeMap<u32, Letter>,
    /// Numbers the model explicitly answered with `n/a`
    pub unanswered: BTreeSet<u32>,
    /// Numbers listed on the `UNSURE:` line
    pub unsure: BTreeSet<u32>,
}

impl ParsedAnswers {
    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }
}

/// Drop the stop token and anything the model wrote after it
pub fn strip_stop_token(response: &str) -> &str {
    match response.find(STOP_TOKEN) {
        Some(idx) => &response[..idx],
        None => response,
    }
}

pub fn parse_answer_lines(response: &str) -> ParsedAnswers {
    let mut parsed = ParsedAnswers::default();

    for raw_line in strip_stop_token(response).lines() {
        let line = raw_line.replace("**", "").replace('`', "");
        if line.trim().is_empty() {
            continue;
        }

        if let Some(caps) = UNSURE_LINE.captures(&line) {
            parsed.unsure.extend(
                caps[1]
                    .split(|c: char| c == ',' || c.is_whitespace())
                    .filter_map(|t| t.trim().parse::<u32>().ok()),
            );
            continue;
        }

        let Some(caps) = ANSWER_LINE.captures(&line) else {
            continue;
        };
        let Ok(number) = caps[1].parse::<u32>() else {
            continue;
        };
        if parsed.answers.contains_key(&number) || parsed.unanswered.contains(&number) {
            continue;
        }

        match Letter::parse(&caps[2]) {
            Some(letter) => {
                parsed.answers.insert(number, letter);
            }
            None => {
                parsed.unanswered.insert(number);
            }
        }
    }

    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_format() {
        let response = "18: B\n19: D\n20: n/a\nUNSURE: 19, 20 XURTH";
        let parsed = parse_answer_lines(response);
        assert_eq!(parsed.answers.get(&18), Some(&Letter::B));
        assert_eq!(parsed.answers.get(&19), Some(&Letter::D));
        assert!(parsed.unanswered.contains(&20));
        assert_eq!(parsed.unsure.iter().copied().collect::<Vec<_>>(), vec![19, 20]);
    }

    #[test]
    fn test_loose_formats() {
        let response = "Q1. (a)\n**2)** C\n- 3 - ④\nQuestion 4: answer: e\n5.b";
        let parsed = parse_answer_lines(response);
        assert_eq!(parsed.answers.get(&1), Some(&Letter::A));
        assert_eq!(parsed.answers.get(&2), Some(&Letter::C));
        assert_eq!(parsed.answers.get(&3), Some(&Letter::D));
        assert_eq!(parsed.answers.get(&4), Some(&Letter::E));
        assert_eq!(parsed.answers.get(&5), Some(&Letter::B));
    }

    #[test]
    fn test_first_answer_wins() {
        let parsed = parse_answer_lines("7: A\n7: C");
        assert_eq!(parsed.answers.get(&7), Some(&Letter::A));
        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn test_text_after_stop_token_is_ignored() {
        let parsed = parse_answer_lines("1: A XURTH\n2: B");
        assert_eq!(parsed.len(), 1);
        assert!(!parsed.answers.contains_key(&2));
    }

    #[test]
    fn test_prose_is_not_an_answer() {
        let parsed = parse_answer_lines("1. According to the passage, the author argues\n2: Because");
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_unsure_dash() {
        let parsed = parse_answer_lines("1: A\nUNSURE: -");
        assert!(parsed.unsure.is_empty());
    }
}
