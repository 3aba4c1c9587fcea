use serde::Serialize;
use std::collections::BTreeMap;

use crate::prompts::SolverRole;
use crate::question_numbers::marker_offsets;

/// Coarse question category used to weight solver votes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    Lexical,
    Logic,
    Reading,
    Grammar,
    Unknown,
}

const LEXICAL_CUES: &[&str] = &[
    "underlined word",
    "underlined expression",
    "closest in meaning",
    "similar in meaning",
    "synonym",
    "antonym",
    "opposite in meaning",
    "vocabulary",
    "appropriate word",
    "word that best",
];

const LOGIC_CUES: &[&str] = &[
    "blank",
    "order",
    "sequence",
    "arrangement",
    "flow",
    "irrelevant",
    "does not fit",
    "best fits",
    "where the following sentence",
    "summary",
];

const READING_CUES: &[&str] = &[
    "main idea",
    "main point",
    "title",
    "purpose",
    "according to the passage",
    "according to the text",
    "mood",
    "attitude",
    "tone",
    "not true",
    "not mentioned",
    "consistent with",
    "infer",
    "topic",
];

const GRAMMAR_CUES: &[&str] = &[
    "grammatically",
    "ungrammatical",
    "not correct",
    "incorrect",
    "grammar",
    "usage",
];

impl QuestionType {
    /// Solver role whose focus matches this question type
    pub fn matching_role(&self) -> Option<SolverRole> {
        match self {
            QuestionType::Lexical => Some(SolverRole::Lexical),
            QuestionType::Logic => Some(SolverRole::Logic),
            QuestionType::Reading => Some(SolverRole::Reading),
            QuestionType::Grammar => Some(SolverRole::Grammar),
            QuestionType::Unknown => None,
        }
    }

    pub fn classify(segment: &str) -> Self {
        let lowered = segment.to_lowercase();
        let score = |cues: &[&str]| cues.iter().filter(|cue| lowered.contains(*cue)).count();

        let scores = [
            (QuestionType::Lexical, score(LEXICAL_CUES)),
            (QuestionType::Logic, score(LOGIC_CUES)),
            (QuestionType::Reading, score(READING_CUES)),
            (QuestionType::Grammar, score(GRAMMAR_CUES)),
        ];

        let best = scores.iter().map(|(_, s)| *s).max().unwrap_or(0);
        if best == 0 {
            return QuestionType::Unknown;
        }

        let mut leaders = scores.iter().filter(|(_, s)| *s == best);
        match (leaders.next(), leaders.next()) {
            (Some((kind, _)), None) => *kind,
            _ => QuestionType::Unknown,
        }
    }
}

/// Split the page at each question marker and classify every segment.
/// Numbers without a marker in the text come back as `Unknown`.
pub fn classify_questions(text: &str, numbers: &[u32]) -> BTreeMap<u32, QuestionType> {
    let offsets = marker_offsets(text, numbers);
    let mut types: BTreeMap<u32, QuestionType> =
        numbers.iter().map(|n| (*n, QuestionType::Unknown)).collect();

    for (idx, (number, start)) in offsets.iter().enumerate() {
        let end = offsets.get(idx + 1).map(|(_, next)| *next).unwrap_or(text.len());
        types.insert(*number, QuestionType::classify(&text[*start..end]));
    }

    types
}
