use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::answer_parser::{Letter, ParsedAnswers};
use crate::prompts::SolverRole;
use crate::question_type::QuestionType;

const BASE_WEIGHT: f64 = 1.0;
const TYPE_MATCH_BONUS: f64 = 1.0;
const UNSURE_FACTOR: f64 = 0.5;
const HIGH_CONFIDENCE: f64 = 0.75;
const MEDIUM_CONFIDENCE: f64 = 0.5;

/// Letter used when nothing on the page was answered at all
pub const DEFAULT_FALLBACK: Letter = Letter::C;

/// One solver role's parsed response
#[derive(Debug, Clone)]
pub struct Ballot {
    pub role: SolverRole,
    pub answers: ParsedAnswers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleVote {
    pub role: SolverRole,
    pub answer: Letter,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalAnswer {
    pub number: u32,
    pub answer: Letter,
    pub confidence: f64,
    pub agreement: f64,
    pub level: ConfidenceLevel,
    pub fallback: bool,
    pub question_type: QuestionType,
    pub votes: Vec<RoleVote>,
}

/// Finalized per-question answers for one page, ascending by number
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnswerKey {
    pub answers: Vec<FinalAnswer>,
}

impl AnswerKey {
    /// `N: X` per line; fallback guesses carry a ` (?)` suffix
    pub fn to_text(&self) -> String {
        self.answers
            .iter()
            .map(|a| {
                if a.fallback {
                    format!("{}: {} (?)", a.number, a.answer)
                } else {
                    format!("{}: {}", a.number, a.answer)
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Numbers no ballot answered
    pub fn missing_numbers(&self) -> Vec<u32> {
        self.answers
            .iter()
            .filter(|a| a.fallback)
            .map(|a| a.number)
            .collect()
    }

    pub fn get(&self, number: u32) -> Option<&FinalAnswer> {
        self.answers.iter().find(|a| a.number == number)
    }
}

#[derive(Default)]
struct Tally {
    weight: f64,
    count: usize,
    first_ballot: usize,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn vote_weight(role: SolverRole, question_type: QuestionType, unsure: bool) -> f64 {
    let mut weight = BASE_WEIGHT;
    if question_type.matching_role() == Some(role) {
        weight += TYPE_MATCH_BONUS;
    }
    if unsure {
        weight *= UNSURE_FACTOR;
    }
    weight
}

fn level_for(confidence: f64, votes_for_winner: usize) -> ConfidenceLevel {
    if confidence >= HIGH_CONFIDENCE && votes_for_winner >= 2 {
        ConfidenceLevel::High
    } else if confidence >= MEDIUM_CONFIDENCE {
        ConfidenceLevel::Medium
    } else {
        ConfidenceLevel::Low
    }
}

/// Weighted majority vote per requested number
pub fn tally(
    numbers: &[u32],
    ballots: &[Ballot],
    question_types: &BTreeMap<u32, QuestionType>,
) -> AnswerKey {
    let mut decided: BTreeMap<u32, FinalAnswer> = BTreeMap::new();
    let mut pending: Vec<(u32, QuestionType)> = Vec::new();

    for &number in numbers {
        let question_type = question_types
            .get(&number)
            .copied()
            .unwrap_or(QuestionType::Unknown);

        let mut tallies: BTreeMap<Letter, Tally> = BTreeMap::new();
        let mut votes = Vec::new();

        for (idx, ballot) in ballots.iter().enumerate() {
            let Some(&letter) = ballot.answers.answers.get(&number) else {
                continue;
            };
            let weight = vote_weight(
                ballot.role,
                question_type,
                ballot.answers.unsure.contains(&number),
            );
            let entry = tallies.entry(letter).or_insert_with(|| Tally {
                first_ballot: idx,
                ..Tally::default()
            });
            entry.weight += weight;
            entry.count += 1;
            votes.push(RoleVote {
                role: ballot.role,
                answer: letter,
                weight,
            });
        }

        let winner = tallies.iter().max_by(|(_, a), (_, b)| {
            a.weight
                .partial_cmp(&b.weight)
                .unwrap_or(Ordering::Equal)
                .then(a.count.cmp(&b.count))
                .then(b.first_ballot.cmp(&a.first_ballot))
        });

        let Some((&answer, winning)) = winner else {
            pending.push((number, question_type));
            continue;
        };

        let total_weight: f64 = tallies.values().map(|t| t.weight).sum();
        let answered: usize = tallies.values().map(|t| t.count).sum();
        let confidence = if total_weight > 0.0 {
            round2(winning.weight / total_weight)
        } else {
            0.0
        };

        decided.insert(
            number,
            FinalAnswer {
                number,
                answer,
                confidence,
                agreement: round2(winning.count as f64 / answered as f64),
                level: level_for(confidence, winning.count),
                fallback: false,
                question_type,
                votes,
            },
        );
    }

    let guess = fallback_letter(decided.values());
    for (number, question_type) in pending {
        decided.insert(
            number,
            FinalAnswer {
                number,
                answer: guess,
                confidence: 0.0,
                agreement: 0.0,
                level: ConfidenceLevel::Low,
                fallback: true,
                question_type,
                votes: Vec::new(),
            },
        );
    }

    AnswerKey {
        answers: decided.into_values().collect(),
    }
}

/// Most frequent decided letter on the page; alphabetical on ties
fn fallback_letter<'a>(decided: impl Iterator<Item = &'a FinalAnswer>) -> Letter {
    let mut counts: BTreeMap<Letter, usize> = BTreeMap::new();
    for answer in decided {
        *counts.entry(answer.answer).or_default() += 1;
    }

    counts
        .into_iter()
        .fold(None, |best: Option<(Letter, usize)>, (letter, count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((letter, count)),
        })
        .map(|(letter, _)| letter)
        .unwrap_or(DEFAULT_FALLBACK)
}
