use serde::Serialize;
use std::fmt;

use crate::answer_parser::STOP_TOKEN;

/// Prompt variant; each role reads the page with a different focus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverRole {
    Lexical,
    Logic,
    Reading,
    Grammar,
}

impl SolverRole {
    pub const ALL: [SolverRole; 4] = [
        SolverRole::Lexical,
        SolverRole::Logic,
        SolverRole::Reading,
        SolverRole::Grammar,
    ];

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "lexical" | "vocab" | "vocabulary" => Some(SolverRole::Lexical),
            "logic" => Some(SolverRole::Logic),
            "reading" => Some(SolverRole::Reading),
            "grammar" => Some(SolverRole::Grammar),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SolverRole::Lexical => "lexical",
            SolverRole::Logic => "logic",
            SolverRole::Reading => "reading",
            SolverRole::Grammar => "grammar",
        }
    }

    pub fn system_message(&self) -> &'static str {
        match self {
            SolverRole::Lexical => {
                "You are a vocabulary specialist grading multiple-choice English exams. \
                 You weigh word meaning, collocation and connotation above everything else. \
                 You must follow the output format exactly."
            }
            SolverRole::Logic => {
                "You are a logic specialist grading multiple-choice English exams. \
                 You track how sentences connect: blanks, ordering, insertion and irrelevant sentences. \
                 You must follow the output format exactly."
            }
            SolverRole::Reading => {
                "You are a reading-comprehension specialist grading multiple-choice English exams. \
                 You answer from what the passage states, not from outside knowledge. \
                 You must follow the output format exactly."
            }
            SolverRole::Grammar => {
                "You are a grammar specialist grading multiple-choice English exams. \
                 You check agreement, tense, voice, clauses and parallel structure. \
                 You must follow the output format exactly."
            }
        }
    }

    fn focus(&self) -> &'static str {
        match self {
            SolverRole::Lexical => {
                "Pay special attention to questions about underlined words, synonyms and the most appropriate word in context."
            }
            SolverRole::Logic => {
                "Pay special attention to blank-filling, sentence order, sentence insertion and questions about the overall flow."
            }
            SolverRole::Reading => {
                "Pay special attention to main idea, title, purpose, mood and true/false-with-the-passage questions."
            }
            SolverRole::Grammar => {
                "Pay special attention to questions asking which underlined part or sentence is grammatically incorrect."
            }
        }
    }
}

impl fmt::Display for SolverRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const DEBUG_SYSTEM_MESSAGE: &str =
    "You are a careful answer generator for multiple-choice English exams. You must follow the output format exactly.";

fn output_rules(numbers: &str) -> String {
    [
        format!("The question numbers present on this page are: {numbers}"),
        String::new(),
        "For EACH question number above, output EXACTLY ONE line in this format:".to_string(),
        "N: <OPTION_LETTER>".to_string(),
        "where N is the question number, and <OPTION_LETTER> is one of A, B, C, D, or E.".to_string(),
        "Options printed as ①②③④⑤ correspond to A, B, C, D, E.".to_string(),
        String::new(),
        "- Always use CAPITAL letters for options.".to_string(),
        "- Do not explain your answers.".to_string(),
        "- If you truly cannot determine the answer for a number, output `n/a` instead of a letter.".to_string(),
        String::new(),
        "After listing all answers, add a final line:".to_string(),
        "UNSURE: <comma-separated list of question numbers you are least confident about, or '-' if you are confident for all>"
            .to_string(),
        String::new(),
        format!(
            "Finally, end your output with the token {STOP_TOKEN} on the same line as the last content (do not add extra text after it)."
        ),
    ]
    .join("\n")
}

fn ocr_block(text: &str) -> String {
    format!("OCR_TEXT:\n\"\"\"\n{text}\n\"\"\"")
}

/// User prompt for one solver role
pub fn build_solve_prompt(role: SolverRole, text: &str, numbers: &str) -> String {
    [
        "You will be given OCR text from one page of a multiple-choice English exam.".to_string(),
        "The OCR may contain broken line breaks, merged words and misread option markers; read through the noise."
            .to_string(),
        role.focus().to_string(),
        String::new(),
        ocr_block(text),
        String::new(),
        output_rules(numbers),
    ]
    .join("\n")
}

/// Single neutral prompt used by the debug endpoint
pub fn build_debug_prompt(text: &str, numbers: &str) -> String {
    [
        "You are an extremely careful solver for multiple-choice English exam questions.".to_string(),
        "You will be given OCR text from an exam page.".to_string(),
        String::new(),
        ocr_block(text),
        String::new(),
        output_rules(numbers),
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!(SolverRole::parse("Reading"), Some(SolverRole::Reading));
        assert_eq!(SolverRole::parse(" vocab "), Some(SolverRole::Lexical));
        assert_eq!(SolverRole::parse("poetry"), None);
    }

    #[test]
    fn test_solve_prompt_contains_page_and_format() {
        let prompt = build_solve_prompt(SolverRole::Grammar, "18. Which is wrong?", "18, 19");
        assert!(prompt.contains("\"\"\"\n18. Which is wrong?\n\"\"\""));
        assert!(prompt.contains("The question numbers present on this page are: 18, 19"));
        assert!(prompt.contains("grammatically incorrect"));
        assert!(prompt.contains(STOP_TOKEN));
        assert!(prompt.contains("UNSURE:"));
    }

    #[test]
    fn test_roles_have_distinct_prompts() {
        let lexical = build_solve_prompt(SolverRole::Lexical, "1. x", "1");
        let logic = build_solve_prompt(SolverRole::Logic, "1. x", "1");
        assert_ne!(lexical, logic);
        assert_ne!(SolverRole::Lexical.system_message(), SolverRole::Logic.system_message());
    }
}
