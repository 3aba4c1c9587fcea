pub mod answer_parser;
pub mod api;
pub mod config;
pub mod ensemble;
pub mod errors;
pub mod llm_providers;
pub mod llm_service;
pub mod logging;
pub mod models;
pub mod ocr_client;
pub mod prompts;
pub mod question_numbers;
pub mod question_type;
pub mod solve_service;

pub use answer_parser::{parse_answer_lines, Letter, ParsedAnswers};
pub use config::Config;
pub use ensemble::{tally, AnswerKey, Ballot};
pub use errors::*;
pub use llm_providers::{LLMProvider, LLMProviderFactory, LLMProviderType};
pub use llm_service::LLMService;
pub use models::*;
pub use ocr_client::OcrSpaceClient;
pub use prompts::SolverRole;
pub use question_numbers::{extract_question_numbers, QuestionNumbers};
pub use question_type::{classify_questions, QuestionType};
pub use solve_service::SolveService;
