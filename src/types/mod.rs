//! Core Types
//!
//! Unified error types and the generated-content data model.

pub mod content;
pub mod error;

pub use content::{
    CorrectAnswer, Enemy, KnowledgeNode, Question, QuestionKind, RawEnemy, RawQuestion,
};
pub use error::{CompletionError, CompletionErrorKind, QuizError, Result};
