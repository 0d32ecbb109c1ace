//! Generated Content Types
//!
//! Typed results produced by the generation operations. All of these are
//! built from model output, validated once, and immutable afterwards.
//! Model-side field names are camelCase; serde aliases accept both.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{CompletionError, Result};

/// Difficulty range accepted from model output, clamped otherwise
const MIN_DIFFICULTY: u8 = 1;
const MAX_DIFFICULTY: u8 = 5;

const DEFAULT_TIME_LIMIT_SECS: u32 = 30;

// =============================================================================
// Questions
// =============================================================================

/// Question shapes the battle system understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    /// One correct option
    #[serde(alias = "single", alias = "single_choice", alias = "Single")]
    Single,
    /// Several correct options
    #[serde(alias = "multi", alias = "multiple_choice", alias = "Multi")]
    Multi,
    /// Two options, one correct
    #[serde(alias = "true_false", alias = "trueFalse", alias = "TrueFalse")]
    TrueFalse,
}

/// Correct option index (single) or indices (multi)
///
/// Models emit either a bare integer or an array of integers; the untagged
/// representation accepts both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CorrectAnswer {
    Single(usize),
    Multiple(Vec<usize>),
}

impl CorrectAnswer {
    /// All indices stay inside the options list
    pub fn within_bounds(&self, option_count: usize) -> bool {
        match self {
            Self::Single(i) => *i < option_count,
            Self::Multiple(indices) => {
                !indices.is_empty() && indices.iter().all(|i| *i < option_count)
            }
        }
    }
}

/// A validated quiz question
///
/// Produced only by generation. Invariant: `correct` is within the bounds
/// of `options`; raw items violating that are dropped during validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub text: String,
    pub kind: QuestionKind,
    pub options: Vec<String>,
    pub correct: CorrectAnswer,
    /// 1 (easy) to 5 (brutal)
    pub difficulty: u8,
    pub time_limit_secs: u32,
    pub explanation: String,
    pub tags: Vec<String>,
}

/// Question as the model emits it, before validation
#[derive(Debug, Deserialize)]
pub struct RawQuestion {
    #[serde(alias = "question")]
    pub text: String,
    #[serde(rename = "type", alias = "kind")]
    pub kind: QuestionKind,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(alias = "correctOptionIndex", alias = "correct_option_index")]
    pub correct: CorrectAnswer,
    #[serde(default = "default_difficulty")]
    pub difficulty: u8,
    #[serde(default, alias = "timeLimit", alias = "time_limit")]
    pub time_limit_secs: Option<u32>,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_difficulty() -> u8 {
    3
}

impl Question {
    /// Validate a raw model item into a Question
    ///
    /// Returns None when the correct indices fall outside the options, the
    /// text is empty, or a choice question has fewer than two options.
    pub fn from_raw(raw: RawQuestion) -> Option<Self> {
        if raw.text.trim().is_empty() {
            return None;
        }
        if raw.options.len() < 2 {
            return None;
        }
        if !raw.correct.within_bounds(raw.options.len()) {
            return None;
        }
        // TrueFalse with more than two options is a model hallucination
        if raw.kind == QuestionKind::TrueFalse && raw.options.len() != 2 {
            return None;
        }
        Some(Self {
            id: Uuid::new_v4(),
            text: raw.text,
            kind: raw.kind,
            options: raw.options,
            correct: raw.correct,
            difficulty: raw.difficulty.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY),
            time_limit_secs: raw.time_limit_secs.unwrap_or(DEFAULT_TIME_LIMIT_SECS),
            explanation: raw.explanation,
            tags: raw.tags,
        })
    }
}

// =============================================================================
// Enemies
// =============================================================================

/// A generated enemy for the battle system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enemy {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    /// 1 (fodder) to 5 (boss)
    pub difficulty: u8,
    pub health: u32,
    /// Topic the enemy quizzes on
    pub trivia_domain: String,
}

#[derive(Debug, Deserialize)]
pub struct RawEnemy {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_difficulty")]
    pub difficulty: u8,
    #[serde(default = "default_health", alias = "hp")]
    pub health: u32,
    #[serde(default, alias = "triviaDomain", alias = "domain")]
    pub trivia_domain: String,
}

fn default_health() -> u32 {
    100
}

impl Enemy {
    pub fn from_raw(raw: RawEnemy) -> Option<Self> {
        if raw.name.trim().is_empty() {
            return None;
        }
        Some(Self {
            id: Uuid::new_v4(),
            name: raw.name,
            description: raw.description,
            difficulty: raw.difficulty.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY),
            health: raw.health.max(1),
            trivia_domain: raw.trivia_domain,
        })
    }
}

// =============================================================================
// Knowledge Map
// =============================================================================

/// One node of a generated knowledge map (topic tree)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeNode {
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub children: Vec<KnowledgeNode>,
}

impl KnowledgeNode {
    /// Total node count including self
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(KnowledgeNode::size).sum::<usize>()
    }

    /// Parse a knowledge map from an extracted JSON object
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| CompletionError::parse(format!("invalid knowledge map: {}", e)).into())
    }
}
