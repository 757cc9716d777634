//! Contracts for the generative study services.
//!
//! The core never talks to a model itself. Callers hand a [`StudyGenerator`]
//! to the study service, which validates inputs before the call and results
//! after it.

use crate::{classify_service_failure, CardDraft, CoreError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const QUIZ_OPTIONS: usize = 4;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceMaterial {
    Text(String),
    /// A document as a `data:<mime>;base64,...` URI.
    Document(String),
}

impl SourceMaterial {
    pub fn is_empty(&self) -> bool {
        match self {
            SourceMaterial::Text(s) | SourceMaterial::Document(s) => s.trim().is_empty(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GeneratedDeck {
    pub summary: String,
    pub flashcards: Vec<CardDraft>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub text: String,
    pub options: Vec<String>,
    pub correct_index: usize,
    pub explanation: String,
}

impl QuizQuestion {
    pub fn is_well_formed(&self) -> bool {
        self.options.len() == QUIZ_OPTIONS && self.correct_index < QUIZ_OPTIONS
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Quiz {
    pub title: String,
    pub questions: Vec<QuizQuestion>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AssistantReply {
    pub response: String,
    pub suggested_flashcards: Vec<CardDraft>,
}

/// Failure signal from a generator, e.g. the provider's error message.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct GeneratorError {
    pub message: String,
}

impl GeneratorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl From<GeneratorError> for CoreError {
    fn from(e: GeneratorError) -> Self {
        CoreError::ExternalService(classify_service_failure(&e.message))
    }
}

/// Single-shot calls; implementations must not retry on their own.
#[async_trait]
pub trait StudyGenerator: Send + Sync {
    async fn generate_flashcards(&self, source: &SourceMaterial) -> Result<GeneratedDeck, GeneratorError>;

    async fn generate_quiz(&self, topic: &str, flashcards: &[CardDraft]) -> Result<Quiz, GeneratorError>;

    async fn study_assistant(&self, query: &str, simplify: bool) -> Result<AssistantReply, GeneratorError>;
}
