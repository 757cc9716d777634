//! Link-safe encoding of a deck's shareable content.
//!
//! The payload is the JSON projection `{topic, summary, flashcards}` in
//! unpadded URL-safe base64, so it can ride in a `?data=` query parameter.

use crate::{CardDraft, CoreError, Deck};
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SharedDeck {
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub flashcards: Vec<CardDraft>,
}

impl SharedDeck {
    pub fn from_deck(deck: &Deck) -> Self {
        Self {
            topic: deck.topic.clone(),
            summary: Some(deck.summary.clone()),
            flashcards: deck.flashcards.iter().map(|c| c.to_draft()).collect(),
        }
    }
}

pub fn encode(shared: &SharedDeck) -> Result<String, CoreError> {
    let json = serde_json::to_vec(shared).map_err(|e| CoreError::Storage(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

pub fn share_link(base_url: &str, shared: &SharedDeck) -> Result<String, CoreError> {
    Ok(format!("{}/import?data={}", base_url.trim_end_matches('/'), encode(shared)?))
}

/// Pulls the payload out of a full link, or returns the input when it is
/// already a bare payload.
fn extract_payload(input: &str) -> &str {
    let input = input.trim();
    match input.find("data=") {
        Some(pos) => {
            let rest = &input[pos + "data=".len()..];
            rest.split(['&', '#']).next().unwrap_or(rest)
        }
        None => input,
    }
}

pub fn decode(input: &str) -> Result<SharedDeck, CoreError> {
    let payload = extract_payload(input);
    if payload.is_empty() {
        return Err(CoreError::ImportFormat("no deck data found in the link"));
    }
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| URL_SAFE.decode(payload))
        .map_err(|_| CoreError::ImportFormat("deck data could not be read"))?;
    let value: Value = serde_json::from_slice(&bytes)
        .map_err(|_| CoreError::ImportFormat("deck data could not be read"))?;

    let shape_ok = value
        .get("topic")
        .and_then(Value::as_str)
        .is_some_and(|t| !t.trim().is_empty())
        && value.get("flashcards").is_some_and(Value::is_array);
    if !shape_ok {
        return Err(CoreError::ImportFormat("deck data is not in the correct format"));
    }
    serde_json::from_value(value)
        .map_err(|_| CoreError::ImportFormat("deck data is not in the correct format"))
}
