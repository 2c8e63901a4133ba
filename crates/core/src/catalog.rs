//! Intent catalog: the fixed table of intents the classifier matches against.
//!
//! Each intent carries example phrases, the ordered entities that must be collected
//! before it completes, and positional response templates. `responses[0]` opens the
//! conversation; the last entry is the completion template.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const GREET_USER: &str = "greet_user";
pub const BOOK_FLIGHT: &str = "book_flight";
pub const ORDER_FOOD: &str = "order_food";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    pub name: String,
    #[serde(default)]
    pub phrases: Vec<String>,
    #[serde(default)]
    pub entities: Vec<String>,
    pub responses: Vec<String>,
}

impl Intent {
    pub fn new(
        name: impl Into<String>,
        phrases: &[&str],
        entities: &[&str],
        responses: &[&str],
    ) -> Self {
        Self {
            name: name.into(),
            phrases: phrases.iter().map(ToString::to_string).collect(),
            entities: entities.iter().map(ToString::to_string).collect(),
            responses: responses.iter().map(ToString::to_string).collect(),
        }
    }

    /// Reply sent on the turn the intent is detected.
    pub fn opening_response(&self) -> &str {
        self.responses.first().map(String::as_str).unwrap_or_default()
    }

    /// Template rendered once every entity has been collected.
    pub fn completion_template(&self) -> &str {
        self.responses.last().map(String::as_str).unwrap_or_default()
    }

    pub fn requires_slots(&self) -> bool {
        !self.entities.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("could not read intent catalog `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse intent catalog: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("intent catalog must declare at least one intent")]
    Empty,
    #[error("intent name must not be blank")]
    BlankName,
    #[error("intent `{0}` is declared more than once")]
    DuplicateIntent(String),
    #[error("intent `{0}` must declare at least one response")]
    MissingResponses(String),
    #[error("fallback intent `{0}` is not declared in the catalog")]
    UnknownFallback(String),
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    intents: Vec<Intent>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntentCatalog {
    intents: Vec<Intent>,
}

impl IntentCatalog {
    pub fn new(intents: Vec<Intent>) -> Result<Self, CatalogError> {
        if intents.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut seen = BTreeSet::new();
        for intent in &intents {
            if intent.name.trim().is_empty() {
                return Err(CatalogError::BlankName);
            }
            if !seen.insert(intent.name.as_str()) {
                return Err(CatalogError::DuplicateIntent(intent.name.clone()));
            }
            if intent.responses.is_empty() {
                return Err(CatalogError::MissingResponses(intent.name.clone()));
            }
        }

        Ok(Self { intents })
    }

    pub fn builtin() -> Self {
        Self {
            intents: vec![
                Intent::new(
                    GREET_USER,
                    &["hello", "hi", "hey", "what's up", "how are you"],
                    &[],
                    &["Hello! How can I assist you today?"],
                ),
                Intent::new(
                    BOOK_FLIGHT,
                    &[
                        "I want to book a flight",
                        "Can you help me book a flight?",
                        "I need a flight to Paris",
                        "Book a flight",
                        "I want to travel",
                        "Can you book me a flight on Monday?",
                    ],
                    &["destination", "date"],
                    &[
                        "Great! Where would you like to fly?",
                        "What date would you prefer to fly to {destination}?",
                        "Flight to {destination} on {date} has been booked!",
                    ],
                ),
                Intent::new(
                    ORDER_FOOD,
                    &[
                        "I'd like to order food",
                        "Can I get some food?",
                        "I want to order a pizza",
                        "Order food for me",
                        "Get me some burgers",
                        "I want to order 2 tacos",
                    ],
                    &["food_item", "quantity"],
                    &[
                        "What would you like to order?",
                        "How many {food_item}s would you like?",
                        "Order of {quantity} {food_item}(s) placed successfully!",
                    ],
                ),
            ],
        }
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, CatalogError> {
        let file = toml::from_str::<CatalogFile>(raw)?;
        Self::new(file.intents)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| CatalogError::ReadFile { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&raw)
    }

    /// Ensures the configured fallback intent can always be resolved.
    pub fn ensure_fallback(&self, fallback: &str) -> Result<(), CatalogError> {
        if self.get(fallback).is_none() {
            return Err(CatalogError::UnknownFallback(fallback.to_string()));
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Intent> {
        self.intents.iter().find(|intent| intent.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Intent> {
        self.intents.iter()
    }

    pub fn len(&self) -> usize {
        self.intents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }
}

impl Default for IntentCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
