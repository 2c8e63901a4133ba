pub mod catalog;
pub mod classifier;
pub mod config;
pub mod dialogue;
pub mod errors;

pub use catalog::{CatalogError, Intent, IntentCatalog, BOOK_FLIGHT, GREET_USER, ORDER_FOOD};
pub use classifier::{
    Classification, ExactMatcher, IntentClassifier, JaroWinklerMatcher, MatcherKind,
    PhraseMatcher, DEFAULT_SIMILARITY_THRESHOLD,
};
pub use dialogue::{
    CollectedEntity, ConversationState, DialogueEngine, SlotFilling, Turn, TurnEvent,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
