pub mod engine;
pub mod state;

pub use engine::{DialogueEngine, Turn, TurnEvent};
pub use state::{CollectedEntity, ConversationState, SlotFilling};
