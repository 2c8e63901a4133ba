use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectedEntity {
    pub name: String,
    pub value: String,
}

/// An intent that is mid-way through collecting its required entities.
///
/// `collected_entities` is kept in insertion order and always mirrors a prefix of
/// `required_entities`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotFilling {
    pub intent: String,
    pub required_entities: Vec<String>,
    pub collected_entities: Vec<CollectedEntity>,
    pub current_entity_index: usize,
}

impl SlotFilling {
    pub fn new(intent: impl Into<String>, required_entities: Vec<String>) -> Self {
        Self {
            intent: intent.into(),
            required_entities,
            collected_entities: Vec::new(),
            current_entity_index: 0,
        }
    }

    pub fn next_entity(&self) -> Option<&str> {
        self.required_entities.get(self.current_entity_index).map(String::as_str)
    }

    pub fn is_complete(&self) -> bool {
        self.current_entity_index >= self.required_entities.len()
    }

    pub fn collected_value(&self, entity: &str) -> Option<&str> {
        self.collected_entities
            .iter()
            .find(|collected| collected.name == entity)
            .map(|collected| collected.value.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum ConversationState {
    #[default]
    Idle,
    SlotFilling(SlotFilling),
}

impl ConversationState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn current_intent(&self) -> Option<&str> {
        match self {
            Self::Idle => None,
            Self::SlotFilling(slots) => Some(slots.intent.as_str()),
        }
    }

    pub fn required_entities(&self) -> &[String] {
        match self {
            Self::Idle => &[],
            Self::SlotFilling(slots) => &slots.required_entities,
        }
    }

    pub fn collected_entities(&self) -> &[CollectedEntity] {
        match self {
            Self::Idle => &[],
            Self::SlotFilling(slots) => &slots.collected_entities,
        }
    }

    pub fn current_entity_index(&self) -> usize {
        match self {
            Self::Idle => 0,
            Self::SlotFilling(slots) => slots.current_entity_index,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::Idle;
    }
}
