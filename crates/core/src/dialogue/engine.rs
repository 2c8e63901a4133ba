use serde::{Deserialize, Serialize};

use crate::catalog::{CatalogError, Intent, IntentCatalog};
use crate::classifier::{IntentClassifier, JaroWinklerMatcher, PhraseMatcher};
use crate::dialogue::state::{CollectedEntity, ConversationState, SlotFilling};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnEvent {
    /// A zero-entity intent was detected and answered in a single turn.
    IntentAnswered { intent: String },
    IntentActivated { intent: String },
    EntityCollected { intent: String, entity: String },
    IntentCompleted { intent: String },
}

impl TurnEvent {
    pub fn intent(&self) -> &str {
        match self {
            Self::IntentAnswered { intent }
            | Self::IntentActivated { intent }
            | Self::EntityCollected { intent, .. }
            | Self::IntentCompleted { intent } => intent,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub state: ConversationState,
    pub response: String,
    pub event: TurnEvent,
}

pub struct DialogueEngine<M = JaroWinklerMatcher> {
    catalog: IntentCatalog,
    classifier: IntentClassifier<M>,
}

impl Default for DialogueEngine<JaroWinklerMatcher> {
    fn default() -> Self {
        Self { catalog: IntentCatalog::builtin(), classifier: IntentClassifier::default() }
    }
}

impl<M> DialogueEngine<M>
where
    M: PhraseMatcher,
{
    pub fn new(
        catalog: IntentCatalog,
        classifier: IntentClassifier<M>,
    ) -> Result<Self, CatalogError> {
        catalog.ensure_fallback(classifier.fallback_intent())?;
        Ok(Self { catalog, classifier })
    }

    pub fn catalog(&self) -> &IntentCatalog {
        &self.catalog
    }

    pub fn classifier(&self) -> &IntentClassifier<M> {
        &self.classifier
    }

    /// Computes the next conversation state and reply without touching `state`.
    ///
    /// Idle conversations are classified; conversations that are filling slots take
    /// `text` verbatim as the value of the next required entity and are never
    /// re-classified.
    pub fn step(&self, state: &ConversationState, text: &str) -> Result<Turn, DomainError> {
        match state {
            ConversationState::Idle => self.activate(text),
            ConversationState::SlotFilling(slots) => self.collect(slots, text),
        }
    }

    /// Applies one turn to `state` in place and returns the reply.
    pub fn process_user_input(
        &self,
        state: &mut ConversationState,
        text: &str,
    ) -> Result<String, DomainError> {
        let turn = self.step(state, text)?;
        *state = turn.state;
        Ok(turn.response)
    }

    fn activate(&self, text: &str) -> Result<Turn, DomainError> {
        let name = self.classifier.detect_intent(&self.catalog, text);
        let intent = self.lookup(name)?;
        let response = intent.opening_response().to_owned();

        if !intent.requires_slots() {
            return Ok(Turn {
                state: ConversationState::Idle,
                response,
                event: TurnEvent::IntentAnswered { intent: intent.name.clone() },
            });
        }

        Ok(Turn {
            state: ConversationState::SlotFilling(SlotFilling::new(
                intent.name.clone(),
                intent.entities.clone(),
            )),
            response,
            event: TurnEvent::IntentActivated { intent: intent.name.clone() },
        })
    }

    fn collect(&self, slots: &SlotFilling, text: &str) -> Result<Turn, DomainError> {
        let intent = self.lookup(&slots.intent)?;
        let entity = slots.next_entity().ok_or_else(|| DomainError::UnknownEntityIndex {
            intent: slots.intent.clone(),
            index: slots.current_entity_index,
            len: slots.required_entities.len(),
        })?;
        if slots.collected_entities.len() != slots.current_entity_index {
            return Err(DomainError::InvariantViolation(format!(
                "intent `{}` has {} collected entities but cursor is at {}",
                slots.intent,
                slots.collected_entities.len(),
                slots.current_entity_index
            )));
        }

        let mut next = slots.clone();
        next.collected_entities
            .push(CollectedEntity { name: entity.to_owned(), value: text.to_owned() });
        next.current_entity_index += 1;

        match next.next_entity().map(str::to_owned) {
            Some(upcoming) => Ok(Turn {
                response: format!("Please provide {upcoming}."),
                event: TurnEvent::EntityCollected {
                    intent: intent.name.clone(),
                    entity: entity.to_owned(),
                },
                state: ConversationState::SlotFilling(next),
            }),
            None => Ok(Turn {
                response: render_template(intent.completion_template(), &next.collected_entities),
                event: TurnEvent::IntentCompleted { intent: intent.name.clone() },
                state: ConversationState::Idle,
            }),
        }
    }

    fn lookup(&self, name: &str) -> Result<&Intent, DomainError> {
        self.catalog.get(name).ok_or_else(|| DomainError::UnknownIntent(name.to_owned()))
    }
}

/// Substitutes the first `{name}` placeholder of each collected entity, in collection order.
/// Entities without a placeholder are ignored.
pub fn render_template(template: &str, collected: &[CollectedEntity]) -> String {
    collected.iter().fold(template.to_owned(), |rendered, entity| {
        rendered.replacen(&format!("{{{}}}", entity.name), &entity.value, 1)
    })
}

#[cfg(test)]
mod tests {
    use crate::catalog::{Intent, IntentCatalog, BOOK_FLIGHT, GREET_USER, ORDER_FOOD};
    use crate::classifier::{ExactMatcher, IntentClassifier};
    use crate::dialogue::engine::{render_template, DialogueEngine, TurnEvent};
    use crate::dialogue::state::{CollectedEntity, ConversationState, SlotFilling};
    use crate::errors::DomainError;

    fn engine() -> DialogueEngine {
        DialogueEngine::default()
    }

    fn run(engine: &DialogueEngine, inputs: &[&str]) -> (Vec<String>, ConversationState) {
        let mut state = ConversationState::default();
        let responses = inputs
            .iter()
            .map(|input| engine.process_user_input(&mut state, input).expect("turn succeeds"))
            .collect();
        (responses, state)
    }

    #[test]
    fn book_flight_round_trip() {
        let engine = engine();
        let (responses, state) = run(&engine, &["I want to book a flight", "Tokyo", "Friday"]);

        assert_eq!(
            responses,
            vec![
                "Great! Where would you like to fly?".to_string(),
                "Please provide date.".to_string(),
                "Flight to Tokyo on Friday has been booked!".to_string(),
            ]
        );
        assert!(state.is_idle());
    }

    #[test]
    fn activation_returns_opening_response_and_enters_slot_filling() {
        let engine = engine();
        let turn = engine
            .step(&ConversationState::Idle, "Get me some burgers")
            .expect("activation succeeds");

        assert_eq!(turn.response, "What would you like to order?");
        assert_eq!(turn.event, TurnEvent::IntentActivated { intent: ORDER_FOOD.to_owned() });
        assert_eq!(turn.state.current_intent(), Some(ORDER_FOOD));
        assert_eq!(turn.state.current_entity_index(), 0);
        assert_eq!(
            turn.state.required_entities(),
            &["food_item".to_string(), "quantity".to_string()]
        );
        assert!(turn.state.collected_entities().is_empty());
    }

    #[test]
    fn zero_entity_intent_stays_idle() {
        let engine = engine();
        let turn = engine.step(&ConversationState::Idle, "hello").expect("greeting succeeds");

        assert_eq!(turn.response, "Hello! How can I assist you today?");
        assert_eq!(turn.event, TurnEvent::IntentAnswered { intent: GREET_USER.to_owned() });
        assert!(turn.state.is_idle());
    }

    #[test]
    fn each_intent_needs_exactly_one_turn_per_entity() {
        let engine = engine();
        for intent in engine.catalog().iter().filter(|intent| intent.requires_slots()) {
            let mut state = ConversationState::SlotFilling(SlotFilling::new(
                intent.name.clone(),
                intent.entities.clone(),
            ));

            for (turn_index, entity) in intent.entities.iter().enumerate().skip(1) {
                let reply = engine
                    .process_user_input(&mut state, &format!("value-{turn_index}"))
                    .expect("collect succeeds");
                assert_eq!(reply, format!("Please provide {entity}."));
                assert_eq!(state.current_entity_index(), turn_index);
            }

            let completion =
                engine.process_user_input(&mut state, "last").expect("completion succeeds");
            assert!(!completion.contains("Please provide"), "{completion}");
            assert!(state.is_idle());
        }
    }

    #[test]
    fn slot_values_are_used_verbatim() {
        let engine = engine();
        let (responses, _) =
            run(&engine, &["I want to book a flight", "  new york  ", "next FRIDAY!!"]);

        assert_eq!(responses[2], "Flight to   new york   on next FRIDAY!! has been booked!");
    }

    #[test]
    fn slot_filling_never_reclassifies() {
        let engine = engine();
        let (responses, state) = run(&engine, &["I want to book a flight", "hello"]);

        assert_eq!(responses[1], "Please provide date.");
        assert_eq!(
            state.collected_entities(),
            &[CollectedEntity { name: "destination".to_owned(), value: "hello".to_owned() }]
        );
    }

    #[test]
    fn completed_conversation_classifies_fresh() {
        let engine = engine();
        let (responses, state) =
            run(&engine, &["I want to book a flight", "Tokyo", "Friday", "hello"]);

        assert_eq!(responses[3], "Hello! How can I assist you today?");
        assert!(state.is_idle());
    }

    #[test]
    fn unrelated_text_gets_greeting_response() {
        let engine = engine();
        let (responses, state) = run(&engine, &["purple elephants dance quietly"]);

        assert_eq!(responses, vec!["Hello! How can I assist you today?".to_string()]);
        assert!(state.is_idle());
    }

    #[test]
    fn identical_input_yields_state_dependent_responses() {
        let engine = engine();
        let (responses, _) = run(&engine, &["I want to book a flight", "Paris", "Paris"]);

        assert_eq!(responses[1], "Please provide date.");
        assert_eq!(responses[2], "Flight to Paris on Paris has been booked!");
        assert_ne!(responses[1], responses[2]);
    }

    #[test]
    fn step_does_not_mutate_input_state() {
        let engine = engine();
        let state = ConversationState::Idle;
        let first = engine.step(&state, "I want to book a flight").expect("turn");
        let second = engine.step(&state, "I want to book a flight").expect("turn");

        assert_eq!(first, second);
        assert!(state.is_idle());
    }

    #[test]
    fn out_of_bounds_cursor_is_reported() {
        let engine = engine();
        let mut slots =
            SlotFilling::new(BOOK_FLIGHT, vec!["destination".to_owned(), "date".to_owned()]);
        slots.current_entity_index = 2;

        let error = engine
            .step(&ConversationState::SlotFilling(slots), "Tokyo")
            .expect_err("cursor past the end must fail");
        assert_eq!(
            error,
            DomainError::UnknownEntityIndex { intent: BOOK_FLIGHT.to_owned(), index: 2, len: 2 }
        );
    }

    #[test]
    fn cursor_out_of_step_with_collected_values_is_reported() {
        let engine = engine();
        let mut slots =
            SlotFilling::new(BOOK_FLIGHT, vec!["destination".to_owned(), "date".to_owned()]);
        slots.current_entity_index = 1;

        let error = engine
            .step(&ConversationState::SlotFilling(slots), "Friday")
            .expect_err("missing collected value must fail");
        assert!(matches!(error, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn unknown_intent_in_state_is_reported() {
        let engine = engine();
        let slots = SlotFilling::new("rent_car", vec!["city".to_owned()]);

        let error = engine
            .step(&ConversationState::SlotFilling(slots), "Lisbon")
            .expect_err("unknown intent must fail");
        assert_eq!(error, DomainError::UnknownIntent("rent_car".to_owned()));
    }

    #[test]
    fn engine_requires_fallback_in_catalog() {
        let catalog = IntentCatalog::new(vec![Intent::new("ping", &["ping"], &[], &["pong"])])
            .expect("catalog");
        let classifier: IntentClassifier = IntentClassifier::default();
        assert!(DialogueEngine::new(catalog, classifier).is_err());
    }

    #[test]
    fn custom_catalog_and_matcher_drive_the_engine() {
        let catalog = IntentCatalog::new(vec![
            Intent::new("fallback", &[], &[], &["Say 'weather' to start."]),
            Intent::new(
                "weather",
                &["weather"],
                &["city", "day"],
                &["Which city?", "Forecast for {city} on {day}: sunny."],
            ),
        ])
        .expect("catalog");
        let engine =
            DialogueEngine::new(catalog, IntentClassifier::new(ExactMatcher, 0.5, "fallback"))
                .expect("engine");

        let mut state = ConversationState::Idle;
        let mut say = |text: &str| engine.process_user_input(&mut state, text).expect("turn");
        assert_eq!(say("weathr"), "Say 'weather' to start.");
        assert_eq!(say("WEATHER"), "Which city?");
        assert_eq!(say("Oslo"), "Please provide day.");
        assert_eq!(say("Monday"), "Forecast for Oslo on Monday: sunny.");
    }

    #[test]
    fn render_replaces_first_occurrence_and_ignores_unused_entities() {
        let collected = vec![
            CollectedEntity { name: "city".to_owned(), value: "Rome".to_owned() },
            CollectedEntity { name: "unused".to_owned(), value: "ignored".to_owned() },
        ];

        assert_eq!(
            render_template("{city} and {city} again", &collected),
            "Rome and {city} again"
        );
        assert_eq!(render_template("no placeholders", &collected), "no placeholders");
    }
}
