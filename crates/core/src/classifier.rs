use serde::{Deserialize, Serialize};

use crate::catalog::{Intent, IntentCatalog, GREET_USER};

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.7;

const WINKLER_PREFIX_SCALE: f64 = 0.1;
const WINKLER_MAX_PREFIX: usize = 4;

/// Scores how closely user text resembles an example phrase, in `[0, 1]`.
pub trait PhraseMatcher: Send + Sync {
    fn name(&self) -> &'static str;
    fn score(&self, text: &str, phrase: &str) -> f64;
}

impl PhraseMatcher for Box<dyn PhraseMatcher> {
    fn name(&self) -> &'static str {
        self.as_ref().name()
    }

    fn score(&self, text: &str, phrase: &str) -> f64 {
        self.as_ref().score(text, phrase)
    }
}

/// Jaro similarity plus the Winkler common-prefix bonus.
///
/// The bonus of up to four shared leading characters is applied to every pair, including
/// pairs whose Jaro score is below 0.7.
#[derive(Clone, Copy, Debug, Default)]
pub struct JaroWinklerMatcher;

impl PhraseMatcher for JaroWinklerMatcher {
    fn name(&self) -> &'static str {
        "jaro_winkler"
    }

    fn score(&self, text: &str, phrase: &str) -> f64 {
        if text == phrase {
            return 1.0;
        }

        let jaro = strsim::jaro(text, phrase);
        let prefix = text
            .chars()
            .zip(phrase.chars())
            .take(WINKLER_MAX_PREFIX)
            .take_while(|(left, right)| left == right)
            .count();

        jaro + prefix as f64 * WINKLER_PREFIX_SCALE * (1.0 - jaro)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ExactMatcher;

impl PhraseMatcher for ExactMatcher {
    fn name(&self) -> &'static str {
        "exact"
    }

    fn score(&self, text: &str, phrase: &str) -> f64 {
        if text == phrase {
            1.0
        } else {
            0.0
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatcherKind {
    #[default]
    JaroWinkler,
    Exact,
}

impl MatcherKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::JaroWinkler => "jaro_winkler",
            Self::Exact => "exact",
        }
    }

    pub fn build(self) -> Box<dyn PhraseMatcher> {
        match self {
            Self::JaroWinkler => Box::new(JaroWinklerMatcher),
            Self::Exact => Box::new(ExactMatcher),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Classification<'a> {
    pub intent: &'a Intent,
    pub matched_phrase: Option<&'a str>,
    pub score: Option<f64>,
    pub fallback: bool,
}

/// First-match intent classifier.
///
/// Intents and their phrases are visited in catalog order and the first phrase whose
/// score is strictly above the threshold wins. When nothing clears the threshold the
/// fallback intent is returned, so classification never fails for a catalog that
/// contains the fallback.
#[derive(Clone, Debug)]
pub struct IntentClassifier<M = JaroWinklerMatcher> {
    matcher: M,
    threshold: f64,
    fallback_intent: String,
}

impl Default for IntentClassifier<JaroWinklerMatcher> {
    fn default() -> Self {
        Self::new(JaroWinklerMatcher, DEFAULT_SIMILARITY_THRESHOLD, GREET_USER)
    }
}

impl<M> IntentClassifier<M>
where
    M: PhraseMatcher,
{
    pub fn new(matcher: M, threshold: f64, fallback_intent: impl Into<String>) -> Self {
        Self { matcher, threshold, fallback_intent: fallback_intent.into() }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn fallback_intent(&self) -> &str {
        &self.fallback_intent
    }

    pub fn matcher_name(&self) -> &'static str {
        self.matcher.name()
    }

    /// Returns `None` only when the fallback intent is missing from `catalog`.
    pub fn classify<'a>(
        &self,
        catalog: &'a IntentCatalog,
        text: &str,
    ) -> Option<Classification<'a>> {
        let normalized_text = text.to_lowercase();

        for intent in catalog.iter() {
            for phrase in &intent.phrases {
                let score = self.matcher.score(&normalized_text, &phrase.to_lowercase());
                if score > self.threshold {
                    return Some(Classification {
                        intent,
                        matched_phrase: Some(phrase.as_str()),
                        score: Some(score),
                        fallback: false,
                    });
                }
            }
        }

        catalog.get(&self.fallback_intent).map(|intent| Classification {
            intent,
            matched_phrase: None,
            score: None,
            fallback: true,
        })
    }

    pub fn detect_intent<'a>(&'a self, catalog: &'a IntentCatalog, text: &str) -> &'a str {
        self.classify(catalog, text)
            .map(|classification| classification.intent.name.as_str())
            .unwrap_or(self.fallback_intent.as_str())
    }
}
