//! Text feature extraction: entities, topics, sentiment, intent
//!
//! Pure, deterministic pattern-class matchers - no model inference. The same
//! input always yields the same features, which the fusion and session layers
//! rely on for reproducible graphs and tests. A neural extractor can replace
//! this behind the same `ExtractedFeatures` contract without touching callers.
//!
//! Extraction reports every literal match; deduplication happens when matches
//! are folded into the session and global frequency maps.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::constants::ENTITY_CONFIDENCE;

/// Entity kinds recognized by the pattern matchers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Person,
    Location,
    Organization,
    Date,
    Time,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Person => "person",
            Self::Location => "location",
            Self::Organization => "organization",
            Self::Date => "date",
            Self::Time => "time",
        }
    }
}

/// A single entity match with its source position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub text: String,
    pub kind: EntityKind,
    /// Pattern matchers report a flat heuristic confidence
    pub confidence: f32,
    /// Byte offset of the match in the source text
    pub position: usize,
}

/// Fixed topic taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    Technology,
    Business,
    Health,
    Education,
    Travel,
    Food,
    Entertainment,
}

impl Topic {
    pub const ALL: [Topic; 7] = [
        Topic::Technology,
        Topic::Business,
        Topic::Health,
        Topic::Education,
        Topic::Travel,
        Topic::Food,
        Topic::Entertainment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Technology => "technology",
            Self::Business => "business",
            Self::Health => "health",
            Self::Education => "education",
            Self::Travel => "travel",
            Self::Food => "food",
            Self::Entertainment => "entertainment",
        }
    }

    /// Keyword list for membership testing (case-insensitive substring)
    fn keywords(&self) -> &'static [&'static str] {
        match self {
            Self::Technology => &[
                "computer", "software", "programming", "code", "technology", "internet",
                "digital", "robot", "algorithm", "server",
            ],
            Self::Business => &[
                "business", "money", "market", "company", "finance", "economy", "startup",
                "sales", "invest",
            ],
            Self::Health => &[
                "health", "doctor", "medicine", "exercise", "fitness", "diet", "sleep",
                "hospital", "wellness",
            ],
            Self::Education => &[
                "school", "learn", "study", "education", "university", "course", "teacher",
                "student", "exam",
            ],
            Self::Travel => &[
                "travel", "trip", "vacation", "flight", "hotel", "destination", "journey",
                "tourist", "airport",
            ],
            Self::Food => &[
                "food", "recipe", "cooking", "restaurant", "meal", "dinner", "lunch",
                "breakfast", "cuisine", "hungry",
            ],
            Self::Entertainment => &[
                "movie", "music", "game", "film", "concert", "show", "entertainment",
                "series", "festival",
            ],
        }
    }
}

/// Message sentiment from the lexicon vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Negative => "negative",
        }
    }
}

/// User intent classes, first-match-wins in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Question,
    Request,
    Command,
    Greeting,
    Farewell,
    Clarification,
    Statement,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Question => "question",
            Self::Request => "request",
            Self::Command => "command",
            Self::Greeting => "greeting",
            Self::Farewell => "farewell",
            Self::Clarification => "clarification",
            Self::Statement => "statement",
        }
    }
}

/// Everything extracted from one text
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedFeatures {
    pub entities: Vec<Entity>,
    pub topics: Vec<Topic>,
    pub sentiment: Sentiment,
    /// Only computed for user-authored text, None otherwise
    pub intent: Option<Intent>,
}

const POSITIVE_WORDS: &[&str] = &[
    "good", "great", "excellent", "love", "happy", "wonderful", "amazing", "awesome",
    "fantastic", "thanks", "thank", "perfect", "nice", "best", "glad", "enjoy",
];

const NEGATIVE_WORDS: &[&str] = &[
    "bad", "terrible", "awful", "hate", "sad", "angry", "horrible", "worst", "problem",
    "wrong", "fail", "broken", "annoying", "poor", "upset", "disappointed",
];

/// Deterministic feature extractor with pre-compiled patterns
pub struct FeatureExtractor {
    person: Regex,
    location: Regex,
    organization: Regex,
    acronym: Regex,
    date: Regex,
    time: Regex,
    intents: Vec<(Intent, Regex)>,
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureExtractor {
    /// Compile all patterns once. Patterns are static literals, so the
    /// unwraps cannot fail at runtime.
    #[allow(clippy::unwrap_used)]
    pub fn new() -> Self {
        let intents = vec![
            (
                Intent::Question,
                Regex::new(
                    r"(?i)^(?:who|what|when|where|why|how|which|is|are|do|does|did|can|could|will|would|should)\b|\?\s*$",
                )
                .unwrap(),
            ),
            (
                Intent::Request,
                Regex::new(r"(?i)^(?:please|could you|would you|can you|i need|i want|i'd like)\b")
                    .unwrap(),
            ),
            (
                Intent::Command,
                Regex::new(
                    r"(?i)^(?:show|tell|give|find|search|open|play|stop|start|create|delete|set|list)\b",
                )
                .unwrap(),
            ),
            (
                Intent::Greeting,
                Regex::new(r"(?i)^(?:hi|hello|hey|good (?:morning|afternoon|evening)|greetings)\b")
                    .unwrap(),
            ),
            (
                Intent::Farewell,
                Regex::new(r"(?i)^(?:bye|goodbye|see you|good night|farewell|later)\b").unwrap(),
            ),
            (
                Intent::Clarification,
                Regex::new(r"(?i)^(?:i mean|actually|to clarify|in other words|what i meant)\b")
                    .unwrap(),
            ),
        ];

        Self {
            // Person names as capitalized bigrams
            person: Regex::new(r"\b([A-Z][a-z]+ [A-Z][a-z]+)\b").unwrap(),
            // Locations via prepositional cues
            location: Regex::new(r"\b(?:in|at|from|near|of) ([A-Z][a-z]+(?: [A-Z][a-z]+)*)\b")
                .unwrap(),
            // Organizations via corporate suffixes
            organization: Regex::new(
                r"\b([A-Z][A-Za-z]+ (?:Corp|Corporation|Inc|Ltd|LLC|Company|Institute|University|Labs?))\b",
            )
            .unwrap(),
            // All-caps acronyms also read as organizations
            acronym: Regex::new(r"\b([A-Z]{2,6})\b").unwrap(),
            date: Regex::new(
                r"\b(\d{4}-\d{2}-\d{2}|\d{1,2}[/-]\d{1,2}[/-]\d{2,4}|(?:January|February|March|April|May|June|July|August|September|October|November|December) \d{1,2}(?:, \d{4})?)\b",
            )
            .unwrap(),
            time: Regex::new(r"(?i)\b(\d{1,2}:\d{2}(?::\d{2})?(?: ?[ap]\.?m\.?)?)\b").unwrap(),
            intents,
        }
    }

    /// Extract entities, topics, sentiment, and (for user text) intent.
    ///
    /// Pure and deterministic: no state is read or written.
    pub fn extract(&self, text: &str, user_authored: bool) -> ExtractedFeatures {
        ExtractedFeatures {
            entities: self.extract_entities(text),
            topics: self.extract_topics(text),
            sentiment: self.extract_sentiment(text),
            intent: user_authored.then(|| self.extract_intent(text)),
        }
    }

    /// All pattern-class entity matches, in match order per kind
    pub fn extract_entities(&self, text: &str) -> Vec<Entity> {
        let mut entities = Vec::new();

        let mut push_matches = |re: &Regex, kind: EntityKind| {
            for caps in re.captures_iter(text) {
                if let Some(m) = caps.get(1) {
                    entities.push(Entity {
                        text: m.as_str().to_string(),
                        kind,
                        confidence: ENTITY_CONFIDENCE,
                        position: m.start(),
                    });
                }
            }
        };

        push_matches(&self.person, EntityKind::Person);
        push_matches(&self.location, EntityKind::Location);
        push_matches(&self.organization, EntityKind::Organization);
        push_matches(&self.acronym, EntityKind::Organization);
        push_matches(&self.date, EntityKind::Date);
        push_matches(&self.time, EntityKind::Time);

        entities
    }

    /// A topic is present if any of its keywords occurs as a case-insensitive
    /// substring of the text
    pub fn extract_topics(&self, text: &str) -> Vec<Topic> {
        let lower = text.to_lowercase();
        Topic::ALL
            .into_iter()
            .filter(|topic| topic.keywords().iter().any(|kw| lower.contains(kw)))
            .collect()
    }

    /// Bag-of-words polarity vote; ties resolve to neutral
    pub fn extract_sentiment(&self, text: &str) -> Sentiment {
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric() && c != '\'')
            .filter(|w| !w.is_empty())
            .collect();

        let positive = words
            .iter()
            .filter(|w| POSITIVE_WORDS.contains(&w.trim_matches('\'')))
            .count();
        let negative = words
            .iter()
            .filter(|w| NEGATIVE_WORDS.contains(&w.trim_matches('\'')))
            .count();

        match positive.cmp(&negative) {
            std::cmp::Ordering::Greater => Sentiment::Positive,
            std::cmp::Ordering::Less => Sentiment::Negative,
            std::cmp::Ordering::Equal => Sentiment::Neutral,
        }
    }

    /// First-match-wins over the anchored intent patterns, default statement
    pub fn extract_intent(&self, text: &str) -> Intent {
        let trimmed = text.trim();
        for (intent, re) in &self.intents {
            if re.is_match(trimmed) {
                return *intent;
            }
        }
        Intent::Statement
    }
}
