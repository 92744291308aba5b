//! Question categorization
//!
//! Sorts free-form questions into broad categories by keyword hits so the
//! dispatcher can pick an opening line and decide whether the question needs
//! a web lookup.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionCategory {
    Technical,
    Emotional,
    Routine,
    Work,
    Study,
    Health,
    Philosophical,
    Casual,
}

impl QuestionCategory {
    /// Scoring order; earlier categories win ties.
    pub const ALL: [QuestionCategory; 8] = [
        QuestionCategory::Technical,
        QuestionCategory::Emotional,
        QuestionCategory::Routine,
        QuestionCategory::Work,
        QuestionCategory::Study,
        QuestionCategory::Health,
        QuestionCategory::Philosophical,
        QuestionCategory::Casual,
    ];

    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            QuestionCategory::Technical => &[
                "how to", "code", "program", "bug", "error", "install", "setup", "configure",
                "debug", "compile", "syntax", "algorithm", "api",
            ],
            QuestionCategory::Emotional => &[
                "feel", "feeling", "sad", "happy", "stressed", "worried", "anxious", "depressed",
                "lonely", "angry", "frustrated", "tired", "exhausted",
            ],
            QuestionCategory::Routine => &[
                "eat", "food", "meal", "breakfast", "lunch", "dinner", "cook", "sleep", "wake",
                "morning", "evening", "daily", "schedule",
            ],
            QuestionCategory::Work => &[
                "work", "job", "project", "deadline", "meeting", "boss", "colleague", "task",
                "assignment", "presentation", "email", "office",
            ],
            QuestionCategory::Study => &[
                "study", "learn", "exam", "test", "homework", "assignment", "class", "lecture",
                "course", "subject", "grade", "university", "college",
            ],
            QuestionCategory::Health => &[
                "health", "exercise", "workout", "gym", "run", "walk", "medicine", "doctor",
                "sick", "pain", "headache", "fever", "diet", "weight",
            ],
            QuestionCategory::Philosophical => &[
                "why", "meaning", "purpose", "life", "existence", "believe", "think", "opinion",
                "philosophy", "ethics", "morality", "right", "wrong",
            ],
            QuestionCategory::Casual => &[
                "joke", "funny", "fun", "game", "play", "movie", "music", "song", "weather",
                "time", "date", "news", "story", "chat",
            ],
        }
    }

    /// Opening line spoken before anything else happens.
    pub fn suggested_response(&self) -> &'static str {
        match self {
            QuestionCategory::Technical => "Let me help you with that technical question.",
            QuestionCategory::Emotional => {
                "I'm here to listen. Tell me more about how you're feeling."
            }
            QuestionCategory::Routine => "Let me help you with your daily routine.",
            QuestionCategory::Work => "Work-related question. I'll do my best to help.",
            QuestionCategory::Study => "Study question. Let's figure this out together.",
            QuestionCategory::Health => "Health is important. What do you need to know?",
            QuestionCategory::Philosophical => "That's a deep question. Let me think about it.",
            QuestionCategory::Casual => "Sure, I can help with that.",
        }
    }

    /// Whether a local answer is not enough and the question should be looked up.
    pub fn needs_backend(&self) -> bool {
        matches!(
            self,
            QuestionCategory::Technical
                | QuestionCategory::Philosophical
                | QuestionCategory::Emotional
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionCategory::Technical => "technical",
            QuestionCategory::Emotional => "emotional",
            QuestionCategory::Routine => "routine",
            QuestionCategory::Work => "work",
            QuestionCategory::Study => "study",
            QuestionCategory::Health => "health",
            QuestionCategory::Philosophical => "philosophical",
            QuestionCategory::Casual => "casual",
        }
    }
}

/// Category with the most keyword hits (substring matches), `Casual` when
/// nothing hits.
pub fn categorize(question: &str) -> QuestionCategory {
    let lower = question.to_lowercase();

    let mut best = (QuestionCategory::Casual, 0usize);
    for category in QuestionCategory::ALL {
        let score = category
            .keywords()
            .iter()
            .filter(|keyword| lower.contains(*keyword))
            .count();
        if score > best.1 {
            best = (category, score);
        }
    }

    tracing::debug!(category = best.0.as_str(), score = best.1, "Categorized question");
    best.0
}
