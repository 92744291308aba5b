//! Voice output
//!
//! The assistant talks through a [`Speaker`]. [`VoiceQueue`] is the stock
//! implementation: a single-consumer queue in front of an external
//! [`SpeechRenderer`] (the text-to-speech engine). At most one utterance is
//! active at a time.
//!
//! - [`Speaker::speak`] flushes: queued utterances are dropped, the active one
//!   is interrupted, and the new one starts immediately.
//! - [`Speaker::speak_queued`] appends without interrupting.
//! - [`Speaker::stop`] interrupts the active utterance and clears the queue.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Emotional coloring of an utterance, rendered as pitch and rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Emotion {
    Neutral,
    Happy,
    Concerned,
    Playful,
    Serious,
    Excited,
    Calm,
    Urgent,
    Curious,
}

impl Emotion {
    pub const ALL: [Emotion; 9] = [
        Emotion::Neutral,
        Emotion::Happy,
        Emotion::Concerned,
        Emotion::Playful,
        Emotion::Serious,
        Emotion::Excited,
        Emotion::Calm,
        Emotion::Urgent,
        Emotion::Curious,
    ];

    /// Pitch multiplier, 1.0 is the engine default.
    pub fn pitch(&self) -> f32 {
        match self {
            Emotion::Neutral => 1.0,
            Emotion::Happy => 1.2,
            Emotion::Concerned => 0.9,
            Emotion::Playful => 1.3,
            Emotion::Serious => 0.8,
            Emotion::Excited => 1.4,
            Emotion::Calm => 0.95,
            Emotion::Urgent => 1.1,
            Emotion::Curious => 1.1,
        }
    }

    /// Speech-rate multiplier, 1.0 is the engine default.
    pub fn speed(&self) -> f32 {
        match self {
            Emotion::Neutral => 1.0,
            Emotion::Happy => 1.1,
            Emotion::Concerned => 0.9,
            Emotion::Playful => 1.2,
            Emotion::Serious => 0.85,
            Emotion::Excited => 1.3,
            Emotion::Calm => 0.9,
            Emotion::Urgent => 1.4,
            Emotion::Curious => 1.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Neutral => "neutral",
            Emotion::Happy => "happy",
            Emotion::Concerned => "concerned",
            Emotion::Playful => "playful",
            Emotion::Serious => "serious",
            Emotion::Excited => "excited",
            Emotion::Calm => "calm",
            Emotion::Urgent => "urgent",
            Emotion::Curious => "curious",
        }
    }
}

/// Anything that can voice the assistant's output.
pub trait Speaker: Send + Sync {
    /// Interrupt whatever is playing and say `text` now.
    fn speak(&self, text: &str, emotion: Emotion);

    /// Say `text` after everything already queued.
    fn speak_queued(&self, text: &str, emotion: Emotion);

    /// Stop the active utterance and drop the queue.
    fn stop(&self);
}

/// A single utterance ready for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub emotion: Emotion,
    pub pitch: f32,
    pub speed: f32,
}

impl Utterance {
    pub fn new(text: &str, emotion: Emotion) -> Self {
        Self {
            text: text.to_string(),
            emotion,
            pitch: emotion.pitch(),
            speed: emotion.speed(),
        }
    }
}

/// The external text-to-speech engine.
///
/// Implementations must not call back into the owning [`VoiceQueue`] from
/// inside these methods; completion is reported later via
/// [`VoiceQueue::finished`].
pub trait SpeechRenderer: Send + Sync {
    fn render(&self, utterance: &Utterance);
    fn interrupt(&self);
}

#[derive(Default)]
struct QueueState {
    active: Option<Utterance>,
    pending: VecDeque<Utterance>,
}

pub struct VoiceQueue<R: SpeechRenderer> {
    renderer: R,
    state: Mutex<QueueState>,
}

impl<R: SpeechRenderer> VoiceQueue<R> {
    pub fn new(renderer: R) -> Self {
        Self {
            renderer,
            state: Mutex::new(QueueState::default()),
        }
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// The renderer finished the active utterance; start the next one.
    pub fn finished(&self) {
        let mut state = self.state.lock().unwrap();
        state.active = state.pending.pop_front();
        if let Some(next) = &state.active {
            self.renderer.render(next);
        }
    }

    /// Mark everything as played, in order. For renderers that complete
    /// synchronously, such as a console.
    pub fn drain(&self) {
        while self.is_speaking() {
            self.finished();
        }
    }

    pub fn is_speaking(&self) -> bool {
        self.state.lock().unwrap().active.is_some()
    }

    pub fn pending_len(&self) -> usize {
        self.state.lock().unwrap().pending.len()
    }

    pub fn active(&self) -> Option<Utterance> {
        self.state.lock().unwrap().active.clone()
    }
}

impl<R: SpeechRenderer> Speaker for VoiceQueue<R> {
    fn speak(&self, text: &str, emotion: Emotion) {
        let utterance = Utterance::new(text, emotion);
        let mut state = self.state.lock().unwrap();
        state.pending.clear();
        if state.active.is_some() {
            self.renderer.interrupt();
        }
        self.renderer.render(&utterance);
        state.active = Some(utterance);
    }

    fn speak_queued(&self, text: &str, emotion: Emotion) {
        let utterance = Utterance::new(text, emotion);
        let mut state = self.state.lock().unwrap();
        if state.active.is_none() {
            self.renderer.render(&utterance);
            state.active = Some(utterance);
        } else {
            state.pending.push_back(utterance);
        }
    }

    fn stop(&self) {
        let mut state = self.state.lock().unwrap();
        state.pending.clear();
        if state.active.take().is_some() {
            self.renderer.interrupt();
        }
        tracing::debug!("Voice output stopped");
    }
}
