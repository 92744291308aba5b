//! Console stand-in for the speech engine.

use kavi_core::voice::{SpeechRenderer, Utterance};
use std::io::Write;

/// Prints each utterance as `kavi [emotion] text`. Rendering completes
/// immediately, so the owning queue is drained after every turn.
#[derive(Debug, Default)]
pub struct ConsoleRenderer;

impl SpeechRenderer for ConsoleRenderer {
    fn render(&self, utterance: &Utterance) {
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(
            stdout,
            "kavi [{}] {}",
            utterance.emotion.as_str(),
            utterance.text
        );
        let _ = stdout.flush();
    }

    fn interrupt(&self) {
        tracing::debug!("Console speech interrupted");
    }
}
