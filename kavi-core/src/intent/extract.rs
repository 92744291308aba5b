//! Slot extraction helpers for the classifier rules.
//!
//! All helpers operate on the lowercased, trimmed utterance.

use regex::Regex;
use std::sync::LazyLock;

static CLOCK_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{1,2}(:\d{2})?(\s*(am|pm))?").unwrap());

static PERCENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\s*%").unwrap());

/// Alarm time used when the utterance names none.
pub const DEFAULT_ALARM_TIME: &str = "7:00 AM";

/// Level used when neither a percentage nor a bucket keyword is present.
pub const DEFAULT_LEVEL: u32 = 50;

pub(crate) fn contains_any(text: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| text.contains(needle))
}

/// True when `word` appears as a whole word.
pub(crate) fn has_word(text: &str, word: &str) -> bool {
    text.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .any(|token| token == word)
}

/// Remove every whole-word occurrence of each keyword, in order, and
/// normalize whitespace.
///
/// Keywords may span several words ("navigate to"). Only whole words are
/// removed, so names like "tom" stay intact when "to" is a keyword and
/// "restart" is not cut down to "re".
pub fn strip_keywords(text: &str, keywords: &[&str]) -> String {
    let mut words: Vec<&str> = text.split_whitespace().collect();

    for keyword in keywords {
        let pattern: Vec<&str> = keyword.split_whitespace().collect();
        if pattern.is_empty() {
            continue;
        }

        let mut kept = Vec::with_capacity(words.len());
        let mut i = 0;
        while i < words.len() {
            if words[i..].starts_with(&pattern) {
                i += pattern.len();
            } else {
                kept.push(words[i]);
                i += 1;
            }
        }
        words = kept;
    }

    words.join(" ")
}

/// Everything after the first marker word found, trying markers in order.
pub fn text_after_marker(text: &str, markers: &[&str]) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    for marker in markers {
        if let Some(pos) = words.iter().position(|w| w == marker) {
            return words[pos + 1..].join(" ");
        }
    }
    String::new()
}

pub fn alarm_time(text: &str) -> String {
    CLOCK_TIME
        .find(text)
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| DEFAULT_ALARM_TIME.to_string())
}

fn explicit_percent(text: &str) -> Option<u32> {
    let caps = PERCENT.captures(text)?;
    let level = caps[1].parse::<u32>().unwrap_or(DEFAULT_LEVEL);
    Some(level.min(100))
}

/// Volume level: explicit percentage, else keyword bucket, else 50.
pub fn volume_level(text: &str) -> u32 {
    if let Some(level) = explicit_percent(text) {
        return level;
    }

    if contains_any(text, &["max", "full", "loud"]) {
        100
    } else if contains_any(text, &["min", "low", "quiet"]) {
        20
    } else if contains_any(text, &["medium", "half"]) {
        50
    } else if text.contains("up") {
        75
    } else if text.contains("down") {
        25
    } else {
        DEFAULT_LEVEL
    }
}

/// Brightness level: explicit percentage, else keyword bucket, else 50.
///
/// "bright" and "dim" are matched as whole words since every brightness
/// utterance contains "brightness".
pub fn brightness_level(text: &str) -> u32 {
    if let Some(level) = explicit_percent(text) {
        return level;
    }

    if contains_any(text, &["max", "full"]) || has_word(text, "bright") || has_word(text, "brighter") {
        100
    } else if contains_any(text, &["min", "low"]) || has_word(text, "dim") || has_word(text, "dimmer") {
        20
    } else if contains_any(text, &["medium", "half"]) {
        50
    } else {
        DEFAULT_LEVEL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_keywords_whole_words_only() {
        assert_eq!(strip_keywords("call tom", &["call", "to"]), "tom");
        assert_eq!(
            strip_keywords("navigate to the airport", &["navigate to", "navigate"]),
            "the airport"
        );
        assert_eq!(strip_keywords("open", &["open"]), "");
        // A keyword inside a longer word stays put
        assert_eq!(
            strip_keywords("restart chrome", &["open", "launch", "start"]),
            "restart chrome"
        );
    }

    #[test]
    fn test_text_after_marker_prefers_earlier_marker() {
        assert_eq!(
            text_after_marker("message bob saying see you soon", &["saying", "say", "message"]),
            "see you soon"
        );
        assert_eq!(text_after_marker("text bob", &["saying", "say"]), "");
    }

    #[test]
    fn test_alarm_time() {
        assert_eq!(alarm_time("set an alarm for 6:30 am"), "6:30 am");
        assert_eq!(alarm_time("wake me at 5"), "5");
        assert_eq!(alarm_time("set an alarm"), DEFAULT_ALARM_TIME);
    }

    #[test]
    fn test_volume_buckets() {
        assert_eq!(volume_level("volume 35%"), 35);
        assert_eq!(volume_level("volume 35 %"), 35);
        assert_eq!(volume_level("volume 250%"), 100);
        assert_eq!(volume_level("max volume"), 100);
        assert_eq!(volume_level("volume low"), 20);
        assert_eq!(volume_level("half volume"), 50);
        assert_eq!(volume_level("volume up"), 75);
        assert_eq!(volume_level("volume down"), 25);
        assert_eq!(volume_level("change the volume"), 50);
    }

    #[test]
    fn test_brightness_buckets() {
        assert_eq!(brightness_level("brightness 80%"), 80);
        assert_eq!(brightness_level("full brightness"), 100);
        assert_eq!(brightness_level("make the brightness bright"), 100);
        assert_eq!(brightness_level("dim the brightness"), 20);
        assert_eq!(brightness_level("brightness to half"), 50);
        assert_eq!(brightness_level("adjust brightness"), 50);
    }
}
