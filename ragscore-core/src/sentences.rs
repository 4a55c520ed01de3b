// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Sentence segmentation for claim extraction.
//!
//! Claims are extracted per numbered sentence so that every claim can be
//! traced back to exactly one sentence of the response.

use regex::Regex;
use std::sync::OnceLock;

fn boundary() -> &'static Regex {
    static BOUNDARY: OnceLock<Regex> = OnceLock::new();
    // Terminal punctuation (optionally followed by closing quotes/brackets)
    // and then whitespace or end of text, or a hard line break.
    BOUNDARY.get_or_init(|| {
        Regex::new(r#"[.!?]+["')\]]*(?:\s+|$)|\n+"#).expect("sentence boundary regex is valid")
    })
}

/// Split text into trimmed, non-empty sentences.
///
/// Decimal numbers ("3.14") are not split because the period is not followed
/// by whitespace.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for m in boundary().find_iter(text) {
        push_trimmed(&mut sentences, &text[start..m.end()]);
        start = m.end();
    }
    push_trimmed(&mut sentences, &text[start..]);

    sentences
}

fn push_trimmed(sentences: &mut Vec<String>, fragment: &str) {
    let trimmed = fragment.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_sentence() {
        let sentences = split_sentences("Einstein was born in Germany on March 14, 1879.");
        assert_eq!(sentences, vec!["Einstein was born in Germany on March 14, 1879."]);
    }

    #[test]
    fn test_multiple_sentences() {
        let sentences =
            split_sentences("Paris is the capital of France. Is it large? Yes!  It has 2.1 million people");
        assert_eq!(
            sentences,
            vec![
                "Paris is the capital of France.",
                "Is it large?",
                "Yes!",
                "It has 2.1 million people",
            ]
        );
    }

    #[test]
    fn test_line_breaks_and_quotes() {
        let sentences = split_sentences("He said \"stop.\" Then he left\n- bullet item");
        assert_eq!(
            sentences,
            vec!["He said \"stop.\"", "Then he left", "- bullet item"]
        );
    }

    #[test]
    fn test_empty_text() {
        assert!(split_sentences("   \n  ").is_empty());
        assert!(split_sentences("").is_empty());
    }
}
