//! Section extraction for structured agent replies.
//!
//! Expected shape (section order is free, labels are case-insensitive):
//!
//! ```text
//! PAYLOAD:
//! ...the actual answer...
//! CONFIDENCE: 0.82
//! RISK_FLAGS: needs_tests, CRITICAL_data_loss
//! RATIONALE:
//! ...why...
//! ```

use serde::{Deserialize, Serialize};

/// Confidence used when a reply carries no readable confidence value.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Payload,
    Confidence,
    RiskFlags,
    Rationale,
}

impl Section {
    const ALL: [Section; 4] = [
        Section::Payload,
        Section::Confidence,
        Section::RiskFlags,
        Section::Rationale,
    ];

    fn label(self) -> &'static str {
        match self {
            Section::Payload => "PAYLOAD:",
            Section::Confidence => "CONFIDENCE:",
            Section::RiskFlags => "RISK_FLAGS:",
            Section::Rationale => "RATIONALE:",
        }
    }

    /// Match a line that opens this section, returning the inline remainder.
    fn open<'a>(line: &'a str) -> Option<(Section, &'a str)> {
        let trimmed = line.trim_start();
        Section::ALL.into_iter().find_map(|section| {
            let label = section.label();
            let head = trimmed.get(..label.len())?;
            head.eq_ignore_ascii_case(label)
                .then(|| (section, trimmed[label.len()..].trim()))
        })
    }
}

/// The four-field record extracted from an agent reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredOutput {
    pub payload: String,
    /// Always within `[0.0, 1.0]`.
    pub confidence: f64,
    pub risk_flags: Vec<String>,
    pub rationale: String,
}

impl Default for StructuredOutput {
    fn default() -> Self {
        Self {
            payload: String::new(),
            confidence: DEFAULT_CONFIDENCE,
            risk_flags: Vec::new(),
            rationale: String::new(),
        }
    }
}

/// Parse a structured reply.
///
/// Never fails. Without a `PAYLOAD:` section the whole input becomes the
/// payload; unreadable confidence degrades to [`DEFAULT_CONFIDENCE`].
pub fn parse_structured_output(raw: &str) -> StructuredOutput {
    let mut sections: Vec<(Section, Vec<&str>)> = Vec::new();

    for line in raw.lines() {
        if let Some((section, rest)) = Section::open(line) {
            let mut body = Vec::new();
            if !rest.is_empty() {
                body.push(rest);
            }
            sections.push((section, body));
        } else if let Some((_, body)) = sections.last_mut() {
            body.push(line);
        }
    }

    // Later duplicates of a section win, matching a top-to-bottom read.
    let text_of = |wanted: Section| -> Option<String> {
        sections
            .iter()
            .rev()
            .find(|(section, _)| *section == wanted)
            .map(|(_, body)| body.join("\n").trim().to_string())
    };

    let payload = text_of(Section::Payload).unwrap_or_else(|| raw.trim().to_string());

    StructuredOutput {
        payload,
        confidence: text_of(Section::Confidence)
            .map(|c| parse_confidence(&c))
            .unwrap_or(DEFAULT_CONFIDENCE),
        risk_flags: text_of(Section::RiskFlags)
            .map(|f| parse_risk_flags(&f))
            .unwrap_or_default(),
        rationale: text_of(Section::Rationale).unwrap_or_default(),
    }
}

/// Parse a confidence value, clamped to `[0, 1]`.
///
/// Accepts a leading number with an optional `%` suffix (`"82%"` → 0.82).
/// Anything unreadable, including NaN, yields [`DEFAULT_CONFIDENCE`].
pub fn parse_confidence(text: &str) -> f64 {
    let token = text.split_whitespace().next().unwrap_or("");
    let (number, percent) = match token.strip_suffix('%') {
        Some(n) => (n, true),
        None => (token.trim_end_matches([',', ';', '.']), false),
    };

    match number.parse::<f64>() {
        Ok(value) if value.is_nan() => DEFAULT_CONFIDENCE,
        Ok(value) if percent => (value / 100.0).clamp(0.0, 1.0),
        Ok(value) => value.clamp(0.0, 1.0),
        Err(_) => DEFAULT_CONFIDENCE,
    }
}

/// Split a comma-separated flag list. `"none"` and empty mean no flags.
pub fn parse_risk_flags(text: &str) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        return Vec::new();
    }
    trimmed
        .split([',', '\n'])
        .map(|flag| flag.trim().trim_start_matches("- ").trim())
        .filter(|flag| !flag.is_empty() && !flag.eq_ignore_ascii_case("none"))
        .map(str::to_string)
        .collect()
}
