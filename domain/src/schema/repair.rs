//! JSON extraction and best-effort repair.
//!
//! Agents wrap JSON in prose, fence it in code blocks, quote with `'` and
//! leave trailing commas. These helpers recover a parseable document where
//! the intent is unambiguous. They never touch the *content* of a value.

/// Locate the JSON document inside free text.
///
/// Prefers the first fenced code block (```` ```json ```` or bare
/// ```` ``` ````) whose body starts with `{` or `[`, then the largest span from
/// the first `{` to the last `}`. An opening brace with no closer yields the
/// tail from that brace so that repair can balance it.
pub fn extract_json_candidate(text: &str) -> Option<String> {
    let (block, outside) = scan_fences(text);
    if let Some(block) = block {
        return Some(block);
    }

    let start = outside.find('{')?;
    match outside.rfind('}') {
        Some(end) if end > start => Some(outside[start..=end].to_string()),
        _ => Some(outside[start..].trim_end().to_string()),
    }
}

/// Returns the first JSON-looking fenced block, plus all text that sits
/// outside of any fence (so code in other languages never feeds the brace
/// search).
fn scan_fences(text: &str) -> (Option<String>, String) {
    // `Some(eligible)` while inside a fence.
    let mut fence: Option<bool> = None;
    let mut current = String::new();
    let mut outside = String::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("```") {
            match fence {
                None => {
                    let lang = trimmed.trim_start_matches('`').trim().to_lowercase();
                    fence = Some(lang.is_empty() || lang == "json");
                    current.clear();
                }
                Some(eligible) => {
                    fence = None;
                    let body = current.trim();
                    if eligible && (body.starts_with('{') || body.starts_with('[')) {
                        return (Some(body.to_string()), outside);
                    }
                }
            }
        } else if fence.is_some() {
            current.push_str(line);
            current.push('\n');
        } else {
            outside.push_str(line);
            outside.push('\n');
        }
    }

    // An unterminated fence still counts as outside text.
    if fence.is_some() {
        outside.push_str(&current);
    }
    (None, outside)
}

/// Steps applied by [`repair_json`], reported back for warnings.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RepairActions {
    pub normalized_quotes: bool,
    pub removed_trailing_commas: bool,
    pub balanced_delimiters: bool,
}

impl RepairActions {
    pub fn any(&self) -> bool {
        self.normalized_quotes || self.removed_trailing_commas || self.balanced_delimiters
    }

    pub fn describe(&self) -> String {
        let mut steps = Vec::new();
        if self.normalized_quotes {
            steps.push("normalized quotes");
        }
        if self.removed_trailing_commas {
            steps.push("removed trailing commas");
        }
        if self.balanced_delimiters {
            steps.push("balanced braces/brackets");
        }
        steps.join(", ")
    }
}

/// Repair common JSON defects: single or typographic quotes, trailing
/// commas, unbalanced `{}`/`[]`.
pub fn repair_json(input: &str) -> (String, RepairActions) {
    let mut actions = RepairActions::default();

    let quoted = normalize_quotes(input, &mut actions);
    let without_commas = strip_trailing_commas(&quoted, &mut actions);
    let balanced = balance_delimiters(&without_commas, &mut actions);

    (balanced, actions)
}

/// Rewrite `'...'` and `“...”` strings as `"..."` outside existing
/// double-quoted strings.
fn normalize_quotes(input: &str, actions: &mut RepairActions) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_double = false;

    while let Some(c) = chars.next() {
        if in_double {
            out.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                }
                '"' => in_double = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => {
                in_double = true;
                out.push(c);
            }
            '\'' | '\u{201C}' => {
                let closer = if c == '\'' { '\'' } else { '\u{201D}' };
                actions.normalized_quotes = true;
                out.push('"');
                while let Some(inner) = chars.next() {
                    if inner == '\\' {
                        out.push(inner);
                        if let Some(escaped) = chars.next() {
                            out.push(escaped);
                        }
                    } else if inner == closer {
                        break;
                    } else if inner == '"' {
                        out.push_str("\\\"");
                    } else {
                        out.push(inner);
                    }
                }
                out.push('"');
            }
            _ => out.push(c),
        }
    }
    out
}

fn strip_trailing_commas(input: &str, actions: &mut RepairActions) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut in_string = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            if c == '\\' {
                if let Some(&escaped) = chars.get(i + 1) {
                    out.push(escaped);
                    i += 1;
                }
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
            out.push(c);
        } else if c == ',' {
            let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
            if matches!(next, Some('}') | Some(']')) {
                actions.removed_trailing_commas = true;
            } else {
                out.push(c);
            }
        } else {
            out.push(c);
        }
        i += 1;
    }
    out
}

fn balance_delimiters(input: &str, actions: &mut RepairActions) -> String {
    let mut out = String::with_capacity(input.len() + 4);
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in input.chars() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '{' => {
                stack.push('}');
                out.push(c);
            }
            '[' => {
                stack.push(']');
                out.push(c);
            }
            '}' | ']' => {
                if stack.last() == Some(&c) {
                    stack.pop();
                    out.push(c);
                } else {
                    // Stray closer with no matching opener.
                    actions.balanced_delimiters = true;
                }
            }
            _ => out.push(c),
        }
    }

    if in_string {
        out.push('"');
        actions.balanced_delimiters = true;
    }
    if !stack.is_empty() {
        actions.balanced_delimiters = true;
        let trimmed_len = out.trim_end().trim_end_matches(',').len();
        out.truncate(trimmed_len);
        while let Some(closer) = stack.pop() {
            out.push(closer);
        }
    }
    out
}
