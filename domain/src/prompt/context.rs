//! Context handed to the compiler and its pruning rules.

use crate::util::{head_lines, truncate_chars};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_MAX_FILES: usize = 10;
pub const DEFAULT_MAX_LINES_PER_FILE: usize = 200;
pub const DEFAULT_MAX_SUMMARY_LINES: usize = 20;
const MAX_EXTRA_VALUE_CHARS: usize = 500;

/// One file excerpt supplied by a context scraper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextFile {
    pub path: String,
    pub content: String,
}

impl ContextFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Raw context for one compilation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptContext {
    #[serde(default)]
    pub files: Vec<ContextFile>,
    pub git_summary: Option<String>,
    /// Summary of the file the user is focused on.
    pub active_file: Option<String>,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl PromptContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.files.push(ContextFile::new(path, content));
        self
    }

    pub fn with_git_summary(mut self, summary: impl Into<String>) -> Self {
        self.git_summary = Some(summary.into());
        self
    }

    pub fn with_active_file(mut self, summary: impl Into<String>) -> Self {
        self.active_file = Some(summary.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
            && self.git_summary.is_none()
            && self.active_file.is_none()
            && self.extra.is_empty()
    }

    /// Apply file-count and line limits; summaries are kept in shortened form.
    pub fn prune(&self, limits: &PruneLimits) -> PrunedContext {
        let mut truncated_lines = 0;
        let files = self
            .files
            .iter()
            .take(limits.max_files)
            .map(|file| {
                let (content, dropped) = head_lines(&file.content, limits.max_lines_per_file);
                truncated_lines += dropped;
                let content = if dropped > 0 {
                    format!("{}\n... ({} more lines)", content, dropped)
                } else {
                    content
                };
                ContextFile::new(file.path.clone(), content)
            })
            .collect();

        let reduce = |summary: &String| head_lines(summary, limits.max_summary_lines).0;

        PrunedContext {
            files,
            git_summary: self.git_summary.as_ref().map(reduce),
            active_file: self.active_file.as_ref().map(reduce),
            extra: self
                .extra
                .iter()
                .map(|(k, v)| (k.clone(), truncate_chars(v, MAX_EXTRA_VALUE_CHARS).to_string()))
                .collect(),
            dropped_files: self.files.len().saturating_sub(limits.max_files),
            truncated_lines,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PruneLimits {
    pub max_files: usize,
    pub max_lines_per_file: usize,
    pub max_summary_lines: usize,
}

impl Default for PruneLimits {
    fn default() -> Self {
        Self {
            max_files: DEFAULT_MAX_FILES,
            max_lines_per_file: DEFAULT_MAX_LINES_PER_FILE,
            max_summary_lines: DEFAULT_MAX_SUMMARY_LINES,
        }
    }
}

/// Context after pruning, ready to be rendered into a prompt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrunedContext {
    pub files: Vec<ContextFile>,
    pub git_summary: Option<String>,
    pub active_file: Option<String>,
    pub extra: BTreeMap<String, String>,
    pub dropped_files: usize,
    pub truncated_lines: usize,
}

impl PrunedContext {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
            && self.git_summary.is_none()
            && self.active_file.is_none()
            && self.extra.is_empty()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();

        if let Some(git) = &self.git_summary {
            out.push_str(&format!("### Repository state\n{}\n\n", git));
        }
        if let Some(active) = &self.active_file {
            out.push_str(&format!("### Active file\n{}\n\n", active));
        }
        for (key, value) in &self.extra {
            out.push_str(&format!("- {}: {}\n", key, value));
        }
        if !self.extra.is_empty() {
            out.push('\n');
        }
        for file in &self.files {
            out.push_str(&format!("### {}\n```\n{}\n```\n\n", file.path, file.content));
        }
        if self.dropped_files > 0 {
            out.push_str(&format!("({} more files omitted)\n", self.dropped_files));
        }

        out.trim_end().to_string()
    }
}
