//! Typed data accumulated over one interactive conversion.

use crate::batch::BatchResult;
use crate::classify::InputKind;
use crate::convert::ConversionOutcome;
use std::path::{Path, PathBuf};

/// Which workflow the user picked from the main menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Single,
    Batch,
}

/// Result of the Processing state.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    Single(ConversionOutcome),
    Batch { success: bool, result: BatchResult },
}

impl ProcessOutcome {
    pub fn succeeded(&self) -> bool {
        match self {
            ProcessOutcome::Single(o) => o.success,
            ProcessOutcome::Batch { success, .. } => *success,
        }
    }
}

/// Everything the session has gathered so far.
///
/// Written only by the menu's own task. Reset wholesale when the user starts
/// another conversion from the results screen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionData {
    pub mode: Option<Mode>,
    /// URL or file path (single mode), CSV path (batch mode).
    pub input: Option<String>,
    pub input_kind: Option<InputKind>,
    pub output_dir: Option<PathBuf>,
    pub outcome: Option<ProcessOutcome>,
    pub generated_toc: Option<String>,
    pub toc_path: Option<PathBuf>,
    pub generated_kb: Option<String>,
    pub kb_path: Option<PathBuf>,
    pub condensed_path: Option<PathBuf>,
}

impl SessionData {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn output_dir_or<'a>(&'a self, fallback: &'a Path) -> &'a Path {
        self.output_dir.as_deref().unwrap_or(fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_clears_everything() {
        let mut s = SessionData {
            mode: Some(Mode::Single),
            input: Some("https://example.com".into()),
            generated_toc: Some("# TOC".into()),
            ..Default::default()
        };
        s.reset();
        assert_eq!(s, SessionData::default());
    }

    #[test]
    fn output_dir_falls_back() {
        let s = SessionData::default();
        assert_eq!(s.output_dir_or(Path::new("output")), Path::new("output"));
    }
}
