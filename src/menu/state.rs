//! Menu states, transitions and the bounded back-navigation history.

use std::collections::VecDeque;
use std::fmt;

/// Every screen the interactive session can be on. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MenuState {
    MainMenu,
    SingleItemMenu,
    BatchMenu,
    UrlInput,
    FileInput,
    OutputDirInput,
    Confirmation,
    Processing,
    TocPrompt,
    TocProcessing,
    TocConfirmSave,
    KbPrompt,
    KbProcessing,
    KbConfirmSave,
    KbCondensePrompt,
    KbCondenseProcessing,
    Results,
    Exit,
}

impl MenuState {
    /// Section header shown when the state is entered.
    pub fn title(&self) -> &'static str {
        match self {
            MenuState::MainMenu => "Main Menu",
            MenuState::SingleItemMenu => "Single Item Conversion",
            MenuState::BatchMenu => "Batch Conversion",
            MenuState::UrlInput => "URL Input",
            MenuState::FileInput => "File Input",
            MenuState::OutputDirInput => "Output Directory",
            MenuState::Confirmation => "Confirmation",
            MenuState::Processing => "Processing",
            MenuState::TocPrompt | MenuState::TocProcessing | MenuState::TocConfirmSave => {
                "Table of Contents"
            }
            MenuState::KbPrompt | MenuState::KbProcessing | MenuState::KbConfirmSave => {
                "Knowledge Base"
            }
            MenuState::KbCondensePrompt | MenuState::KbCondenseProcessing => {
                "Knowledge Base Condensation"
            }
            MenuState::Results => "Results",
            MenuState::Exit => "Exit",
        }
    }
}

impl fmt::Display for MenuState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// What a state handler asks the machine to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Move forward, remembering the current state.
    To(MenuState),
    /// Move to a state and forget all history.
    Reset(MenuState),
    /// Return N steps through the history.
    Back(usize),
    /// Re-run the current state.
    Stay,
}

/// Back-navigation stack holding at most `capacity` states; the oldest entry
/// is dropped when a push would exceed it.
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<MenuState>,
    capacity: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(History::DEFAULT_CAPACITY)
    }
}

impl History {
    pub const DEFAULT_CAPACITY: usize = 10;

    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, state: MenuState) {
        self.entries.push_back(state);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &MenuState> {
        self.entries.iter()
    }

    /// Pop `steps` entries and return the state found that far back.
    ///
    /// With too little history, clears everything and returns
    /// [`MenuState::MainMenu`].
    pub fn go_back(&mut self, steps: usize) -> MenuState {
        let steps = steps.max(1);
        if self.entries.len() >= steps {
            let target = self.entries[self.entries.len() - steps];
            self.entries.truncate(self.entries.len() - steps);
            target
        } else {
            self.entries.clear();
            MenuState::MainMenu
        }
    }

    /// Steps back to the most recent occurrence of `state`, if any.
    pub fn steps_to(&self, state: MenuState) -> Option<usize> {
        self.entries
            .iter()
            .rev()
            .position(|s| *s == state)
            .map(|i| i + 1)
    }
}
