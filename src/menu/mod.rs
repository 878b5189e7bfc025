//! Interactive session: states, history, typed session data, terminal
//! prompting, and the [`MenuSystem`] that ties them together.

pub mod machine;
pub mod prompt;
pub mod session;
pub mod state;

pub use machine::MenuSystem;
pub use prompt::{PromptRetryHook, Prompter, TerminalPrompter, Tone};
pub use session::{Mode, ProcessOutcome, SessionData};
pub use state::{History, MenuState, Transition};
