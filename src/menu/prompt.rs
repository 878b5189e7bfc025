//! Terminal interaction behind a small trait, so the state machine can be
//! driven by a script in tests and by stdin/stdout in the binary.

use crate::error::{ErrorRecord, KbError};
use crate::retry::RetryHook;
use std::io::{self, BufRead, BufReader, IsTerminal, Stdin, Stdout, Write};

// ── ANSI colour helpers ──────────────────────────────────────────────────

fn paint(code: &str, s: &str) -> String {
    format!("\x1b[{code}m{s}\x1b[0m")
}

/// Visual tone of a message or panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Info,
    Success,
    Warning,
    Error,
    Muted,
}

impl Tone {
    fn code(&self) -> &'static str {
        match self {
            Tone::Info => "36",
            Tone::Success => "32",
            Tone::Warning => "33",
            Tone::Error => "31",
            Tone::Muted => "2",
        }
    }

    fn marker(&self) -> &'static str {
        match self {
            Tone::Info => "◆",
            Tone::Success => "✔",
            Tone::Warning => "⚠",
            Tone::Error => "✘",
            Tone::Muted => "·",
        }
    }
}

// ── Trait ────────────────────────────────────────────────────────────────

/// Everything the menu needs from a terminal.
///
/// Input methods return [`KbError::InputClosed`] when the input stream ends.
pub trait Prompter: Send {
    /// Show `options` as `key: label` lines and return the chosen key.
    fn select(&mut self, prompt: &str, options: &[(&str, &str)]) -> Result<String, KbError>;

    /// Read one non-empty line; an empty answer takes `default` when given.
    fn input(&mut self, prompt: &str, default: Option<&str>) -> Result<String, KbError>;

    /// Yes/no question; an empty answer takes `default`.
    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool, KbError>;

    fn header(&mut self, title: &str);

    fn message(&mut self, tone: Tone, text: &str);

    fn panel(&mut self, tone: Tone, title: &str, body: &str);
}

// ── stdin/stdout implementation ──────────────────────────────────────────

/// Line-oriented prompter over any reader/writer pair.
pub struct TerminalPrompter<R, W> {
    input: R,
    output: W,
    color: bool,
}

impl TerminalPrompter<BufReader<Stdin>, Stdout> {
    /// Prompter on the process's stdin/stdout, coloured when stdout is a TTY.
    pub fn stdio() -> Self {
        let color = io::stdout().is_terminal();
        Self::new(BufReader::new(io::stdin()), io::stdout(), color)
    }
}

impl<R: BufRead + Send, W: Write + Send> TerminalPrompter<R, W> {
    pub fn new(input: R, output: W, color: bool) -> Self {
        Self {
            input,
            output,
            color,
        }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn style(&self, code: &str, s: &str) -> String {
        if self.color {
            paint(code, s)
        } else {
            s.to_string()
        }
    }

    fn read_line(&mut self, prompt: &str) -> Result<String, KbError> {
        write!(self.output, "{}", prompt).ok();
        self.output.flush().ok();
        let mut line = String::new();
        let n = self
            .input
            .read_line(&mut line)
            .map_err(|e| KbError::Internal(format!("Failed to read input: {}", e)))?;
        if n == 0 {
            return Err(KbError::InputClosed);
        }
        Ok(line.trim().to_string())
    }

    fn invalid(&mut self, text: &str) {
        let line = self.style("1;33", text);
        writeln!(self.output, "{}", line).ok();
    }
}

impl<R: BufRead + Send, W: Write + Send> Prompter for TerminalPrompter<R, W> {
    fn select(&mut self, prompt: &str, options: &[(&str, &str)]) -> Result<String, KbError> {
        writeln!(self.output).ok();
        writeln!(self.output, "{}", prompt).ok();
        for (key, label) in options {
            let key = self.style("32", key);
            writeln!(self.output, "{}: {}", key, label).ok();
        }
        loop {
            let choice = self.read_line("\nPlease select an option: ")?;
            if options.iter().any(|(k, _)| k.eq_ignore_ascii_case(&choice)) {
                return Ok(choice.to_ascii_lowercase());
            }
            self.invalid("Invalid option. Please try again.");
        }
    }

    fn input(&mut self, prompt: &str, default: Option<&str>) -> Result<String, KbError> {
        let shown = match default {
            Some(d) => format!("{} [{}]: ", prompt, self.style("36", d)),
            None => format!("{}: ", prompt),
        };
        loop {
            let answer = self.read_line(&shown)?;
            if !answer.is_empty() {
                return Ok(answer);
            }
            if let Some(d) = default {
                return Ok(d.to_string());
            }
            self.invalid("A value is required.");
        }
    }

    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool, KbError> {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        loop {
            let answer = self.read_line(&format!("{} {} ", prompt, hint))?;
            match answer.to_ascii_lowercase().as_str() {
                "" => return Ok(default),
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => self.invalid("Please answer y or n."),
            }
        }
    }

    fn header(&mut self, title: &str) {
        let rule = "─".repeat(title.chars().count() + 4);
        let title = self.style("1", title);
        writeln!(self.output, "\n{}\n  {}\n{}", rule, title, rule).ok();
    }

    fn message(&mut self, tone: Tone, text: &str) {
        let marker = self.style(tone.code(), tone.marker());
        writeln!(self.output, "{} {}", marker, text).ok();
    }

    fn panel(&mut self, tone: Tone, title: &str, body: &str) {
        let bar = self.style(tone.code(), "│");
        let heading = self.style(&format!("1;{}", tone.code()), title);
        writeln!(self.output, "\n{} {}", bar, heading).ok();
        for line in body.lines() {
            writeln!(self.output, "{} {}", bar, line).ok();
        }
    }
}

// ── Human-in-the-loop retry ──────────────────────────────────────────────

/// Asks the user whether to retry after each failed conversion attempt.
pub struct PromptRetryHook<'a> {
    prompter: &'a mut dyn Prompter,
}

impl<'a> PromptRetryHook<'a> {
    pub fn new(prompter: &'a mut dyn Prompter) -> Self {
        Self { prompter }
    }
}

impl RetryHook for PromptRetryHook<'_> {
    fn on_attempt_failed(&mut self, attempt: u32, max_retries: u32, error: &ErrorRecord) -> bool {
        self.prompter.message(
            Tone::Warning,
            &format!(
                "Attempt {}/{} failed: {}",
                attempt,
                max_retries + 1,
                error.message
            ),
        );
        self.prompter
            .confirm("Would you like to retry?", true)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn prompter(script: &str) -> TerminalPrompter<Cursor<Vec<u8>>, Vec<u8>> {
        TerminalPrompter::new(Cursor::new(script.as_bytes().to_vec()), Vec::new(), false)
    }

    #[test]
    fn select_reprompts_until_valid() {
        let mut p = prompter("9\n2\n");
        let choice = p.select("Pick", &[("1", "One"), ("2", "Two")]).unwrap();
        assert_eq!(choice, "2");
        let out = String::from_utf8(p.into_output()).unwrap();
        assert!(out.contains("Invalid option"));
        assert!(out.contains("1: One"));
    }

    #[test]
    fn input_uses_default_on_empty() {
        let mut p = prompter("\n");
        assert_eq!(p.input("Dir", Some("./output")).unwrap(), "./output");
    }

    #[test]
    fn confirm_parses_answers() {
        let mut p = prompter("maybe\nyes\n\n");
        assert!(p.confirm("Go?", false).unwrap());
        assert!(!p.confirm("Go?", false).unwrap());
    }

    #[test]
    fn eof_is_input_closed() {
        let mut p = prompter("");
        assert!(matches!(p.input("x", None), Err(KbError::InputClosed)));
    }

    #[test]
    fn retry_hook_declines_on_no() {
        let mut p = prompter("n\n");
        let mut hook = PromptRetryHook::new(&mut p);
        let rec = ErrorRecord::new(crate::error::ErrorKind::Conversion, "boom");
        assert!(!hook.on_attempt_failed(1, 3, &rec));
    }
}
