//! The interactive state machine.
//!
//! ```text
//! MainMenu ─▶ SingleItemMenu ─▶ UrlInput / FileInput ─┐
//!          └▶ BatchMenu ──────▶ FileInput (CSV) ──────┤
//!                                                     ▼
//!              OutputDirInput ─▶ Confirmation ─▶ Processing
//!                                                     │
//!   TocPrompt ─▶ TocProcessing ─▶ TocConfirmSave ─────┤
//!   KbPrompt  ─▶ KbProcessing  ─▶ KbConfirmSave ──────┤
//!   KbCondensePrompt ─▶ KbCondenseProcessing ─────────┤
//!                                                     ▼
//!                                         Results ─▶ MainMenu | Exit
//! ```
//!
//! Each state handler returns a [`Transition`]. Handlers may fail with a
//! [`KbError`]; the run loop catches it, renders a panel for its kind and
//! offers recovery (back one step, main menu, exit). A closed input stream
//! ends the session cleanly.

use super::prompt::{PromptRetryHook, Prompter, Tone};
use super::session::{Mode, ProcessOutcome, SessionData};
use super::state::{History, MenuState, Transition};
use crate::batch;
use crate::classify::{self, InputKind};
use crate::config::KbConfig;
use crate::convert;
use crate::error::KbError;
use crate::generate::Generator;
use crate::output::{self, SavePolicy};
use crate::progress::{NoopProgressCallback, ProgressCallback};
use crate::retry::RetryAdapter;
use crate::summary;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

const TOC_FILE_NAME: &str = "toc.md";
const KB_FILE_NAME: &str = "knowledge_base.md";

/// Which generated artefact a shared handler is working on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Artefact {
    Toc,
    Kb,
}

impl Artefact {
    fn label(&self) -> &'static str {
        match self {
            Artefact::Toc => "table of contents",
            Artefact::Kb => "knowledge base",
        }
    }

    fn file_name(&self) -> &'static str {
        match self {
            Artefact::Toc => TOC_FILE_NAME,
            Artefact::Kb => KB_FILE_NAME,
        }
    }

    fn processing(&self) -> MenuState {
        match self {
            Artefact::Toc => MenuState::TocProcessing,
            Artefact::Kb => MenuState::KbProcessing,
        }
    }

    fn confirm_save(&self) -> MenuState {
        match self {
            Artefact::Toc => MenuState::TocConfirmSave,
            Artefact::Kb => MenuState::KbConfirmSave,
        }
    }

    /// Where to go when this step is skipped or fails.
    fn next(&self) -> MenuState {
        match self {
            Artefact::Toc => MenuState::KbPrompt,
            Artefact::Kb => MenuState::Results,
        }
    }
}

/// Drives one interactive session over a [`Prompter`].
pub struct MenuSystem<P: Prompter> {
    prompter: P,
    config: KbConfig,
    adapter: RetryAdapter,
    generator: Option<Generator>,
    progress: ProgressCallback,
    state: MenuState,
    history: History,
    session: SessionData,
}

impl<P: Prompter> MenuSystem<P> {
    pub fn new(prompter: P, config: KbConfig, adapter: RetryAdapter) -> Self {
        Self {
            prompter,
            config,
            adapter,
            generator: None,
            progress: Arc::new(NoopProgressCallback),
            state: MenuState::MainMenu,
            history: History::default(),
            session: SessionData::default(),
        }
    }

    /// Enable the TOC / knowledge-base steps.
    pub fn with_generator(mut self, generator: Generator) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Receive batch progress events (the CLI draws a progress bar).
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = progress;
        self
    }

    pub fn state(&self) -> MenuState {
        self.state
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn session(&self) -> &SessionData {
        &self.session
    }

    pub fn prompter(&self) -> &P {
        &self.prompter
    }

    /// Run until the user exits. Returns the process exit code.
    pub async fn run(&mut self) -> i32 {
        self.prompter.header("EdgeQuake KB: documents to knowledge base");

        while self.state != MenuState::Exit {
            let transition = match self.handle().await {
                Ok(t) => t,
                Err(KbError::InputClosed) => {
                    info!("Input closed, ending session");
                    return 0;
                }
                Err(e) => match self.recover(&e) {
                    Ok(t) => t,
                    Err(KbError::InputClosed) => return 0,
                    Err(e) => {
                        error!("Error during recovery: {}", e);
                        return 1;
                    }
                },
            };
            self.apply(transition);
        }

        self.prompter.message(Tone::Info, "Goodbye!");
        0
    }

    fn apply(&mut self, transition: Transition) {
        match transition {
            Transition::To(next) => {
                if self.state != MenuState::Exit {
                    self.history.push(self.state);
                }
                self.state = next;
            }
            Transition::Reset(next) => {
                self.history.clear();
                self.state = next;
            }
            Transition::Back(steps) => {
                self.state = self.history.go_back(steps);
            }
            Transition::Stay => {}
        }
    }

    async fn handle(&mut self) -> Result<Transition, KbError> {
        match self.state {
            MenuState::MainMenu => self.main_menu(),
            MenuState::SingleItemMenu => self.single_item_menu(),
            MenuState::BatchMenu => self.batch_menu(),
            MenuState::UrlInput => self.url_input(),
            MenuState::FileInput => self.file_input(),
            MenuState::OutputDirInput => self.output_dir_input().await,
            MenuState::Confirmation => self.confirmation(),
            MenuState::Processing => self.processing().await,
            MenuState::TocPrompt => self.generation_prompt(Artefact::Toc),
            MenuState::TocProcessing => self.generation_processing(Artefact::Toc).await,
            MenuState::TocConfirmSave => self.generation_confirm_save(Artefact::Toc).await,
            MenuState::KbPrompt => self.generation_prompt(Artefact::Kb),
            MenuState::KbProcessing => self.generation_processing(Artefact::Kb).await,
            MenuState::KbConfirmSave => self.generation_confirm_save(Artefact::Kb).await,
            MenuState::KbCondensePrompt => self.condense_prompt(),
            MenuState::KbCondenseProcessing => self.condense_processing().await,
            MenuState::Results => self.results(),
            MenuState::Exit => Ok(Transition::Stay),
        }
    }

    // ── Error recovery ───────────────────────────────────────────────────

    fn recover(&mut self, e: &KbError) -> Result<Transition, KbError> {
        error!(state = %self.state, "{}", e);
        self.render_error(e);

        let choice = self.prompter.select(
            "How would you like to proceed?",
            &[
                ("1", "Go back to the previous step"),
                ("2", "Return to the main menu"),
                ("0", "Exit"),
            ],
        )?;
        Ok(match choice.as_str() {
            "1" => Transition::Back(1),
            "2" => Transition::Reset(MenuState::MainMenu),
            _ => Transition::To(MenuState::Exit),
        })
    }

    fn render_error(&mut self, e: &KbError) {
        match e {
            KbError::Validation(v) => self.prompter.panel(
                Tone::Error,
                "Validation Error",
                &format!("{}\n\nValidation type: {}\nInput: {}", v.message, v.kind, v.input),
            ),
            KbError::FileIo {
                path,
                operation,
                source,
            } => self.prompter.panel(
                Tone::Error,
                "File Operation Error",
                &format!("Failed to {} '{}'\n\n{}", operation, path.display(), source),
            ),
            other => self.prompter.panel(
                Tone::Error,
                "Unexpected Error",
                &format!("{}\n\nError type: {}", other, other.kind()),
            ),
        }
    }

    // ── Menus ────────────────────────────────────────────────────────────

    fn main_menu(&mut self) -> Result<Transition, KbError> {
        self.prompter.header(MenuState::MainMenu.title());
        let choice = self.prompter.select(
            "What would you like to convert?",
            &[
                ("1", "A single URL or document"),
                ("2", "A batch of inputs from a CSV file"),
                ("0", "Exit"),
            ],
        )?;
        Ok(match choice.as_str() {
            "1" => {
                self.session.mode = Some(Mode::Single);
                Transition::To(MenuState::SingleItemMenu)
            }
            "2" => {
                self.session.mode = Some(Mode::Batch);
                Transition::To(MenuState::BatchMenu)
            }
            _ => Transition::To(MenuState::Exit),
        })
    }

    fn single_item_menu(&mut self) -> Result<Transition, KbError> {
        self.prompter.header(MenuState::SingleItemMenu.title());
        let choice = self.prompter.select(
            "What kind of input?",
            &[
                ("1", "Web page URL"),
                ("2", "Local PDF, DOC or DOCX file"),
                ("b", "Back"),
                ("0", "Exit"),
            ],
        )?;
        Ok(match choice.as_str() {
            "1" => Transition::To(MenuState::UrlInput),
            "2" => Transition::To(MenuState::FileInput),
            "b" => Transition::Back(1),
            _ => Transition::To(MenuState::Exit),
        })
    }

    fn batch_menu(&mut self) -> Result<Transition, KbError> {
        self.prompter.header(MenuState::BatchMenu.title());
        self.prompter.message(
            Tone::Muted,
            "Every non-empty cell of the CSV file is treated as one URL or file path.",
        );
        let choice = self.prompter.select(
            "Batch options",
            &[("1", "Enter the CSV file path"), ("b", "Back"), ("0", "Exit")],
        )?;
        Ok(match choice.as_str() {
            "1" => Transition::To(MenuState::FileInput),
            "b" => Transition::Back(1),
            _ => Transition::To(MenuState::Exit),
        })
    }

    // ── Inputs ───────────────────────────────────────────────────────────

    fn url_input(&mut self) -> Result<Transition, KbError> {
        self.prompter.header(MenuState::UrlInput.title());
        loop {
            let raw = self.prompter.input("Enter the URL to convert", None)?;
            match classify::validate_url(&raw) {
                Ok(url) => {
                    self.session.input = Some(url);
                    self.session.input_kind = Some(InputKind::Url);
                    return Ok(Transition::To(MenuState::OutputDirInput));
                }
                Err(e) => self.prompter.message(Tone::Error, &e.message),
            }
        }
    }

    fn file_input(&mut self) -> Result<Transition, KbError> {
        self.prompter.header(MenuState::FileInput.title());
        let batch = self.session.mode == Some(Mode::Batch);
        loop {
            if batch {
                let raw = self.prompter.input("Enter the path to the CSV file", None)?;
                match classify::validate_file_path(&raw) {
                    Ok(path) => {
                        self.session.input = Some(path.display().to_string());
                        self.session.input_kind = None;
                        return Ok(Transition::To(MenuState::OutputDirInput));
                    }
                    Err(e) => self.prompter.message(Tone::Error, &e.message),
                }
            } else {
                let raw = self
                    .prompter
                    .input("Enter the path to the PDF, DOC or DOCX file", None)?;
                match classify::classify(&raw) {
                    Ok(item) if item.kind.is_file() => {
                        self.session.input = Some(item.validated_value);
                        self.session.input_kind = Some(item.kind);
                        return Ok(Transition::To(MenuState::OutputDirInput));
                    }
                    Ok(_) => self.prompter.message(
                        Tone::Error,
                        "That looks like a URL. Go back and choose URL input instead.",
                    ),
                    Err(e) => self.prompter.message(Tone::Error, &e.message),
                }
            }
        }
    }

    async fn output_dir_input(&mut self) -> Result<Transition, KbError> {
        self.prompter.header(MenuState::OutputDirInput.title());
        let default = self.config.output_dir.display().to_string();
        let raw = self
            .prompter
            .input("Where should the Markdown files go?", Some(&default))?;
        let dir = output::ensure_directory(Path::new(&raw)).await?;
        self.session.output_dir = Some(dir);
        Ok(Transition::To(MenuState::Confirmation))
    }

    fn confirmation(&mut self) -> Result<Transition, KbError> {
        let mode = self.session.mode.unwrap_or(Mode::Single);
        let input = self.session.input.clone().unwrap_or_default();
        let kind = match (mode, self.session.input_kind) {
            (Mode::Batch, _) => "CSV batch".to_string(),
            (Mode::Single, Some(k)) => k.as_str().to_uppercase(),
            (Mode::Single, None) => "unknown".to_string(),
        };
        let dir = self.session.output_dir_or(&self.config.output_dir).display().to_string();

        self.prompter.panel(
            Tone::Info,
            "Ready to convert",
            &format!(
                "Input:       {}\nType:        {}\nOutput dir:  {}\nMax retries: {}",
                input,
                kind,
                dir,
                self.adapter.max_retries()
            ),
        );

        if self.prompter.confirm("Proceed with the conversion?", true)? {
            return Ok(Transition::To(MenuState::Processing));
        }

        let menu = match mode {
            Mode::Single => MenuState::SingleItemMenu,
            Mode::Batch => MenuState::BatchMenu,
        };
        let steps = self
            .history
            .steps_to(menu)
            .unwrap_or(self.history.len() + 1);
        Ok(Transition::Back(steps))
    }

    // ── Conversion ───────────────────────────────────────────────────────

    async fn processing(&mut self) -> Result<Transition, KbError> {
        self.prompter.header(MenuState::Processing.title());
        let input = self
            .session
            .input
            .clone()
            .ok_or_else(|| KbError::Internal("No input path specified".to_string()))?;
        let dir = self
            .session
            .output_dir_or(&self.config.output_dir)
            .to_path_buf();

        let outcome = match self.session.mode.unwrap_or(Mode::Single) {
            Mode::Single => {
                self.prompter
                    .message(Tone::Info, &format!("Converting {} ...", input));
                let mut hook = PromptRetryHook::new(&mut self.prompter);
                let outcome =
                    convert::convert_single(&input, &dir, &self.adapter, &self.config, &mut hook)
                        .await;
                if outcome.success {
                    self.prompter.panel(
                        Tone::Success,
                        "Conversion complete",
                        &summary::outcome_summary(&outcome),
                    );
                } else {
                    self.prompter.panel(
                        Tone::Error,
                        "Conversion failed",
                        &summary::outcome_summary(&outcome),
                    );
                }
                ProcessOutcome::Single(outcome)
            }
            Mode::Batch => {
                self.prompter
                    .message(Tone::Info, &format!("Running batch from {} ...", input));
                let (success, result) = batch::run_batch(
                    Path::new(&input),
                    &dir,
                    &self.adapter,
                    &self.config,
                    self.progress.as_ref(),
                )
                .await;
                let tone = if success { Tone::Success } else { Tone::Error };
                self.prompter
                    .panel(tone, "Batch summary", &summary::batch_summary(&result));
                ProcessOutcome::Batch { success, result }
            }
        };

        self.session.outcome = Some(outcome);
        Ok(Transition::To(MenuState::TocPrompt))
    }

    // ── Generation ───────────────────────────────────────────────────────

    fn generation_prompt(&mut self, what: Artefact) -> Result<Transition, KbError> {
        if self.generator.is_none() {
            if what == Artefact::Toc {
                self.prompter.message(
                    Tone::Warning,
                    "No LLM provider configured; skipping table of contents and knowledge base generation.",
                );
            }
            return Ok(Transition::To(MenuState::Results));
        }

        let question = format!(
            "Generate a {} from the documents in the output directory?",
            what.label()
        );
        Ok(if self.prompter.confirm(&question, true)? {
            Transition::To(what.processing())
        } else {
            Transition::To(what.next())
        })
    }

    async fn generation_processing(&mut self, what: Artefact) -> Result<Transition, KbError> {
        let dir = self
            .session
            .output_dir_or(&self.config.output_dir)
            .to_path_buf();
        self.prompter
            .message(Tone::Info, &format!("Generating {} ...", what.label()));

        let generated = match &self.generator {
            Some(g) => match what {
                Artefact::Toc => g.generate_toc(&dir).await,
                Artefact::Kb => g.generate_kb(&dir).await,
            },
            None => None,
        };

        let Some(content) = generated else {
            self.prompter.message(
                Tone::Warning,
                &format!("Failed to generate the {}; skipping.", what.label()),
            );
            return Ok(Transition::To(what.next()));
        };

        match what {
            Artefact::Toc => self.session.generated_toc = Some(content),
            Artefact::Kb => self.session.generated_kb = Some(content),
        }
        Ok(Transition::To(what.confirm_save()))
    }

    async fn generation_confirm_save(&mut self, what: Artefact) -> Result<Transition, KbError> {
        let content = match what {
            Artefact::Toc => self.session.generated_toc.clone(),
            Artefact::Kb => self.session.generated_kb.clone(),
        }
        .ok_or_else(|| KbError::Internal(format!("No generated {} to save", what.label())))?;

        self.prompter.panel(
            Tone::Info,
            &format!("Generated {} (preview)", what.label()),
            &output::preview(&content, self.config.preview_lines),
        );

        if !self
            .prompter
            .confirm(&format!("Save this {}?", what.label()), true)?
        {
            let regenerate = format!("Regenerate the {}", what.label());
            let choice = self.prompter.select(
                "What would you like to do instead?",
                &[("1", regenerate.as_str()), ("2", "Skip this step")],
            )?;
            return Ok(match choice.as_str() {
                "1" => Transition::To(what.processing()),
                _ => Transition::To(what.next()),
            });
        }

        let dir = self
            .session
            .output_dir_or(&self.config.output_dir)
            .to_path_buf();
        let saved = self.save_generated(&dir, what.file_name(), &content).await?;

        match &saved {
            Some(path) => self
                .prompter
                .message(Tone::Success, &format!("Saved to {}", path.display())),
            None => self.prompter.message(Tone::Muted, "Save cancelled."),
        }

        Ok(match what {
            Artefact::Toc => {
                self.session.toc_path = saved;
                Transition::To(MenuState::KbPrompt)
            }
            Artefact::Kb => {
                let next = if saved.is_some() {
                    MenuState::KbCondensePrompt
                } else {
                    MenuState::Results
                };
                self.session.kb_path = saved;
                Transition::To(next)
            }
        })
    }

    /// Write `content` to `dir/file_name`, asking what to do if it exists.
    async fn save_generated(
        &mut self,
        dir: &Path,
        file_name: &str,
        content: &str,
    ) -> Result<Option<PathBuf>, KbError> {
        let path = dir.join(file_name);
        let policy = if path.exists() {
            let choice = self.prompter.select(
                &format!("{} already exists.", path.display()),
                &[
                    ("1", "Overwrite it"),
                    ("2", "Save under a new name"),
                    ("0", "Cancel"),
                ],
            )?;
            match choice.as_str() {
                "1" => SavePolicy::Overwrite,
                "2" => {
                    let stem = Path::new(file_name)
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_else(|| "document".to_string());
                    let suggested = output::next_available_path(dir, &stem, "md");
                    let suggested = suggested
                        .file_name()
                        .map(|f| f.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    loop {
                        let name = self.prompter.input("New file name", Some(&suggested))?;
                        let chosen = PathBuf::from(name);
                        let chosen = if chosen.is_absolute() {
                            chosen
                        } else {
                            dir.join(chosen)
                        };
                        if !chosen.exists() {
                            break SavePolicy::Rename(chosen);
                        }
                        self.prompter.message(
                            Tone::Warning,
                            &format!("{} already exists. Choose another name.", chosen.display()),
                        );
                    }
                }
                _ => SavePolicy::Cancel,
            }
        } else {
            SavePolicy::Overwrite
        };

        output::save_document(&path, content, policy).await
    }

    fn condense_prompt(&mut self) -> Result<Transition, KbError> {
        if self.session.kb_path.is_none() || self.generator.is_none() {
            return Ok(Transition::To(MenuState::Results));
        }
        Ok(
            if self
                .prompter
                .confirm("Condense the knowledge base into a shorter version?", true)?
            {
                Transition::To(MenuState::KbCondenseProcessing)
            } else {
                Transition::To(MenuState::Results)
            },
        )
    }

    async fn condense_processing(&mut self) -> Result<Transition, KbError> {
        let kb_path = self
            .session
            .kb_path
            .clone()
            .ok_or_else(|| KbError::Internal("No saved knowledge base to condense".to_string()))?;
        self.prompter
            .message(Tone::Info, "Condensing the knowledge base ...");

        let condensed = match &self.generator {
            Some(g) => g.condense_knowledge_base(&kb_path).await,
            None => None,
        };
        match condensed {
            Some(path) => {
                self.prompter.message(
                    Tone::Success,
                    &format!("Condensed knowledge base saved to {}", path.display()),
                );
                self.session.condensed_path = Some(path);
            }
            None => self
                .prompter
                .message(Tone::Warning, "Condensation failed; skipping."),
        }
        Ok(Transition::To(MenuState::Results))
    }

    // ── Results ──────────────────────────────────────────────────────────

    fn results(&mut self) -> Result<Transition, KbError> {
        self.prompter.header(MenuState::Results.title());

        let mut body = match &self.session.outcome {
            Some(ProcessOutcome::Single(o)) => summary::outcome_summary(o),
            Some(ProcessOutcome::Batch { result, .. }) => summary::batch_summary(result),
            None => "No conversion was run.".to_string(),
        };
        let generated = [
            ("Table of contents", &self.session.toc_path),
            ("Knowledge base", &self.session.kb_path),
            ("Condensed knowledge base", &self.session.condensed_path),
        ];
        for (label, path) in generated {
            if let Some(p) = path {
                body.push_str(&format!("\n{}: {}", label, p.display()));
            }
        }
        let tone = match &self.session.outcome {
            Some(o) if o.succeeded() => Tone::Success,
            Some(_) => Tone::Error,
            None => Tone::Muted,
        };
        self.prompter.panel(tone, "Session results", &body);

        if self
            .prompter
            .confirm("Would you like to convert something else?", false)?
        {
            self.session.reset();
            Ok(Transition::Reset(MenuState::MainMenu))
        } else {
            Ok(Transition::To(MenuState::Exit))
        }
    }
}
