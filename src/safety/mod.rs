//! Confirmation guard in front of the deletion phase.
//!
//! Removing a delete marker makes the previous object version current again,
//! so an interactive run asks the user to type `yes` first. The prompt is
//! skipped when nothing will be deleted (dry run), when `--force` is given,
//! and in environments where a prompt cannot be answered or would corrupt
//! the output (no TTY, JSON logging).


use crate::config::Config;
use crate::types::error::SweepError;
use anyhow::{Result, anyhow};
use std::io::{BufRead, IsTerminal, Write};

// ---------------------------------------------------------------------------
// PromptHandler trait (for testability)
// ---------------------------------------------------------------------------

/// Reads the user's answer to the confirmation prompt.
///
/// The default implementation ([`StdioPromptHandler`]) uses stdin/stdout.
/// Tests provide their own implementations to avoid blocking on input.
pub trait PromptHandler: Send + Sync {
    /// Display the prompt for `target_display` and return the trimmed answer.
    fn read_confirmation(&self, target_display: &str) -> Result<String>;

    /// `true` if both stdin and stdout are connected to a TTY.
    fn is_interactive(&self) -> bool;
}

/// Prompt handler using stdin/stdout.
pub struct StdioPromptHandler;

impl PromptHandler for StdioPromptHandler {
    fn read_confirmation(&self, target_display: &str) -> Result<String> {
        println!("All current delete markers under {target_display} will be removed.");
        print!("Type 'yes' to confirm: ");
        std::io::stdout().flush()?;

        let mut input = String::new();
        std::io::stdin().lock().read_line(&mut input)?;
        Ok(input.trim().to_string())
    }

    fn is_interactive(&self) -> bool {
        std::io::stdin().is_terminal() && std::io::stdout().is_terminal()
    }
}

// ---------------------------------------------------------------------------
// SafetyChecker
// ---------------------------------------------------------------------------

/// Decides whether the pipeline may start deleting.
///
/// Checks, in order:
/// 1. dry run: proceed (nothing is deleted)
/// 2. `--force`: proceed
/// 3. JSON logging or no TTY: proceed without prompting
/// 4. otherwise prompt and require the exact answer `yes`
pub struct SafetyChecker {
    dry_run: bool,
    force: bool,
    json_logging: bool,
    target_display: String,
    prompt_handler: Box<dyn PromptHandler>,
}

impl SafetyChecker {
    pub fn new(config: &Config) -> Self {
        Self::with_prompt_handler(config, Box::new(StdioPromptHandler))
    }

    pub fn with_prompt_handler(config: &Config, prompt_handler: Box<dyn PromptHandler>) -> Self {
        let json_logging = config
            .tracing_config
            .map(|tc| tc.json_tracing)
            .unwrap_or(false);

        Self {
            dry_run: config.dry_run,
            force: config.force,
            json_logging,
            target_display: config.target.to_string(),
            prompt_handler,
        }
    }

    /// `Err(SweepError::Cancelled)` when the user declines.
    pub fn check_before_deletion(&self) -> Result<()> {
        if self.dry_run || self.force || self.should_skip_prompt() {
            return Ok(());
        }

        self.prompt_confirmation()
    }

    fn should_skip_prompt(&self) -> bool {
        self.json_logging || !self.prompt_handler.is_interactive()
    }

    fn prompt_confirmation(&self) -> Result<()> {
        let input = self.prompt_handler.read_confirmation(&self.target_display)?;

        if input != "yes" {
            return Err(anyhow!(SweepError::Cancelled));
        }

        Ok(())
    }
}
