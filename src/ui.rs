// UI layer: the tool normally runs unattended, so the terminal surface is
// small. A spinner while the run is in progress, a hidden prompt when the
// client secret is not configured, and one line with the outcome.

use std::io::IsTerminal;
use std::time::Duration;

use anyhow::Result;
use dialoguer::Password;
use indicatif::{ProgressBar, ProgressStyle};

use crate::app::Outcome;

/// Start a spinner on stderr. indicatif hides it when stderr is not a
/// terminal, so scheduled runs print nothing extra.
pub fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

/// Ask for the client secret when running interactively.
///
/// Returns `None` without prompting when stdin is not a terminal.
pub fn prompt_secret() -> Result<Option<String>> {
    if !std::io::stdin().is_terminal() {
        return Ok(None);
    }
    let secret = Password::new().with_prompt("Alloy API client secret").interact()?;
    Ok(Some(secret))
}

/// Print the final outcome: successes on stdout, failures on stderr.
pub fn report(outcome: &Outcome) {
    if outcome.exit_status().code() == 0 {
        println!("{}", outcome);
    } else {
        eprintln!("{}", outcome);
    }
}
