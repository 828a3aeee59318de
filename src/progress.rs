//! Progress indicators for the orgsync CLI.
//!
//! Spinners are drawn on stderr and stay hidden when it is not a terminal,
//! so piped output and tests see nothing.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Start a spinner for an indeterminate remote read
pub fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Remove a finished spinner from the screen
pub fn finish_clear(spinner: &ProgressBar) {
    spinner.finish_and_clear();
}
