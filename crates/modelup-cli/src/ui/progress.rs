//! One-line-per-model progress rendering
//!
//! While a model downloads, its line is redrawn in place. When it finishes
//! the line is replaced by the final result and the cursor moves on. Output
//! that is not a terminal only gets the final lines.

use std::io::{IsTerminal, Write, stdout};
use std::sync::Mutex;

use crossterm::QueueableCommand;
use crossterm::cursor::MoveToColumn;
use crossterm::style::Stylize;
use crossterm::terminal::{Clear, ClearType};

use modelup_core::{InstalledModel, PendingUpdate, ProgressEvent, Reporter, UpdateError};

use super::{NAME_WIDTH, display_version, format_size};

/// Redraw at most this often when the total size is unknown.
const UNKNOWN_TOTAL_STEP: u64 = 1024 * 1024;

#[derive(Debug, Default)]
struct LineState {
    transition: String,
    last_percent: Option<u8>,
    last_received: u64,
}

/// [`Reporter`] that renders each model on its own terminal line.
#[derive(Debug)]
pub struct LineReporter {
    interactive: bool,
    state: Mutex<LineState>,
}

impl Default for LineReporter {
    fn default() -> Self {
        Self::new(stdout().is_terminal())
    }
}

impl LineReporter {
    pub fn new(interactive: bool) -> Self {
        Self {
            interactive,
            state: Mutex::new(LineState::default()),
        }
    }

    fn finish(&self, line: &str) {
        if self.interactive {
            redraw(line);
            println!();
        } else {
            println!("{line}");
        }
    }

    fn transition(&self) -> String {
        self.state
            .lock()
            .map(|s| s.transition.clone())
            .unwrap_or_default()
    }
}

/// Replace the current terminal line.
fn redraw(line: &str) {
    let mut out = stdout().lock();
    let _ = out.queue(MoveToColumn(0));
    let _ = out.queue(Clear(ClearType::CurrentLine));
    let _ = write!(out, "{line}");
    let _ = out.flush();
}

/// Format `from -> to` for a pending update.
pub fn format_transition(from: Option<&str>, to: &str) -> String {
    let from = from.map_or_else(|| "new".to_string(), display_version);
    format!("{from} -> {}", display_version(to))
}

/// Format the in-progress status column.
pub fn format_progress(received: u64, total: u64, percent: u8) -> String {
    if total == 0 {
        format!("fetching {}", format_size(received))
    } else {
        format!(
            "{percent:>3}%  {} / {}",
            format_size(received),
            format_size(total)
        )
    }
}

fn name_column(name: &str) -> String {
    format!("{name:<NAME_WIDTH$}")
}

impl Reporter for LineReporter {
    fn started(&self, update: &PendingUpdate) {
        let transition =
            format_transition(update.current_version.as_deref(), &update.next_version);
        if let Ok(mut state) = self.state.lock() {
            *state = LineState {
                transition: transition.clone(),
                ..LineState::default()
            };
        }
        if self.interactive {
            redraw(&format!(
                "  {} {}  {}",
                name_column(&update.name).cyan(),
                transition.as_str().dark_grey(),
                "queued".dark_grey()
            ));
        }
    }

    fn progress(&self, event: &ProgressEvent) {
        if !self.interactive {
            return;
        }
        let transition = {
            let Ok(mut state) = self.state.lock() else {
                return;
            };
            let changed = if event.total == 0 {
                event.received >= state.last_received + UNKNOWN_TOTAL_STEP
            } else {
                state.last_percent != Some(event.percent)
            };
            if !changed {
                return;
            }
            state.last_percent = Some(event.percent);
            state.last_received = event.received;
            state.transition.clone()
        };

        redraw(&format!(
            "  {} {}  {}",
            name_column(&event.model).cyan(),
            transition.dark_grey(),
            format_progress(event.received, event.total, event.percent)
        ));
    }

    fn updated(&self, installed: &InstalledModel) {
        self.finish(&format!(
            "  {} {} {}",
            name_column(&installed.name).cyan(),
            format!("updated to {}", display_version(&installed.version)).green(),
            format!("({})", format_size(installed.bytes)).dark_grey()
        ));
    }

    fn failed(&self, name: &str, error: &UpdateError) {
        tracing::debug!(model = name, "update failed: {error}");
        let transition = self.transition();
        self.finish(&format!(
            "  {} {}  {}",
            name_column(name).cyan(),
            transition.dark_grey(),
            format!("failed: {}", error.kind()).red()
        ));
    }
}
