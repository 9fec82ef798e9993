// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Renders status events as plain text or JSON lines.

use crate::status::{Level, StatusEvent};

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly lines; verbose events only when asked for
    Normal { verbose: bool },
    /// One JSON object per event, for scripting
    Json,
}

/// Renders status events to stdout/stderr.
pub struct Output {
    mode: OutputMode,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self { mode }
    }

    /// Render one event, or nothing if the mode filters it out.
    pub fn render(&self, event: &StatusEvent) -> Option<String> {
        match self.mode {
            OutputMode::Json => serde_json::to_string(event).ok(),
            OutputMode::Normal { verbose } => match event.level {
                Level::Info => {
                    let mut line = event.message.clone();
                    if let Some(deployments) = &event.deployments {
                        for d in deployments {
                            line.push_str(&format!("\n  {} ({})", d.name, d.state_label()));
                        }
                    }
                    Some(line)
                }
                Level::Error => {
                    let mut line = format!("Error: {}", event.message);
                    if let Some(log) = &event.log {
                        for entry in log {
                            line.push_str("\n  ");
                            line.push_str(entry.trim_end());
                        }
                    }
                    Some(line)
                }
                Level::Verbose | Level::Debug if verbose => Some(event.message.clone()),
                Level::Verbose | Level::Debug => None,
            },
        }
    }

    /// Print an event. Errors go to stderr in normal mode.
    pub fn emit(&self, event: &StatusEvent) {
        let Some(line) = self.render(event) else {
            return;
        };
        if event.level == Level::Error && self.mode != OutputMode::Json {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
    }
}
