// ABOUTME: Diagnostics accumulator for non-fatal warnings during deployment.
// ABOUTME: Collects warnings that shouldn't fail a deploy but should be reported.

/// Collects non-fatal warnings during deployment operations.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!("{}", warning.message);
        self.warnings.push(warning);
    }

    /// Get all collected warnings.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Check if any warnings were collected.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// A non-fatal warning collected during deployment.
#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    /// More than one plugin claims exclusive handling.
    pub fn multiple_exclusive_plugins(names: &[&str]) -> Self {
        Self {
            kind: WarningKind::MultipleExclusivePlugins,
            message: format!(
                "more than one exclusive plugin installed ({}); only the first to handle a hook wins",
                names.join(", ")
            ),
        }
    }

    /// A volume entry that could not be parsed.
    pub fn invalid_volume(spec: &str) -> Self {
        Self {
            kind: WarningKind::InvalidVolume,
            message: format!("ignoring invalid volume `{}` (expected source:dest)", spec),
        }
    }

    /// Hostname that is not a valid network alias.
    pub fn invalid_hostname(hostname: &str, reason: impl std::fmt::Display) -> Self {
        Self {
            kind: WarningKind::InvalidHostname,
            message: format!("ignoring hostname `{}`: {}", hostname, reason),
        }
    }

    /// Image inspection for exposed ports failed.
    pub fn port_introspection(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::PortIntrospection,
            message: message.into(),
        }
    }
}

/// Categories of warnings that can occur during deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// Several plugins set `exclusive`.
    MultipleExclusivePlugins,
    /// Malformed `volumes` entry, skipped.
    InvalidVolume,
    /// `hostname` rejected as a network alias.
    InvalidHostname,
    /// Could not read exposed ports, default port used.
    PortIntrospection,
}
