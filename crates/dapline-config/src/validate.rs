use crate::config::{Config, TransportKind};
use crate::error::ConfigError;

/// Smallest accepted `connection.max_frame_bytes`.
pub const MIN_FRAME_BYTES: usize = 64;

/// Validate a [`Config`], returning all detected violations.
///
/// Returns `Ok(())` when the config is valid, or `Err` with a
/// vector of every validation error found.
pub fn validate(config: &Config) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let conn = &config.connection;

    match conn.transport {
        TransportKind::Tcp => {
            if conn.port == 0 {
                errors.push(violation("connection.port", "must be non-zero for tcp"));
            }
            if conn.host.trim().is_empty() {
                errors.push(violation("connection.host", "must not be empty for tcp"));
            }
        }
        TransportKind::Spawn => {
            if conn.program.as_deref().map_or(true, |p| p.trim().is_empty()) {
                errors.push(violation("connection.program", "required for spawn"));
            }
        }
    }

    if conn.max_frame_bytes < MIN_FRAME_BYTES {
        errors.push(violation(
            "connection.max_frame_bytes",
            format!(
                "must be \u{2265} {MIN_FRAME_BYTES}, got {}",
                conn.max_frame_bytes
            ),
        ));
    }

    for (i, step) in config.scenario.steps.iter().enumerate() {
        if step.command.trim().is_empty() {
            errors.push(violation(
                format!("scenario.steps[{i}].command"),
                "must not be empty",
            ));
        }
        if step
            .wait_for_event
            .as_deref()
            .is_some_and(|e| e.trim().is_empty())
        {
            errors.push(violation(
                format!("scenario.steps[{i}].wait_for_event"),
                "must not be empty when set",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn violation(field: impl Into<String>, message: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        message: message.into(),
    }
}
