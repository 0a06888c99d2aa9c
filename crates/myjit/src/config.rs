//! Session configuration.

use std::fmt;
use std::str::FromStr;

use crate::error::SessionError;
use crate::optimizer::Pipeline;

/// Configuration for a compilation session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Cranelift code generation optimization level.
    pub opt_level: OptLevel,
    /// IR passes run over every defined function before code generation.
    pub pipeline: Pipeline,
    /// Run Cranelift's verifier inside code generation and after every pass.
    /// Every function is still verified once before optimization, so
    /// invalid IR is reported as an error even when this is off.
    pub enable_verifier: bool,
    /// Raw Cranelift setting overrides, applied after everything above.
    pub flags: Vec<(String, String)>,
}

impl SessionConfig {
    /// Add a raw Cranelift setting override.
    pub fn with_flag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.flags.push((name.into(), value.into()));
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            opt_level: OptLevel::Speed,
            pipeline: Pipeline::default(),
            enable_verifier: true,
            flags: Vec::new(),
        }
    }
}

/// Cranelift's `opt_level` setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptLevel {
    None,
    #[default]
    Speed,
    SpeedAndSize,
}

impl OptLevel {
    /// The setting value Cranelift expects.
    pub const fn as_str(self) -> &'static str {
        match self {
            OptLevel::None => "none",
            OptLevel::Speed => "speed",
            OptLevel::SpeedAndSize => "speed_and_size",
        }
    }
}

impl fmt::Display for OptLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptLevel {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(OptLevel::None),
            "speed" => Ok(OptLevel::Speed),
            "speed_and_size" | "speed-and-size" => Ok(OptLevel::SpeedAndSize),
            other => Err(SessionError::UnknownOptLevel(other.to_string())),
        }
    }
}
