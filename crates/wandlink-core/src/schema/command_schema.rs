//! The loaded command schema and structural validation.
//!
//! # Schema document
//!
//! ```json
//! {
//!   "commands": {
//!     "led":        { "parameters": ["color"],    "description": "Set LED colour" },
//!     "brightness": { "parameters": ["value"] },
//!     "vibrate":    { "parameters": ["duration_ms"] }
//!   }
//! }
//! ```
//!
//! Fetching this document is the caller's job; this module only parses it and
//! answers "is this command with these parameters acceptable?".

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::rules::{rule_for, ParamRule};

/// Reasons a command is rejected before anything is sent.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    /// The command name is not in the schema.
    #[error("unknown command `{0}`")]
    UnknownCommand(String),

    /// The number of parameters differs from the schema's parameter list.
    #[error("command `{command}` takes {expected} parameter(s), got {actual}")]
    ParamCountMismatch {
        command: String,
        expected: usize,
        actual: usize,
    },

    /// A parameter value failed its range rule.
    #[error("command `{command}` parameter {index} is out of range: {value:?}")]
    ParamRangeInvalid {
        command: String,
        index: usize,
        value: String,
    },
}

/// Errors that can occur while loading a schema document.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The schema file could not be read.
    #[error("I/O error reading command schema at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid schema JSON.
    #[error("failed to parse command schema JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Declaration of one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Parameter names, in wire order.  Only the count is enforced.
    #[serde(default)]
    pub parameters: Vec<String>,
    /// Human-readable description for UIs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// One rule per parameter, attached at load time.
    #[serde(skip)]
    rules: Vec<ParamRule>,
}

impl CommandSpec {
    /// Creates a spec with the given parameter names and no description.
    pub fn new<I, S>(parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            parameters: parameters.into_iter().map(Into::into).collect(),
            description: None,
            rules: Vec::new(),
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Number of parameters the command takes.
    pub fn param_count(&self) -> usize {
        self.parameters.len()
    }

    /// The rule attached to each parameter position.
    pub fn rules(&self) -> &[ParamRule] {
        &self.rules
    }
}

/// Command name → declaration, shared read-only once loaded.
///
/// # Examples
///
/// ```rust
/// use wandlink_core::CommandSchema;
///
/// let schema = CommandSchema::builtin();
/// assert!(schema.is_valid("brightness", &["128"]));
/// assert!(!schema.is_valid("brightness", &["300"]));
/// assert!(!schema.is_valid("teleport", &["now"]));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSchema {
    #[serde(default)]
    commands: BTreeMap<String, CommandSpec>,
}

impl CommandSchema {
    /// The command set the current controller firmware understands.
    pub fn builtin() -> Self {
        Self::from_specs([
            (
                "led",
                CommandSpec::new(["color"])
                    .with_description("Set the LED colour (name or 6-digit hex)"),
            ),
            (
                "brightness",
                CommandSpec::new(["value"]).with_description("Set LED brightness, 0-255"),
            ),
            (
                "vibrate",
                CommandSpec::new(["duration_ms"])
                    .with_description("Run the vibration motor for N milliseconds"),
            ),
            (
                "spring_param",
                CommandSpec::new(["hex"]).with_description("Set spring parameters as 6 hex digits"),
            ),
        ])
    }

    /// Builds a schema from `(name, spec)` pairs and attaches range rules.
    pub fn from_specs<I, S>(specs: I) -> Self
    where
        I: IntoIterator<Item = (S, CommandSpec)>,
        S: Into<String>,
    {
        Self {
            commands: specs.into_iter().map(|(n, s)| (n.into(), s)).collect(),
        }
        .with_rules()
    }

    /// Parses a schema document.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Parse`] if the text is not a valid schema document.
    pub fn from_json_str(json: &str) -> Result<Self, SchemaError> {
        let schema: CommandSchema = serde_json::from_str(json)?;
        debug!("loaded command schema: {:?}", schema.command_names());
        Ok(schema.with_rules())
    }

    /// Reads and parses a schema document from disk.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Io`] if the file cannot be read and
    /// [`SchemaError::Parse`] if its content is invalid.
    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Checks a command against the schema.
    ///
    /// # Errors
    ///
    /// Returns the first [`CommandError`] found: unknown name, then parameter
    /// count, then per-parameter range.
    pub fn validate<S: AsRef<str>>(&self, command: &str, params: &[S]) -> Result<(), CommandError> {
        let spec = self
            .commands
            .get(command)
            .ok_or_else(|| CommandError::UnknownCommand(command.to_string()))?;

        if params.len() != spec.param_count() {
            return Err(CommandError::ParamCountMismatch {
                command: command.to_string(),
                expected: spec.param_count(),
                actual: params.len(),
            });
        }

        for (index, (rule, value)) in spec.rules.iter().zip(params).enumerate() {
            let value: &str = value.as_ref();
            if !rule.accepts(value) {
                return Err(CommandError::ParamRangeInvalid {
                    command: command.to_string(),
                    index,
                    value: value.to_string(),
                });
            }
        }

        Ok(())
    }

    /// Boolean form of [`validate`](Self::validate).
    pub fn is_valid<S: AsRef<str>>(&self, command: &str, params: &[S]) -> bool {
        self.validate(command, params).is_ok()
    }

    /// All command names, sorted.
    pub fn command_names(&self) -> Vec<String> {
        self.commands.keys().cloned().collect()
    }

    /// The declaration of one command.
    pub fn command_info(&self, command: &str) -> Option<&CommandSpec> {
        self.commands.get(command)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    fn with_rules(mut self) -> Self {
        for (name, spec) in &mut self.commands {
            spec.rules = (0..spec.param_count()).map(|i| rule_for(name, i)).collect();
        }
        self
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
