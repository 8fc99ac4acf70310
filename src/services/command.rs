use crate::models::{AnalyzerConfig, GeneratorConfig};
use std::fmt;
use thiserror::Error;

/// Flag asking the generator to drop classes that no longer exist
pub const CLEANUP_CLASSES_FLAG: &str = "--cleanup-classes";

/// Flag asking the generator to drop arrows of removed classes
pub const CLEANUP_ARROWS_FLAG: &str = "--cleanup-arrows";

/// Errors that can occur while building the generator command
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("generate_uml.py path is not configured in UMLSettings")]
    ScriptPathNotConfigured,

    #[error("Python path is not configured in UMLSettings")]
    ToolPathNotConfigured,

    #[error("Output directory is not configured in CodeAnalyzerSettings")]
    InputDirectoryNotConfigured,

    #[error("Output directory is not configured in UMLSettings")]
    OutputDirectoryNotConfigured,
}

/// Ordered argument tokens passed to the generator script
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandLine {
    tokens: Vec<String>,
}

impl CommandLine {
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }
}

/// Tokens joined by single spaces, as written into the post-commit hook
impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tokens.join(" "))
    }
}

/// Interpreter plus the arguments it is launched with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub command_line: CommandLine,
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.program, self.command_line)
    }
}

/// Build the generator arguments.
///
/// Token order is fixed:
/// `<script> -i <analyzer output> -o <generator output> [--cleanup-classes] [--cleanup-arrows]`
pub fn build(
    analyzer: &AnalyzerConfig,
    generator: &GeneratorConfig,
) -> Result<CommandLine, CommandError> {
    let script = non_empty(&generator.generate_uml_path, CommandError::ScriptPathNotConfigured)?;
    let input = non_empty(
        &analyzer.output_directory,
        CommandError::InputDirectoryNotConfigured,
    )?;
    let output = non_empty(
        &generator.output_directory,
        CommandError::OutputDirectoryNotConfigured,
    )?;

    let mut tokens = vec![
        script.to_string(),
        "-i".to_string(),
        input.to_string(),
        "-o".to_string(),
        output.to_string(),
    ];

    if generator.cleanup_classes {
        tokens.push(CLEANUP_CLASSES_FLAG.to_string());
    }
    if generator.cleanup_arrows {
        tokens.push(CLEANUP_ARROWS_FLAG.to_string());
    }

    Ok(CommandLine { tokens })
}

/// Build the arguments and pair them with the configured interpreter
pub fn build_invocation(
    analyzer: &AnalyzerConfig,
    generator: &GeneratorConfig,
) -> Result<Invocation, CommandError> {
    let program = non_empty(&generator.python_path, CommandError::ToolPathNotConfigured)?;
    let command_line = build(analyzer, generator)?;

    Ok(Invocation {
        program: program.to_string(),
        command_line,
    })
}

fn non_empty(value: &str, error: CommandError) -> Result<&str, CommandError> {
    if value.trim().is_empty() {
        Err(error)
    } else {
        Ok(value)
    }
}
