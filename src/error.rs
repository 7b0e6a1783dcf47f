//! Crate-wide error type.
//!
//! Mirrors the teacher's `SolcError` convention: one variant per failure kind
//! described in the specification's error handling section, each carrying
//! enough data to render a diagnostic later. Rendering itself is out of scope
//! for this crate.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DriverError>;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("'{0}' is not a valid driver name")]
    InvalidDriverName(String),

    #[error("a subcommand name was passed to the driver directly")]
    SubcommandPassedToDriver,

    #[error("unknown or missing subcommand '{0}'")]
    UnknownOrMissingSubcommand(String),

    #[error("invalid input file: {0}")]
    InvalidInput(PathBuf),

    #[error("no input files")]
    NoInputFiles,

    #[error("filename '{basename}' used twice: '{first}' and '{second}'")]
    TwoFilesSameName { basename: String, first: PathBuf, second: PathBuf },

    #[error("invalid value '{value}' for option '{option}'")]
    InvalidArgumentValue { option: String, value: String },

    #[error("option '{0}' and option '{1}' are mutually exclusive")]
    ConflictingOptions(String, String),

    #[error("option '{0}' requires option '{1}'")]
    OptionRequiresAnother(String, String),

    #[error("cannot specify -o when generating multiple output files")]
    CannotSpecifyOForMultipleOutputs,

    #[error("unable to load output file map at '{path}': {reason}")]
    UnableToLoadOutputFileMap { path: PathBuf, reason: String },

    #[error("malformed dependency info for module '{module_name}': {reason}")]
    MalformedModuleDependency { module_name: String, reason: String },

    #[error("missing dependency info for module '{0}'")]
    MissingModuleDependency(String),

    #[error("missing context hash for swift module dependency '{0}'")]
    MissingContextHashOnSwiftDependency(String),

    #[error("missing external dependency info for module '{0}'")]
    MissingExternalDependency(String),

    #[error("dependency scanning failed (exit code {code:?}): {message}")]
    DependencyScanningFailure { code: Option<i32>, message: String },

    #[error("unable to decode frontend target info: {0}")]
    UnableToDecodeFrontendTargetInfo(String),

    #[error("failed to retrieve frontend target info")]
    FailedToRetrieveFrontendTargetInfo,

    #[error("unable to read frontend target info")]
    UnableToReadFrontendTargetInfo,

    #[error("failed to run frontend to retrieve target info (exit {code:?}): {stderr}")]
    FailedToRunFrontendToRetrieveTargetInfo { code: Option<i32>, stderr: String },

    #[error("baseline generation requires a top-level module ('{0}' was given)")]
    BaselineGenerationRequiresTopLevelModule(String),

    #[error("missing profiling data at '{0}'")]
    MissingProfilingData(PathBuf),

    #[error("conditional compilation flag '{0}' has a redundant '-D' prefix")]
    ConditionalCompilationFlagHasRedundantPrefix(String),

    #[error("conditional compilation flag '{0}' is not a valid identifier")]
    ConditionalCompilationFlagIsNotValidIdentifier(String),

    #[error("frontend path '{0}' must be absolute")]
    RelativeFrontendPath(PathBuf),

    #[error("the integrated REPL has been removed")]
    IntegratedReplRemoved,

    #[error("two jobs declared the same output: {0}")]
    DuplicateJobOutput(String),

    #[error("module '{0}' participates in a dependency cycle")]
    ModuleDependencyCycle(String),

    #[error("I/O error at '{1}': {0}")]
    Io(#[source] std::io::Error, PathBuf),

    #[error("{0}")]
    Msg(String),
}

impl DriverError {
    pub fn io(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::Io(err, path.into())
    }

    pub fn msg(msg: impl Into<String>) -> Self {
        Self::Msg(msg.into())
    }
}
