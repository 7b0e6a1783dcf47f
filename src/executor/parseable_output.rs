//! Newline-framed JSON parseable-output event stream (§6): the executor's
//! sole delegate-facing wire format.

use std::io::Write as _;

use serde::Serialize;

use crate::error::{DriverError, Result};
use crate::path::TypedPath;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ParseableEvent {
    Began {
        pid: i64,
        #[serde(rename = "realPid")]
        real_pid: u32,
        inputs: Vec<String>,
        outputs: Vec<ParseableOutput>,
        #[serde(rename = "commandExecutable")]
        command_executable: String,
        #[serde(rename = "commandArguments")]
        command_arguments: Vec<String>,
    },
    Finished {
        #[serde(rename = "exitStatus")]
        exit_status: i32,
        pid: i64,
        #[serde(rename = "realPid")]
        real_pid: u32,
        output: Option<String>,
    },
    Signalled {
        pid: i64,
        #[serde(rename = "realPid")]
        real_pid: u32,
        output: Option<String>,
        #[serde(rename = "errorMessage")]
        error_message: String,
        signal: i32,
    },
    Abnormal {
        pid: i64,
        #[serde(rename = "realPid")]
        real_pid: u32,
        output: Option<String>,
        exception: u32,
    },
    Skipped {
        inputs: Vec<String>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ParseableOutput {
    pub path: String,
    #[serde(rename = "type")]
    pub file_type: String,
}

impl From<&TypedPath> for ParseableOutput {
    fn from(p: &TypedPath) -> Self {
        Self { path: p.key(), file_type: format!("{:?}", p.file_type).to_lowercase() }
    }
}

/// Frames one event as `<decimal-byte-length>\n<json>\n` and writes it to `w`.
pub fn write_event<W: std::io::Write>(w: &mut W, event: &ParseableEvent) -> Result<()> {
    let json = serde_json::to_string(event).map_err(|e| DriverError::msg(e.to_string()))?;
    write!(w, "{}\n{}\n", json.len(), json).map_err(|e| DriverError::io(e, std::path::PathBuf::new()))?;
    w.flush().map_err(|e| DriverError::io(e, std::path::PathBuf::new()))
}
