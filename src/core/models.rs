// Copyright 2026 BadCompany
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::core::errors::SandboxError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Arguments supplied by the model for one tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptRequest {
    /// Full script body, or a single command line.
    #[serde(alias = "command_line")]
    pub script: String,
}

impl ScriptRequest {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
        }
    }

    /// Parse the raw JSON arguments of a tool call.
    pub fn from_json(arguments: &str) -> Result<Self, SandboxError> {
        Ok(serde_json::from_str(arguments)?)
    }
}

/// How the child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    /// Normal exit with the given code. Windows codes are stored bit-for-bit.
    Exited(i32),
    /// Killed by a signal (unix only).
    Signaled(i32),
}

impl Termination {
    pub fn success(&self) -> bool {
        matches!(self, Termination::Exited(0))
    }

    /// Process exit status to propagate from the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Termination::Exited(code) if (0..=255).contains(code) => *code,
            Termination::Signaled(sig) => 128 + sig,
            Termination::Exited(_) => 1,
        }
    }
}

impl From<std::process::ExitStatus> for Termination {
    fn from(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(sig) = status.signal() {
                return Termination::Signaled(sig);
            }
        }
        Termination::Exited(status.code().unwrap_or(-1))
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Exited(code) if (0..=255).contains(code) => {
                write!(f, "exit code {}", code)
            }
            Termination::Exited(code) => write!(f, "exit code 0x{:08x}", *code as u32),
            Termination::Signaled(sig) => write!(f, "terminated by signal {}", sig),
        }
    }
}

/// Merged output of one invocation and how the child ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub output: String,
    pub termination: Termination,
}

impl ExecutionResult {
    pub fn new(output: Vec<u8>, termination: Termination) -> Self {
        Self {
            output: String::from_utf8_lossy(&output).into_owned(),
            termination,
        }
    }

    pub fn success(&self) -> bool {
        self.termination.success()
    }

    /// Collapse into the tool-call result: the output on success, otherwise an
    /// error that still carries the output.
    pub fn into_result(self) -> Result<String, SandboxError> {
        if self.success() {
            Ok(self.output)
        } else {
            Err(SandboxError::Execution {
                termination: self.termination,
                output: self.output,
            })
        }
    }
}
