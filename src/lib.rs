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

//! shelltool: sandboxed script execution for LLM tool calls.
//!
//! [`get_sandbox_tool`] picks the OS-native sandbox (bubblewrap on Linux,
//! Seatbelt on macOS, AppContainer on Windows) and returns a
//! [`ToolDefinition`] the model-facing loop can advertise and call.

pub mod config;
pub mod core;
pub mod sandbox;
pub mod tool;

pub use crate::core::errors::SandboxError;
pub use crate::core::models::{ExecutionResult, ScriptRequest, Termination};
pub use crate::sandbox::{get_sandbox_tool, shell_tools, NetworkEnforcement, SandboxPolicy};
pub use crate::tool::{ToolContext, ToolDefinition};
