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

//! shelltool Constants - Single source of truth for names, paths and env vars.

/// Tool surface exposed to the tool-call loop
pub mod tool {
    /// Tool name on Linux (bubblewrap + bash)
    pub const NAME_BASH: &str = "bash";
    /// Tool name on macOS (sandbox-exec + zsh)
    pub const NAME_ZSH: &str = "zsh";
    /// Tool name on Windows (AppContainer + PowerShell)
    pub const NAME_POWERSHELL: &str = "powershell";
    /// Required string field of the argument object
    pub const ARG_SCRIPT: &str = "script";
    /// Accepted in place of `script`, never together with it
    pub const ARG_COMMAND_LINE: &str = "command_line";
}

/// Child process environment
pub mod env {
    /// Locale forced in every child, so tool output parses the same on
    /// non-English hosts
    pub const LOCALE_VARS: &[(&str, &str)] = &[("LANG", "C"), ("LC_ALL", "C")];
    /// Scratch directory variable on unix
    pub const TMPDIR: &str = "TMPDIR";
    /// Scratch directory variables on Windows
    pub const WINDOWS_TEMP_VARS: &[&str] = &["TMP", "TEMP"];
}

/// Temporary file naming
pub mod materialize {
    /// Prefix shared by every file and directory this crate creates
    pub const PREFIX: &str = "shelltool.";
    /// Suffix of the Seatbelt profile file
    pub const PROFILE_SUFFIX: &str = ".sb";
    /// Suffix of POSIX shell scripts
    pub const SHELL_SUFFIX: &str = ".sh";
    /// Suffix of PowerShell scripts
    pub const POWERSHELL_SUFFIX: &str = ".ps1";
}

/// Linux namespace sandbox
pub mod linux {
    /// Bubblewrap executable, looked up on PATH
    pub const BWRAP: &str = "bwrap";
    /// Interpreter run inside the namespace
    pub const SHELL: &str = "bash";
    /// Writable tmpfs mounted inside the namespace
    pub const SCRATCH_DIR: &str = "/tmp";
}

/// macOS Seatbelt sandbox
pub mod macos {
    /// Sandbox enforcement binary, looked up on `PATH`
    pub const SANDBOX_EXEC: &str = "sandbox-exec";
    /// Interpreter run under the profile, looked up on `PATH`
    pub const SHELL: &str = "zsh";
    /// Host-shared temporary directory kept writable (resolved form of /tmp)
    pub const SHARED_TMP: &str = "/private/tmp";
}

/// Windows AppContainer sandbox
pub mod windows {
    /// Prefix of the per-invocation AppContainer profile name
    pub const PROFILE_PREFIX: &str = "shelltool-";
    /// Display name of the AppContainer profile
    pub const PROFILE_DISPLAY_NAME: &str = "shelltool sandbox";
    /// Description of the AppContainer profile
    pub const PROFILE_DESCRIPTION: &str = "Restricted container for LLM-requested scripts";
    /// Interpreter path relative to %SystemRoot%
    pub const POWERSHELL_RELATIVE: &str = r"System32\WindowsPowerShell\v1.0\powershell.exe";
    /// Fallback when %SystemRoot% is unset
    pub const DEFAULT_SYSTEM_ROOT: &str = r"C:\Windows";
    /// Arguments placed before `-File <script>`
    pub const POWERSHELL_ARGS: &[&str] = &[
        "-NoLogo",
        "-NoProfile",
        "-NonInteractive",
        "-ExecutionPolicy",
        "Bypass",
    ];
}

/// Output collection
pub mod output {
    /// Read size of each pipe reader
    pub const READ_CHUNK: usize = 4096;
    /// Chunks buffered between the readers and the merger
    pub const CHANNEL_DEPTH: usize = 64;
    /// How long a killed child's pipes may keep draining before the readers
    /// are abandoned
    pub const DRAIN_GRACE: std::time::Duration = std::time::Duration::from_millis(250);
}

/// Configuration environment variables
pub mod config {
    pub const ENV_LOG_LEVEL: &str = "SHELLTOOL_LOG_LEVEL";
    pub const ENV_LOG_FORMAT: &str = "SHELLTOOL_LOG_FORMAT";
    pub const ENV_ALLOW_NETWORK: &str = "SHELLTOOL_ALLOW_NETWORK";
    pub const ENV_TIMEOUT_SECS: &str = "SHELLTOOL_TIMEOUT_SECS";
    pub const ENV_CONFIG_PATH: &str = "SHELLTOOL_CONFIG";
}
