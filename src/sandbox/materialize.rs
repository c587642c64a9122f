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

//! Temporary files and directories that live exactly as long as one
//! invocation. Deletion happens in `Drop`, so every exit path cleans up.

use crate::core::constants::materialize::PREFIX;
use crate::core::errors::SandboxError;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{TempDir, TempPath};
use tracing::{debug, warn};

/// UTF-8 byte order mark. Windows PowerShell 5.1 reads BOM-less scripts in
/// the ANSI code page.
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// A uniquely named file in the system temp directory, removed on drop.
#[derive(Debug)]
pub struct MaterializedFile {
    path: Option<TempPath>,
}

impl MaterializedFile {
    /// Write `content` to a new `shelltool.*<suffix>` file.
    pub fn write(content: &[u8], suffix: &str, what: &'static str) -> Result<Self, SandboxError> {
        Self::write_in(&std::env::temp_dir(), content, suffix, what)
    }

    pub fn write_in(
        dir: &Path,
        content: &[u8],
        suffix: &str,
        what: &'static str,
    ) -> Result<Self, SandboxError> {
        let err = |source| SandboxError::Materialize { what, source };

        let mut file = tempfile::Builder::new()
            .prefix(PREFIX)
            .suffix(suffix)
            .tempfile_in(dir)
            .map_err(err)?;
        file.write_all(content).map_err(err)?;
        file.flush().map_err(err)?;

        let path = file.into_temp_path();
        debug!(path = %path.display(), bytes = content.len(), "Materialized {}", what);
        Ok(Self { path: Some(path) })
    }

    pub fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or_else(|| Path::new(""))
    }
}

impl Drop for MaterializedFile {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            let shown = path.display().to_string();
            if let Err(e) = path.close() {
                warn!(path = %shown, error = %e, "Failed to remove temporary file");
            }
        }
    }
}

/// Per-invocation writable directory, removed recursively on drop.
#[derive(Debug)]
pub struct ScratchDir {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl ScratchDir {
    pub fn create() -> Result<Self, SandboxError> {
        Self::create_in(&std::env::temp_dir())
    }

    pub fn create_in(parent: &Path) -> Result<Self, SandboxError> {
        let err = |source| SandboxError::Materialize {
            what: "scratch directory",
            source,
        };
        let dir = tempfile::Builder::new()
            .prefix(PREFIX)
            .tempdir_in(parent)
            .map_err(err)?;
        // Sandbox rules match resolved paths (/var -> /private/var on macOS).
        let path = dunce_canonical(dir.path()).map_err(err)?;
        debug!(path = %path.display(), "Created scratch directory");
        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    /// Canonical path of the directory.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            if let Err(e) = dir.close() {
                warn!(path = %self.path.display(), error = %e, "Failed to remove scratch directory");
            }
        }
    }
}

/// `canonicalize` without the `\\?\` prefix on Windows, which PowerShell and
/// the ACL APIs handle poorly.
fn dunce_canonical(path: &Path) -> std::io::Result<PathBuf> {
    let canonical = path.canonicalize()?;
    #[cfg(windows)]
    {
        let s = canonical.to_string_lossy();
        if let Some(stripped) = s.strip_prefix(r"\\?\") {
            if !stripped.starts_with("UNC\\") {
                return Ok(PathBuf::from(stripped));
            }
        }
    }
    Ok(canonical)
}
