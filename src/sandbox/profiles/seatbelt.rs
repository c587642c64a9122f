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

//! Seatbelt (SBPL) profile for `sandbox-exec`.
//!
//! Deny-by-default: process execution and reads are allowed, writes only
//! under the given scratch directories, network only when requested.

use crate::sandbox::SandboxPolicy;
use std::fmt::Write;
use std::path::Path;

const HEADER: &str = r#"(version 1)

; Default policy: deny everything
(deny default)

; Allow process execution
(allow process-exec)
(allow process-fork)
(allow signal (target same-sandbox))

; Allow read-only access to files
(allow file-read*)

; Allow basic system services needed for execution
(allow sysctl-read)
(allow mach-lookup)

; Discarding output is always allowed
(allow file-write* (literal "/dev/null"))
"#;

/// Render the profile. Scratch paths must already be canonical: Seatbelt
/// matches resolved paths, so `/tmp` has to be given as `/private/tmp`.
pub fn profile<P: AsRef<Path>>(policy: &SandboxPolicy, scratch_dirs: &[P]) -> String {
    let mut out = String::from(HEADER);

    out.push_str("\n; Allow writes only under the scratch directories\n");
    for dir in scratch_dirs {
        let _ = writeln!(
            out,
            "(allow file-write* (subpath {}))",
            quote(&dir.as_ref().to_string_lossy())
        );
    }

    if policy.allow_network {
        out.push_str("\n; Network access requested\n(allow network*)\n(allow system-socket)\n");
    } else {
        out.push_str("\n; Deny all network access\n(deny network*)\n");
    }
    out
}

/// SBPL string literal.
fn quote(s: &str) -> String {
    let mut q = String::with_capacity(s.len() + 2);
    q.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            q.push('\\');
        }
        q.push(c);
    }
    q.push('"');
    q
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profile_denies_network_and_writes() {
        let text = profile(&SandboxPolicy::new(), &["/private/tmp"]);
        assert!(text.starts_with("(version 1)"));
        assert!(text.contains("(deny default)"));
        assert!(text.contains("(deny network*)"));
        assert!(!text.contains("(allow network*)"));
        assert!(text.contains(r#"(allow file-write* (subpath "/private/tmp"))"#));
    }

    #[test]
    fn test_network_clause_flips_with_policy() {
        let text = profile(&SandboxPolicy::new().allow_network(true), &["/private/tmp"]);
        assert!(text.contains("(allow network*)"));
        assert!(!text.contains("(deny network*)"));
    }

    #[test]
    fn test_every_scratch_dir_is_writable() {
        let text = profile(
            &SandboxPolicy::new(),
            &["/private/var/folders/xy/T/shelltool.abc", "/private/tmp"],
        );
        assert_eq!(text.matches("(subpath ").count(), 2);
    }

    #[test]
    fn test_paths_are_escaped() {
        assert_eq!(quote(r#"/tmp/a"b\c"#), r#""/tmp/a\"b\\c""#);
    }
}
