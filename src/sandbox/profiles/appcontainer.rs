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

//! AppContainer policy: capability set, profile naming, command line and
//! environment block. Kept free of Win32 calls so it builds everywhere.

use crate::core::constants::windows::{POWERSHELL_ARGS, PROFILE_PREFIX};
use crate::sandbox::SandboxPolicy;
use std::fmt;
use uuid::Uuid;

/// Well-known AppContainer capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    InternetClient,
    InternetClientServer,
    PrivateNetworkClientServer,
    PicturesLibrary,
    VideosLibrary,
    MusicLibrary,
    DocumentsLibrary,
    EnterpriseAuthentication,
    SharedUserCertificates,
    RemovableStorage,
}

impl Capability {
    pub const ALL: [Capability; 10] = [
        Capability::InternetClient,
        Capability::InternetClientServer,
        Capability::PrivateNetworkClientServer,
        Capability::PicturesLibrary,
        Capability::VideosLibrary,
        Capability::MusicLibrary,
        Capability::DocumentsLibrary,
        Capability::EnterpriseAuthentication,
        Capability::SharedUserCertificates,
        Capability::RemovableStorage,
    ];

    /// String form accepted by `ConvertStringSidToSidW`.
    pub fn sid(&self) -> &'static str {
        match self {
            Capability::InternetClient => "S-1-15-3-1",
            Capability::InternetClientServer => "S-1-15-3-2",
            Capability::PrivateNetworkClientServer => "S-1-15-3-3",
            Capability::PicturesLibrary => "S-1-15-3-4",
            Capability::VideosLibrary => "S-1-15-3-5",
            Capability::MusicLibrary => "S-1-15-3-6",
            Capability::DocumentsLibrary => "S-1-15-3-7",
            Capability::EnterpriseAuthentication => "S-1-15-3-8",
            Capability::SharedUserCertificates => "S-1-15-3-9",
            Capability::RemovableStorage => "S-1-15-3-10",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Capability::InternetClient => "internetClient",
            Capability::InternetClientServer => "internetClientServer",
            Capability::PrivateNetworkClientServer => "privateNetworkClientServer",
            Capability::PicturesLibrary => "picturesLibrary",
            Capability::VideosLibrary => "videosLibrary",
            Capability::MusicLibrary => "musicLibrary",
            Capability::DocumentsLibrary => "documentsLibrary",
            Capability::EnterpriseAuthentication => "enterpriseAuthentication",
            Capability::SharedUserCertificates => "sharedUserCertificates",
            Capability::RemovableStorage => "removableStorage",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.sid())
    }
}

/// Capabilities granted to the container. Nothing unless network is allowed,
/// and then only outbound client access.
pub fn capabilities_for(policy: &SandboxPolicy) -> Vec<Capability> {
    if policy.allow_network {
        vec![Capability::InternetClient]
    } else {
        Vec::new()
    }
}

/// Fresh profile name, so concurrent invocations never share a container.
pub fn profile_name() -> String {
    format!("{}{}", PROFILE_PREFIX, Uuid::new_v4().simple())
}

/// `"<powershell>" -NoLogo ... -File "<script>"`.
pub fn command_line(powershell: &str, script: &str) -> String {
    let mut parts = Vec::with_capacity(POWERSHELL_ARGS.len() + 3);
    parts.push(quote_arg(powershell, true));
    parts.extend(POWERSHELL_ARGS.iter().map(|a| a.to_string()));
    parts.push("-File".to_string());
    parts.push(quote_arg(script, true));
    parts.join(" ")
}

/// Quote one argument for `CommandLineToArgvW` rules: backslashes are literal
/// unless they precede a quote, in which case they are doubled.
pub fn quote_arg(arg: &str, force: bool) -> String {
    let needs_quotes = force
        || arg.is_empty()
        || arg.contains(|c: char| c == ' ' || c == '\t' || c == '\n' || c == '"');
    if !needs_quotes {
        return arg.to_string();
    }

    let mut out = String::with_capacity(arg.len() + 2);
    out.push('"');
    let mut backslashes = 0usize;
    for c in arg.chars() {
        match c {
            '\\' => backslashes += 1,
            '"' => {
                out.extend(std::iter::repeat('\\').take(backslashes * 2 + 1));
                out.push('"');
                backslashes = 0;
            }
            _ => {
                out.extend(std::iter::repeat('\\').take(backslashes));
                out.push(c);
                backslashes = 0;
            }
        }
    }
    out.extend(std::iter::repeat('\\').take(backslashes * 2));
    out.push('"');
    out
}

/// Parent environment with `overrides` applied. Names compare
/// case-insensitively, and the result is sorted the way
/// `CreateProcess` expects.
pub fn merge_environment<I>(base: I, overrides: &[(&str, String)]) -> Vec<(String, String)>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut vars: Vec<(String, String)> = base
        .into_iter()
        .filter(|(k, _)| !overrides.iter().any(|(o, _)| o.eq_ignore_ascii_case(k)))
        .collect();
    vars.extend(overrides.iter().map(|(k, v)| (k.to_string(), v.clone())));
    vars.sort_by_key(|(k, _)| k.to_uppercase());
    vars
}

/// UTF-16 `KEY=VALUE\0...\0\0` block for `CREATE_UNICODE_ENVIRONMENT`.
pub fn environment_block(vars: &[(String, String)]) -> Vec<u16> {
    let mut block = Vec::new();
    for (k, v) in vars {
        block.extend(k.encode_utf16());
        block.push(u16::from(b'='));
        block.extend(v.encode_utf16());
        block.push(0);
    }
    if block.is_empty() {
        block.push(0);
    }
    block.push(0);
    block
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_capability_only_when_allowed() {
        assert!(capabilities_for(&SandboxPolicy::new()).is_empty());
        assert_eq!(
            capabilities_for(&SandboxPolicy::new().allow_network(true)),
            vec![Capability::InternetClient]
        );
    }

    #[test]
    fn test_capability_sids_are_distinct() {
        let mut sids: Vec<_> = Capability::ALL.iter().map(|c| c.sid()).collect();
        sids.sort_unstable();
        sids.dedup();
        assert_eq!(sids.len(), Capability::ALL.len());
        assert_eq!(Capability::RemovableStorage.sid(), "S-1-15-3-10");
    }

    #[test]
    fn test_profile_names_are_unique() {
        let a = profile_name();
        let b = profile_name();
        assert!(a.starts_with("shelltool-"));
        assert_ne!(a, b);
        // AppContainer names are limited to 64 characters
        assert!(a.len() <= 64);
    }

    #[test]
    fn test_command_line_quotes_paths() {
        let line = command_line(
            r"C:\Windows\System32\WindowsPowerShell\v1.0\powershell.exe",
            r"C:\Users\Jane Doe\AppData\Local\Temp\shelltool.x.ps1",
        );
        assert_eq!(
            line,
            r#""C:\Windows\System32\WindowsPowerShell\v1.0\powershell.exe" -NoLogo -NoProfile -NonInteractive -ExecutionPolicy Bypass -File "C:\Users\Jane Doe\AppData\Local\Temp\shelltool.x.ps1""#
        );
    }

    #[test]
    fn test_quote_arg_backslash_rules() {
        assert_eq!(quote_arg("plain", false), "plain");
        assert_eq!(quote_arg("", false), "\"\"");
        assert_eq!(quote_arg(r"C:\dir\", true), r#""C:\dir\\""#);
        assert_eq!(quote_arg(r#"a\"b"#, false), r#""a\\\"b""#);
    }

    #[test]
    fn test_overrides_replace_case_insensitively() {
        let base = vec![
            ("Path".to_string(), r"C:\bin".to_string()),
            ("temp".to_string(), r"C:\old".to_string()),
            ("Lang".to_string(), "de_DE".to_string()),
        ];
        let merged = merge_environment(
            base,
            &[("LANG", "C".to_string()), ("TEMP", r"C:\scratch".to_string())],
        );
        assert_eq!(
            merged,
            vec![
                ("LANG".to_string(), "C".to_string()),
                ("Path".to_string(), r"C:\bin".to_string()),
                ("TEMP".to_string(), r"C:\scratch".to_string()),
            ]
        );
    }

    #[test]
    fn test_environment_block_is_double_nul_terminated() {
        let block = environment_block(&[("A".to_string(), "1".to_string())]);
        let expected: Vec<u16> = "A=1\0\0".encode_utf16().collect();
        assert_eq!(block, expected);
        assert_eq!(environment_block(&[]), vec![0, 0]);
    }
}
