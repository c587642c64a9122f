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

//! Windows: PowerShell inside an AppContainer, launched with a restricted
//! token, with stdio over anonymous pipes.
//!
//! Every kernel object is owned by a guard so cleanup happens in `Drop` on
//! all paths: profile deletion, SID frees, handle closes, job close.

use async_trait::async_trait;
use std::ffi::{c_void, OsStr};
use std::os::windows::ffi::OsStrExt;
use std::os::windows::io::{FromRawHandle, RawHandle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use win32job::Job;

use windows::core::{BOOL, PCWSTR, PWSTR};
use windows::Win32::Foundation::{
    CloseHandle, LocalFree, SetHandleInformation, ERROR_ALREADY_EXISTS, HANDLE,
    HANDLE_FLAGS, HANDLE_FLAG_INHERIT, HLOCAL, WIN32_ERROR,
};
use windows::Win32::Security::Authorization::{
    ConvertStringSidToSidW, GetNamedSecurityInfoW, SetEntriesInAclW, SetNamedSecurityInfoW,
    EXPLICIT_ACCESS_W, GRANT_ACCESS, NO_MULTIPLE_TRUSTEE, SE_FILE_OBJECT, TRUSTEE_IS_SID,
    TRUSTEE_IS_UNKNOWN, TRUSTEE_W,
};
use windows::Win32::Security::Isolation::{CreateAppContainerProfile, DeleteAppContainerProfile};
use windows::Win32::Security::{
    CreateRestrictedToken, FreeSid, ACE_FLAGS, ACL, DACL_SECURITY_INFORMATION,
    DISABLE_MAX_PRIVILEGE, LUA_TOKEN, NO_INHERITANCE, PSECURITY_DESCRIPTOR, PSID,
    SECURITY_ATTRIBUTES, SECURITY_CAPABILITIES, SID_AND_ATTRIBUTES,
    SUB_CONTAINERS_AND_OBJECTS_INHERIT, TOKEN_ALL_ACCESS,
};
use windows::Win32::System::Pipes::CreatePipe;
use windows::Win32::System::Threading::{
    CreateProcessAsUserW, DeleteProcThreadAttributeList, GetCurrentProcess, GetExitCodeProcess,
    InitializeProcThreadAttributeList, OpenProcessToken, ResumeThread, TerminateProcess,
    UpdateProcThreadAttribute, WaitForSingleObject, CREATE_NO_WINDOW, CREATE_SUSPENDED,
    CREATE_UNICODE_ENVIRONMENT, EXTENDED_STARTUPINFO_PRESENT, INFINITE,
    LPPROC_THREAD_ATTRIBUTE_LIST, PROCESS_INFORMATION, PROC_THREAD_ATTRIBUTE_HANDLE_LIST,
    PROC_THREAD_ATTRIBUTE_SECURITY_CAPABILITIES, STARTF_USESTDHANDLES, STARTUPINFOEXW,
    STARTUPINFOW,
};

use crate::core::constants::env::{LOCALE_VARS, WINDOWS_TEMP_VARS};
use crate::core::constants::materialize::POWERSHELL_SUFFIX;
use crate::core::constants::tool::NAME_POWERSHELL;
use crate::core::constants::windows::{
    DEFAULT_SYSTEM_ROOT, POWERSHELL_RELATIVE, PROFILE_DESCRIPTION, PROFILE_DISPLAY_NAME,
    PROFILE_PREFIX,
};
use crate::core::errors::{SandboxError, SetupStage};
use crate::core::models::{ExecutionResult, Termination};
use crate::sandbox::materialize::{MaterializedFile, ScratchDir, UTF8_BOM};
use crate::sandbox::output::OutputCollector;
use crate::sandbox::profiles::appcontainer::{self, Capability};
use crate::sandbox::{NetworkEnforcement, SandboxPolicy, SandboxStrategy};
use crate::tool::ToolContext;

const DESCRIPTION: &str = "Execute a PowerShell script in a sandbox. The script runs in a \
fresh working directory, which is also $env:TEMP, and can write only there. Network access \
may be disabled. stdout and stderr are merged.";

/// READ_CONTROL | SYNCHRONIZE | FILE_GENERIC_READ | FILE_GENERIC_EXECUTE
const READ_MASK: u32 = 0x1200a9;
/// READ_MASK | FILE_GENERIC_WRITE | DELETE
const MODIFY_MASK: u32 = 0x1301bf;
/// Not exported as a plain integer by the bindings
const SE_GROUP_ENABLED: u32 = 0x4;

pub struct AppContainerStrategy {
    powershell: PathBuf,
    policy: SandboxPolicy,
}

impl AppContainerStrategy {
    pub fn locate(policy: SandboxPolicy) -> Result<Self, SandboxError> {
        let root = std::env::var("SystemRoot").unwrap_or_else(|_| DEFAULT_SYSTEM_ROOT.to_string());
        let powershell = Path::new(&root).join(POWERSHELL_RELATIVE);
        if !powershell.is_file() {
            return Err(SandboxError::Unavailable(format!(
                "{} not found",
                powershell.display()
            )));
        }
        Ok(Self { powershell, policy })
    }
}

#[async_trait]
impl SandboxStrategy for AppContainerStrategy {
    fn name(&self) -> &'static str {
        NAME_POWERSHELL
    }

    fn description(&self) -> &'static str {
        DESCRIPTION
    }

    fn policy(&self) -> &SandboxPolicy {
        &self.policy
    }

    fn network_enforcement(&self) -> NetworkEnforcement {
        NetworkEnforcement::CapabilityOmission
    }

    fn describe_policy(&self) -> String {
        let capabilities = appcontainer::capabilities_for(&self.policy);
        let caps = if capabilities.is_empty() {
            "none".to_string()
        } else {
            capabilities
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        format!(
            "AppContainer {}<uuid>, restricted token (DISABLE_MAX_PRIVILEGE | LUA_TOKEN)\n\
             capabilities: {}\n\
             command: {}",
            PROFILE_PREFIX,
            caps,
            appcontainer::command_line(&self.powershell.to_string_lossy(), "<script>.ps1"),
        )
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        script: &str,
    ) -> Result<ExecutionResult, SandboxError> {
        let scratch = ScratchDir::create()?;
        let mut body = UTF8_BOM.to_vec();
        body.extend_from_slice(script.as_bytes());
        let script_file = MaterializedFile::write(&body, POWERSHELL_SUFFIX, "script")?;

        let container = ContainerProfile::create(&appcontainer::profile_name())?;
        container.grant(scratch.path(), MODIFY_MASK, SUB_CONTAINERS_AND_OBJECTS_INHERIT)?;
        container.grant(script_file.path(), READ_MASK, NO_INHERITANCE)?;

        let command_line = appcontainer::command_line(
            &self.powershell.to_string_lossy(),
            &script_file.path().to_string_lossy(),
        );
        let scratch_str = scratch.path().to_string_lossy().into_owned();
        let mut overrides: Vec<(&str, String)> = LOCALE_VARS
            .iter()
            .map(|(k, v)| (*k, v.to_string()))
            .collect();
        overrides.extend(WINDOWS_TEMP_VARS.iter().map(|k| (*k, scratch_str.clone())));
        let vars = appcontainer::merge_environment(
            std::env::vars_os().map(|(k, v)| {
                (
                    k.to_string_lossy().into_owned(),
                    v.to_string_lossy().into_owned(),
                )
            }),
            &overrides,
        );
        let env_block = appcontainer::environment_block(&vars);

        debug!(command_line = %command_line, "Launching AppContainer process");
        let interrupted = ctx.interrupted();
        let Launched {
            mut child,
            stdout,
            stderr,
        } = launch(
            &container,
            &appcontainer::capabilities_for(&self.policy),
            &command_line,
            &env_block,
            scratch.path(),
        )?;
        let collector = OutputCollector::spawn(stdout, stderr);

        let outcome = tokio::select! {
            code = child.wait() => Ok(code),
            interrupt = interrupted => Err(interrupt),
        };

        match outcome {
            Ok(Ok(code)) => {
                child.close_job();
                let output = collector.finish().await;
                Ok(ExecutionResult::new(output, Termination::Exited(code as i32)))
            }
            Ok(Err(e)) => {
                child.terminate();
                child.close_job();
                Err(e)
            }
            Err(interrupt) => {
                child.terminate();
                let _ = child.wait().await;
                child.close_job();
                let output = collector.finish().await;
                Err(interrupt.into_error(output))
            }
        }
    }
}

// ------------------------------------------------------------------
// Guards
// ------------------------------------------------------------------

/// Owned kernel handle, closed on drop.
struct HandleGuard(HANDLE);

// SAFETY: kernel handles may be used and closed from any thread.
unsafe impl Send for HandleGuard {}
unsafe impl Sync for HandleGuard {}

impl HandleGuard {
    fn raw(&self) -> HANDLE {
        self.0
    }

    fn into_file(self) -> tokio::fs::File {
        let raw = self.0 .0 as RawHandle;
        std::mem::forget(self);
        // SAFETY: ownership of the handle moves into the File.
        unsafe { tokio::fs::File::from_raw_handle(raw) }
    }
}

impl Drop for HandleGuard {
    fn drop(&mut self) {
        if !self.0.is_invalid() {
            // SAFETY: the handle is owned and closed exactly once.
            unsafe {
                let _ = CloseHandle(self.0);
            }
        }
    }
}

/// A per-invocation AppContainer profile; deleted on drop.
struct ContainerProfile {
    name: String,
    wide_name: Vec<u16>,
    sid: PSID,
}

// SAFETY: the SID buffer is owned by this value and never shared mutably.
unsafe impl Send for ContainerProfile {}
unsafe impl Sync for ContainerProfile {}

impl ContainerProfile {
    fn create(name: &str) -> Result<Self, SandboxError> {
        let wide_name = to_wide(OsStr::new(name));
        let display = to_wide(OsStr::new(PROFILE_DISPLAY_NAME));
        let description = to_wide(OsStr::new(PROFILE_DESCRIPTION));
        let err = |e: windows::core::Error| SandboxError::setup(SetupStage::AppContainerProfile, e);

        let create = || unsafe {
            CreateAppContainerProfile(
                PCWSTR(wide_name.as_ptr()),
                PCWSTR(display.as_ptr()),
                PCWSTR(description.as_ptr()),
                None,
            )
        };

        let sid = match create() {
            Ok(sid) => sid,
            Err(e) if e.code() == ERROR_ALREADY_EXISTS.to_hresult() => {
                debug!(profile = name, "AppContainer profile exists, recreating");
                unsafe { DeleteAppContainerProfile(PCWSTR(wide_name.as_ptr())) }.map_err(err)?;
                create().map_err(err)?
            }
            Err(e) => return Err(err(e)),
        };
        debug!(profile = name, "Created AppContainer profile");

        Ok(Self {
            name: name.to_string(),
            wide_name,
            sid,
        })
    }

    /// Add an allow ACE for this container's SID to `path`.
    fn grant(&self, path: &Path, mask: u32, inheritance: ACE_FLAGS) -> Result<(), SandboxError> {
        // SAFETY: the SID stays valid for the lifetime of self.
        unsafe { grant_path_access_with_mask(path, self.sid, mask, inheritance) }
            .map_err(|message| SandboxError::setup(SetupStage::AccessGrant, message))
    }
}

impl Drop for ContainerProfile {
    fn drop(&mut self) {
        // SAFETY: the SID came from CreateAppContainerProfile and is freed once.
        unsafe {
            if !self.sid.0.is_null() {
                let _ = FreeSid(self.sid);
            }
            if let Err(e) = DeleteAppContainerProfile(PCWSTR(self.wide_name.as_ptr())) {
                warn!(profile = %self.name, error = %e, "Failed to delete AppContainer profile");
            }
        }
    }
}

/// Capability SIDs converted from their string form, freed on drop.
struct CapabilitySids {
    entries: Vec<SID_AND_ATTRIBUTES>,
}

impl CapabilitySids {
    fn convert(capabilities: &[Capability]) -> Result<Self, SandboxError> {
        let mut sids = Self {
            entries: Vec::with_capacity(capabilities.len()),
        };
        for capability in capabilities {
            let wide = to_wide(OsStr::new(capability.sid()));
            let mut sid = PSID::default();
            unsafe { ConvertStringSidToSidW(PCWSTR(wide.as_ptr()), &mut sid) }
                .map_err(|e| SandboxError::setup(SetupStage::Policy, format!("{capability}: {e}")))?;
            sids.entries.push(SID_AND_ATTRIBUTES {
                Sid: sid,
                Attributes: SE_GROUP_ENABLED,
            });
        }
        Ok(sids)
    }

    fn as_mut_ptr(&mut self) -> *mut SID_AND_ATTRIBUTES {
        if self.entries.is_empty() {
            std::ptr::null_mut()
        } else {
            self.entries.as_mut_ptr()
        }
    }

    fn len(&self) -> u32 {
        self.entries.len() as u32
    }
}

impl Drop for CapabilitySids {
    fn drop(&mut self) {
        for entry in &self.entries {
            // SAFETY: allocated by ConvertStringSidToSidW, freed once.
            unsafe {
                let _ = LocalFree(Some(HLOCAL(entry.Sid.0)));
            }
        }
    }
}

/// PROC_THREAD_ATTRIBUTE_LIST storage; deleted on drop.
struct AttributeList {
    // usize-backed for pointer alignment
    buf: Vec<usize>,
}

impl AttributeList {
    fn new(count: u32) -> Result<Self, SandboxError> {
        let mut size = 0usize;
        // SAFETY: sizing call; fails by design with ERROR_INSUFFICIENT_BUFFER.
        unsafe {
            let _ = InitializeProcThreadAttributeList(None, count, Some(0), &mut size);
        }
        let words = size.div_ceil(std::mem::size_of::<usize>());
        let mut list = Self {
            buf: vec![0usize; words.max(1)],
        };
        unsafe { InitializeProcThreadAttributeList(Some(list.as_raw()), count, Some(0), &mut size) }
            .map_err(|e| {
                // Nothing to delete yet
                list.buf.clear();
                SandboxError::setup(SetupStage::AttributeList, e)
            })?;
        Ok(list)
    }

    fn as_raw(&mut self) -> LPPROC_THREAD_ATTRIBUTE_LIST {
        LPPROC_THREAD_ATTRIBUTE_LIST(self.buf.as_mut_ptr() as *mut c_void)
    }

    /// SAFETY: `value` must stay valid until the process is created.
    unsafe fn update(
        &mut self,
        attribute: u32,
        value: *const c_void,
        size: usize,
    ) -> Result<(), SandboxError> {
        UpdateProcThreadAttribute(
            self.as_raw(),
            0,
            attribute as usize,
            Some(value),
            size,
            None,
            None,
        )
        .map_err(|e| SandboxError::setup(SetupStage::AttributeList, e))
    }
}

impl Drop for AttributeList {
    fn drop(&mut self) {
        if !self.buf.is_empty() {
            // SAFETY: initialized in new().
            unsafe { DeleteProcThreadAttributeList(self.as_raw()) };
        }
    }
}

/// The running child. Terminated on drop unless it already exited; closing
/// the job kills anything it spawned.
struct SandboxedChild {
    process: Arc<HandleGuard>,
    job: Option<Job>,
    exited: bool,
}

// SAFETY: the job handle is only closed, never shared.
unsafe impl Send for SandboxedChild {}

impl SandboxedChild {
    async fn wait(&mut self) -> Result<u32, SandboxError> {
        let process = Arc::clone(&self.process);
        let code = tokio::task::spawn_blocking(move || unsafe {
            WaitForSingleObject(process.raw(), INFINITE);
            let mut code = 0u32;
            GetExitCodeProcess(process.raw(), &mut code).map(|_| code)
        })
        .await
        .map_err(|e| SandboxError::setup(SetupStage::Wait, e))?
        .map_err(|e| SandboxError::setup(SetupStage::Wait, e))?;
        self.exited = true;
        Ok(code)
    }

    fn terminate(&self) {
        // SAFETY: the process handle is open for the lifetime of self.
        if let Err(e) = unsafe { TerminateProcess(self.process.raw(), 1) } {
            debug!(error = %e, "TerminateProcess failed");
        }
    }

    fn close_job(&mut self) {
        if self.job.take().is_some() {
            debug!("Closed job object");
        }
    }
}

impl Drop for SandboxedChild {
    fn drop(&mut self) {
        if !self.exited {
            self.terminate();
        }
    }
}

struct Launched {
    child: SandboxedChild,
    stdout: tokio::fs::File,
    stderr: tokio::fs::File,
}

// ------------------------------------------------------------------
// Launch
// ------------------------------------------------------------------

fn launch(
    container: &ContainerProfile,
    capabilities: &[Capability],
    command_line: &str,
    env_block: &[u16],
    cwd: &Path,
) -> Result<Launched, SandboxError> {
    let mut caps = CapabilitySids::convert(capabilities)?;
    let token = restricted_token()?;

    let (stdin_read, stdin_write) = create_pipe()?;
    let (stdout_read, stdout_write) = create_pipe()?;
    let (stderr_read, stderr_write) = create_pipe()?;
    for parent_end in [&stdin_write, &stdout_read, &stderr_read] {
        unsafe { SetHandleInformation(parent_end.raw(), HANDLE_FLAG_INHERIT.0, HANDLE_FLAGS(0)) }
            .map_err(|e| SandboxError::setup(SetupStage::Pipe, e))?;
    }

    let mut security_capabilities = SECURITY_CAPABILITIES {
        AppContainerSid: container.sid,
        Capabilities: caps.as_mut_ptr(),
        CapabilityCount: caps.len(),
        Reserved: 0,
    };
    // Only these handles are inherited, so concurrent invocations never
    // receive each other's pipe ends.
    let inherited = [stdin_read.raw(), stdout_write.raw(), stderr_write.raw()];

    let mut attributes = AttributeList::new(2)?;
    // SAFETY: both values are locals that outlive CreateProcessAsUserW below.
    unsafe {
        attributes.update(
            PROC_THREAD_ATTRIBUTE_SECURITY_CAPABILITIES,
            &mut security_capabilities as *mut _ as *const c_void,
            std::mem::size_of::<SECURITY_CAPABILITIES>(),
        )?;
        attributes.update(
            PROC_THREAD_ATTRIBUTE_HANDLE_LIST,
            inherited.as_ptr() as *const c_void,
            std::mem::size_of_val(&inherited),
        )?;
    }

    let si = STARTUPINFOEXW {
        StartupInfo: STARTUPINFOW {
            cb: std::mem::size_of::<STARTUPINFOEXW>() as u32,
            dwFlags: STARTF_USESTDHANDLES,
            hStdInput: stdin_read.raw(),
            hStdOutput: stdout_write.raw(),
            hStdError: stderr_write.raw(),
            ..Default::default()
        },
        lpAttributeList: attributes.as_raw(),
    };

    let mut cmd_line_w: Vec<u16> = command_line
        .encode_utf16()
        .chain(std::iter::once(0))
        .collect();
    let cwd_w = to_wide(cwd.as_os_str());
    let mut pi = PROCESS_INFORMATION::default();

    // Suspended, so the job owns the process before it runs any code
    unsafe {
        CreateProcessAsUserW(
            Some(token.raw()),
            PCWSTR::null(),
            Some(PWSTR(cmd_line_w.as_mut_ptr())),
            None,
            None,
            true,
            EXTENDED_STARTUPINFO_PRESENT
                | CREATE_SUSPENDED
                | CREATE_NO_WINDOW
                | CREATE_UNICODE_ENVIRONMENT,
            Some(env_block.as_ptr() as *const c_void),
            PCWSTR(cwd_w.as_ptr()),
            &si.StartupInfo,
            &mut pi,
        )
    }
    .map_err(|e| SandboxError::setup(SetupStage::ProcessCreation, e))?;

    let thread = HandleGuard(pi.hThread);
    let mut child = SandboxedChild {
        process: Arc::new(HandleGuard(pi.hProcess)),
        job: None,
        exited: false,
    };
    child.job = Some(kill_on_close_job(&child.process)?);

    if unsafe { ResumeThread(thread.raw()) } == u32::MAX {
        return Err(SandboxError::setup(
            SetupStage::ProcessCreation,
            std::io::Error::last_os_error(),
        ));
    }

    // The child holds its own copies now; ours would keep the pipes open.
    drop(stdin_read);
    drop(stdout_write);
    drop(stderr_write);
    // Closing the write end gives the child EOF on stdin.
    drop(stdin_write);

    Ok(Launched {
        child,
        stdout: stdout_read.into_file(),
        stderr: stderr_read.into_file(),
    })
}

fn restricted_token() -> Result<HandleGuard, SandboxError> {
    let err = |e: windows::core::Error| SandboxError::setup(SetupStage::Token, e);
    let mut current = HANDLE::default();
    unsafe { OpenProcessToken(GetCurrentProcess(), TOKEN_ALL_ACCESS, &mut current) }.map_err(err)?;
    let current = HandleGuard(current);

    let mut restricted = HANDLE::default();
    unsafe {
        CreateRestrictedToken(
            current.raw(),
            DISABLE_MAX_PRIVILEGE | LUA_TOKEN,
            None,
            None,
            None,
            &mut restricted,
        )
    }
    .map_err(err)?;
    Ok(HandleGuard(restricted))
}

/// Anonymous pipe with both ends inheritable: (read, write).
fn create_pipe() -> Result<(HandleGuard, HandleGuard), SandboxError> {
    let sa = SECURITY_ATTRIBUTES {
        nLength: std::mem::size_of::<SECURITY_ATTRIBUTES>() as u32,
        lpSecurityDescriptor: std::ptr::null_mut(),
        bInheritHandle: BOOL::from(true),
    };
    let mut read = HANDLE::default();
    let mut write = HANDLE::default();
    unsafe { CreatePipe(&mut read, &mut write, Some(&sa), 0) }
        .map_err(|e| SandboxError::setup(SetupStage::Pipe, e))?;
    Ok((HandleGuard(read), HandleGuard(write)))
}

fn kill_on_close_job(process: &HandleGuard) -> Result<Job, SandboxError> {
    let err = |e: win32job::JobError| SandboxError::setup(SetupStage::ProcessCreation, e);
    let job = Job::create().map_err(err)?;
    let mut info = job.query_extended_limit_info().map_err(err)?;
    info.limit_kill_on_job_close();
    job.set_extended_limit_info(&info).map_err(err)?;
    job.assign_process(process.raw().0 as isize).map_err(err)?;
    Ok(job)
}

fn to_wide(s: &OsStr) -> Vec<u16> {
    s.encode_wide().chain(std::iter::once(0)).collect()
}

unsafe fn grant_path_access_with_mask(
    path: &Path,
    sid: PSID,
    mask: u32,
    inheritance: ACE_FLAGS,
) -> Result<(), String> {
    let path_w = to_wide(path.as_os_str());
    let pcwstr_path = PCWSTR(path_w.as_ptr());

    let mut old_acl: *mut ACL = std::ptr::null_mut();
    let mut sd = PSECURITY_DESCRIPTOR::default();
    let res = GetNamedSecurityInfoW(
        pcwstr_path,
        SE_FILE_OBJECT,
        DACL_SECURITY_INFORMATION,
        None,
        None,
        Some(&mut old_acl),
        None,
        &mut sd,
    );
    if res != WIN32_ERROR(0) {
        return Err(format!(
            "reading DACL of {}: {:?}",
            path.display(),
            res
        ));
    }

    let explicit = EXPLICIT_ACCESS_W {
        grfAccessPermissions: mask,
        grfAccessMode: GRANT_ACCESS,
        grfInheritance: inheritance,
        Trustee: TRUSTEE_W {
            TrusteeForm: TRUSTEE_IS_SID,
            TrusteeType: TRUSTEE_IS_UNKNOWN,
            ptstrName: PWSTR(sid.0 as *mut _),
            pMultipleTrustee: std::ptr::null_mut(),
            MultipleTrusteeOperation: NO_MULTIPLE_TRUSTEE,
        },
    };

    let mut new_acl: *mut ACL = std::ptr::null_mut();
    let res = SetEntriesInAclW(Some(&[explicit]), Some(old_acl), &mut new_acl);
    if res != WIN32_ERROR(0) {
        if !sd.is_invalid() {
            let _ = LocalFree(Some(HLOCAL(sd.0)));
        }
        return Err(format!("merging ACL for {}: {:?}", path.display(), res));
    }

    let res = SetNamedSecurityInfoW(
        pcwstr_path,
        SE_FILE_OBJECT,
        DACL_SECURITY_INFORMATION,
        None,
        None,
        Some(new_acl),
        None,
    );

    if !sd.is_invalid() {
        let _ = LocalFree(Some(HLOCAL(sd.0)));
    }
    if !new_acl.is_null() {
        let _ = LocalFree(Some(HLOCAL(new_acl as *mut _)));
    }

    if res != WIN32_ERROR(0) {
        return Err(format!("writing DACL of {}: {:?}", path.display(), res));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_sids_convert_and_free() {
        let mut sids =
            CapabilitySids::convert(&[Capability::InternetClient, Capability::RemovableStorage])
                .unwrap();
        assert_eq!(sids.len(), 2);
        assert!(!sids.as_mut_ptr().is_null());

        let mut none = CapabilitySids::convert(&[]).unwrap();
        assert_eq!(none.len(), 0);
        assert!(none.as_mut_ptr().is_null());
    }

    #[test]
    fn test_restricted_token_and_pipes() {
        let token = restricted_token().unwrap();
        assert!(!token.raw().is_invalid());
        let (read, write) = create_pipe().unwrap();
        assert!(!read.raw().is_invalid());
        assert!(!write.raw().is_invalid());
    }
}
