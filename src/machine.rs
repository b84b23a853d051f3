// Local machine identity: hardware serial number and audit id.

use std::path::Path;
#[cfg(any(target_os = "macos", target_os = "windows"))]
use std::process::Command;

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum MachineError {
    #[error("failed to run {program}: {source}")]
    Command {
        program: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("the operating system reported no hardware serial number")]
    NoSerial,
}

/// What the resolver knows about this machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineIdentity {
    pub serial: String,
    pub audit_id: Option<String>,
}

impl MachineIdentity {
    /// Read the serial (unless overridden) and the optional audit id file.
    pub fn detect(
        serial_override: Option<String>,
        audit_id_file: Option<&Path>,
    ) -> Result<Self, MachineError> {
        let serial = match serial_override {
            Some(serial) => serial.trim().to_string(),
            None => hardware_serial()?,
        };
        let audit_id = match audit_id_file {
            Some(path) => read_audit_id(path)?,
            None => None,
        };
        debug!(%serial, audit_id = audit_id.as_deref().unwrap_or("-"), "machine identity");
        Ok(Self { serial, audit_id })
    }
}

/// Audit id stored in `path`, or `None` if the file does not exist or holds
/// no value.
pub fn read_audit_id(path: &Path) -> Result<Option<String>, MachineError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(parse_audit_id(&contents)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no audit id file");
            Ok(None)
        }
        Err(source) => Err(MachineError::Read { path: path.display().to_string(), source }),
    }
}

/// Accepts either a bare id or an `AuditID=<id>` line. Blank lines and
/// `#`/`;` comments are ignored.
pub fn parse_audit_id(contents: &str) -> Option<String> {
    let lines = contents
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#') && !l.starts_with(';'));

    for line in lines {
        let value = match line.split_once('=') {
            Some((key, value)) if key.trim().eq_ignore_ascii_case("auditid") => value,
            Some(_) => continue,
            None => line,
        };
        let value = value.trim().trim_matches('"');
        if !value.is_empty() {
            return Some(value.to_string());
        }
    }
    None
}

#[cfg(target_os = "linux")]
fn hardware_serial() -> Result<String, MachineError> {
    const PATH: &str = "/sys/class/dmi/id/product_serial";
    let raw = std::fs::read_to_string(PATH)
        .map_err(|source| MachineError::Read { path: PATH.to_string(), source })?;
    non_empty(raw.trim())
}

#[cfg(target_os = "macos")]
fn hardware_serial() -> Result<String, MachineError> {
    let output = Command::new("ioreg")
        .args(["-c", "IOPlatformExpertDevice", "-d", "2"])
        .output()
        .map_err(|source| MachineError::Command { program: "ioreg", source })?;
    let text = String::from_utf8_lossy(&output.stdout);
    parse_ioreg_serial(&text).ok_or(MachineError::NoSerial)
}

#[cfg(target_os = "windows")]
fn hardware_serial() -> Result<String, MachineError> {
    let output = Command::new("powershell")
        .args([
            "-NoProfile",
            "-NonInteractive",
            "-Command",
            "(Get-CimInstance Win32_BIOS).SerialNumber",
        ])
        .output()
        .map_err(|source| MachineError::Command { program: "powershell", source })?;
    non_empty(String::from_utf8_lossy(&output.stdout).trim())
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn hardware_serial() -> Result<String, MachineError> {
    Err(MachineError::NoSerial)
}

#[cfg(any(target_os = "linux", target_os = "windows", test))]
fn non_empty(serial: &str) -> Result<String, MachineError> {
    if serial.is_empty() {
        Err(MachineError::NoSerial)
    } else {
        Ok(serial.to_string())
    }
}

/// Pull `IOPlatformSerialNumber` out of `ioreg` output.
#[cfg(any(target_os = "macos", test))]
fn parse_ioreg_serial(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let (key, value) = line.split_once('=')?;
        if !key.contains("\"IOPlatformSerialNumber\"") {
            return None;
        }
        let value = value.trim().trim_matches('"').trim();
        (!value.is_empty()).then(|| value.to_string())
    })
}
