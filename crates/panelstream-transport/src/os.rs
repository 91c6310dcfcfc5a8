//! Host permission checks for device nodes.

use std::path::Path;

/// Whether the current user can open a device node read/write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeAccess {
    Accessible,
    Denied,
    Missing,
}

#[cfg(unix)]
#[allow(unsafe_code)]
pub fn check_access(path: &Path) -> NodeAccess {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let Ok(c_path) = CString::new(path.as_os_str().as_bytes()) else {
        return NodeAccess::Missing;
    };
    // SAFETY: `c_path` is a NUL-terminated string that outlives the call;
    // access(2) only reads it.
    let rc = unsafe { libc::access(c_path.as_ptr(), libc::R_OK | libc::W_OK) };
    if rc == 0 {
        return NodeAccess::Accessible;
    }
    match std::io::Error::last_os_error().raw_os_error() {
        Some(libc::ENOENT) | Some(libc::ENOTDIR) => NodeAccess::Missing,
        _ => NodeAccess::Denied,
    }
}

#[cfg(not(unix))]
pub fn check_access(path: &Path) -> NodeAccess {
    match std::fs::metadata(path) {
        Ok(_) => NodeAccess::Accessible,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => NodeAccess::Denied,
        Err(_) => NodeAccess::Missing,
    }
}
