//! Platform-specific atomic swap operations

use crate::io::error::InboxError;
use std::path::Path;

#[cfg(any(target_os = "linux", target_os = "macos"))]
use std::ffi::CString;

/// Atomically exchange two files
///
/// After the swap, `path1` holds what was in `path2` and vice versa. Both
/// files must exist.
///
/// - **macOS**: `renamex_np(from, to, RENAME_SWAP)`
/// - **Linux**: `renameat2(AT_FDCWD, from, AT_FDCWD, to, RENAME_EXCHANGE)`
/// - **Elsewhere**: three renames through a temporary name (not atomic)
pub fn atomic_swap(path1: &Path, path2: &Path) -> Result<(), InboxError> {
    #[cfg(target_os = "macos")]
    {
        macos_atomic_swap(path1, path2)
    }

    #[cfg(target_os = "linux")]
    {
        linux_atomic_swap(path1, path2)
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        rename_through_temp(path1, path2)
    }
}

#[cfg(any(target_os = "linux", target_os = "macos"))]
fn c_path(path: &Path) -> Result<CString, InboxError> {
    use std::os::unix::ffi::OsStrExt;

    CString::new(path.as_os_str().as_bytes()).map_err(|_| InboxError::InvalidPath {
        path: path.to_path_buf(),
    })
}

#[cfg(target_os = "macos")]
fn macos_atomic_swap(path1: &Path, path2: &Path) -> Result<(), InboxError> {
    use libc::{c_char, c_int, c_uint};

    const RENAME_SWAP: c_uint = 0x00000002;

    unsafe extern "C" {
        fn renamex_np(from: *const c_char, to: *const c_char, flags: c_uint) -> c_int;
    }

    let from = c_path(path1)?;
    let to = c_path(path2)?;

    let result = unsafe { renamex_np(from.as_ptr(), to.as_ptr(), RENAME_SWAP) };
    if result == 0 {
        Ok(())
    } else {
        Err(InboxError::io(path1, std::io::Error::last_os_error()))
    }
}

#[cfg(target_os = "linux")]
fn linux_atomic_swap(path1: &Path, path2: &Path) -> Result<(), InboxError> {
    use libc::{AT_FDCWD, c_char, c_int};

    const RENAME_EXCHANGE: c_int = 1 << 1;

    unsafe extern "C" {
        fn renameat2(
            olddirfd: c_int,
            oldpath: *const c_char,
            newdirfd: c_int,
            newpath: *const c_char,
            flags: c_int,
        ) -> c_int;
    }

    let from = c_path(path1)?;
    let to = c_path(path2)?;

    let result =
        unsafe { renameat2(AT_FDCWD, from.as_ptr(), AT_FDCWD, to.as_ptr(), RENAME_EXCHANGE) };
    if result == 0 {
        Ok(())
    } else {
        Err(InboxError::io(path1, std::io::Error::last_os_error()))
    }
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
fn rename_through_temp(path1: &Path, path2: &Path) -> Result<(), InboxError> {
    use std::fs;

    let temp_path = path1.with_extension("swap_temp");

    fs::rename(path1, &temp_path).map_err(|e| InboxError::io(path1, e))?;
    if let Err(e) = fs::rename(path2, path1) {
        let _ = fs::rename(&temp_path, path1);
        return Err(InboxError::io(path2, e));
    }
    fs::rename(&temp_path, path2).map_err(|e| InboxError::io(&temp_path, e))
}
