//! Worker process plumbing: scheduling priority, process title, and
//! privilege reduction. All of it is best effort; nothing here may stop a
//! plugin from running.

use std::ffi::CString;
use std::io;
use tracing::debug;

/// Outcome of a privilege-drop attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropOutcome {
    /// Privileges were dropped
    Dropped,
    /// The process was not privileged to begin with; expected, not a failure
    NotPrivileged,
    /// The drop failed for another reason
    Failed(String),
}

/// Lower the worker's scheduling priority. Failures are logged, never fatal.
pub(crate) fn renice_worker() {
    clear_errno();
    let rv = unsafe { libc::nice(-5) };
    if rv == -1 {
        // -1 is a legal return value of nice(); only errno decides.
        let err = io::Error::last_os_error();
        if err.raw_os_error().unwrap_or(0) != 0 {
            debug!(error = %err, "Unable to renice worker");
        }
    }
}

fn clear_errno() {
    #[cfg(target_os = "linux")]
    unsafe {
        *libc::__errno_location() = 0;
    }
}

/// Set the externally visible process title. Operational visibility only;
/// silently best effort.
pub(crate) fn set_process_title(title: &str) {
    #[cfg(target_os = "linux")]
    {
        // PR_SET_NAME truncates to 15 bytes.
        if let Ok(name) = CString::new(title.as_bytes().to_vec()) {
            unsafe {
                libc::prctl(libc::PR_SET_NAME, name.as_ptr() as libc::c_ulong, 0, 0, 0);
            }
        }
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = title;
    }
}

/// Drop root privileges by switching to the `nobody` user.
///
/// A process that is not running as root reports
/// [`DropOutcome::NotPrivileged`], which callers treat as an expected
/// non-failure. Any other failure is reported but must not abort the
/// plugin run.
pub(crate) fn drop_privileges() -> DropOutcome {
    if unsafe { libc::geteuid() } != 0 {
        return DropOutcome::NotPrivileged;
    }

    let (uid, gid) = nobody_ids();

    if unsafe { libc::setgid(gid) } != 0 {
        return DropOutcome::Failed(format!("setgid({gid}): {}", io::Error::last_os_error()));
    }
    if unsafe { libc::setgroups(0, std::ptr::null()) } != 0 {
        return DropOutcome::Failed(format!("setgroups: {}", io::Error::last_os_error()));
    }
    if unsafe { libc::setuid(uid) } != 0 {
        return DropOutcome::Failed(format!("setuid({uid}): {}", io::Error::last_os_error()));
    }

    DropOutcome::Dropped
}

/// Resolve the `nobody` account, falling back to the conventional ids when
/// the lookup is unavailable (static binaries, stripped-down containers).
fn nobody_ids() -> (libc::uid_t, libc::gid_t) {
    const FALLBACK: (libc::uid_t, libc::gid_t) = (65534, 65534);

    let Ok(name) = CString::new("nobody") else {
        return FALLBACK;
    };
    let pw = unsafe { libc::getpwnam(name.as_ptr()) };
    if pw.is_null() {
        return FALLBACK;
    }
    unsafe { ((*pw).pw_uid, (*pw).pw_gid) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unprivileged_drop_is_expected() {
        // Test suites do not run as root; the classification must be the
        // silent non-failure case.
        if unsafe { libc::geteuid() } != 0 {
            assert_eq!(drop_privileges(), DropOutcome::NotPrivileged);
        }
    }

    #[test]
    fn test_process_title_is_best_effort() {
        set_process_title("moray: testing host (plugin)");
        set_process_title("");
    }
}
