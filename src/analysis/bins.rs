// Turns PATH values into command names
//
// A value may hold several directories separated by ':'. Missing or
// unreadable directories are normal (modules point at software that isn't
// installed everywhere) so they are skipped quietly.

use std::ffi::CString;
use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use tracing::{debug, warn};

/// Scan every directory in a colon-separated `value`, appending the name of
/// each executable file to `bins`. No deduplication is done.
pub fn scan_path_value(value: &str, bins: &mut Vec<String>) {
    for dir in value.split(':').filter(|d| !d.is_empty()) {
        scan_dir(Path::new(dir), bins);
    }
}

fn scan_dir(dir: &Path, bins: &mut Vec<String>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("skipping {}: {}", dir.display(), e);
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();

        // follow symlinks, a link to a binary counts as the binary
        let metadata = match fs::metadata(&path) {
            Ok(m) => m,
            Err(e) => {
                warn!("couldn't stat {}: {}", path.display(), e);
                continue;
            }
        };

        if metadata.is_file() && is_executable(&path) {
            bins.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
}

/// Whether the current user may execute `path`, as the shell would decide.
fn is_executable(path: &Path) -> bool {
    let Ok(cpath) = CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };

    // SAFETY: cpath is a valid NUL-terminated string that outlives the call
    unsafe { libc::access(cpath.as_ptr(), libc::X_OK) == 0 }
}
