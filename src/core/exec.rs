//! Helpers for driving external tools.

use std::process::ExitStatus;

/// Exit code of a finished child, using the shell convention `128 + signal`
/// for processes killed by a signal.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}

/// Last non-empty line of a tool's stderr, for one-line error messages.
///
/// The full output belongs in the log; callers only need the gist.
pub fn last_line(stderr: &[u8]) -> String {
    String::from_utf8_lossy(stderr)
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("no output")
        .to_string()
}
