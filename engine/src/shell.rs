//! Shell detection and configuration for command execution.

use std::fmt;
use std::path::{Path, PathBuf};

use jobexec_types::ShellConfig;

/// Detected shell for command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedShell {
    /// Path or name of the shell binary.
    pub binary: PathBuf,
    /// Arguments to pass before the command (e.g., `["-c"]` or `["/C"]`).
    pub args: Vec<String>,
    /// Human-readable name for logging.
    pub name: String,
}

impl fmt::Display for DetectedShell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Pick the shell that runs job commands.
///
/// Priority:
/// - `global.shell` from the job file (if set)
/// - The platform's POSIX shell (`cmd` on Windows)
#[must_use]
pub fn detect_shell(config: Option<&ShellConfig>) -> DetectedShell {
    if let Some(cfg) = config
        && let Some(binary) = &cfg.binary
    {
        let args = cfg.args.clone().unwrap_or_else(|| default_args_for(binary));
        return DetectedShell {
            binary: PathBuf::from(binary),
            args,
            name: "configured".into(),
        };
    }

    detect_platform_shell()
}

/// Infer default args for a shell binary name.
fn default_args_for(binary: &str) -> Vec<String> {
    let name = Path::new(binary)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(binary)
        .to_lowercase();

    match name.as_str() {
        "cmd" => vec!["/C".to_string()],
        "pwsh" | "powershell" => vec!["-NoProfile".to_string(), "-Command".to_string()],
        // Most Unix shells use -c
        _ => vec!["-c".to_string()],
    }
}

#[cfg(windows)]
fn detect_platform_shell() -> DetectedShell {
    let comspec = std::env::var("ComSpec")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(r"C:\Windows\System32\cmd.exe"));
    DetectedShell {
        binary: comspec,
        args: vec!["/C".to_string()],
        name: "cmd".into(),
    }
}

#[cfg(not(windows))]
fn detect_platform_shell() -> DetectedShell {
    // Job files are written against POSIX sh, not the operator's login shell.
    let standard = Path::new("/bin/sh");
    let binary = if standard.exists() {
        standard.to_path_buf()
    } else {
        which::which("sh").unwrap_or_else(|_| standard.to_path_buf())
    };
    DetectedShell {
        binary,
        args: vec!["-c".to_string()],
        name: "sh".into(),
    }
}
