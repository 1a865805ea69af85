//! Game process detection

use std::path::Path;
use sysinfo::{ProcessRefreshKind, System, UpdateKind};
use tracing::trace;

/// Reports whether the game client is running
pub trait ProcessProbe {
    fn is_running(&mut self) -> bool;
}

/// Answers "is the game client running?" from the live process table
pub struct ProcessWatcher {
    target: String,
    system: System,
}

impl ProcessWatcher {
    pub fn new(process_name: &str) -> Self {
        Self {
            target: process_name.trim().to_ascii_lowercase(),
            system: System::new(),
        }
    }
}

impl ProcessProbe for ProcessWatcher {
    /// Re-query the process table
    fn is_running(&mut self) -> bool {
        self.system.refresh_processes_specifics(
            ProcessRefreshKind::new().with_exe(UpdateKind::OnlyIfNotSet),
        );

        let running = self
            .system
            .processes()
            .values()
            .any(|process| matches_target(&self.target, process.name(), process.exe()));

        trace!("Process '{}' running: {}", self.target, running);
        running
    }
}

/// Compare against both the process name and the executable file name.
/// Wine/Proton report truncated process names, so the exe path is the fallback.
fn matches_target(target: &str, name: &str, exe: Option<&Path>) -> bool {
    if target.is_empty() {
        return false;
    }
    if name.to_ascii_lowercase() == target {
        return true;
    }
    exe.and_then(|path| path.file_name())
        .map(|file| file.to_string_lossy().to_ascii_lowercase() == target)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET: &str = "fortniteclient-win64-shipping.exe";

    #[test]
    fn test_matches_process_name_case_insensitive() {
        assert!(matches_target(TARGET, "FortniteClient-Win64-Shipping.exe", None));
        assert!(!matches_target(TARGET, "FortniteLauncher.exe", None));
    }

    #[test]
    fn test_matches_exe_when_name_truncated() {
        let exe = Path::new("/games/Fortnite/Binaries/Win64/FortniteClient-Win64-Shipping.exe");
        assert!(matches_target(TARGET, "FortniteClient-", Some(exe)));
    }

    #[test]
    fn test_empty_target_never_matches() {
        assert!(!matches_target("", "", None));
    }

    #[test]
    fn test_unknown_process_not_running() {
        let mut watcher = ProcessWatcher::new("definitely-not-a-real-process-name.exe");
        assert!(!watcher.is_running());
    }
}
