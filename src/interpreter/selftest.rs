// src/interpreter/selftest.rs

//! Post-install self-test

use super::exec::run_shell;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Run a formula's test command against an install root
///
/// The command runs in `install_root` with `path` as its `PATH`. A formula
/// without a test command passes trivially. Failure is reported, never
/// raised: the install has already happened by the time this runs.
pub fn self_test(install_root: &Path, command: Option<&str>, path: String, timeout: Duration) -> bool {
    let Some(command) = command else {
        info!("No self-test defined");
        return true;
    };

    info!("Self-test: {}", command);
    let env = [("PATH".to_string(), path)];

    match run_shell(command, install_root, &env, timeout) {
        Ok(output) if output.success() => {
            if let Some(first) = output.stdout.lines().next() {
                info!("Self-test passed: {}", first);
            } else {
                info!("Self-test passed");
            }
            true
        }
        Ok(output) => {
            let reason = match output.code() {
                Some(code) => format!("exit code {}", code),
                None => "timed out or killed by signal".to_string(),
            };
            warn!("Self-test failed ({}): {}", reason, output.stderr.trim());
            false
        }
        Err(e) => {
            warn!("Self-test could not run: {}", e);
            false
        }
    }
}
