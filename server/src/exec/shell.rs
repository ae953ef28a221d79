//! Default shell inference

use tracing::{debug, warn};

use crate::gateway::RuntimeGateway;

/// Shell used for Windows containers
pub const WINDOWS_SHELL: &str = "powershell.exe";

/// Shell for a platform string as reported by the runtime
pub fn shell_for_platform<'a>(platform: &str, fallback: &'a str) -> &'a str {
    if platform.to_ascii_lowercase().contains("windows") {
        WINDOWS_SHELL
    } else {
        fallback
    }
}

/// Pick a shell by inspecting the container platform.
///
/// Best-effort: any inspection failure yields `fallback`.
pub async fn infer_shell(gateway: &dyn RuntimeGateway, container_id: &str, fallback: &str) -> String {
    match gateway.inspect_platform(container_id).await {
        Ok(platform) => {
            let shell = shell_for_platform(&platform, fallback);
            debug!(container_id, platform = %platform, shell, "Inferred default shell");
            shell.to_string()
        }
        Err(e) => {
            warn!(container_id, error = %e, "Failed to detect container platform, using default shell");
            fallback.to_string()
        }
    }
}

/// Split a shell string into the exec command
pub fn command_line(shell: &str) -> Vec<String> {
    shell.split_whitespace().map(str::to_string).collect()
}
