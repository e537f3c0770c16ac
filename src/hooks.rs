use tokio::process::Command;

/// Run a user-configured shell command in the background.
///
/// `args` are passed as positional parameters (`$1`, `$2`, ...) so they never
/// need quoting; `env` entries are exported to the command.
pub fn run_hook(label: &str, command: &str, args: Vec<String>, env: Vec<(&'static str, String)>) {
    let label = label.to_owned();
    let script = format!("{} \"$@\"", command);

    tokio::task::spawn(async move {
        tracing::debug!("[{}] Running hook: {}", label, script);

        match Command::new("sh")
            .arg("-c")
            .arg(&script)
            .arg("styleshot")
            .args(&args)
            .envs(env)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::piped())
            .spawn()
        {
            Ok(child) => match child.wait_with_output().await {
                Ok(output) => {
                    if !output.status.success() {
                        let stderr = String::from_utf8_lossy(&output.stderr);
                        tracing::warn!(
                            "[{}] Hook exited with {}: {}",
                            label,
                            output.status,
                            stderr.trim()
                        );
                    }
                }
                Err(e) => tracing::warn!("[{}] Failed to wait on hook: {}", label, e),
            },
            Err(e) => tracing::warn!("[{}] Failed to spawn hook: {}", label, e),
        }
    });
}
