use async_trait::async_trait;

/// Host capability for reading pasted text, behind a trait so the session
/// flow stays testable without a real clipboard.
#[async_trait]
pub trait ClipboardReader: Send + Sync {
    async fn read_text(&self) -> anyhow::Result<String>;
}

pub struct SystemClipboardReader;

#[async_trait]
impl ClipboardReader for SystemClipboardReader {
    async fn read_text(&self) -> anyhow::Result<String> {
        #[cfg(target_os = "macos")]
        {
            read_command_output("pbpaste", &[]).await
        }

        #[cfg(target_os = "linux")]
        {
            read_text_linux().await
        }

        #[cfg(target_os = "windows")]
        {
            read_command_output(
                "powershell",
                &["-NoProfile", "-NonInteractive", "-Command", "Get-Clipboard"],
            )
            .await
        }
    }
}

async fn read_command_output(program: &str, args: &[&str]) -> anyhow::Result<String> {
    let output = tokio::process::Command::new(program)
        .args(args)
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow::anyhow!("{} failed: {}", program, stderr));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

#[cfg(target_os = "linux")]
async fn read_text_linux() -> anyhow::Result<String> {
    if let Ok(text) = read_command_output("xclip", &["-selection", "clipboard", "-o"]).await {
        return Ok(text);
    }
    tracing::debug!("[clipboard] xclip not usable, trying xsel");

    if let Ok(text) = read_command_output("xsel", &["--clipboard", "--output"]).await {
        return Ok(text);
    }
    tracing::debug!("[clipboard] xsel not usable, trying wl-paste");

    if let Ok(text) = read_command_output("wl-paste", &["--no-newline"]).await {
        return Ok(text);
    }

    Err(anyhow::anyhow!(
        "No clipboard tool found (tried xclip, xsel, wl-paste)"
    ))
}
