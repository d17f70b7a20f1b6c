//! Delivers outbound replies through the bridged messaging CLI — a port of
//! the source system's `WhatsAppSender`, generalized to whichever
//! `--channel` the operator configures (see `SenderConfig::channel`)
//! instead of a hardcoded "whatsapp" string.

use std::time::Duration;

use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::warn;

pub struct Sender {
    cli: String,
    channel: String,
    chunk_size: usize,
    timeout: Duration,
    /// Serializes CLI invocations the way the original's `asyncio.Lock` did
    /// — the bridging CLI itself isn't safe for concurrent invocation.
    lock: Mutex<()>,
}

impl Sender {
    pub fn new(cli_command: impl Into<String>, channel: impl Into<String>, chunk_size: usize, timeout_secs: u64) -> Self {
        Self {
            cli: cli_command.into(),
            channel: channel.into(),
            chunk_size,
            timeout: Duration::from_secs(timeout_secs),
            lock: Mutex::new(()),
        }
    }

    pub async fn send_text(&self, target: &str, message: &str, quote_id: Option<&str>) -> bool {
        let mut args = vec![
            "message",
            "send",
            "--channel",
            &self.channel,
            "--target",
            target,
            "--message",
            message,
            "--json",
        ];
        if let Some(id) = quote_id {
            args.push("--quote");
            args.push(id);
        }
        self.run_cli(&args, &format!("send to {target}"), self.timeout, false).await
    }

    pub async fn send_typing(&self, target: &str) {
        let args = [
            "message",
            "send",
            "--channel",
            &self.channel,
            "--target",
            target,
            "--action",
            "typing_on",
        ];
        self.run_cli(&args, &format!("typing to {target}"), Duration::from_secs(5), true).await;
    }

    pub async fn send_seen(&self, target: &str, message_id: &str) {
        let args = [
            "message",
            "send",
            "--channel",
            &self.channel,
            "--target",
            target,
            "--action",
            "mark_read",
            "--id",
            message_id,
        ];
        self.run_cli(&args, &format!("seen to {target}"), Duration::from_secs(5), true).await;
    }

    /// Split messages over `chunk_size` at the nearest natural break point
    /// (blank line, newline, then space) before sending sequentially. Only
    /// the first chunk carries `quote_id`, matching the original's reply
    /// threading onto the opening message of a multi-part answer.
    pub async fn send_long_message(&self, target: &str, message: &str, quote_id: Option<&str>) -> bool {
        if message.len() <= self.chunk_size {
            return self.send_text(target, message, quote_id).await;
        }

        let chunks = split_message(message, self.chunk_size);
        let last = chunks.len() - 1;
        for (i, chunk) in chunks.iter().enumerate() {
            let quote = if i == 0 { quote_id } else { None };
            if !self.send_text(target, chunk, quote).await {
                warn!(target, chunk = i + 1, total = chunks.len(), "failed on chunk");
                return false;
            }
            if i < last {
                tokio::time::sleep(Duration::from_millis(800)).await;
            }
        }
        true
    }

    /// Smoke-test the bridging CLI with `--dry-run`, for `/whatsapp/loop-test`.
    /// Returns whether the round trip succeeded and how long it took.
    pub async fn dry_run(&self, target: &str) -> (bool, Duration) {
        let args = [
            "message",
            "send",
            "--channel",
            &self.channel,
            "--target",
            target,
            "--message",
            "loop-test",
            "--json",
            "--dry-run",
        ];
        let start = std::time::Instant::now();
        let ok = self.run_cli(&args, &format!("dry-run to {target}"), self.timeout, false).await;
        (ok, start.elapsed())
    }

    async fn run_cli(&self, args: &[&str], context: &str, timeout: Duration, silent: bool) -> bool {
        let _guard = self.lock.lock().await;
        let result = tokio::time::timeout(timeout, Command::new(&self.cli).args(args).output()).await;

        match result {
            Ok(Ok(output)) if output.status.success() => {
                if !silent {
                    tracing::info!(context, "cli ok");
                }
                true
            }
            Ok(Ok(output)) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                if !silent {
                    warn!(context, code = ?output.status.code(), err = %truncate(&stderr, 200), "cli error");
                }
                false
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(cli = %self.cli, "sender CLI not found on PATH");
                false
            }
            Ok(Err(e)) => {
                if !silent {
                    warn!(context, error = %e, "cli exception");
                }
                false
            }
            Err(_) => {
                if !silent {
                    warn!(context, timeout_secs = timeout.as_secs(), "cli timeout");
                }
                false
            }
        }
    }
}

fn split_message(text: &str, chunk_size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= chunk_size {
            chunks.push(remaining.to_string());
            break;
        }

        let boundary = floor_char_boundary(remaining, chunk_size.min(remaining.len()));
        let window = &remaining[..boundary];
        let break_point = window
            .rfind("\n\n")
            .or_else(|| window.rfind('\n'))
            .or_else(|| window.rfind(' '))
            .unwrap_or(boundary);

        chunks.push(remaining[..break_point].to_string());
        remaining = remaining[break_point..].trim_start();
    }

    chunks
}

/// The largest byte index `<= idx` that lands on a UTF-8 char boundary.
/// `str::floor_char_boundary` is nightly-only; this is the stable equivalent.
fn floor_char_boundary(s: &str, idx: usize) -> usize {
    if idx >= s.len() {
        return s.len();
    }
    let mut i = idx;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_message_breaks_on_paragraph_boundary() {
        let text = format!("{}\n\n{}", "a".repeat(10), "b".repeat(10));
        let chunks = split_message(&text, 12);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "a".repeat(10));
        assert_eq!(chunks[1], "b".repeat(10));
    }

    #[test]
    fn split_message_leaves_short_text_whole() {
        let chunks = split_message("short", 100);
        assert_eq!(chunks, vec!["short".to_string()]);
    }

    #[test]
    fn split_message_does_not_panic_on_multibyte_boundary() {
        let text = "a".repeat(9) + "😀😀😀😀😀";
        let chunks = split_message(&text, 10);
        assert_eq!(chunks.concat(), text);
        assert!(chunks.iter().all(|c| c.len() <= 14));
    }
}
