use tracing_subscriber::fmt::MakeWriter;

/// Tees formatted log lines into a broadcast channel so the `/api/logs`
/// SSE endpoint can replay them live, while still writing to stdout.
#[derive(Clone)]
pub struct SseMakeWriter {
    pub sender: tokio::sync::broadcast::Sender<String>,
}

impl<'a> MakeWriter<'a> for SseMakeWriter {
    type Writer = SseWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SseWriter {
            sender: self.sender.clone(),
        }
    }
}

pub struct SseWriter {
    sender: tokio::sync::broadcast::Sender<String>,
}

impl std::io::Write for SseWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let msg = String::from_utf8_lossy(buf).to_string();
        let _ = self.sender.send(msg); // Ignored if no receivers
        std::io::stdout().write(buf)?;
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        std::io::stdout().flush()
    }
}
