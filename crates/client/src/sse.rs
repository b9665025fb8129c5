/// Splits a `text/event-stream` body into the `data` payload of each event.
///
/// Chunks may cut frames anywhere; incomplete frames are kept until the
/// terminating blank line arrives.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk and returns every payload it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf
            .extend(chunk.iter().copied().filter(|byte| *byte != b'\r'));

        let mut payloads = Vec::new();
        while let Some(pos) = find_double_newline(&self.buf) {
            let frame = self.buf.drain(..pos + 2).collect::<Vec<_>>();
            payloads.extend(frame_data(&frame));
        }
        payloads
    }

    /// Returns the payload of a trailing frame that was never terminated.
    pub fn finish(&mut self) -> Option<String> {
        let frame = std::mem::take(&mut self.buf);
        frame_data(&frame)
    }
}

fn find_double_newline(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|window| window == b"\n\n")
}

fn frame_data(frame: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(frame);
    let lines = text
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.strip_prefix(' ').unwrap_or(data))
        .collect::<Vec<_>>();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}
