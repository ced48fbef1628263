const DATA_PREFIX: &str = "data: ";
const DONE_MARKER: &str = "data: [DONE]";

/// Semantic kind of a delimited frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameKind {
    /// Carries a `data: ` payload for classification.
    Data,
    /// The terminal marker; ends the run.
    Done,
    /// Keep-alive or other non-data frame; never surfaced as an event.
    Discard,
}

/// One delimited unit of the inbound streaming protocol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Frame content as received, delimiter excluded.
    pub raw: String,
    pub kind: FrameKind,
}

impl Frame {
    /// Payload text after the `data: ` prefix. `None` for non-data frames.
    pub fn payload(&self) -> Option<&str> {
        match self.kind {
            FrameKind::Data => self.raw.trim().strip_prefix(DATA_PREFIX),
            FrameKind::Done | FrameKind::Discard => None,
        }
    }
}

/// Turns arbitrarily-chunked bytes into a sequence of frames.
///
/// Frames are separated by a blank line; chunk boundaries never imply frame
/// boundaries, so partial frames are buffered until the delimiter arrives.
/// Once the terminal marker is observed the decoder is finished and later
/// bytes produce nothing.
#[derive(Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    finished: bool,
}

impl FrameDecoder {
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();
        if self.finished {
            return frames;
        }
        self.buf.extend_from_slice(chunk);
        while let Some((idx, delim_len)) = find_frame_delimiter(&self.buf) {
            let frame_bytes = self.buf[..idx].to_vec();
            self.buf.drain(..idx + delim_len);
            if let Some(frame) = classify_frame(&frame_bytes) {
                let done = frame.kind == FrameKind::Done;
                frames.push(frame);
                if done {
                    self.finished = true;
                    self.buf.clear();
                    break;
                }
            }
        }
        frames
    }

    /// Whether the terminal marker has been observed.
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

fn find_frame_delimiter(buf: &[u8]) -> Option<(usize, usize)> {
    let mut i = 0;
    while i + 1 < buf.len() {
        if buf[i] == b'\n' && buf[i + 1] == b'\n' {
            return Some((i, 2));
        }
        if i + 3 < buf.len()
            && buf[i] == b'\r'
            && buf[i + 1] == b'\n'
            && buf[i + 2] == b'\r'
            && buf[i + 3] == b'\n'
        {
            return Some((i, 4));
        }
        i += 1;
    }
    None
}

fn classify_frame(bytes: &[u8]) -> Option<Frame> {
    let raw = String::from_utf8_lossy(bytes).into_owned();
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let kind = if trimmed == DONE_MARKER {
        FrameKind::Done
    } else if trimmed.starts_with(DATA_PREFIX) {
        FrameKind::Data
    } else {
        FrameKind::Discard
    };
    Some(Frame { raw, kind })
}
