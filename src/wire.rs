//! Newline-delimited framing.
//!
//! Every message is one line of UTF-8 JSON terminated by `\n`. A trailing
//! `\r` is stripped, whitespace-only lines are skipped, and a final line
//! without a terminator is still delivered as a frame when the stream ends.
//! Lines longer than the configured limit are consumed without being
//! buffered and reported as [`Frame::Oversized`].

use std::io::{self, BufRead, Write};

pub mod stdio;

/// Default upper bound on a single frame.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;

/// One line of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// The line without its terminator (`\n` or `\r\n`).
    Message(Vec<u8>),
    /// A line longer than the limit. Its bytes were discarded; `length` does
    /// not count a trailing `\r`.
    Oversized { length: usize, limit: usize },
}

/// What the server loop gets when it asks for the next frame.
#[derive(Debug, PartialEq, Eq)]
pub enum Inbound {
    Frame(Frame),
    /// The input stream ended.
    Closed,
    /// A termination signal arrived while waiting.
    Terminated(i32),
}

/// A source of frames, read one at a time on demand.
///
/// The server calls [`Inbox::next_frame`] only after the previous response
/// has been written, so implementations must not read ahead on its behalf.
pub trait Inbox {
    /// Blocks until a frame is available, the input ends or a signal is
    /// reported.
    fn next_frame(&mut self) -> io::Result<Inbound>;
}

/// Splits a buffered byte stream into frames.
///
/// Reads only as far as the end of the current line, so it never consumes
/// input that belongs to a later request.
pub struct FrameReader<R> {
    reader: R,
    max_frame_bytes: usize,
}

impl<R: BufRead> FrameReader<R> {
    /// `max_frame_bytes` bounds the memory held for a single line.
    pub fn new(reader: R, max_frame_bytes: usize) -> Self {
        FrameReader {
            reader,
            max_frame_bytes,
        }
    }

    /// Returns the next non-blank frame, or `None` at end of stream.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndtools::wire::{Frame, FrameReader};
    ///
    /// let input = b"{\"id\":1}\r\n\n{\"id\":2,\"padding\":\"xxxxxxxxxxxx\"}\n{\"id\":3}";
    /// let mut reader = FrameReader::new(&input[..], 16);
    ///
    /// assert_eq!(reader.read_frame().unwrap(), Some(Frame::Message(b"{\"id\":1}".to_vec())));
    /// assert!(matches!(reader.read_frame().unwrap(), Some(Frame::Oversized { limit: 16, .. })));
    /// assert_eq!(reader.read_frame().unwrap(), Some(Frame::Message(b"{\"id\":3}".to_vec())));
    /// assert_eq!(reader.read_frame().unwrap(), None);
    /// ```
    pub fn read_frame(&mut self) -> io::Result<Option<Frame>> {
        loop {
            match self.read_line()? {
                None => return Ok(None),
                Some(Frame::Message(line)) if line.iter().all(u8::is_ascii_whitespace) => continue,
                Some(frame) => return Ok(Some(frame)),
            }
        }
    }

    fn read_line(&mut self) -> io::Result<Option<Frame>> {
        // room for a trailing `\r`, which does not count against the limit
        let buffered = self.max_frame_bytes.saturating_add(1);
        let mut line = Vec::new();
        let mut length = 0usize;
        let mut last = None;
        let mut any = false;
        loop {
            let available = match self.reader.fill_buf() {
                Ok(available) => available,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            if available.is_empty() {
                if !any {
                    return Ok(None);
                }
                break;
            }
            any = true;
            let newline = available.iter().position(|b| *b == b'\n');
            let chunk = &available[..newline.unwrap_or(available.len())];
            length += chunk.len();
            if let Some(byte) = chunk.last() {
                last = Some(*byte);
            }
            if length <= buffered {
                line.extend_from_slice(chunk);
            } else {
                line.clear();
            }
            let consumed = newline.map_or(chunk.len(), |i| i + 1);
            self.reader.consume(consumed);
            if newline.is_some() {
                break;
            }
        }
        if last == Some(b'\r') {
            length -= 1;
            line.pop();
        }
        if length > self.max_frame_bytes {
            return Ok(Some(Frame::Oversized {
                length,
                limit: self.max_frame_bytes,
            }));
        }
        Ok(Some(Frame::Message(line)))
    }
}

impl<R: BufRead> Inbox for FrameReader<R> {
    fn next_frame(&mut self) -> io::Result<Inbound> {
        Ok(match self.read_frame()? {
            Some(frame) => Inbound::Frame(frame),
            None => Inbound::Closed,
        })
    }
}

/// Writes frames, flushing after each one so the client sees every
/// response before the next request is read.
pub struct FrameWriter<W> {
    writer: W,
}

impl<W: Write> FrameWriter<W> {
    pub fn new(writer: W) -> Self {
        FrameWriter { writer }
    }

    /// Writes `body` and a `\n`, then flushes. `body` must not contain a
    /// newline.
    pub fn write_frame(&mut self, body: &[u8]) -> io::Result<()> {
        self.writer.write_all(body)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
