//! An [`Inbox`] fed by a reader thread.
//!
//! Blocking reads happen on a helper thread so the server loop can keep
//! watching for termination signals. The helper only reads a frame after
//! the loop has asked for one, so request N+1 is never pulled off the
//! stream before the response to request N has been written.

use std::io::{self, BufRead};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::time::Duration;

use logwise::privacy::LogIt;

use super::{Frame, FrameReader, Inbound, Inbox};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

type ReadResult = io::Result<Option<Frame>>;

/// Frames read on a helper thread named `ndtools::stdin`.
///
/// The helper reads one frame per [`Inbox::next_frame`] call and then waits
/// for the next demand. While waiting for that frame the caller polls the
/// `terminated` function, so a signal is noticed within a poll interval even
/// when the client sends nothing. A frame still being read when the signal
/// arrives is abandoned.
pub struct ThreadedInbox {
    demand: SyncSender<()>,
    frames: Receiver<ReadResult>,
    pending: bool,
    terminated: fn() -> Option<i32>,
}

impl ThreadedInbox {
    /// Spawns the reader thread.
    ///
    /// `terminated` is polled while waiting for input; once it reports a
    /// signal number, [`Inbox::next_frame`] returns [`Inbound::Terminated`].
    pub fn spawn<R>(
        reader: R,
        max_frame_bytes: usize,
        terminated: fn() -> Option<i32>,
    ) -> io::Result<Self>
    where
        R: BufRead + Send + 'static,
    {
        let (demand, wanted) = mpsc::sync_channel::<()>(1);
        let (sender, frames) = mpsc::sync_channel::<ReadResult>(1);
        std::thread::Builder::new()
            .name("ndtools::stdin".to_string())
            .spawn(move || {
                let mut reader = FrameReader::new(reader, max_frame_bytes);
                while wanted.recv().is_ok() {
                    let result = reader.read_frame();
                    let finished = !matches!(result, Ok(Some(_)));
                    if sender.send(result).is_err() || finished {
                        break;
                    }
                }
            })?;
        Ok(ThreadedInbox {
            demand,
            frames,
            pending: false,
            terminated,
        })
    }

    /// Reads process stdin, watching [`crate::signal::received`].
    pub fn stdin(max_frame_bytes: usize) -> io::Result<Self> {
        let stdin = io::BufReader::new(io::stdin());
        Self::spawn(stdin, max_frame_bytes, crate::signal::received)
    }
}

impl Inbox for ThreadedInbox {
    fn next_frame(&mut self) -> io::Result<Inbound> {
        if let Some(signo) = (self.terminated)() {
            return Ok(Inbound::Terminated(signo));
        }
        if !self.pending {
            if self.demand.send(()).is_err() {
                return Ok(Inbound::Closed);
            }
            self.pending = true;
        }
        loop {
            match self.frames.recv_timeout(POLL_INTERVAL) {
                Ok(result) => {
                    self.pending = false;
                    return Ok(match result? {
                        Some(frame) => Inbound::Frame(frame),
                        None => Inbound::Closed,
                    });
                }
                Err(RecvTimeoutError::Timeout) => {
                    if let Some(signo) = (self.terminated)() {
                        logwise::info_sync!(
                            "signal {signo} received while waiting for input",
                            signo = LogIt(&signo)
                        );
                        return Ok(Inbound::Terminated(signo));
                    }
                }
                Err(RecvTimeoutError::Disconnected) => return Ok(Inbound::Closed),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufReader, Cursor, Read};
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::time::Instant;

    /// A reader that blocks until its sender is dropped, then reports end of
    /// stream.
    struct Stalled(mpsc::Receiver<()>);

    impl Read for Stalled {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            let _ = self.0.recv();
            Ok(0)
        }
    }

    static RAISED: AtomicI32 = AtomicI32::new(0);

    fn raised() -> Option<i32> {
        match RAISED.load(Ordering::SeqCst) {
            0 => None,
            signo => Some(signo),
        }
    }

    fn never() -> Option<i32> {
        None
    }

    fn sigterm() -> Option<i32> {
        Some(15)
    }

    #[test]
    fn delivers_frames_then_closes() {
        let input = Cursor::new(b"{\"a\":1}\n{\"b\":2}\n".to_vec());
        let mut inbox = ThreadedInbox::spawn(input, 1024, never).unwrap();
        assert_eq!(
            inbox.next_frame().unwrap(),
            Inbound::Frame(Frame::Message(b"{\"a\":1}".to_vec()))
        );
        assert_eq!(
            inbox.next_frame().unwrap(),
            Inbound::Frame(Frame::Message(b"{\"b\":2}".to_vec()))
        );
        assert_eq!(inbox.next_frame().unwrap(), Inbound::Closed);
        assert_eq!(inbox.next_frame().unwrap(), Inbound::Closed);
    }

    #[test]
    fn pending_signal_stops_before_reading() {
        let input = Cursor::new(b"{\"a\":1}\n".to_vec());
        let mut inbox = ThreadedInbox::spawn(input, 1024, sigterm).unwrap();
        assert_eq!(inbox.next_frame().unwrap(), Inbound::Terminated(15));
    }

    #[test]
    fn signal_during_blocked_read_is_noticed() {
        let (release, stalled) = mpsc::channel();
        let reader = BufReader::new(Stalled(stalled));
        let mut inbox = ThreadedInbox::spawn(reader, 1024, raised).unwrap();
        let started = Instant::now();
        let raiser = std::thread::spawn(|| {
            std::thread::sleep(Duration::from_millis(200));
            RAISED.store(15, Ordering::SeqCst);
        });

        assert_eq!(inbox.next_frame().unwrap(), Inbound::Terminated(15));
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(200), "returned after {waited:?}");
        assert!(waited < Duration::from_secs(5), "returned after {waited:?}");

        raiser.join().unwrap();
        drop(release);
    }
}
