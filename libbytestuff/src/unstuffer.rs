//! Incremental byte unstuffer.
//!
//! Reconstructs the payload of a single frame from a stuffed byte stream that
//! may arrive in chunks of arbitrary size. Bytes before the start-of-frame
//! marker are dropped, a start-of-frame marker inside a frame restarts the
//! frame. All unstuffed data is stored in the buffer handed to
//! [`Unstuffer::init`], no allocation takes place.

use num_enum::{IntoPrimitive, TryFromPrimitive};

use super::consts::flags;
use super::Error;


#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum State {
    NeedSof = 0,
    NeedRawData = 1,
    NeedNegateData = 2,
    UnstuffEnd = 3,
    UnstuffFail = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The whole chunk has been consumed. This includes a chunk ending with
    /// the end-of-frame marker, so `Ok` does not imply that the frame is
    /// still open. Check [`Unstuffer::is_frame_complete`] after every call.
    Ok,
    /// A frame has been completed by an earlier byte. The remaining bytes have
    /// not been consumed and must be resubmitted after
    /// [`Unstuffer::start_new_frame`].
    FrameEnded,
    /// The output buffer cannot hold the frame. Remaining bytes have not been
    /// consumed.
    OutOfMemory,
}

/// Result of a call to [`Unstuffer::feed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Feed {
    pub status: Status,
    /// Number of bytes of the chunk that have been processed.
    pub consumed: usize,
    /// Number of partial frames discarded due to an unexpected start-of-frame.
    pub errors: u32,
}

/// Plain representation of the bookkeeping of an [`Unstuffer`], without the
/// buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parts {
    pub initialized: bool,
    pub cursor: usize,
    pub state: u8,
}


#[derive(Debug)]
pub struct Unstuffer<B> {
    buf: Option<B>,
    initialized: bool,
    cursor: usize,
    state: State,
}

impl<B> Unstuffer<B> {
    /// Creates an uninitialized unstuffer. Everything except
    /// [`init`](Self::init) fails with [`Error::NotInitialized`] on it.
    pub fn new() -> Self {
        Self {
            buf: None,
            initialized: false,
            cursor: 0,
            state: State::NeedSof,
        }
    }

    pub fn into_parts(self) -> (Option<B>, Parts) {
        let parts = Parts {
            initialized: self.initialized,
            cursor: self.cursor,
            state: self.state.into(),
        };

        (self.buf, parts)
    }
}

impl<B> Default for Unstuffer<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> Unstuffer<B> {
    pub fn with_buffer(buf: B) -> Result<Self, Error> {
        let mut unstuffer = Self::new();
        unstuffer.init(buf)?;
        Ok(unstuffer)
    }

    /// Rebuilds an unstuffer from a buffer and previously extracted parts.
    ///
    /// The parts are not trusted: they are validated against the buffer
    /// before the unstuffer is handed out.
    pub fn from_parts(buf: Option<B>, parts: Parts) -> Result<Self, Error> {
        let buf = buf.ok_or(Error::BadPointer)?;

        if !parts.initialized {
            return Err(Error::NotInitialized);
        }

        let state = State::try_from(parts.state)
            .map_err(|_| Error::CorruptContext)?;

        let unstuffer = Self {
            buf: Some(buf),
            initialized: true,
            cursor: parts.cursor,
            state,
        };

        unstuffer.check()?;
        Ok(unstuffer)
    }

    pub fn init(&mut self, buf: B) -> Result<(), Error> {
        if buf.as_ref().is_empty() {
            return Err(Error::BadParam);
        }

        self.buf = Some(buf);
        self.initialized = true;
        self.cursor = 0;
        self.state = State::NeedSof;

        Ok(())
    }

    /// Drops any frame received so far and starts waiting for the next
    /// start-of-frame marker.
    pub fn start_new_frame(&mut self) -> Result<(), Error> {
        self.check()?;

        self.cursor = 0;
        self.state = State::NeedSof;

        Ok(())
    }

    /// Payload unstuffed so far. May be called while a frame is still in
    /// progress; the data is dropped again if the frame is restarted.
    pub fn unstuffed_data(&self) -> Result<&[u8], Error> {
        let buf = self.check()?;
        Ok(&buf[..self.cursor])
    }

    pub fn unstuffed_len(&self) -> Result<usize, Error> {
        self.check()?;
        Ok(self.cursor)
    }

    pub fn capacity(&self) -> Result<usize, Error> {
        self.check().map(<[u8]>::len)
    }

    pub fn is_waiting_for_sof(&self) -> Result<bool, Error> {
        self.check()?;
        Ok(self.state == State::NeedSof)
    }

    pub fn is_frame_complete(&self) -> Result<bool, Error> {
        self.check()?;
        Ok(self.state == State::UnstuffEnd)
    }

    /// Unstuffs the given chunk of stuffed data, byte by byte.
    ///
    /// Processing stops early once a frame has been completed or the buffer
    /// ran full. In both cases `consumed` is smaller than the chunk length
    /// and the rest of the chunk has to be fed again after the condition has
    /// been handled. A chunk ending with the end-of-frame marker is consumed
    /// completely, check [`is_frame_complete`](Self::is_frame_complete) to
    /// detect this.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Feed, Error> {
        self.check()?;

        if chunk.is_empty() {
            return Err(Error::BadParam);
        }

        let Some(buf): Option<&mut [u8]> = self.buf.as_mut().map(|b| b.as_mut()) else {
            return Err(Error::CorruptContext);
        };

        let mut feed = Feed { status: Status::Ok, consumed: 0, errors: 0 };
        let mut discarded = 0usize;

        while feed.consumed < chunk.len() && feed.status == Status::Ok {
            let byte = chunk[feed.consumed];

            match self.state {
                State::NeedSof => {
                    if byte == flags::SOF {
                        self.cursor = 0;
                        self.state = State::NeedRawData;
                    } else {
                        discarded += 1;
                    }

                    feed.consumed += 1;
                },
                State::NeedRawData => match byte {
                    flags::SOF => {
                        tracing::debug!(dropped = self.cursor, "unexpected start of frame, restarting frame");

                        self.cursor = 0;
                        feed.errors = feed.errors.saturating_add(1);
                        feed.consumed += 1;
                    },
                    flags::EOF => {
                        tracing::trace!(len = self.cursor, "frame complete");

                        self.state = State::UnstuffEnd;
                        feed.consumed += 1;
                    },
                    flags::ESC => {
                        self.state = State::NeedNegateData;
                        feed.consumed += 1;
                    },
                    byte => {
                        if push(buf, &mut self.cursor, byte) {
                            feed.consumed += 1;
                        } else {
                            tracing::warn!(capacity = buf.len(), "frame does not fit into unstuff buffer");

                            self.state = State::UnstuffFail;
                            feed.status = Status::OutOfMemory;
                        }
                    },
                },
                State::NeedNegateData => {
                    if push(buf, &mut self.cursor, !byte) {
                        self.state = State::NeedRawData;
                        feed.consumed += 1;
                    } else {
                        tracing::warn!(capacity = buf.len(), "frame does not fit into unstuff buffer");

                        self.state = State::UnstuffFail;
                        feed.status = Status::OutOfMemory;
                    }
                },
                State::UnstuffEnd => {
                    feed.status = Status::FrameEnded;
                },
                State::UnstuffFail => {
                    feed.status = Status::OutOfMemory;
                },
            }
        }

        if discarded > 0 {
            tracing::debug!(discarded, "dropped data outside of frame");
        }

        Ok(feed)
    }

    fn check(&self) -> Result<&[u8], Error> {
        if !self.initialized {
            return Err(Error::NotInitialized);
        }

        let buf = match &self.buf {
            Some(buf) => buf.as_ref(),
            None => return Err(Error::CorruptContext),
        };

        if buf.is_empty() || self.cursor > buf.len() {
            return Err(Error::CorruptContext);
        }

        Ok(buf)
    }
}


fn push(buf: &mut [u8], cursor: &mut usize, byte: u8) -> bool {
    if *cursor < buf.len() {
        buf[*cursor] = byte;
        *cursor += 1;
        true
    } else {
        false
    }
}
