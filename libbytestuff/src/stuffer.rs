//! Byte stuffer.
//!
//! Frames a raw payload as `SOF <escaped payload> EOF` into a caller supplied
//! buffer. Payload bytes colliding with one of the markers are replaced by
//! `ESC` followed by their bitwise complement.

use num_enum::{IntoPrimitive, TryFromPrimitive};

use super::consts::{self, flags};
use super::Error;


#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum State {
    NeedSof = 0,
    NeedRawData = 1,
    NeedNegatePrecedingData = 2,
    NeedEof = 3,
    StuffEnd = 4,
}

/// Plain representation of the bookkeeping of a [`Stuffer`], without the
/// buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parts {
    pub initialized: bool,
    pub cursor: usize,
    pub state: u8,
    /// Set once an emission ran out of memory, cleared by a new frame.
    pub failed: bool,
}


#[derive(Debug)]
pub struct Stuffer<B> {
    buf: Option<B>,
    initialized: bool,
    cursor: usize,
    state: State,
    failed: bool,
}

impl<B> Stuffer<B> {
    pub fn new() -> Self {
        Self {
            buf: None,
            initialized: false,
            cursor: 0,
            state: State::NeedSof,
            failed: false,
        }
    }

    pub fn into_parts(self) -> (Option<B>, Parts) {
        let parts = Parts {
            initialized: self.initialized,
            cursor: self.cursor,
            state: self.state.into(),
            failed: self.failed,
        };

        (self.buf, parts)
    }
}

impl<B> Default for Stuffer<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> Stuffer<B> {
    pub fn with_buffer(buf: B) -> Result<Self, Error> {
        let mut stuffer = Self::new();
        stuffer.init(buf)?;
        Ok(stuffer)
    }

    /// Rebuilds a stuffer from a buffer and previously extracted parts,
    /// validating the parts against the buffer.
    pub fn from_parts(buf: Option<B>, parts: Parts) -> Result<Self, Error> {
        let buf = buf.ok_or(Error::BadPointer)?;

        if !parts.initialized {
            return Err(Error::NotInitialized);
        }

        let state = State::try_from(parts.state)
            .map_err(|_| Error::CorruptContext)?;

        let stuffer = Self {
            buf: Some(buf),
            initialized: true,
            cursor: parts.cursor,
            state,
            failed: parts.failed,
        };

        stuffer.check()?;
        Ok(stuffer)
    }

    pub fn init(&mut self, buf: B) -> Result<(), Error> {
        if buf.as_ref().is_empty() {
            return Err(Error::BadParam);
        }

        self.buf = Some(buf);
        self.initialized = true;
        self.cursor = 0;
        self.state = State::NeedSof;
        self.failed = false;

        Ok(())
    }

    pub fn start_new_frame(&mut self) -> Result<(), Error> {
        self.check()?;

        self.cursor = 0;
        self.state = State::NeedSof;
        self.failed = false;

        Ok(())
    }

    /// Bytes of the frame emitted so far.
    pub fn stuffed_data(&self) -> Result<&[u8], Error> {
        let buf = self.check()?;
        Ok(&buf[..self.cursor])
    }

    pub fn stuffed_len(&self) -> Result<usize, Error> {
        self.check()?;
        Ok(self.cursor)
    }

    pub fn capacity(&self) -> Result<usize, Error> {
        self.check().map(<[u8]>::len)
    }

    pub fn is_frame_complete(&self) -> Result<bool, Error> {
        self.check()?;
        Ok(self.state == State::StuffEnd)
    }

    /// Appends raw payload bytes to the current frame, opening the frame if
    /// necessary.
    ///
    /// Fails with [`Error::OutOfMemory`] as soon as the buffer is full. The
    /// frame can not be continued after that, it has to be restarted via
    /// [`start_new_frame`](Self::start_new_frame).
    pub fn push(&mut self, data: &[u8]) -> Result<(), Error> {
        self.check()?;

        if self.failed {
            return Err(Error::OutOfMemory);
        }

        let result = self.emit_data(data);
        if result == Err(Error::OutOfMemory) {
            self.failed = true;
        }

        result
    }

    /// Closes the current frame and returns the complete framed data.
    pub fn flush(&mut self) -> Result<&[u8], Error> {
        self.check()?;

        if self.failed {
            return Err(Error::OutOfMemory);
        }

        if let Err(err) = self.emit_eof() {
            if err == Error::OutOfMemory {
                self.failed = true;
            }

            return Err(err);
        }

        self.stuffed_data()
    }

    /// Frames a complete payload in one go, discarding any frame in progress.
    pub fn stuff(&mut self, payload: &[u8]) -> Result<&[u8], Error> {
        self.start_new_frame()?;
        self.push(payload)?;
        self.flush()
    }

    fn emit_data(&mut self, data: &[u8]) -> Result<(), Error> {
        let Some(buf): Option<&mut [u8]> = self.buf.as_mut().map(|b| b.as_mut()) else {
            return Err(Error::CorruptContext);
        };

        match self.state {
            State::NeedSof => {
                emit(buf, &mut self.cursor, flags::SOF)?;
                self.state = State::NeedRawData;
            },
            State::NeedRawData => {},
            State::NeedNegatePrecedingData | State::NeedEof => {
                return Err(Error::OutOfMemory);
            },
            State::StuffEnd => {
                return Err(Error::BadParam);
            },
        }

        for &byte in data {
            if consts::is_marker(byte) {
                emit(buf, &mut self.cursor, flags::ESC)?;
                self.state = State::NeedNegatePrecedingData;

                emit(buf, &mut self.cursor, !byte)?;
                self.state = State::NeedRawData;
            } else {
                emit(buf, &mut self.cursor, byte)?;
            }
        }

        Ok(())
    }

    fn emit_eof(&mut self) -> Result<(), Error> {
        let Some(buf): Option<&mut [u8]> = self.buf.as_mut().map(|b| b.as_mut()) else {
            return Err(Error::CorruptContext);
        };

        if self.state == State::NeedSof {
            emit(buf, &mut self.cursor, flags::SOF)?;
            self.state = State::NeedRawData;
        }

        match self.state {
            State::NeedRawData => {
                self.state = State::NeedEof;

                emit(buf, &mut self.cursor, flags::EOF)?;
                self.state = State::StuffEnd;

                tracing::trace!(len = self.cursor, "frame stuffed");
            },
            State::StuffEnd => {},
            State::NeedSof | State::NeedNegatePrecedingData | State::NeedEof => {
                return Err(Error::OutOfMemory);
            },
        }

        Ok(())
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


fn emit(buf: &mut [u8], cursor: &mut usize, byte: u8) -> Result<(), Error> {
    if *cursor >= buf.len() {
        tracing::warn!(capacity = buf.len(), "stuffed frame does not fit into buffer");
        return Err(Error::OutOfMemory);
    }

    buf[*cursor] = byte;
    *cursor += 1;

    Ok(())
}


/// Lazily stuffs `payload`, yielding the complete frame byte by byte.
pub fn stuffed(payload: &[u8]) -> Stuffed<'_> {
    Stuffed {
        data: payload.iter(),
        state: State::NeedSof,
        pending: 0,
    }
}

/// Exact number of bytes `payload` occupies once stuffed, markers included.
pub fn stuffed_len(payload: &[u8]) -> usize {
    2 + payload.iter()
        .map(|b| consts::escaped_len(*b))
        .sum::<usize>()
}

pub struct Stuffed<'a> {
    data: std::slice::Iter<'a, u8>,
    state: State,
    pending: u8,
}

impl Iterator for Stuffed<'_> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        match self.state {
            State::NeedSof => {
                self.state = State::NeedRawData;
                Some(flags::SOF)
            },
            State::NeedRawData => match self.data.next().copied() {
                Some(b) if consts::is_marker(b) => {
                    self.pending = !b;
                    self.state = State::NeedNegatePrecedingData;
                    Some(flags::ESC)
                },
                Some(b) => Some(b),
                None => {
                    self.state = State::NeedEof;
                    self.next()
                },
            },
            State::NeedNegatePrecedingData => {
                self.state = State::NeedRawData;
                Some(self.pending)
            },
            State::NeedEof => {
                self.state = State::StuffEnd;
                Some(flags::EOF)
            },
            State::StuffEnd => None,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let rest = self.data.len();

        match self.state {
            State::NeedSof => (rest + 2, Some(2 * rest + 2)),
            State::NeedRawData => (rest + 1, Some(2 * rest + 1)),
            State::NeedNegatePrecedingData => (rest + 2, Some(2 * rest + 2)),
            State::NeedEof => (1, Some(1)),
            State::StuffEnd => (0, Some(0)),
        }
    }
}
