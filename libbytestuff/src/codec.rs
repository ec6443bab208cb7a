//! [`tokio_util::codec`] adapter for framing payloads over a byte stream.

use super::consts::{self, flags};
use super::{stuffed_len, Status, Unstuffer};

use bytes::{Buf, BufMut, BytesMut};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;


const DEFAULT_MAX_PAYLOAD: usize = 4096;


#[derive(Debug)]
pub struct Codec {
    dec: Unstuffer<Box<[u8]>>,
}

impl Codec {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_PAYLOAD)
    }

    /// Creates a codec accepting payloads of up to `cap` bytes. Larger frames
    /// are dropped by the decoder.
    pub fn with_capacity(cap: usize) -> Self {
        let mut dec = Unstuffer::new();

        // the codec stays uninitialized and fails every decode in that case
        if let Err(err) = dec.init(vec![0; cap].into_boxed_slice()) {
            tracing::warn!(cap, "rejected unstuff buffer capacity: {err}");
        }

        Self { dec }
    }

    pub fn max_payload(&self) -> usize {
        self.dec.capacity().unwrap_or(0)
    }

    pub fn wrap<T>(self, io: T) -> Framed<T, Codec>
    where
        T: AsyncRead + AsyncWrite,
    {
        let cap = stuffed_len(&[]) + 2 * self.max_payload();
        Framed::with_capacity(io, self, cap)
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::new()
    }
}

impl tokio_util::codec::Encoder<&[u8]> for Codec {
    type Error = std::io::Error;

    fn encode(&mut self, payload: &[u8], dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(stuffed_len(payload));

        dst.put_u8(flags::SOF);
        for byte in payload {
            dst.put_slice(&consts::escape(*byte));
        }
        dst.put_u8(flags::EOF);

        Ok(())
    }
}

impl tokio_util::codec::Decoder for Codec {
    type Item = Box<[u8]>;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        while !src.is_empty() {
            let feed = self.dec.feed(&src[..])?;
            src.advance(feed.consumed);

            if feed.errors > 0 {
                tracing::warn!(errors = feed.errors, "dropped incomplete frame(s)");
            }

            match feed.status {
                Status::Ok | Status::FrameEnded => {
                    if self.dec.is_frame_complete()? {
                        let frame = self.dec.unstuffed_data()?.into();
                        self.dec.start_new_frame()?;

                        return Ok(Some(frame));
                    }
                },
                Status::OutOfMemory => {
                    tracing::warn!(max_payload = self.max_payload(), "dropping oversized frame");
                    self.dec.start_new_frame()?;
                },
            }
        }

        Ok(None)
    }
}


#[cfg(test)]
mod test {
    use super::*;

    use futures::{SinkExt, StreamExt};
    use tokio_util::codec::{Decoder, Encoder};

    const SOF: u8 = flags::SOF;
    const EOF: u8 = flags::EOF;
    const ESC: u8 = flags::ESC;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .try_init();
    }

    #[test]
    fn test_encode() {
        let mut codec = Codec::new();
        let mut buf = BytesMut::new();

        codec.encode(&[0x01, EOF, 0x02][..], &mut buf)
            .expect("error encoding payload");

        assert_eq!(&buf[..], [SOF, 0x01, ESC, 0x5D, 0x02, EOF]);
    }

    #[test]
    fn test_decode() {
        let mut codec = Codec::new();

        let data = [
            // leading garbage
            0x13, 0x37,
            // frame
            SOF, 0x01, ESC, 0x5C, 0x02, EOF,
            // partial frame
            SOF, 0x03,
        ];

        let mut buf = BytesMut::from(&data[..]);

        let frame = codec.decode(&mut buf)
            .expect("error decoding frame")
            .expect("frame incomplete");

        assert_eq!(&frame[..], [0x01, ESC, 0x02]);
        assert_eq!(buf.remaining(), 2);

        // partial frame is kept in the decoder
        assert_eq!(codec.decode(&mut buf).expect("error decoding frame"), None);
        assert_eq!(buf.remaining(), 0);

        buf.put_slice(&[0x04, EOF]);

        let frame = codec.decode(&mut buf)
            .expect("error decoding frame")
            .expect("frame incomplete");

        assert_eq!(&frame[..], [0x03, 0x04]);
    }

    #[test]
    fn test_decode_oversized() {
        init_tracing();

        let mut codec = Codec::with_capacity(2);
        assert_eq!(codec.max_payload(), 2);

        let data = [SOF, 0x01, 0x02, 0x03, EOF, SOF, 0x04, EOF];
        let mut buf = BytesMut::from(&data[..]);

        let frame = codec.decode(&mut buf)
            .expect("error decoding frame")
            .expect("frame incomplete");

        assert_eq!(&frame[..], [0x04]);
        assert_eq!(buf.remaining(), 0);
    }

    #[test]
    fn test_decode_zero_capacity() {
        init_tracing();

        let mut codec = Codec::with_capacity(0);
        assert_eq!(codec.max_payload(), 0);

        let mut buf = BytesMut::from(&[SOF, EOF][..]);
        assert!(codec.decode(&mut buf).is_err());
        assert_eq!(buf.remaining(), 2);
    }

    #[test]
    fn test_encode_decode() {
        let mut codec = Codec::new();
        let mut buf = BytesMut::new();

        let payload: Vec<u8> = (0..=u8::MAX).collect();

        codec.encode(&payload[..], &mut buf)
            .expect("error encoding payload");

        let decoded = codec.decode(&mut buf)
            .expect("error decoding frame")
            .expect("frame incomplete");

        assert_eq!(&decoded[..], &payload[..]);
    }

    #[tokio::test]
    async fn test_framed() {
        init_tracing();

        let (a, b) = tokio::io::duplex(64);

        let mut tx = Codec::new().wrap(a);
        let mut rx = Codec::new().wrap(b);

        let payloads: [&[u8]; 3] = [&[0x01, SOF, 0x02], &[], &[ESC; 40]];

        tokio::spawn(async move {
            for payload in payloads {
                tx.send(payload).await.expect("error sending frame");
            }
        });

        for payload in payloads {
            let frame = rx.next().await
                .expect("stream ended")
                .expect("error receiving frame");

            assert_eq!(&frame[..], payload);
        }
    }
}
