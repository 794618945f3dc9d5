//! Length prefixed frames over any async byte stream.
//!
//! Every frame is a big endian `u64` body length followed by the body. The
//! prefix does not count itself.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{Align4, Deserialize, Serialize};

type Prefix = u64;
const PREFIX_SIZE: usize = size_of::<Prefix>();

/// Bodies larger than this are refused on both ends.
pub const MAX_FRAME_LEN: usize = 1 << 32;

fn too_large(len: u128) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("frame of {len} bytes exceeds the {MAX_FRAME_LEN} bytes limit"),
    )
}

fn encode_prefix(len: usize) -> io::Result<[u8; PREFIX_SIZE]> {
    if len > MAX_FRAME_LEN {
        return Err(too_large(len as u128));
    }

    Ok((len as Prefix).to_be_bytes())
}

fn decode_prefix(prefix: [u8; PREFIX_SIZE]) -> io::Result<usize> {
    let len = Prefix::from_be_bytes(prefix);
    usize::try_from(len)
        .ok()
        .filter(|&len| len <= MAX_FRAME_LEN)
        .ok_or_else(|| too_large(len as u128))
}

/// The writing half of a connection.
pub struct FrameSender<W: AsyncWrite + Unpin> {
    tx: W,
    buf: Vec<u8>,
}

impl<W: AsyncWrite + Unpin> FrameSender<W> {
    pub(crate) fn new(tx: W) -> Self {
        Self {
            tx,
            buf: Vec::new(),
        }
    }

    /// Writes `msg` as one frame and flushes.
    ///
    /// The owned part of the body is staged behind a reserved prefix, the
    /// borrowed tail goes out as a second write.
    pub async fn send<'a, T: Serialize<'a>>(&mut self, msg: &'a T) -> io::Result<()> {
        self.buf.clear();
        self.buf.extend_from_slice(&[0; PREFIX_SIZE]);

        let tail = msg.serialize(&mut self.buf)?;
        let body_len = self.buf.len() - PREFIX_SIZE + tail.map_or(0, <[u8]>::len);
        self.buf[..PREFIX_SIZE].copy_from_slice(&encode_prefix(body_len)?);

        self.tx.write_all(&self.buf).await?;
        if let Some(tail) = tail {
            self.tx.write_all(tail).await?;
        }

        self.tx.flush().await
    }
}

/// The reading half of a connection.
pub struct FrameReceiver<R: AsyncRead + Unpin> {
    rx: R,
}

impl<R: AsyncRead + Unpin> FrameReceiver<R> {
    pub(crate) fn new(rx: R) -> Self {
        Self { rx }
    }

    /// Waits for the next frame and deserializes its body.
    ///
    /// # Arguments
    /// * `buf` - Storage for the body. `T` may borrow from it, and its element
    ///   type sets the alignment the body is read at.
    ///
    /// # Returns
    /// The message, or an error if the stream ends early, the prefix is over
    /// the limit or the body doesn't decode.
    pub async fn recv_into<'buf, T, B>(&mut self, buf: &'buf mut Vec<B>) -> io::Result<T>
    where
        T: Deserialize<'buf>,
        B: Align4,
    {
        let mut prefix = [0; PREFIX_SIZE];
        self.rx.read_exact(&mut prefix).await?;
        let len = decode_prefix(prefix)?;

        buf.clear();
        buf.resize(len.div_ceil(size_of::<B>()), B::zeroed());

        let body = &mut bytemuck::cast_slice_mut(buf.as_mut_slice())[..len];
        self.rx.read_exact(body).await?;

        T::deserialize(body)
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{self, AsyncWriteExt};

    use super::*;

    /// Borrows the whole body as is.
    struct Raw<'a>(&'a [u8]);

    impl<'a> Serialize<'a> for Raw<'a> {
        fn serialize(&'a self, buf: &mut Vec<u8>) -> io::Result<Option<&'a [u8]>> {
            buf.push(self.0.len() as u8);
            Ok(Some(self.0))
        }
    }

    impl<'a> Deserialize<'a> for Raw<'a> {
        fn deserialize(buf: &'a [u8]) -> io::Result<Self> {
            match buf.split_first() {
                Some((&n, rest)) if rest.len() == n as usize => Ok(Raw(rest)),
                _ => Err(io::Error::new(io::ErrorKind::InvalidData, "bad raw body")),
            }
        }
    }

    #[test]
    fn prefix_limit_is_inclusive() {
        assert_eq!(decode_prefix(encode_prefix(MAX_FRAME_LEN).unwrap()).unwrap(), MAX_FRAME_LEN);

        let err = encode_prefix(MAX_FRAME_LEN + 1).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        let err = decode_prefix(u64::MAX.to_be_bytes()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn odd_sized_bodies_survive_word_buffers() -> io::Result<()> {
        let (a, b) = io::duplex(64);
        let mut tx = FrameSender::new(a);
        let mut rx = FrameReceiver::new(b);
        let mut buf: Vec<u32> = vec![7; 16];

        tx.send(&Raw(b"hello")).await?;
        let Raw(body) = rx.recv_into(&mut buf).await?;
        assert_eq!(body, b"hello");

        tx.send(&Raw(b"")).await?;
        let Raw(body) = rx.recv_into(&mut buf).await?;
        assert!(body.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn oversized_prefix_is_rejected_before_reading_the_body() -> io::Result<()> {
        let (mut a, b) = io::duplex(64);
        let mut rx = FrameReceiver::new(b);

        a.write_all(&((MAX_FRAME_LEN as u64) + 1).to_be_bytes()).await?;

        let mut buf: Vec<u32> = Vec::new();
        let err = rx.recv_into::<Raw, _>(&mut buf).await.err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(buf.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn truncated_body_is_an_early_eof() -> io::Result<()> {
        let (mut a, b) = io::duplex(64);
        let mut rx = FrameReceiver::new(b);

        a.write_all(&10u64.to_be_bytes()).await?;
        a.write_all(&[3, 1, 2]).await?;
        drop(a);

        let mut buf: Vec<u32> = Vec::new();
        let err = rx.recv_into::<Raw, _>(&mut buf).await.err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);

        Ok(())
    }
}
