mod align;
mod codec;
mod frame;
pub mod msg;
pub mod relay;
pub mod specs;

use tokio::io::{AsyncRead, AsyncWrite};

pub use align::Align4;
pub use codec::{Deserialize, Serialize};
pub use frame::{FrameReceiver, FrameSender, MAX_FRAME_LEN};

/// Wraps the two halves of a byte stream into framed connection ends.
pub fn channel<R, W>(rx: R, tx: W) -> (FrameReceiver<R>, FrameSender<W>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    (FrameReceiver::new(rx), FrameSender::new(tx))
}
