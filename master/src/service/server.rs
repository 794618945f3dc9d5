use std::{borrow::Cow, io, net::SocketAddr};

use comms::{
    FrameReceiver, FrameSender,
    msg::{Command, Msg, Payload},
    relay::{RelayWorker, WorkerClient},
};
use log::{debug, info, warn};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{TcpListener, ToSocketAddrs},
    task::JoinSet,
};

/// Exposes an in-process relay to remote workers over tcp.
pub struct RelayServer {
    listener: TcpListener,
    relay: RelayWorker,
    connections: JoinSet<io::Result<()>>,
}

impl RelayServer {
    /// Creates a new `RelayServer` listening on `addr`.
    ///
    /// # Arguments
    /// * `addr` - The address to listen on.
    /// * `relay` - The relay handle every connection is served from.
    pub async fn bind<A: ToSocketAddrs>(addr: A, relay: RelayWorker) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;

        Ok(Self {
            listener,
            relay,
            connections: JoinSet::new(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts workers forever, each connection is served on its own task.
    ///
    /// A failing connection only drops that worker.
    pub async fn run(mut self) -> io::Result<()> {
        info!("relay listening on {}", self.local_addr()?);

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, addr) = accepted?;
                    debug!("worker connected from {addr}");

                    let (rx, tx) = stream.into_split();
                    let (rx, tx) = comms::channel(rx, tx);
                    self.connections.spawn(serve(rx, tx, self.relay.clone()));
                }
                Some(joined) = self.connections.join_next() => {
                    match joined {
                        Ok(Ok(())) => debug!("worker disconnected"),
                        Ok(Err(e)) => warn!("worker connection failed: {e}"),
                        Err(e) => warn!("worker connection task failed: {e}"),
                    }
                }
            }
        }
    }
}

/// Creates an error for when an unexpected message kind is received.
///
/// # Arguments
/// * `msg` - The received message.
///
/// # Returns
/// An error.
fn unexpected_message_kind<U>(msg: &Msg) -> io::Result<U> {
    Err(io::Error::new(
        io::ErrorKind::InvalidData,
        format!("received an unexpected message kind, got: {msg:?}"),
    ))
}

/// Answers a single worker's requests until it disconnects.
///
/// # Arguments
/// * `rx` - The receiving end of the connection.
/// * `tx` - The sending end of the connection.
/// * `relay` - The relay the requests are forwarded to.
pub async fn serve<R, W>(
    mut rx: FrameReceiver<R>,
    mut tx: FrameSender<W>,
    mut relay: RelayWorker,
) -> io::Result<()>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    let mut rx_buf: Vec<u32> = Vec::new();

    loop {
        let msg: Msg = rx.recv_into(&mut rx_buf).await?;

        match msg {
            Msg::Control(Command::FetchExperiment) => {
                let exp = relay.get_experiment().await?;
                tx.send(&Msg::Control(Command::Experiment(exp))).await?;
            }
            Msg::Control(Command::FetchTask) => {
                let (id, task) = relay.get_current_task().await?;
                let msg = Msg::Data(Payload::Task {
                    id,
                    meta: task.meta.clone(),
                    params: &task.params,
                });
                tx.send(&msg).await?;
            }
            Msg::Data(Payload::Result { task_id, result }) => {
                relay.push_result(task_id, result).await?;
            }
            Msg::Control(Command::Disconnect) => {
                tx.send(&Msg::Control(Command::Disconnect)).await?;
                return Ok(());
            }
            msg => {
                let text = format!("unexpected message {msg:?}");
                tx.send(&Msg::Err(Cow::Owned(text))).await?;
                return unexpected_message_kind(&msg);
            }
        }
    }
}
