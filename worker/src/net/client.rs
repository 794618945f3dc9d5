use std::{io, sync::Arc};

use comms::{
    FrameReceiver, FrameSender,
    msg::{Command, Msg, Payload},
    relay::WorkerClient,
    specs::{
        experiment::ExperimentSpec,
        result::EsResult,
        task::{Task, TaskId},
    },
};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{
        TcpStream, ToSocketAddrs,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
};

/// A worker's view of a relay living in another process.
///
/// Contract:
/// - `FetchExperiment` is answered with `Command::Experiment`
/// - `FetchTask` is answered with `Payload::Task`
/// - results are sent as `Payload::Result` and never answered
pub struct RelayClient<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    rx: FrameReceiver<R>,
    tx: FrameSender<W>,
    rx_buf: Vec<u32>,
}

impl RelayClient<OwnedReadHalf, OwnedWriteHalf> {
    /// Connects to a relay server over tcp.
    ///
    /// # Arguments
    /// * `addr` - The address the master's relay server listens on.
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;

        let (rx, tx) = stream.into_split();
        let (rx, tx) = comms::channel(rx, tx);
        Ok(Self::new(rx, tx))
    }
}

impl<R, W> RelayClient<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(rx: FrameReceiver<R>, tx: FrameSender<W>) -> Self {
        Self {
            rx,
            tx,
            rx_buf: Vec::new(),
        }
    }

    /// Says goodbye to the relay server and waits for its acknowledgement.
    pub async fn disconnect(mut self) -> io::Result<()> {
        self.tx.send(&Msg::Control(Command::Disconnect)).await?;

        match self.rx.recv_into(&mut self.rx_buf).await? {
            Msg::Control(Command::Disconnect) => Ok(()),
            other => unexpected("a disconnect acknowledgement", &other),
        }
    }
}

/// Creates an error for an answer that doesn't match the request.
///
/// # Arguments
/// * `expected` - What the request should have been answered with.
/// * `msg` - The received message.
fn unexpected<T>(expected: &str, msg: &Msg) -> io::Result<T> {
    let text = match msg {
        Msg::Err(e) => format!("the relay server failed: {e}"),
        other => format!("expected {expected}, got: {other:?}"),
    };

    Err(io::Error::new(io::ErrorKind::InvalidData, text))
}

impl<R, W> WorkerClient for RelayClient<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn get_experiment(&mut self) -> io::Result<ExperimentSpec> {
        self.tx.send(&Msg::Control(Command::FetchExperiment)).await?;

        match self.rx.recv_into(&mut self.rx_buf).await? {
            Msg::Control(Command::Experiment(exp)) => Ok(exp),
            other => unexpected("an experiment", &other),
        }
    }

    async fn get_current_task(&mut self) -> io::Result<(TaskId, Arc<Task>)> {
        self.tx.send(&Msg::Control(Command::FetchTask)).await?;

        match self.rx.recv_into(&mut self.rx_buf).await? {
            Msg::Data(Payload::Task { id, meta, params }) => {
                let task = Task {
                    params: params.to_vec(),
                    meta,
                };
                Ok((id, Arc::new(task)))
            }
            other => unexpected("a task", &other),
        }
    }

    async fn push_result(&mut self, task_id: TaskId, result: EsResult) -> io::Result<()> {
        let msg = Msg::Data(Payload::Result { task_id, result });
        self.tx.send(&msg).await
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use comms::specs::{
        result::Outcome,
        task::{ObNorm, TaskMeta},
    };
    use tokio::io;

    use super::{Command, EsResult, Msg, Payload, RelayClient, WorkerClient};

    const BUF_SIZE: usize = 4096;

    /// The server answers a task request, then receives the worker's result.
    #[tokio::test]
    async fn task_and_result_roundtrip_over_duplex() -> io::Result<()> {
        let (sv_stream, wk_stream) = io::duplex(BUF_SIZE);

        let (sv_rx, sv_tx) = io::split(sv_stream);
        let (mut sv_rx, mut sv_tx) = comms::channel(sv_rx, sv_tx);

        let (wk_rx, wk_tx) = io::split(wk_stream);
        let (wk_rx, wk_tx) = comms::channel(wk_rx, wk_tx);
        let mut client = RelayClient::new(wk_rx, wk_tx);

        let server = tokio::spawn(async move {
            let mut buf: Vec<u32> = Vec::new();

            let msg: Msg = sv_rx.recv_into(&mut buf).await?;
            assert!(matches!(msg, Msg::Control(Command::FetchTask)));

            let params = [1.0_f32, -2.0, 3.5];
            let meta = TaskMeta {
                ob_stat: Some(ObNorm {
                    mean: vec![0.0, 1.0],
                    std: vec![1.0, 2.0],
                }),
                timestep_limit: Some(7),
            };
            let msg = Msg::Data(Payload::Task {
                id: 4,
                meta,
                params: &params,
            });
            sv_tx.send(&msg).await?;

            match sv_rx.recv_into(&mut buf).await? {
                Msg::Data(Payload::Result { task_id, result }) => {
                    Ok::<_, io::Error>((task_id, result))
                }
                other => panic!("unexpected msg: {other:?}"),
            }
        });

        let (id, task) = client.get_current_task().await?;
        assert_eq!(id, 4);
        assert_eq!(task.params, [1.0, -2.0, 3.5]);
        assert_eq!(task.meta.timestep_limit, Some(7));
        assert_eq!(task.meta.ob_stat.as_ref().map(|n| n.std.clone()), Some(vec![1.0, 2.0]));

        let result = EsResult {
            worker_id: 9,
            outcome: Outcome::Eval {
                eval_return: -3.0,
                eval_length: 12,
            },
        };
        client.push_result(id, result.clone()).await?;

        let (task_id, received): (_, EsResult) = server.await.unwrap()?;
        assert_eq!(task_id, 4);
        assert_eq!(received, result);

        Ok(())
    }

    #[tokio::test]
    async fn server_errors_are_surfaced() -> io::Result<()> {
        let (sv_stream, wk_stream) = io::duplex(BUF_SIZE);

        let (sv_rx, sv_tx) = io::split(sv_stream);
        let (_sv_rx, mut sv_tx) = comms::channel(sv_rx, sv_tx);

        let (wk_rx, wk_tx) = io::split(wk_stream);
        let (wk_rx, wk_tx) = comms::channel(wk_rx, wk_tx);
        let mut client = RelayClient::new(wk_rx, wk_tx);

        sv_tx.send(&Msg::Err(Cow::Borrowed("no experiment"))).await?;

        let err = client.get_experiment().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(err.to_string().contains("no experiment"));

        Ok(())
    }
}
