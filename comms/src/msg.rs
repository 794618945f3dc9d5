use std::{borrow::Cow, io};

use crate::{
    Deserialize, Serialize,
    specs::{
        experiment::ExperimentSpec,
        result::EsResult,
        task::{TaskId, TaskMeta},
    },
};

type Header = u32;
const HEADER_SIZE: usize = size_of::<Header>();
const TASK_ID_SIZE: usize = size_of::<TaskId>();

type MetaLen = u32;
const META_LEN_SIZE: usize = size_of::<MetaLen>();

const ERR: Header = 0;
const CONTROL: Header = 1;
const TASK: Header = 2;
const RESULT: Header = 3;

/// The payload data for the `Data` variant of the `Msg` enum.
#[derive(Debug)]
pub enum Payload<'a> {
    /// A published task, `params` is written and read without copies.
    Task {
        id: TaskId,
        meta: TaskMeta,
        params: &'a [f32],
    },
    Result { task_id: TaskId, result: EsResult },
}

/// The command for the `Control` variant of the `Msg` enum.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    FetchExperiment,
    Experiment(ExperimentSpec),
    FetchTask,
    Disconnect,
}

/// The application layer message between the master's relay and its workers.
#[derive(Debug)]
pub enum Msg<'a> {
    Control(Command),
    Data(Payload<'a>),
    Err(Cow<'a, str>),
}

fn invalid_data<T, E>(err: E) -> io::Result<T>
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    Err(io::Error::new(io::ErrorKind::InvalidData, err))
}

fn buf_is_too_small<T>(size: usize, needed: usize) -> io::Result<T> {
    invalid_data(format!(
        "the given buffer is too small {size}, must at least be {needed} bytes"
    ))
}

fn split_be<const N: usize>(buf: &[u8]) -> io::Result<([u8; N], &[u8])> {
    match buf.split_first_chunk::<N>() {
        Some((head, rest)) => Ok((*head, rest)),
        None => buf_is_too_small(buf.len(), N),
    }
}

impl<'a> Serialize<'a> for Msg<'a> {
    fn serialize(&'a self, buf: &mut Vec<u8>) -> io::Result<Option<&'a [u8]>> {
        match self {
            Msg::Err(e) => {
                buf.extend_from_slice(&ERR.to_be_bytes());
                Ok(Some(e.as_bytes()))
            }
            Msg::Control(cmd) => {
                buf.extend_from_slice(&CONTROL.to_be_bytes());
                serde_json::to_writer(&mut *buf, cmd)?;
                Ok(None)
            }
            Msg::Data(Payload::Task { id, meta, params }) => {
                buf.extend_from_slice(&TASK.to_be_bytes());
                buf.extend_from_slice(&id.to_be_bytes());

                let len_at = buf.len();
                buf.extend_from_slice(&[0; META_LEN_SIZE]);
                serde_json::to_writer(&mut *buf, meta)?;

                let meta_len = buf.len() - len_at - META_LEN_SIZE;
                let Ok(meta_len) = MetaLen::try_from(meta_len) else {
                    return invalid_data(format!("task metadata of {meta_len} bytes is too large"));
                };
                buf[len_at..len_at + META_LEN_SIZE].copy_from_slice(&meta_len.to_be_bytes());

                // Pads so the parameters start 4 byte aligned within the frame.
                buf.resize(buf.len().next_multiple_of(size_of::<f32>()), 0);
                Ok(Some(bytemuck::cast_slice(params)))
            }
            Msg::Data(Payload::Result { task_id, result }) => {
                buf.extend_from_slice(&RESULT.to_be_bytes());
                buf.extend_from_slice(&task_id.to_be_bytes());
                serde_json::to_writer(&mut *buf, result)?;
                Ok(None)
            }
        }
    }
}

impl<'a> Deserialize<'a> for Msg<'a> {
    fn deserialize(buf: &'a [u8]) -> io::Result<Self> {
        let (kind, rest) = split_be::<HEADER_SIZE>(buf)?;

        match Header::from_be_bytes(kind) {
            ERR => match std::str::from_utf8(rest) {
                Ok(text) => Ok(Self::Err(Cow::Borrowed(text))),
                Err(err) => invalid_data(err),
            },
            CONTROL => {
                let cmd = serde_json::from_slice(rest)?;
                Ok(Self::Control(cmd))
            }
            TASK => {
                let (id, rest) = split_be::<TASK_ID_SIZE>(rest)?;
                let (meta_len, rest) = split_be::<META_LEN_SIZE>(rest)?;
                let meta_len = MetaLen::from_be_bytes(meta_len) as usize;

                let Some(meta) = rest.get(..meta_len) else {
                    return buf_is_too_small(rest.len(), meta_len);
                };
                let meta = serde_json::from_slice(meta)?;

                let start = HEADER_SIZE + TASK_ID_SIZE + META_LEN_SIZE + meta_len;
                let start = start.next_multiple_of(size_of::<f32>());
                let params = match bytemuck::try_cast_slice(buf.get(start..).unwrap_or_default()) {
                    Ok(params) => params,
                    Err(err) => return invalid_data(format!("malformed task parameters: {err}")),
                };

                Ok(Self::Data(Payload::Task {
                    id: TaskId::from_be_bytes(id),
                    meta,
                    params,
                }))
            }
            RESULT => {
                let (task_id, rest) = split_be::<TASK_ID_SIZE>(rest)?;
                let result = serde_json::from_slice(rest)?;

                Ok(Self::Data(Payload::Result {
                    task_id: TaskId::from_be_bytes(task_id),
                    result,
                }))
            }
            kind => invalid_data(format!("received an invalid kind header {kind}")),
        }
    }
}
