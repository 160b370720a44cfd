//! Runs a [`TsWriter`] on tokio's blocking pool.
//!
//! Segment writing does synchronous file I/O, so the writer lives on a
//! blocking task and async callers talk to it through a command channel.
//! Each stream gets its own pipeline; pipelines run independently.

use super::pes::PesPacket;
use super::writer::{SegmentSummary, TsWriter};
use crate::error::{Result, TsError};
use log::{debug, warn};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

const DEFAULT_CAPACITY: usize = 100;

enum Command {
    NewSegment {
        file_name: String,
        reply: oneshot::Sender<Result<()>>,
    },
    AddPes {
        pes_packet: PesPacket,
        reply: oneshot::Sender<Result<()>>,
    },
    SignalEncrypted {
        reply: oneshot::Sender<Result<()>>,
    },
    Finalize {
        reply: oneshot::Sender<Result<SegmentSummary>>,
    },
}

/// Async handle to a writer running on a blocking task.
pub struct SegmentPipeline {
    commands: mpsc::Sender<Command>,
    task: JoinHandle<TsWriter>,
}

impl SegmentPipeline {
    /// Moves an initialized `writer` onto the blocking pool. Must be called
    /// from within a tokio runtime.
    pub fn spawn(writer: TsWriter) -> Result<Self> {
        Self::with_capacity(writer, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(writer: TsWriter, capacity: usize) -> Result<Self> {
        if !writer.is_initialized() {
            return Err(TsError::InvalidState("writer is not initialized".into()));
        }

        let (tx, rx) = mpsc::channel(capacity.max(1));
        let task = tokio::task::spawn_blocking(move || run(writer, rx));
        Ok(Self { commands: tx, task })
    }

    pub async fn new_segment(&self, file_name: impl Into<String>) -> Result<()> {
        let file_name = file_name.into();
        self.request(|reply| Command::NewSegment { file_name, reply })
            .await
    }

    pub async fn add_pes_packet(&self, pes_packet: PesPacket) -> Result<()> {
        self.request(|reply| Command::AddPes { pes_packet, reply })
            .await
    }

    pub async fn signal_encrypted(&self) -> Result<()> {
        self.request(|reply| Command::SignalEncrypted { reply }).await
    }

    pub async fn finalize_segment(&self) -> Result<SegmentSummary> {
        self.request(|reply| Command::Finalize { reply }).await
    }

    /// Stops the task once queued commands are done and hands the writer
    /// back.
    pub async fn shutdown(self) -> Result<TsWriter> {
        drop(self.commands);
        self.task
            .await
            .map_err(|e| TsError::InvalidState(format!("pipeline task failed: {}", e)))
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<Result<T>>) -> Command,
    ) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| TsError::InvalidState("pipeline has stopped".into()))?;
        response
            .await
            .map_err(|_| TsError::InvalidState("pipeline dropped the request".into()))?
    }
}

fn run(mut writer: TsWriter, mut commands: mpsc::Receiver<Command>) -> TsWriter {
    debug!("Segment pipeline started");

    while let Some(command) = commands.blocking_recv() {
        let delivered = match command {
            Command::NewSegment { file_name, reply } => {
                reply.send(writer.new_segment(&file_name)).is_ok()
            }
            Command::AddPes { pes_packet, reply } => {
                reply.send(writer.add_pes_packet(pes_packet)).is_ok()
            }
            Command::SignalEncrypted { reply } => reply.send(writer.signal_encrypted()).is_ok(),
            Command::Finalize { reply } => reply.send(writer.finalize_segment()).is_ok(),
        };
        if !delivered {
            warn!("Pipeline caller went away before receiving a reply");
        }
    }

    debug!("Segment pipeline stopped");
    writer
}
