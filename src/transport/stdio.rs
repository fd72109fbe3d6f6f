//! Point-to-point transport over standard input/output.
//!
//! Newline-delimited JSON-RPC. Each line is handled on its own task and
//! all writes go through one writer task, so a slow tool call never blocks
//! reading or other responses. Notifications get no reply.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};

use crate::lifecycle::Shutdown;
use crate::rpc::{RpcRequest, RpcResponse, RpcRouter};

pub const TRANSPORT_LABEL: &str = "stdio";

const WRITE_QUEUE: usize = 256;
const DEFAULT_GRACE: Duration = Duration::from_secs(10);

/// Factory for the stdio transport task.
#[derive(Debug, Clone)]
pub struct StdioTransport {
    rpc: RpcRouter,
    grace: Duration,
}

/// A running stdio transport.
#[derive(Debug)]
pub struct StdioHandle {
    shutdown: Shutdown,
    closed: Shutdown,
    task: JoinHandle<io::Result<()>>,
}

impl StdioTransport {
    pub fn new(rpc: RpcRouter) -> Self {
        Self {
            rpc,
            grace: DEFAULT_GRACE,
        }
    }

    /// How long `stop` waits for in-flight calls before aborting them.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Serve the process's stdin/stdout.
    pub fn start(&self) -> StdioHandle {
        self.start_with(tokio::io::stdin(), tokio::io::stdout())
    }

    /// Serve an arbitrary reader/writer pair.
    pub fn start_with<R, W>(&self, reader: R, writer: W) -> StdioHandle
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let shutdown = Shutdown::new();
        let closed = Shutdown::new();
        let rpc = self.rpc.clone();
        let grace = self.grace;
        let stop = shutdown.clone();
        let done = closed.clone();

        let task = tokio::spawn(async move {
            let result = serve(rpc, reader, writer, stop, grace).await;
            done.trigger();
            result
        });

        tracing::info!("Stdio transport started");
        StdioHandle {
            shutdown,
            closed,
            task,
        }
    }
}

impl StdioHandle {
    /// Latch that fires when the transport ends (EOF, error or stop).
    pub fn closed(&self) -> Shutdown {
        self.closed.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.closed.is_triggered()
    }

    /// Stop reading and flush pending responses. Calls still running after
    /// the grace period are aborted and reported as a `TimedOut` error.
    pub async fn stop(self) -> io::Result<()> {
        self.shutdown.trigger();
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(io::Error::other(e.to_string())),
        }
    }
}

async fn serve<R, W>(
    rpc: RpcRouter,
    reader: R,
    writer: W,
    shutdown: Shutdown,
    grace: Duration,
) -> io::Result<()>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<RpcResponse>(WRITE_QUEUE);
    let writer_task = tokio::spawn(write_responses(writer, rx));
    let mut lines = BufReader::new(reader).lines();
    let mut handlers = JoinSet::new();

    let read_result = loop {
        let line = tokio::select! {
            _ = shutdown.wait() => break Ok(()),
            Some(joined) = handlers.join_next(), if !handlers.is_empty() => {
                log_join(joined);
                continue;
            }
            line = lines.next_line() => line,
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => {
                tracing::info!("Stdin closed");
                break Ok(());
            }
            Err(e) => break Err(e),
        };
        if line.trim().is_empty() {
            continue;
        }

        let rpc = rpc.clone();
        let tx = tx.clone();
        handlers.spawn(async move {
            let reply = match RpcRequest::parse(line.as_bytes()) {
                Ok(request) if request.is_notification => {
                    let _ = rpc.handle(request, TRANSPORT_LABEL).await;
                    return;
                }
                Ok(request) => rpc.handle(request, TRANSPORT_LABEL).await,
                Err(e) => {
                    tracing::warn!(error = %e, "Rejected stdio envelope");
                    e.to_response()
                }
            };
            let _ = tx.send(reply).await;
        });
    };

    // The writer ends once every in-flight handler has dropped its sender.
    drop(tx);
    let drained = tokio::select! {
        _ = async {
            while let Some(joined) = handlers.join_next().await {
                log_join(joined);
            }
        } => true,
        _ = async {
            shutdown.wait().await;
            tokio::time::sleep(grace).await;
        } => false,
    };
    let drain_result = if drained {
        Ok(())
    } else {
        let abandoned = handlers.len();
        tracing::warn!(abandoned, grace_ms = grace.as_millis() as u64, "Aborting stdio calls still in flight");
        handlers.shutdown().await;
        Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("{} stdio call(s) still running after {:?}; aborted", abandoned, grace),
        ))
    };

    let write_result = match writer_task.await {
        Ok(result) => result,
        Err(e) => Err(io::Error::other(e.to_string())),
    };

    tracing::info!("Stdio transport stopped");
    read_result.and(drain_result).and(write_result)
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            tracing::error!(error = %e, "Stdio handler panicked");
        }
    }
}

async fn write_responses<W>(mut writer: W, mut rx: mpsc::Receiver<RpcResponse>) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let mut line = match serde_json::to_vec(&response) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize response");
                continue;
            }
        };
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
    }
    Ok(())
}
