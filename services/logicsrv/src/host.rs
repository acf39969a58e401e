//! JSON-lines host plumbing
//!
//! Signal updates arrive one per line on the input stream:
//!
//! ```text
//! {"path": "electrical.switches.bank.0.1.state", "value": 1}
//! ```
//!
//! Every delivery the engine makes is written as one line on the output
//! stream. The bus is only ever published from the pump task; with
//! loopback enabled, a delivery is republished inline from that same task.

use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use switchlogic_bus::{
    BusError, Delivery, DeliveryMode, MemoryBus, OutputSink, PutCallback, PutResponse,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use std::future::Future;
use tracing::{debug, info, trace, warn};

/// One incoming signal update
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SignalUpdate {
    pub path: String,
    #[serde(default)]
    pub value: Value,
}

/// Parse a single input line; blank lines yield `Ok(None)`
pub fn parse_update(line: &str) -> serde_json::Result<Option<SignalUpdate>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(line).map(Some)
}

/// Output sink that forwards deliveries to the writer task
pub struct ChannelSink {
    tx: Mutex<Option<UnboundedSender<Delivery>>>,
    loopback: Option<Arc<MemoryBus>>,
}

impl ChannelSink {
    pub fn new(tx: UnboundedSender<Delivery>) -> Self {
        Self {
            tx: Mutex::new(Some(tx)),
            loopback: None,
        }
    }

    /// Republish every delivered value on `bus`
    pub fn with_loopback(mut self, bus: Arc<MemoryBus>) -> Self {
        self.loopback = Some(bus);
        self
    }

    /// Release the sender so the writer drains and ends
    pub fn close(&self) {
        self.tx.lock().take();
    }

    fn send(&self, delivery: Delivery) -> switchlogic_bus::Result<()> {
        let path = delivery.path.clone();
        let value = delivery.value.clone();
        {
            let tx = self.tx.lock();
            let tx = tx
                .as_ref()
                .ok_or_else(|| BusError::SinkClosed("output channel".to_string()))?;
            tx.send(delivery)
                .map_err(|_| BusError::SinkClosed("output channel".to_string()))?;
        }
        if let Some(bus) = &self.loopback {
            bus.publish(&path, value);
        }
        Ok(())
    }
}

impl OutputSink for ChannelSink {
    fn notify(&self, source: &str, path: &str, value: Value) -> switchlogic_bus::Result<()> {
        self.send(Delivery {
            mode: DeliveryMode::Notify,
            source: Some(source.to_string()),
            path: path.to_string(),
            value,
        })
    }

    fn put(&self, path: &str, value: Value, ack: PutCallback) -> switchlogic_bus::Result<()> {
        self.send(Delivery {
            mode: DeliveryMode::Put,
            source: None,
            path: path.to_string(),
            value,
        })?;
        // Queued for the writer; nothing downstream reports back
        ack(PutResponse::completed());
        Ok(())
    }
}

/// Read updates until end of input, forwarding each to the pump
///
/// Returns the number of updates accepted. Malformed lines are skipped.
pub async fn read_updates<R>(input: R, tx: UnboundedSender<SignalUpdate>) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut count = 0usize;
    let mut line_no = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        match parse_update(&line) {
            Ok(Some(update)) => {
                if tx.send(update).is_err() {
                    debug!("Pump closed, reader stopping");
                    break;
                }
                count += 1;
            },
            Ok(None) => {},
            Err(e) => warn!("Skipping malformed input line {}: {}", line_no, e),
        }
    }

    debug!("Input ended after {} lines", line_no);
    Ok(count)
}

/// Publish updates onto the bus in arrival order
///
/// Ends when the reader is done or `shutdown` resolves, returning the number
/// of updates published.
pub async fn pump<F>(bus: &MemoryBus, mut rx: UnboundedReceiver<SignalUpdate>, shutdown: F) -> usize
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut count = 0usize;

    loop {
        tokio::select! {
            update = rx.recv() => match update {
                Some(update) => {
                    trace!("update {} = {}", update.path, update.value);
                    bus.publish(&update.path, update.value);
                    count += 1;
                },
                None => break,
            },
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            },
        }
    }
    count
}

/// Write each delivery as one JSON line; ends when every sender is gone
pub async fn write_outputs<W>(mut output: W, mut rx: UnboundedReceiver<Delivery>) -> std::io::Result<usize>
where
    W: AsyncWrite + Unpin,
{
    let mut count = 0usize;
    while let Some(delivery) = rx.recv().await {
        let mut line = serde_json::to_vec(&delivery).map_err(std::io::Error::other)?;
        line.push(b'\n');
        output.write_all(&line).await?;
        output.flush().await?;
        count += 1;
    }
    output.shutdown().await?;
    Ok(count)
}
