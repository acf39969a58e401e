//! logicsrv - Switch logic service
//!
//! Hosts the switchlogic rule engine over a JSON-lines stream: signal updates
//! are read from the input, published on an in-memory bus, and every output
//! delivery is written back as a JSON line.

pub mod config;
pub mod host;
pub mod logging;
pub mod shutdown;

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use switchlogic_bus::{MemoryBus, MemorySink};
use switchlogic_expr::{boolean_table, ExpressionParser};
use switchlogic_rules::{RuleEngine, RuleLoggerManager, StartReport, Term};
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

pub use config::LogicsrvConfig;
use host::ChannelSink;

/// What a `serve` run did
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub report: StartReport,
    /// Signal updates published on the bus
    pub updates: usize,
    /// Deliveries written to the output
    pub outputs: usize,
}

/// Run the configured rules until input ends or `shutdown` resolves
pub async fn serve<R, W, F>(config: &LogicsrvConfig, input: R, output: W, shutdown: F) -> Result<RunSummary>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
    F: Future<Output = ()>,
{
    let bus = Arc::new(MemoryBus::new());

    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(host::write_outputs(output, out_rx));

    let mut sink = ChannelSink::new(out_tx);
    if config.loopback {
        sink = sink.with_loopback(Arc::clone(&bus));
    }
    let sink = Arc::new(sink);

    let mut engine = RuleEngine::new(bus.clone(), sink.clone());
    if let Some(root) = config.rule_log_root() {
        info!("Rule transition logs under {}", root.join("rules").display());
        engine = engine.with_rule_logs(Arc::new(RuleLoggerManager::new(root)));
    }

    let report = match engine.start(&config.engine) {
        Ok(report) => report,
        Err(e) => {
            sink.close();
            match writer.await {
                Ok(Err(write_err)) => warn!("Output writer failed: {}", write_err),
                Err(join_err) => warn!("Output writer panicked: {}", join_err),
                Ok(Ok(_)) => {},
            }
            return Err(anyhow!(e).context("Failed to start rule engine"));
        },
    };
    for dropped in &report.dropped {
        warn!("Rule '{}' not started: {}", dropped.rule, dropped.reason);
    }

    let (in_tx, in_rx) = mpsc::unbounded_channel();
    let reader = tokio::spawn(host::read_updates(BufReader::new(input), in_tx));

    let updates = host::pump(&bus, in_rx, shutdown).await;

    reader.abort();
    match reader.await {
        Ok(Err(e)) => warn!("Input read failed: {}", e),
        Ok(Ok(_)) | Err(_) => {},
    }

    engine.stop();
    drop(engine);
    sink.close();

    let outputs = writer
        .await
        .context("Output writer panicked")?
        .context("Failed to write output")?;

    info!("logicsrv finished: {} updates in, {} outputs", updates, outputs);
    Ok(RunSummary {
        report,
        updates,
        outputs,
    })
}

/// Compile every configured rule without running anything
pub fn check(config: &LogicsrvConfig) -> Result<StartReport> {
    let bus = Arc::new(MemoryBus::new());
    let engine = RuleEngine::new(bus, Arc::new(MemorySink::new()));
    let report = engine
        .start(&config.engine)
        .context("No usable rules")?;
    engine.stop();
    Ok(report)
}

/// Compile an infix expression to prefix form, checking it the way the
/// engine does: every operand must decode and exactly one value must remain
pub fn compile(expression: &str) -> Result<String> {
    let parser = ExpressionParser::new(boolean_table(|token| Term::parse(token).ok().map(|_| true)));
    let prefix = parser.infix_to_prefix(expression)?;
    if parser.parse_prefix(&prefix).is_none() {
        return Err(anyhow!("Invalid expression '{}' (prefix '{}')", expression, prefix));
    }
    Ok(prefix)
}
