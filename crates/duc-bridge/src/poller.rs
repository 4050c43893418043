//! Periodic value polling
//!
//! Each cycle reads every catalogued pid with one `pdb.getvalue`, formats
//! the values through their classification and publishes one batch per
//! category. A failed read ends the loop: without session renewal a
//! failing controller call is not recoverable. A failed publish is logged
//! and the cycle carries on.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use duc_client::DucClient;
use tracing::{debug, error, info, Span};

use crate::catalog::Catalog;
use crate::classification::Category;
use crate::error::BridgeResult;
use crate::sink::{Batch, Sink};

/// Interval used when none (or zero) is configured
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

/// Outcome of one poll cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Categories whose batch the sink accepted
    pub published: Vec<Category>,
    /// Categories whose publish failed
    pub failed: Vec<Category>,
    /// Returned pids with no catalog entry
    pub unknown: Vec<String>,
}

/// Drives the read / translate / publish cycle
#[derive(Debug, Clone)]
pub struct Poller {
    interval: Duration,
    span: Span,
}

impl Poller {
    /// A zero interval falls back to [`DEFAULT_INTERVAL`]
    pub fn new(interval: Duration) -> Self {
        let interval = if interval.is_zero() {
            DEFAULT_INTERVAL
        } else {
            interval
        };
        Self {
            interval,
            span: Span::current(),
        }
    }

    /// Record all events under `span`
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Poll forever. Returns only on a controller failure.
    pub async fn run(
        &self,
        client: &mut DucClient,
        catalog: &Catalog,
        sink: &dyn Sink,
    ) -> BridgeResult<()> {
        self.run_until(client, catalog, sink, std::future::pending())
            .await
    }

    /// Poll until `shutdown` resolves or the controller fails.
    ///
    /// The first cycle runs immediately; later cycles wait `interval`
    /// after the previous one finished. `shutdown` is observed while
    /// waiting and before every read.
    pub async fn run_until<F>(
        &self,
        client: &mut DucClient,
        catalog: &Catalog,
        sink: &dyn Sink,
        shutdown: F,
    ) -> BridgeResult<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut first = true;

        loop {
            if !first {
                tokio::select! {
                    biased;
                    _ = &mut shutdown => break,
                    _ = tokio::time::sleep(self.interval) => {}
                }
            }
            first = false;

            // Don't start a read once shutdown has been requested
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = std::future::ready(()) => {}
            }

            self.poll_once(client, catalog, sink).await?;
        }

        info!(parent: &self.span, "Polling stopped");
        Ok(())
    }

    /// Run exactly one cycle
    pub async fn poll_once(
        &self,
        client: &mut DucClient,
        catalog: &Catalog,
        sink: &dyn Sink,
    ) -> BridgeResult<CycleReport> {
        let pids = catalog.pids();
        let values = client.get_values(&pids).await?;

        let mut report = CycleReport::default();
        let mut batches: BTreeMap<Category, Batch> = BTreeMap::new();

        for sample in values.samples() {
            let Some(classification) = catalog.get(&sample.pid) else {
                debug!(parent: &self.span, pid = %sample.pid, "Value for uncatalogued point");
                report.unknown.push(sample.pid);
                continue;
            };
            batches
                .entry(classification.category())
                .or_default()
                .insert(sample.pid, classification.format(sample.value));
        }

        for (category, batch) in &batches {
            match sink.publish(*category, catalog.device_id(), batch).await {
                Ok(()) => {
                    debug!(
                        parent: &self.span,
                        category = %category,
                        values = batch.len(),
                        "Successfully sent sensor data"
                    );
                    report.published.push(*category);
                }
                Err(e) => {
                    error!(parent: &self.span, category = %category, error = %e, "Failed to send sensor data");
                    report.failed.push(*category);
                }
            }
        }

        Ok(report)
    }
}
