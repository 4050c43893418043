//! Publisher boundary
//!
//! The bus publisher lives outside this crate. The poller only needs an
//! ok/error signal per batch.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::{info, Span};

use crate::classification::Category;
use crate::error::SinkError;

/// One category's formatted values, keyed by pid
pub type Batch = BTreeMap<String, String>;

/// Receives one batch per category per poll cycle
#[async_trait]
pub trait Sink: Send + Sync {
    async fn publish(&self, category: Category, device_id: &str, batch: &Batch)
        -> Result<(), SinkError>;
}

/// Sink that records every batch as a log event
#[derive(Debug, Clone)]
pub struct LogSink {
    span: Span,
}

impl LogSink {
    pub fn new() -> Self {
        Self {
            span: Span::current(),
        }
    }

    /// Record all events under `span`
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Sink for LogSink {
    async fn publish(
        &self,
        category: Category,
        device_id: &str,
        batch: &Batch,
    ) -> Result<(), SinkError> {
        let payload = serde_json::to_string(batch)
            .map_err(|e| SinkError::new(category, e.to_string()))?;
        info!(
            parent: &self.span,
            category = %category,
            device = %device_id,
            values = batch.len(),
            %payload,
            "Publishing sensor data"
        );
        Ok(())
    }
}
