use std::{fmt::Debug, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::core::event::{EventRecord, GroupTraits, UserTraits};

/// Vendor event-ingestion SDK surface.
///
/// The production implementation wraps the vendor's client, constructed by
/// the host with an environment-selected write credential. Queueing,
/// batching and delivery are the vendor's concern; this crate only decides
/// what reaches the sink.
#[async_trait]
pub trait EventSink: Debug {
    /// Tie traits to the user identified by `id`.
    async fn identify(&self, id: &str, traits: UserTraits) -> Result<()>;

    /// Associate the current user with a group.
    async fn group(&self, group_id: &str, traits: GroupTraits) -> Result<()>;

    /// Record a single event.
    async fn track(&self, event: EventRecord) -> Result<()>;

    /// Merge two historical identities into one user timeline.
    async fn alias(&self, id: &str) -> Result<()>;

    /// Clear the vendor-side session identity.
    async fn reset(&self, context_id: &str) -> Result<()>;

    /// Push any queued events to the vendor.
    async fn flush(&self) -> Result<()>;
}

/// One recorded [EventSink] invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkCall {
    Identify { id: String, traits: UserTraits },
    Group { group_id: String, traits: GroupTraits },
    Track(EventRecord),
    Alias { id: String },
    Reset { context_id: String },
    Flush,
}

/// A call-recording in-memory sink. Not for production use!
///
/// # Warning
/// This sink only exists so tests and host-application previews can observe
/// what would have reached the vendor; nothing is ever delivered.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    calls: Arc<Mutex<Vec<SinkCall>>>,
}

impl MemorySink {
    /// Every call received so far, in order.
    pub async fn calls(&self) -> Vec<SinkCall> {
        self.calls.lock().await.clone()
    }

    /// Received [SinkCall::Track] records, in order.
    pub async fn tracked(&self) -> Vec<EventRecord> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|call| match call {
                SinkCall::Track(event) => Some(event.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl EventSink for MemorySink {
    async fn identify(&self, id: &str, traits: UserTraits) -> Result<()> {
        self.calls.try_lock()?.push(SinkCall::Identify {
            id: id.to_owned(),
            traits,
        });

        Ok(())
    }

    async fn group(&self, group_id: &str, traits: GroupTraits) -> Result<()> {
        self.calls.try_lock()?.push(SinkCall::Group {
            group_id: group_id.to_owned(),
            traits,
        });

        Ok(())
    }

    async fn track(&self, event: EventRecord) -> Result<()> {
        self.calls.try_lock()?.push(SinkCall::Track(event));

        Ok(())
    }

    async fn alias(&self, id: &str) -> Result<()> {
        self.calls
            .try_lock()?
            .push(SinkCall::Alias { id: id.to_owned() });

        Ok(())
    }

    async fn reset(&self, context_id: &str) -> Result<()> {
        self.calls.try_lock()?.push(SinkCall::Reset {
            context_id: context_id.to_owned(),
        });

        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        self.calls.try_lock()?.push(SinkCall::Flush);

        Ok(())
    }
}
