//! Debounced Writer
//!
//! Coalesces bursts of writes into one. Every `schedule()` bumps a generation
//! counter and spawns a timer task; when the timer fires it only writes if no
//! newer value was scheduled in the meantime. `flush()` writes the pending
//! value immediately and invalidates outstanding timers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::utils::error::AppResult;

/// Destination of a debounced writer
#[async_trait]
pub trait WriteSink<T>: Send + Sync + 'static
where
    T: Send + 'static,
{
    async fn write(&self, value: T) -> AppResult<()>;

    /// Name used in log lines
    fn name(&self) -> &str;
}

struct Pending<T> {
    generation: u64,
    value: Option<T>,
}

pub struct Debouncer<T>
where
    T: Send + 'static,
{
    delay: Duration,
    pending: Arc<Mutex<Pending<T>>>,
    sink: Arc<dyn WriteSink<T>>,
}

impl<T> Debouncer<T>
where
    T: Send + 'static,
{
    pub fn new(delay: Duration, sink: Arc<dyn WriteSink<T>>) -> Self {
        Self {
            delay,
            pending: Arc::new(Mutex::new(Pending {
                generation: 0,
                value: None,
            })),
            sink,
        }
    }

    /// Replace the pending value and restart the timer.
    pub async fn schedule(&self, value: T) {
        let generation = {
            let mut pending = self.pending.lock().await;
            pending.generation += 1;
            pending.value = Some(value);
            pending.generation
        };

        let delay = self.delay;
        let pending = Arc::clone(&self.pending);
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let value = {
                let mut pending = pending.lock().await;
                if pending.generation != generation {
                    return;
                }
                pending.value.take()
            };
            if let Some(value) = value {
                if let Err(e) = sink.write(value).await {
                    tracing::warn!("[Debounce] {} write failed: {}", sink.name(), e);
                }
            }
        });
    }

    /// Write the pending value now, if any.
    pub async fn flush(&self) -> AppResult<()> {
        let value = {
            let mut pending = self.pending.lock().await;
            pending.generation += 1;
            pending.value.take()
        };
        match value {
            Some(value) => self.sink.write(value).await,
            None => Ok(()),
        }
    }

    /// Drop the pending value without writing it.
    pub async fn cancel(&self) {
        let mut pending = self.pending.lock().await;
        pending.generation += 1;
        pending.value = None;
    }

    pub async fn has_pending(&self) -> bool {
        self.pending.lock().await.value.is_some()
    }
}

impl<T> std::fmt::Debug for Debouncer<T>
where
    T: Send + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("delay", &self.delay)
            .field("sink", &self.sink.name())
            .finish()
    }
}
