//! Writes every bus event to the structured log.

use tokio::sync::broadcast;

use crate::bus::{event_types, ReviewEvent};

/// Background task draining the bus into `tracing`.
pub struct EventLogger;

impl EventLogger {
    /// Log events until the bus is dropped.
    pub async fn run(mut receiver: broadcast::Receiver<ReviewEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => Self::log(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Event logger lagged, some events were not logged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, event logger shutting down");
                    break;
                }
            }
        }
    }

    fn log(event: &ReviewEvent) {
        let context_id = event.context_id.as_deref().unwrap_or("-");
        let sheet_key = event.sheet_key.as_deref().unwrap_or("-");
        if event.event_type == event_types::UPDATE_ROLLED_BACK {
            tracing::warn!(
                event_type = %event.event_type,
                context_id,
                payload = %event.payload,
                "Update rolled back by intercept rule"
            );
        } else {
            tracing::info!(
                event_type = %event.event_type,
                context_id,
                sheet_key,
                payload = %event.payload,
                "Review event"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventBus;

    #[tokio::test]
    async fn logger_exits_when_bus_is_dropped() {
        let bus = EventBus::default();
        let handle = tokio::spawn(EventLogger::run(bus.subscribe()));

        bus.publish(ReviewEvent::new(event_types::UPDATE_ROLLED_BACK));
        bus.publish(ReviewEvent::new(event_types::CHANGE_RESTORED).with_sheet("sheet_1"));
        drop(bus);

        handle.await.expect("logger task should finish cleanly");
    }
}
