//! Database Log Layer
//!
//! A `tracing-subscriber` layer that mirrors log events into the `logs`
//! table, so a run's operational history travels with its database.
//!
//! Write failures are swallowed: losing a log row must never disturb the
//! pipeline, and `Database::insert_log` emits no tracing events of its own,
//! which keeps the layer re-entrancy safe.

use tracing::{Event, Subscriber, field::Field};
use tracing_subscriber::layer::{Context, Layer};

use super::SharedDatabase;

pub struct DbLogLayer {
    db: SharedDatabase,
}

impl DbLogLayer {
    pub fn new(db: SharedDatabase) -> Self {
        Self { db }
    }
}

impl<S: Subscriber> Layer<S> for DbLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let created = chrono::Utc::now().to_rfc3339();
        let level = event.metadata().level().to_string();
        let _ = self.db.insert_log(&created, &level, &visitor.message);
    }
}

/// Collects the event's `message` field plus any structured fields.
#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl MessageVisitor {
    fn append_field(&mut self, name: &str, value: String) {
        if !self.message.is_empty() {
            self.message.push(' ');
        }
        self.message.push_str(name);
        self.message.push('=');
        self.message.push_str(&value);
    }
}

impl tracing::field::Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.append_field(field.name(), value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.append_field(field.name(), format!("{:?}", value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;
    use std::sync::Arc;
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn test_events_land_in_logs_table() {
        let db: SharedDatabase = Arc::new(Database::open_in_memory().unwrap());
        let layer = DbLogLayer::new(db.clone());
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("pipeline started");
            tracing::warn!(records = 3, "partial sink failure");
        });

        assert_eq!(db.log_count().unwrap(), 2);
    }
}
