//! Relay of warnings and errors to the push channel.
//!
//! [`LogRelay`] is a `tracing_subscriber` layer installed once at startup.
//! The hub it publishes to is attached later and may be swapped when the
//! application restarts; events seen while no hub is attached are ignored.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::hub::BroadcastHub;
use crate::types::PushMessage;

/// Events from the hub itself are never relayed.
const HUB_TARGET: &str = "minerd_web::hub";

/// Publishes WARN and ERROR events as `log` push messages.
#[derive(Clone, Default)]
pub struct LogRelay {
    hub: Arc<RwLock<Option<BroadcastHub>>>,
}

impl LogRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start relaying to `hub`, replacing any previous one.
    pub fn attach(&self, hub: BroadcastHub) {
        *self.hub.write() = Some(hub);
    }

    pub fn detach(&self) {
        *self.hub.write() = None;
    }
}

impl<S: Subscriber> Layer<S> for LogRelay {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if *meta.level() > Level::WARN || meta.target().starts_with(HUB_TARGET) {
            return;
        }
        let Some(hub) = self.hub.read().clone() else {
            return;
        };

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let message = PushMessage::Log {
            level: meta.level().as_str().to_ascii_lowercase(),
            message: visitor.finish(),
        };
        if let Ok(json) = message.encode() {
            hub.publish(json);
        }
    }
}

/// Collects the event message followed by its `key=value` fields.
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: Vec<String>,
}

impl MessageVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            return self.message;
        }
        format!("{} {}", self.message, self.fields.join(" "))
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }
}
