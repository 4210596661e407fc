//! Shared test doubles: log capture, call recording and a mock probe.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use mockall::mock;
use tracing::field::{Field, Visit};
use tracing::{Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::{Layer, Registry};

use crate::dispatch::ActionContext;
use crate::dom::NodeId;
use crate::registry::Handler;

// ---------------------------------------------------------------------------
// Log capture
// ---------------------------------------------------------------------------

/// One captured tracing event.
#[derive(Debug, Clone)]
pub(crate) struct CapturedLog {
    pub(crate) level: Level,
    pub(crate) message: String,
    pub(crate) fields: HashMap<String, String>,
}

impl CapturedLog {
    pub(crate) fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: HashMap<String, String>,
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.record(field, value.to_owned());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.record(field, format!("{value:?}"));
    }
}

impl FieldVisitor {
    fn record(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = value;
        } else {
            self.fields.insert(field.name().to_owned(), value);
        }
    }
}

/// Layer collecting every event emitted while it is the default subscriber.
#[derive(Clone, Default)]
pub(crate) struct LogCapture {
    records: Arc<Mutex<Vec<CapturedLog>>>,
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        self.records
            .lock()
            .expect("log capture lock")
            .push(CapturedLog {
                level: *event.metadata().level(),
                message: visitor.message,
                fields: visitor.fields,
            });
    }
}

impl LogCapture {
    /// Runs `f` with this capture installed as the thread's subscriber.
    pub(crate) fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        let subscriber = Registry::default().with(self.clone());
        tracing::subscriber::with_default(subscriber, f)
    }

    pub(crate) fn at(&self, level: Level) -> Vec<CapturedLog> {
        self.records
            .lock()
            .expect("log capture lock")
            .iter()
            .filter(|log| log.level == level)
            .cloned()
            .collect()
    }

    pub(crate) fn warnings(&self) -> Vec<CapturedLog> {
        self.at(Level::WARN)
    }

    pub(crate) fn errors(&self) -> Vec<CapturedLog> {
        self.at(Level::ERROR)
    }
}

// ---------------------------------------------------------------------------
// Call recording
// ---------------------------------------------------------------------------

/// What a recording handler saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Call {
    pub(crate) key: String,
    pub(crate) element: NodeId,
    pub(crate) event_type: String,
    pub(crate) params: HashMap<String, String>,
}

/// Collects calls made through the handlers it hands out.
#[derive(Clone, Default)]
pub(crate) struct Recorder {
    calls: Rc<RefCell<Vec<Call>>>,
}

impl Recorder {
    pub(crate) fn record(&self, context: &ActionContext) {
        self.calls.borrow_mut().push(Call {
            key: context.key.to_string(),
            element: context.element,
            event_type: context.event.event_type().to_owned(),
            params: context.params.clone(),
        });
    }

    /// A synchronous handler that records and succeeds.
    pub(crate) fn handler(&self) -> Handler {
        let recorder = self.clone();
        Handler::sync(move |context| {
            recorder.record(context);
            Ok(())
        })
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub(crate) fn count(&self) -> usize {
        self.calls.borrow().len()
    }

    pub(crate) fn keys(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|call| call.key.clone()).collect()
    }
}

// ---------------------------------------------------------------------------
// Mock probe
// ---------------------------------------------------------------------------

/// Observation point for asserting exact invocation counts.
pub trait CallProbe {
    fn called(&self, key: String, params: HashMap<String, String>);
}

mock! {
    pub Probe {}
    impl CallProbe for Probe {
        fn called(&self, key: String, params: HashMap<String, String>);
    }
}

/// Wraps a configured probe in a handler.
pub(crate) fn probe_handler(probe: Rc<MockProbe>) -> Handler {
    Handler::sync(move |context| {
        probe.called(context.key.to_string(), context.params.clone());
        Ok(())
    })
}
