//! Decoding of raw CDP notifications into typed events
//!
//! Events the driver reacts to are a closed set keyed by method name. A raw
//! [`CdpEvent`] is matched against that set with a compile-time map and then
//! deserialized into the corresponding payload.

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::protocol::{debugger, fetch, network, page, target};
use super::traits::CdpEvent;
use crate::Result;

/// Payload of a CDP event with a fixed method name
pub trait ProtocolEvent: DeserializeOwned + Send + 'static {
    const METHOD: &'static str;
}

macro_rules! protocol_event {
    ($ty:ty, $method:literal) => {
        impl ProtocolEvent for $ty {
            const METHOD: &'static str = $method;
        }
    };
}

protocol_event!(network::RequestWillBeSent, "Network.requestWillBeSent");
protocol_event!(network::LoadingFinished, "Network.loadingFinished");
protocol_event!(network::LoadingFailed, "Network.loadingFailed");
protocol_event!(target::TargetCreated, "Target.targetCreated");
protocol_event!(page::JavascriptDialogOpening, "Page.javascriptDialogOpening");
protocol_event!(page::LoadEventFired, "Page.loadEventFired");
protocol_event!(page::FrameNavigated, "Page.frameNavigated");
protocol_event!(fetch::RequestPaused, "Fetch.requestPaused");
protocol_event!(debugger::Resumed, "Debugger.resumed");

/// Kinds of events the driver understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    RequestWillBeSent,
    LoadingFinished,
    LoadingFailed,
    TargetCreated,
    JavascriptDialogOpening,
    LoadEventFired,
    FrameNavigated,
    RequestPaused,
    DebuggerResumed,
}

static EVENT_KINDS: phf::Map<&'static str, EventKind> = phf::phf_map! {
    "Network.requestWillBeSent" => EventKind::RequestWillBeSent,
    "Network.loadingFinished" => EventKind::LoadingFinished,
    "Network.loadingFailed" => EventKind::LoadingFailed,
    "Target.targetCreated" => EventKind::TargetCreated,
    "Page.javascriptDialogOpening" => EventKind::JavascriptDialogOpening,
    "Page.loadEventFired" => EventKind::LoadEventFired,
    "Page.frameNavigated" => EventKind::FrameNavigated,
    "Fetch.requestPaused" => EventKind::RequestPaused,
    "Debugger.resumed" => EventKind::DebuggerResumed,
};

impl EventKind {
    pub fn from_method(method: &str) -> Option<Self> {
        EVENT_KINDS.get(method).copied()
    }
}

/// A decoded event
#[derive(Debug, Clone)]
pub enum Event {
    RequestWillBeSent(network::RequestWillBeSent),
    LoadingFinished(network::LoadingFinished),
    LoadingFailed(network::LoadingFailed),
    TargetCreated(target::TargetCreated),
    JavascriptDialogOpening(page::JavascriptDialogOpening),
    LoadEventFired(page::LoadEventFired),
    FrameNavigated(page::FrameNavigated),
    RequestPaused(fetch::RequestPaused),
    DebuggerResumed(debugger::Resumed),
}

impl Event {
    /// Decode `raw` if its method is a known kind.
    ///
    /// Returns `Ok(None)` for methods the driver does not model.
    pub fn decode(raw: &CdpEvent) -> Result<Option<Event>> {
        let Some(kind) = EventKind::from_method(&raw.method) else {
            return Ok(None);
        };

        let params = params_of(raw);
        let event = match kind {
            EventKind::RequestWillBeSent => Event::RequestWillBeSent(serde_json::from_value(params)?),
            EventKind::LoadingFinished => Event::LoadingFinished(serde_json::from_value(params)?),
            EventKind::LoadingFailed => Event::LoadingFailed(serde_json::from_value(params)?),
            EventKind::TargetCreated => Event::TargetCreated(serde_json::from_value(params)?),
            EventKind::JavascriptDialogOpening => {
                Event::JavascriptDialogOpening(serde_json::from_value(params)?)
            }
            EventKind::LoadEventFired => Event::LoadEventFired(serde_json::from_value(params)?),
            EventKind::FrameNavigated => Event::FrameNavigated(serde_json::from_value(params)?),
            EventKind::RequestPaused => Event::RequestPaused(serde_json::from_value(params)?),
            EventKind::DebuggerResumed => Event::DebuggerResumed(serde_json::from_value(params)?),
        };
        Ok(Some(event))
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Event::RequestWillBeSent(_) => EventKind::RequestWillBeSent,
            Event::LoadingFinished(_) => EventKind::LoadingFinished,
            Event::LoadingFailed(_) => EventKind::LoadingFailed,
            Event::TargetCreated(_) => EventKind::TargetCreated,
            Event::JavascriptDialogOpening(_) => EventKind::JavascriptDialogOpening,
            Event::LoadEventFired(_) => EventKind::LoadEventFired,
            Event::FrameNavigated(_) => EventKind::FrameNavigated,
            Event::RequestPaused(_) => EventKind::RequestPaused,
            Event::DebuggerResumed(_) => EventKind::DebuggerResumed,
        }
    }
}

/// Decode `raw` as `E` when the method matches, `None` otherwise
pub fn decode_as<E: ProtocolEvent>(raw: &CdpEvent) -> Option<Result<E>> {
    if raw.method != E::METHOD {
        return None;
    }
    Some(serde_json::from_value(params_of(raw)).map_err(Into::into))
}

// Parameterless events may arrive without a params member
fn params_of(raw: &CdpEvent) -> Value {
    if raw.params.is_null() {
        Value::Object(Default::default())
    } else {
        raw.params.clone()
    }
}
