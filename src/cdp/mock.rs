//! Mock CDP transport for testing
//!
//! Replies like a cooperative Chrome for the methods the page driver uses,
//! records every call, and lets tests override replies per method or push
//! events onto the browser-wide bus.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::cdp::bus::EventBus;
use crate::cdp::traits::{CdpEvent, Transport};
use crate::Error;

/// One command received by the mock
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub session_id: Option<String>,
    pub method: String,
    pub params: Value,
}

type Handler = Box<dyn Fn(&RecordedCall, &EventBus) -> Result<Value, Error> + Send + Sync>;

/// Mock CDP transport
pub struct MockTransport {
    bus: EventBus,
    is_active: AtomicBool,
    next_object: AtomicU64,
    calls: Mutex<Vec<RecordedCall>>,
    handlers: Mutex<HashMap<String, Handler>>,
    queued: Mutex<HashMap<String, VecDeque<Result<Value, Error>>>>,
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("is_active", &self.is_active)
            .field("calls", &lock(&self.calls).len())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockTransport {
    /// Create a new mock publishing events to `bus`
    pub fn new(bus: EventBus) -> Self {
        Self {
            bus,
            is_active: AtomicBool::new(true),
            next_object: AtomicU64::new(1),
            calls: Mutex::new(Vec::new()),
            handlers: Mutex::new(HashMap::new()),
            queued: Mutex::new(HashMap::new()),
        }
    }

    /// Reply to every `method` call with `handler`
    pub fn on<F>(&self, method: &str, handler: F)
    where
        F: Fn(&RecordedCall, &EventBus) -> Result<Value, Error> + Send + Sync + 'static,
    {
        lock(&self.handlers).insert(method.to_string(), Box::new(handler));
    }

    /// Reply to the next `method` call with `reply`, ahead of any handler
    pub fn respond_once(&self, method: &str, reply: Result<Value, Error>) {
        lock(&self.queued)
            .entry(method.to_string())
            .or_default()
            .push_back(reply);
    }

    /// Publish an event as if Chrome had sent it
    pub fn emit(&self, session_id: Option<&str>, method: &str, params: Value) -> usize {
        self.bus.publish(CdpEvent {
            method: method.to_string(),
            params,
            session_id: session_id.map(str::to_string),
        })
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// All calls received so far
    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    /// Methods of all calls received so far, in order
    pub fn methods(&self) -> Vec<String> {
        lock(&self.calls).iter().map(|c| c.method.clone()).collect()
    }

    /// Calls of one method, in order
    pub fn calls_to(&self, method: &str) -> Vec<RecordedCall> {
        lock(&self.calls)
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }

    fn default_reply(&self, call: &RecordedCall) -> Value {
        match call.method.as_str() {
            "Target.attachToTarget" => {
                let target = call.params["targetId"].as_str().unwrap_or("unknown");
                json!({ "sessionId": format!("session-{}", target) })
            }
            "Target.getTargetInfo" => json!({
                "targetInfo": {
                    "targetId": call.params["targetId"].as_str().unwrap_or("unknown"),
                    "type": "page",
                    "title": "Mock Page",
                    "url": "https://example.com/",
                    "attached": true
                }
            }),
            "DOM.getDocument" => {
                let frame = call
                    .session_id
                    .as_deref()
                    .and_then(|s| s.strip_prefix("session-"))
                    .map(|t| format!("F{}", t))
                    .unwrap_or_else(|| "F0".to_string());
                json!({
                    "root": {
                        "nodeId": 1,
                        "nodeName": "#document",
                        "children": [{ "nodeId": 2, "nodeName": "HTML", "frameId": frame }]
                    }
                })
            }
            "DOM.describeNode" => json!({ "node": { "nodeId": 0, "nodeName": "DIV" } }),
            "Page.navigate" => json!({ "frameId": "F0", "loaderId": "L1" }),
            "Page.createIsolatedWorld" => json!({ "executionContextId": 7 }),
            "Page.getLayoutMetrics" => json!({
                "layoutViewport": { "pageX": 0, "pageY": 0, "clientWidth": 1280, "clientHeight": 720 },
                "contentSize": { "x": 0, "y": 0, "width": 1280, "height": 2400 }
            }),
            // "mock" in base64
            "Page.captureScreenshot" | "Page.printToPDF" => json!({ "data": "bW9jaw==" }),
            "Runtime.evaluate" => {
                let n = self.next_object.fetch_add(1, Ordering::SeqCst);
                json!({
                    "result": { "type": "object", "className": "Window", "objectId": format!("window-{}", n) }
                })
            }
            "Runtime.callFunctionOn" => json!({ "result": { "type": "undefined" } }),
            "Network.getCookies" => json!({ "cookies": [] }),
            "Browser.getWindowForTarget" => json!({
                "windowId": 1,
                "bounds": { "left": 0, "top": 0, "width": 1280, "height": 800, "windowState": "normal" }
            }),
            "Browser.getWindowBounds" => json!({
                "bounds": { "left": 0, "top": 0, "width": 1280, "height": 800, "windowState": "normal" }
            }),
            "Debugger.enable" => json!({ "debuggerId": "debugger-1" }),
            _ => json!({}),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn call(
        &self,
        session_id: Option<&str>,
        method: &str,
        params: Value,
    ) -> Result<Value, Error> {
        if !self.is_active.load(Ordering::SeqCst) {
            return Err(Error::websocket("Connection is closed"));
        }

        let call = RecordedCall {
            session_id: session_id.map(str::to_string),
            method: method.to_string(),
            params,
        };
        lock(&self.calls).push(call.clone());

        let queued = lock(&self.queued)
            .get_mut(method)
            .and_then(VecDeque::pop_front);
        if let Some(reply) = queued {
            return reply;
        }

        if let Some(handler) = lock(&self.handlers).get(method) {
            return handler(&call, &self.bus);
        }

        Ok(self.default_reply(&call))
    }

    async fn close(&self) -> Result<(), Error> {
        self.is_active.store(false, Ordering::SeqCst);
        self.bus.close();
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.is_active.load(Ordering::SeqCst)
    }
}
