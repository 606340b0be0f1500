//! Typed CDP commands, replies and event payloads used by the page driver
//!
//! Each command struct serializes to the method's `params` object and names
//! its reply type through [`Command`]. Only the fields the driver reads or
//! writes are modelled; unknown reply fields are ignored.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A CDP method with typed parameters (`Self`) and a typed reply
pub trait Command: Serialize + Send + Sync {
    /// Method name, e.g. "Page.navigate"
    const METHOD: &'static str;
    /// Reply payload
    type Response: DeserializeOwned + Send;
}

/// Reply of commands that return nothing of interest
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Empty {}

macro_rules! command {
    ($ty:ty, $method:literal, $resp:ty) => {
        impl Command for $ty {
            const METHOD: &'static str = $method;
            type Response = $resp;
        }
    };
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Remote target (tab, iframe process, worker)
    TargetId
);
string_id!(
    /// Flattened session attached to a target
    SessionId
);
string_id!(
    /// Frame within a target
    FrameId
);
string_id!(
    /// Handle to a value living in a remote execution context
    RemoteObjectId
);
string_id!(
    /// Network request id
    RequestId
);
string_id!(
    /// Id of a request paused by the Fetch domain
    FetchRequestId
);

pub type ExecutionContextId = i64;
pub type WindowId = i64;

pub mod target {
    use super::*;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct TargetInfo {
        pub target_id: TargetId,
        #[serde(rename = "type")]
        pub target_type: String,
        #[serde(default)]
        pub title: String,
        #[serde(default)]
        pub url: String,
        #[serde(default)]
        pub attached: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub opener_id: Option<TargetId>,
    }

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct AttachToTarget {
        pub target_id: TargetId,
        /// Non-flattened sessions get no synchronous reply
        pub flatten: bool,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct AttachToTargetReturns {
        pub session_id: SessionId,
    }

    command!(AttachToTarget, "Target.attachToTarget", AttachToTargetReturns);

    #[derive(Debug, Clone, Default, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GetTargetInfo {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub target_id: Option<TargetId>,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GetTargetInfoReturns {
        pub target_info: TargetInfo,
    }

    command!(GetTargetInfo, "Target.getTargetInfo", GetTargetInfoReturns);

    #[derive(Debug, Clone, Serialize)]
    pub struct SetDiscoverTargets {
        pub discover: bool,
    }

    command!(SetDiscoverTargets, "Target.setDiscoverTargets", Empty);

    /// `Target.targetCreated`
    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct TargetCreated {
        pub target_info: TargetInfo,
    }
}

pub mod page {
    use super::*;

    #[derive(Debug, Clone, Default, Serialize)]
    pub struct Enable {}

    command!(Enable, "Page.enable", Empty);

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Navigate {
        pub url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub referrer: Option<String>,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct NavigateReturns {
        pub frame_id: FrameId,
        #[serde(default)]
        pub loader_id: Option<String>,
        #[serde(default)]
        pub error_text: Option<String>,
    }

    command!(Navigate, "Page.navigate", NavigateReturns);

    #[derive(Debug, Clone, Default, Serialize)]
    pub struct StopLoading {}

    command!(StopLoading, "Page.stopLoading", Empty);

    #[derive(Debug, Clone, Default, Serialize)]
    pub struct Close {}

    command!(Close, "Page.close", Empty);

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct HandleJavaScriptDialog {
        pub accept: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub prompt_text: Option<String>,
    }

    command!(HandleJavaScriptDialog, "Page.handleJavaScriptDialog", Empty);

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
    #[serde(rename_all = "lowercase")]
    pub enum DownloadBehavior {
        Deny,
        Allow,
        Default,
    }

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct SetDownloadBehavior {
        pub behavior: DownloadBehavior,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub download_path: Option<String>,
    }

    command!(SetDownloadBehavior, "Page.setDownloadBehavior", Empty);

    #[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Rect {
        pub x: f64,
        pub y: f64,
        pub width: f64,
        pub height: f64,
    }

    #[derive(Debug, Clone, Copy, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct LayoutViewport {
        pub page_x: i64,
        pub page_y: i64,
        pub client_width: i64,
        pub client_height: i64,
    }

    #[derive(Debug, Clone, Default, Serialize)]
    pub struct GetLayoutMetrics {}

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GetLayoutMetricsReturns {
        #[serde(default)]
        pub layout_viewport: LayoutViewport,
        pub content_size: Rect,
    }

    command!(GetLayoutMetrics, "Page.getLayoutMetrics", GetLayoutMetricsReturns);

    #[derive(Debug, Clone, Serialize)]
    pub struct Viewport {
        pub x: f64,
        pub y: f64,
        pub width: f64,
        pub height: f64,
        pub scale: f64,
    }

    #[derive(Debug, Clone, Default, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CaptureScreenshot {
        /// "png", "jpeg" or "webp"
        #[serde(skip_serializing_if = "Option::is_none")]
        pub format: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub quality: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub clip: Option<Viewport>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub from_surface: Option<bool>,
    }

    /// Base64 payload of captures and prints
    #[derive(Debug, Clone, Deserialize)]
    pub struct DataReturns {
        pub data: String,
    }

    command!(CaptureScreenshot, "Page.captureScreenshot", DataReturns);

    #[derive(Debug, Clone, Default, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct PrintToPdf {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub landscape: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub print_background: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub scale: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub paper_width: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub paper_height: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub page_ranges: Option<String>,
    }

    command!(PrintToPdf, "Page.printToPDF", DataReturns);

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CreateIsolatedWorld {
        pub frame_id: FrameId,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub world_name: Option<String>,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CreateIsolatedWorldReturns {
        pub execution_context_id: ExecutionContextId,
    }

    command!(CreateIsolatedWorld, "Page.createIsolatedWorld", CreateIsolatedWorldReturns);

    /// `Page.javascriptDialogOpening`
    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct JavascriptDialogOpening {
        #[serde(default)]
        pub url: String,
        #[serde(default)]
        pub message: String,
        #[serde(rename = "type")]
        pub dialog_type: String,
        #[serde(default)]
        pub default_prompt: Option<String>,
    }

    /// `Page.loadEventFired`
    #[derive(Debug, Clone, Deserialize)]
    pub struct LoadEventFired {
        pub timestamp: f64,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct Frame {
        pub id: FrameId,
        #[serde(default)]
        pub url: String,
    }

    /// `Page.frameNavigated`
    #[derive(Debug, Clone, Deserialize)]
    pub struct FrameNavigated {
        pub frame: Frame,
    }
}

pub mod network {
    use super::*;
    use serde_json::{Map, Value};

    pub type Headers = Map<String, Value>;

    #[derive(Debug, Clone, Default, Serialize)]
    pub struct Enable {}

    command!(Enable, "Network.enable", Empty);

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Cookie {
        pub name: String,
        pub value: String,
        pub domain: String,
        pub path: String,
        #[serde(default)]
        pub expires: f64,
        #[serde(default)]
        pub size: i64,
        #[serde(default)]
        pub http_only: bool,
        #[serde(default)]
        pub secure: bool,
        #[serde(default)]
        pub session: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub same_site: Option<String>,
    }

    #[derive(Debug, Clone, Default, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CookieParam {
        pub name: String,
        pub value: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub url: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub domain: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub path: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub secure: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub http_only: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub same_site: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub expires: Option<f64>,
    }

    #[derive(Debug, Clone, Default, Serialize)]
    pub struct GetCookies {
        pub urls: Vec<String>,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct GetCookiesReturns {
        pub cookies: Vec<Cookie>,
    }

    command!(GetCookies, "Network.getCookies", GetCookiesReturns);

    #[derive(Debug, Clone, Default, Serialize)]
    pub struct SetCookies {
        pub cookies: Vec<CookieParam>,
    }

    command!(SetCookies, "Network.setCookies", Empty);

    #[derive(Debug, Clone, Default, Serialize)]
    pub struct SetExtraHttpHeaders {
        pub headers: Headers,
    }

    command!(SetExtraHttpHeaders, "Network.setExtraHTTPHeaders", Empty);

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct SetUserAgentOverride {
        pub user_agent: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub accept_language: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub platform: Option<String>,
    }

    command!(SetUserAgentOverride, "Network.setUserAgentOverride", Empty);

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Request {
        pub url: String,
        #[serde(default = "default_method")]
        pub method: String,
        #[serde(default)]
        pub headers: Headers,
        #[serde(default)]
        pub post_data: Option<String>,
    }

    fn default_method() -> String {
        "GET".to_string()
    }

    /// `Network.requestWillBeSent`
    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct RequestWillBeSent {
        pub request_id: RequestId,
        pub request: Request,
    }

    /// `Network.loadingFinished`
    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct LoadingFinished {
        pub request_id: RequestId,
    }

    /// `Network.loadingFailed`
    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct LoadingFailed {
        pub request_id: RequestId,
        #[serde(default)]
        pub error_text: String,
    }
}

pub mod browser {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Bounds {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub left: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub top: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub width: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub height: Option<i64>,
        /// "normal", "minimized", "maximized" or "fullscreen"
        #[serde(skip_serializing_if = "Option::is_none")]
        pub window_state: Option<String>,
    }

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GetWindowForTarget {
        pub target_id: TargetId,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GetWindowForTargetReturns {
        pub window_id: WindowId,
    }

    command!(GetWindowForTarget, "Browser.getWindowForTarget", GetWindowForTargetReturns);

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GetWindowBounds {
        pub window_id: WindowId,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct GetWindowBoundsReturns {
        pub bounds: Bounds,
    }

    command!(GetWindowBounds, "Browser.getWindowBounds", GetWindowBoundsReturns);

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct SetWindowBounds {
        pub window_id: WindowId,
        pub bounds: Bounds,
    }

    command!(SetWindowBounds, "Browser.setWindowBounds", Empty);
}

pub mod emulation {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct SetDeviceMetricsOverride {
        pub width: i64,
        pub height: i64,
        pub device_scale_factor: f64,
        pub mobile: bool,
    }

    command!(SetDeviceMetricsOverride, "Emulation.setDeviceMetricsOverride", Empty);

    #[derive(Debug, Clone, Default, Serialize)]
    pub struct ClearDeviceMetricsOverride {}

    command!(ClearDeviceMetricsOverride, "Emulation.clearDeviceMetricsOverride", Empty);
}

pub mod fetch {
    use super::*;

    #[derive(Debug, Clone, Default, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct RequestPattern {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub url_pattern: Option<String>,
    }

    #[derive(Debug, Clone, Default, Serialize)]
    pub struct Enable {
        /// Intercept every request when absent
        #[serde(skip_serializing_if = "Option::is_none")]
        pub patterns: Option<Vec<RequestPattern>>,
    }

    command!(Enable, "Fetch.enable", Empty);

    #[derive(Debug, Clone, Default, Serialize)]
    pub struct Disable {}

    command!(Disable, "Fetch.disable", Empty);

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct HeaderEntry {
        pub name: String,
        pub value: String,
    }

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct FulfillRequest {
        pub request_id: FetchRequestId,
        pub response_code: i64,
        pub response_headers: Vec<HeaderEntry>,
        /// Base64 encoded body
        #[serde(skip_serializing_if = "Option::is_none")]
        pub body: Option<String>,
    }

    command!(FulfillRequest, "Fetch.fulfillRequest", Empty);

    /// `Fetch.requestPaused`
    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct RequestPaused {
        pub request_id: FetchRequestId,
        pub request: network::Request,
        #[serde(default)]
        pub frame_id: Option<FrameId>,
        #[serde(default)]
        pub resource_type: Option<String>,
    }
}

pub mod debugger {
    use super::*;

    #[derive(Debug, Clone, Default, Serialize)]
    pub struct Enable {}

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct EnableReturns {
        #[serde(default)]
        pub debugger_id: Option<String>,
    }

    command!(Enable, "Debugger.enable", EnableReturns);

    #[derive(Debug, Clone, Default, Serialize)]
    pub struct Pause {}

    command!(Pause, "Debugger.pause", Empty);

    /// `Debugger.resumed`
    #[derive(Debug, Clone, Default, Deserialize)]
    pub struct Resumed {}
}

pub mod runtime {
    use super::*;
    use serde_json::Value;

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct RemoteObject {
        #[serde(rename = "type")]
        pub object_type: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub subtype: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub class_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub value: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub unserializable_value: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub description: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub object_id: Option<RemoteObjectId>,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ExceptionDetails {
        #[serde(default)]
        pub text: String,
        #[serde(default)]
        pub exception: Option<RemoteObject>,
    }

    impl ExceptionDetails {
        /// Best human readable description of the thrown value
        pub fn description(&self) -> String {
            self.exception
                .as_ref()
                .and_then(|e| e.description.clone())
                .unwrap_or_else(|| self.text.clone())
        }
    }

    #[derive(Debug, Clone, Default, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CallArgument {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub value: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub object_id: Option<RemoteObjectId>,
    }

    impl CallArgument {
        pub fn value(value: Value) -> Self {
            Self {
                value: Some(value),
                object_id: None,
            }
        }
    }

    #[derive(Debug, Clone, Default, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Evaluate {
        pub expression: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub context_id: Option<ExecutionContextId>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub await_promise: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub return_by_value: Option<bool>,
    }

    /// Reply of `Runtime.evaluate` and `Runtime.callFunctionOn`
    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct EvaluationReturns {
        pub result: RemoteObject,
        #[serde(default)]
        pub exception_details: Option<ExceptionDetails>,
    }

    command!(Evaluate, "Runtime.evaluate", EvaluationReturns);

    #[derive(Debug, Clone, Default, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CallFunctionOn {
        pub function_declaration: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub object_id: Option<RemoteObjectId>,
        pub arguments: Vec<CallArgument>,
        pub return_by_value: bool,
        pub await_promise: bool,
    }

    command!(CallFunctionOn, "Runtime.callFunctionOn", EvaluationReturns);

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ReleaseObject {
        pub object_id: RemoteObjectId,
    }

    command!(ReleaseObject, "Runtime.releaseObject", Empty);
}

pub mod dom {
    use super::*;

    #[derive(Debug, Clone, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Node {
        #[serde(default)]
        pub node_id: i64,
        #[serde(default)]
        pub node_name: String,
        #[serde(default)]
        pub frame_id: Option<FrameId>,
        #[serde(default)]
        pub children: Vec<Node>,
    }

    #[derive(Debug, Clone, Default, Serialize)]
    pub struct GetDocument {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub depth: Option<i64>,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct GetDocumentReturns {
        pub root: Node,
    }

    command!(GetDocument, "DOM.getDocument", GetDocumentReturns);

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct DescribeNode {
        pub object_id: RemoteObjectId,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct DescribeNodeReturns {
        pub node: Node,
    }

    command!(DescribeNode, "DOM.describeNode", DescribeNodeReturns);
}
