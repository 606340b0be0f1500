//! Page entity
//!
//! A [`Page`] is one controlled tab or iframe. It owns the lifecycle token
//! scoping every subscription and wait armed on it, the session-scoped event
//! bus, and the cached handle to its JavaScript global object.
//!
//! The work is split by concern:
//! - `session`: attach, event filter, frame discovery
//! - `eval`: the retrying script-evaluation bridge
//! - `wait`: arm-then-block wait primitives
//! - `idle`: network-idle state machine
//! - `download`: download interception

mod download;
mod eval;
mod idle;
mod session;
mod wait;

#[cfg(test)]
mod tests;

pub use download::Download;
pub use idle::{IdleTracker, UrlFilter};
pub use wait::Waiter;

use base64::prelude::{Engine as _, BASE64_STANDARD};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::backoff::Backoff;
use crate::browser::Browser;
use crate::cdp::protocol::{
    browser as browser_domain, emulation, network, page, runtime, target, Command, FrameId,
    RemoteObjectId, SessionId, TargetId,
};
use crate::cdp::{CallContext, Caller, EventBus, Transport};
use crate::config::Config;
use crate::element::Element;
use crate::input::{Keyboard, Mouse};
use crate::{Error, Result};

/// Key of a page in the browser's page arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageId(Uuid);

impl PageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Back-reference from an iframe page to where it is embedded
#[derive(Debug, Clone)]
struct ParentLink {
    page: PageId,
    element: RemoteObjectId,
}

/// One controlled tab or iframe
#[derive(Debug)]
pub struct Page {
    id: PageId,
    browser: Weak<Browser>,
    target_id: TargetId,
    session_id: SessionId,
    frame_id: FrameId,
    /// Cancelled when the page closes or the browser shuts down
    token: CancellationToken,
    transport: Arc<dyn Transport>,
    config: Arc<Config>,
    mouse: Mouse,
    keyboard: Keyboard,
    /// Present only for iframes
    parent: Option<ParentLink>,
    /// Implicit receiver of evaluations; cleared when its context dies
    window_object_id: Mutex<Option<RemoteObjectId>>,
    /// Serializes download interception, shared with iframes
    download_lock: Arc<tokio::sync::Mutex<()>>,
    /// Last applied device metrics override
    viewport: Mutex<Option<emulation::SetDeviceMetricsOverride>>,
    event: EventBus,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Page {
    /// Attach a session to `target_id` and build the page on it.
    ///
    /// The page is not registered with the browser.
    pub(crate) async fn attach(browser: &Arc<Browser>, target_id: TargetId) -> Result<Arc<Self>> {
        let token = browser.token().child_token();

        let init = match session::init_session(browser, &token, &target_id).await {
            Ok(init) => init,
            Err(e) => {
                token.cancel();
                return Err(e);
            }
        };

        Ok(Arc::new(Self {
            id: PageId::new(),
            browser: Arc::downgrade(browser),
            target_id,
            session_id: init.session_id,
            frame_id: init.frame_id,
            token,
            transport: browser.transport().clone(),
            config: browser.config().clone(),
            mouse: Mouse::new(),
            keyboard: Keyboard::default(),
            parent: None,
            window_object_id: Mutex::new(None),
            download_lock: Arc::new(tokio::sync::Mutex::new(())),
            viewport: Mutex::new(None),
            event: init.event,
        }))
    }

    /// Page for the frame embedded by `element` of `parent`.
    ///
    /// Shares the parent's session and event stream; evaluation happens in an
    /// isolated world created on `frame_id`.
    pub(crate) fn new_iframe(parent: &Arc<Page>, element: RemoteObjectId, frame_id: FrameId) -> Arc<Self> {
        Arc::new(Self {
            id: PageId::new(),
            browser: parent.browser.clone(),
            target_id: parent.target_id.clone(),
            session_id: parent.session_id.clone(),
            frame_id,
            token: parent.token.child_token(),
            transport: parent.transport.clone(),
            config: parent.config.clone(),
            mouse: Mouse::new(),
            keyboard: Keyboard::default(),
            parent: Some(ParentLink {
                page: parent.id,
                element,
            }),
            window_object_id: Mutex::new(None),
            download_lock: parent.download_lock.clone(),
            viewport: Mutex::new(parent.viewport()),
            event: parent.event.clone(),
        })
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn target_id(&self) -> &TargetId {
        &self.target_id
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn frame_id(&self) -> &FrameId {
        &self.frame_id
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn mouse(&self) -> &Mouse {
        &self.mouse
    }

    pub fn keyboard(&self) -> &Keyboard {
        &self.keyboard
    }

    /// Events addressed to this page's session
    pub fn event(&self) -> &EventBus {
        &self.event
    }

    pub fn is_iframe(&self) -> bool {
        self.parent.is_some()
    }

    /// Page this iframe is embedded in
    pub fn parent_id(&self) -> Option<PageId> {
        self.parent.as_ref().map(|p| p.page)
    }

    /// Remote object id of the element embedding this iframe
    pub fn parent_element(&self) -> Option<&RemoteObjectId> {
        self.parent.as_ref().map(|p| &p.element)
    }

    /// Owning browser; `Cancelled` once it has been dropped
    pub fn browser(&self) -> Result<Arc<Browser>> {
        self.browser.upgrade().ok_or(Error::Cancelled)
    }

    /// Walk up the iframe chain to the top-level page
    pub fn root(self: &Arc<Self>) -> Result<Arc<Page>> {
        let mut page = self.clone();
        if page.parent.is_none() {
            return Ok(page);
        }

        let browser = self.browser()?;
        while let Some(parent) = page.parent.clone() {
            page = browser.page(parent.page)?;
        }
        Ok(page)
    }

    /// Issue a command on this page's session
    pub async fn call<C: Command>(&self, command: &C) -> Result<C::Response> {
        self.call_context().call(command).await
    }

    pub fn viewport(&self) -> Option<emulation::SetDeviceMetricsOverride> {
        lock(&self.viewport).clone()
    }

    /// Backoff for callers polling the page, e.g. for an element to appear
    pub fn sleeper(&self) -> Backoff {
        let (initial, max) = self.config.sleeper();
        Backoff::new(initial, max)
    }

    pub fn element_from_object_id(self: &Arc<Self>, object_id: RemoteObjectId) -> Element {
        Element::new(self.clone(), object_id)
    }

    /// Navigate to `url`, failing if the browser reports an error text
    #[instrument(level = "debug", skip_all, fields(page = %self.id, url = %url))]
    pub async fn navigate(&self, url: &str) -> Result<()> {
        self.stop_loading().await?;

        let reply = self
            .call(&page::Navigate {
                url: url.to_string(),
                referrer: None,
            })
            .await?;

        match reply.error_text {
            Some(text) if !text.is_empty() => Err(Error::navigation(text)),
            _ => Ok(()),
        }
    }

    pub async fn stop_loading(&self) -> Result<()> {
        self.call(&page::StopLoading {}).await?;
        Ok(())
    }

    /// Close the page; its token is cancelled and it leaves the arena
    #[instrument(level = "debug", skip_all, fields(page = %self.id))]
    pub async fn close(&self) -> Result<()> {
        let result = async {
            self.stop_loading().await?;
            self.call(&page::Close {}).await?;
            Ok::<_, Error>(())
        }
        .await;

        self.token.cancel();
        if let Ok(browser) = self.browser() {
            browser.unregister(self.id);
        }
        info!(page = %self.id, "Page closed");
        result
    }

    /// Cookies for `urls`, or for the page's current URL when empty
    pub async fn cookies(&self, urls: &[String]) -> Result<Vec<network::Cookie>> {
        let urls = if urls.is_empty() {
            let info = self
                .call(&target::GetTargetInfo {
                    target_id: Some(self.target_id.clone()),
                })
                .await?;
            vec![info.target_info.url]
        } else {
            urls.to_vec()
        };

        Ok(self.call(&network::GetCookies { urls }).await?.cookies)
    }

    pub async fn set_cookies(&self, cookies: Vec<network::CookieParam>) -> Result<()> {
        self.call(&network::SetCookies { cookies }).await?;
        Ok(())
    }

    /// Send these headers with every request of the page
    pub async fn set_extra_headers(&self, headers: &[(&str, &str)]) -> Result<()> {
        let headers: Map<String, Value> = headers
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect();
        self.call(&network::SetExtraHttpHeaders { headers }).await?;
        Ok(())
    }

    /// Override the user agent; `None` applies the configured default
    pub async fn set_user_agent(&self, user_agent: Option<network::SetUserAgentOverride>) -> Result<()> {
        let user_agent = user_agent.unwrap_or_else(|| network::SetUserAgentOverride {
            user_agent: self.config.user_agent.clone(),
            accept_language: Some(self.config.accept_language.clone()),
            platform: Some(self.config.platform.clone()),
        });
        self.call(&user_agent).await?;
        Ok(())
    }

    async fn window_id(&self) -> Result<i64> {
        let reply = self
            .call(&browser_domain::GetWindowForTarget {
                target_id: self.target_id.clone(),
            })
            .await?;
        Ok(reply.window_id)
    }

    /// Bounds of the browser window holding the page
    pub async fn get_window(&self) -> Result<browser_domain::Bounds> {
        let window_id = self.window_id().await?;
        let reply = self
            .call(&browser_domain::GetWindowBounds { window_id })
            .await?;
        Ok(reply.bounds)
    }

    pub async fn set_window(&self, bounds: browser_domain::Bounds) -> Result<()> {
        let window_id = self.window_id().await?;
        self.call(&browser_domain::SetWindowBounds { window_id, bounds })
            .await?;
        Ok(())
    }

    /// Apply a device metrics override and remember it
    pub async fn set_viewport(&self, viewport: emulation::SetDeviceMetricsOverride) -> Result<()> {
        self.call(&viewport).await?;
        *lock(&self.viewport) = Some(viewport);
        Ok(())
    }

    /// Drop the device metrics override
    pub async fn clear_viewport(&self) -> Result<()> {
        self.call(&emulation::ClearDeviceMetricsOverride {}).await?;
        *lock(&self.viewport) = None;
        Ok(())
    }

    /// Arm a handler for the next JavaScript dialog.
    ///
    /// Blocking on the handle waits for the dialog and then answers it.
    pub fn handle_dialog(&self, accept: bool, prompt_text: Option<String>) -> Waiter<()> {
        let mut opening = self.wait_event::<page::JavascriptDialogOpening>();
        let ctx = self.call_context();

        Waiter::spawn(self.token.child_token(), "dialog", async move {
            let dialog = opening.wait().await?;
            debug!(kind = %dialog.dialog_type, message = %dialog.message, "Answering dialog");
            ctx.call(&page::HandleJavaScriptDialog {
                accept,
                prompt_text,
            })
            .await?;
            Ok(())
        })
    }

    /// Capture the page.
    ///
    /// With `full_page` the viewport is stretched to the content size for the
    /// capture and restored afterwards, even when the capture fails.
    #[instrument(level = "debug", skip_all, fields(page = %self.id, full_page = full_page))]
    pub async fn screenshot(&self, full_page: bool, req: &page::CaptureScreenshot) -> Result<Vec<u8>> {
        if !full_page {
            return self.capture(req).await;
        }

        let metrics = self.call(&page::GetLayoutMetrics {}).await?;
        let previous = self.viewport();

        let base = previous.clone().unwrap_or(emulation::SetDeviceMetricsOverride {
            width: metrics.layout_viewport.client_width,
            height: metrics.layout_viewport.client_height,
            device_scale_factor: 1.0,
            mobile: false,
        });
        let full = emulation::SetDeviceMetricsOverride {
            width: metrics.content_size.width.ceil() as i64,
            height: metrics.content_size.height.ceil() as i64,
            ..base
        };
        self.set_viewport(full).await?;

        let captured = self.capture(req).await;
        let restored = match previous {
            Some(viewport) => self.set_viewport(viewport).await,
            None => self.clear_viewport().await,
        };

        let data = captured?;
        restored?;
        Ok(data)
    }

    async fn capture(&self, req: &page::CaptureScreenshot) -> Result<Vec<u8>> {
        let reply = self.call(req).await?;
        Ok(BASE64_STANDARD.decode(reply.data)?)
    }

    pub async fn pdf(&self, req: &page::PrintToPdf) -> Result<Vec<u8>> {
        let reply = self.call(req).await?;
        Ok(BASE64_STANDARD.decode(reply.data)?)
    }

    /// Add a script tag; `content` is used when `url` is empty.
    ///
    /// Adding the same url and content twice is a no-op.
    pub async fn add_script_tag(&self, url: &str, content: &str) -> Result<()> {
        self.add_tag("addScriptTag", url, content).await
    }

    /// Add a style tag; `content` is used when `url` is empty
    pub async fn add_style_tag(&self, url: &str, content: &str) -> Result<()> {
        self.add_tag("addStyleTag", url, content).await
    }

    async fn add_tag(&self, helper: &str, url: &str, content: &str) -> Result<()> {
        let id = tag_id(url, content);
        self.eval(
            true,
            None,
            &self.js_fn(helper),
            &[json!(id), json!(url), json!(content)],
        )
        .await?;
        Ok(())
    }

    /// Release a remote object
    pub async fn release(&self, object_id: &RemoteObjectId) -> Result<()> {
        self.call(&runtime::ReleaseObject {
            object_id: object_id.clone(),
        })
        .await?;
        Ok(())
    }
}

impl Caller for Page {
    fn call_context(&self) -> CallContext {
        CallContext {
            token: self.token.clone(),
            transport: self.transport.clone(),
            session_id: Some(self.session_id.clone()),
        }
    }
}

/// DOM id of an injected tag, stable for the same url and content
fn tag_id(url: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
