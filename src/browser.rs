//! Browser handle
//!
//! Owns the transport, the browser-wide event bus and the arena of attached
//! pages. Pages refer back to it weakly and to each other by [`PageId`].

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::cdp::protocol::{target, Command, FrameId, RemoteObjectId, TargetId};
use crate::cdp::{CallContext, Caller, CdpWebSocketConnection, EventBus, Transport};
use crate::config::Config;
use crate::page::{Page, PageId};
use crate::{Error, Result};

/// Browser handle
#[derive(Debug)]
pub struct Browser {
    transport: Arc<dyn Transport>,
    event: EventBus,
    config: Arc<Config>,
    token: CancellationToken,
    pages: RwLock<HashMap<PageId, Arc<Page>>>,
}

impl Browser {
    /// Create a browser over an existing transport whose events go to `event`
    pub fn new(transport: Arc<dyn Transport>, event: EventBus, config: Config) -> Arc<Self> {
        Arc::new(Self {
            transport,
            event,
            config: Arc::new(config),
            token: CancellationToken::new(),
            pages: RwLock::new(HashMap::new()),
        })
    }

    /// Connect to `config.cdp_endpoint` and start target discovery
    pub async fn connect(config: Config) -> Result<Arc<Self>> {
        config.validate()?;

        let event = EventBus::new();
        let transport = CdpWebSocketConnection::connect(
            config.cdp_endpoint.clone(),
            event.clone(),
            config.command_timeout(),
        )
        .await?;
        info!("Connected to browser at {}", config.cdp_endpoint);

        let browser = Self::new(transport, event, config);
        browser
            .call(&target::SetDiscoverTargets { discover: true })
            .await?;
        Ok(browser)
    }

    /// Browser-wide event stream, every session included
    pub fn event(&self) -> &EventBus {
        &self.event
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Issue a browser-level command
    pub async fn call<C: Command>(&self, command: &C) -> Result<C::Response> {
        self.call_context().call(command).await
    }

    /// Attach to `target_id` and register the resulting page
    #[instrument(skip_all, fields(target = %target_id))]
    pub async fn page_from_target_id(self: &Arc<Self>, target_id: TargetId) -> Result<Arc<Page>> {
        let page = Page::attach(self, target_id).await?;
        self.register(page.clone())?;
        info!(page = %page.id(), session = %page.session_id(), "Page attached");
        Ok(page)
    }

    /// The page of `frame_id` embedded in `parent`, created and registered
    /// on first use
    pub(crate) fn frame_page(
        self: &Arc<Self>,
        parent: &Arc<Page>,
        element: RemoteObjectId,
        frame_id: FrameId,
    ) -> Result<Arc<Page>> {
        let mut pages = self
            .pages
            .write()
            .map_err(|e| Error::internal(format!("Lock error: {}", e)))?;

        let existing = pages.values().find(|p| {
            p.parent_id() == Some(parent.id())
                && p.frame_id() == &frame_id
                && !p.token().is_cancelled()
        });
        if let Some(frame) = existing {
            return Ok(frame.clone());
        }

        let frame = Page::new_iframe(parent, element, frame_id);
        pages.insert(frame.id(), frame.clone());
        drop(pages);

        self.unregister_on_cancel(&frame);
        debug!(page = %frame.id(), frame = %frame.frame_id(), "Iframe registered");
        Ok(frame)
    }

    pub(crate) fn register(self: &Arc<Self>, page: Arc<Page>) -> Result<()> {
        self.pages
            .write()
            .map_err(|e| Error::internal(format!("Lock error: {}", e)))?
            .insert(page.id(), page.clone());
        self.unregister_on_cancel(&page);
        Ok(())
    }

    /// Drop `page` from the arena once its token fires
    fn unregister_on_cancel(self: &Arc<Self>, page: &Arc<Page>) {
        let id = page.id();
        let token = page.token().clone();
        let browser = Arc::downgrade(self);
        tokio::spawn(async move {
            token.cancelled().await;
            if let Some(browser) = browser.upgrade() {
                browser.unregister(id);
            }
        });
    }

    /// Remove a page and every iframe page nested in it
    pub(crate) fn unregister(&self, id: PageId) {
        match self.pages.write() {
            Ok(mut pages) => {
                let mut doomed = vec![id];
                while let Some(id) = doomed.pop() {
                    pages.remove(&id);
                    doomed.extend(
                        pages
                            .values()
                            .filter(|p| p.parent_id() == Some(id))
                            .map(|p| p.id()),
                    );
                }
            }
            Err(e) => warn!("Failed to unregister page {}: {}", id, e),
        }
    }

    /// Look up a registered page
    pub fn page(&self, id: PageId) -> Result<Arc<Page>> {
        self.pages
            .read()
            .map_err(|e| Error::internal(format!("Lock error: {}", e)))?
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::page_not_found(id.to_string()))
    }

    /// All registered pages, iframes included
    pub fn pages(&self) -> Result<Vec<Arc<Page>>> {
        let pages = self
            .pages
            .read()
            .map_err(|e| Error::internal(format!("Lock error: {}", e)))?;
        Ok(pages.values().cloned().collect())
    }

    /// Cancel every page and close the transport
    pub async fn close(&self) -> Result<()> {
        info!("Closing browser");
        self.token.cancel();

        self.pages
            .write()
            .map_err(|e| Error::internal(format!("Lock error: {}", e)))?
            .clear();

        self.transport.close().await
    }
}

impl Caller for Browser {
    fn call_context(&self) -> CallContext {
        CallContext {
            token: self.token.clone(),
            transport: self.transport.clone(),
            session_id: None,
        }
    }
}
