//! Element handle
//!
//! A remote object reference bound to the page it lives in. Querying the DOM
//! is left to callers; this layer only evaluates on the element and resolves
//! iframe elements to their own [`Page`].

use serde_json::Value;
use std::sync::Arc;

use crate::cdp::protocol::{dom, runtime, RemoteObjectId};
use crate::page::Page;
use crate::{Error, Result};

/// Element handle
#[derive(Debug, Clone)]
pub struct Element {
    page: Arc<Page>,
    object_id: RemoteObjectId,
}

impl Element {
    pub fn new(page: Arc<Page>, object_id: RemoteObjectId) -> Self {
        Self { page, object_id }
    }

    pub fn page(&self) -> &Arc<Page> {
        &self.page
    }

    pub fn object_id(&self) -> &RemoteObjectId {
        &self.object_id
    }

    /// Evaluate `js` with the element as `this`.
    ///
    /// A stale element is reported as is; it is never re-resolved.
    pub async fn eval(&self, by_value: bool, js: &str, args: &[Value]) -> Result<runtime::RemoteObject> {
        self.page.eval(by_value, Some(&self.object_id), js, args).await
    }

    pub async fn describe(&self) -> Result<dom::Node> {
        let reply = self
            .page
            .call(&dom::DescribeNode {
                object_id: self.object_id.clone(),
            })
            .await?;
        Ok(reply.node)
    }

    /// Page of the frame this iframe element embeds.
    ///
    /// Repeated calls return the same page until its parent goes away.
    pub async fn frame(&self) -> Result<Arc<Page>> {
        let node = self.describe().await?;
        let frame_id = node
            .frame_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::page_not_found(format!("element {} embeds no frame", self.object_id)))?;

        self.page
            .browser()?
            .frame_page(&self.page, self.object_id.clone(), frame_id)
    }

    /// Release the remote object behind the handle
    pub async fn release(&self) -> Result<()> {
        self.page.release(&self.object_id).await
    }
}
