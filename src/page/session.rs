//! Session initialization
//!
//! Attach a flattened session to the target, derive the page's event bus
//! from the browser-wide one, enable the domains the page listens to and
//! discover the page's frame id.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::browser::Browser;
use crate::cdp::protocol::{dom, network, page, target, FrameId, SessionId, TargetId};
use crate::cdp::{CallContext, EventBus};
use crate::Result;

/// What a freshly attached page needs
#[derive(Debug)]
pub(crate) struct SessionInit {
    pub session_id: SessionId,
    pub event: EventBus,
    pub frame_id: FrameId,
}

pub(crate) async fn init_session(
    browser: &Arc<Browser>,
    token: &CancellationToken,
    target_id: &TargetId,
) -> Result<SessionInit> {
    let browser_ctx = CallContext {
        token: token.clone(),
        transport: browser.transport().clone(),
        session_id: None,
    };

    let attached = browser_ctx
        .call(&target::AttachToTarget {
            target_id: target_id.clone(),
            flatten: true,
        })
        .await?;
    debug!(target = %target_id, session = %attached.session_id, "Session attached");

    let ctx = CallContext {
        session_id: Some(attached.session_id.clone()),
        ..browser_ctx
    };
    let event = init_events(browser.event(), &ctx).await?;

    let document = ctx.call(&dom::GetDocument { depth: None }).await?;
    let frame_id = discover_frame_id(&document.root);

    Ok(SessionInit {
        session_id: attached.session_id,
        event,
        frame_id,
    })
}

/// Derive the session's event bus, then enable the Page and Network domains
pub(crate) async fn init_events(source: &EventBus, ctx: &CallContext) -> Result<EventBus> {
    let session = ctx
        .session_id
        .as_ref()
        .map(|s| s.as_str().to_string())
        .unwrap_or_default();

    let event = source.filter(ctx.token.clone(), move |e| {
        e.session_id.as_deref() == Some(session.as_str())
    });

    ctx.call(&page::Enable {}).await?;
    ctx.call(&network::Enable {}).await?;
    Ok(event)
}

/// Frame id of the document; the last child carrying one wins
pub(crate) fn discover_frame_id(root: &dom::Node) -> FrameId {
    root.children
        .iter()
        .filter_map(|child| child.frame_id.as_ref())
        .filter(|id| !id.is_empty())
        .last()
        .cloned()
        .unwrap_or_default()
}
