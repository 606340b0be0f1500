//! Protocol caller binding
//!
//! Every outgoing command needs three things: the lifecycle token bounding
//! the call, the transport, and the session to address. [`Caller`] supplies
//! that triple; [`CallContext::call`] turns a typed command into its reply.

use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::protocol::{Command, SessionId};
use super::traits::Transport;
use crate::{Error, Result};

/// Everything needed to issue a command
#[derive(Debug, Clone)]
pub struct CallContext {
    pub token: CancellationToken,
    pub transport: Arc<dyn Transport>,
    /// `None` addresses the browser target itself
    pub session_id: Option<SessionId>,
}

/// Anything that can issue protocol commands
pub trait Caller {
    fn call_context(&self) -> CallContext;
}

impl Caller for CallContext {
    fn call_context(&self) -> CallContext {
        self.clone()
    }
}

impl CallContext {
    /// Issue `command` and decode its reply.
    ///
    /// Fails with [`Error::Cancelled`] if the token fires first.
    pub async fn call<C: Command>(&self, command: &C) -> Result<C::Response> {
        if self.token.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let params = serde_json::to_value(command)?;
        let session = self.session_id.as_ref().map(SessionId::as_str);
        debug!(method = C::METHOD, session = ?session, "Calling CDP method");

        let result = tokio::select! {
            _ = self.token.cancelled() => return Err(Error::Cancelled),
            result = self.transport.call(session, C::METHOD, params) => result?,
        };

        // Commands without a result may come back with no `result` member
        let result = if result.is_null() {
            Value::Object(Default::default())
        } else {
            result
        };

        Ok(serde_json::from_value(result)?)
    }
}

/// Issue `command` through any [`Caller`]
pub async fn call<C, P>(caller: &P, command: &C) -> Result<C::Response>
where
    C: Command,
    P: Caller + ?Sized,
{
    caller.call_context().call(command).await
}
