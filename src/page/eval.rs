//! Script execution bridge
//!
//! Functions are invoked with `Runtime.callFunctionOn` on a receiver. Without
//! an explicit receiver the page's cached global object is used; it is created
//! on demand by evaluating the helper script and dropped whenever Chrome
//! reports its execution context gone, after which the call is retried.

use serde_json::{json, Value};
use tracing::{debug, instrument};

use super::{lock, Page};
use crate::assets::{self, HELPER_NAMESPACE, HELPER_SOURCE_URL};
use crate::backoff::{retry, Backoff};
use crate::cdp::protocol::{page, runtime, RemoteObjectId};
use crate::{Error, Result};

impl Page {
    /// Evaluate the function expression `js` with `args`.
    ///
    /// `this` is the receiver; `None` means the page's global object, which
    /// is re-created transparently after navigations. With `by_value` the
    /// result is returned inline, otherwise as a remote handle.
    #[instrument(level = "debug", skip_all, fields(page = %self.id))]
    pub async fn eval(
        &self,
        by_value: bool,
        this: Option<&RemoteObjectId>,
        js: &str,
        args: &[Value],
    ) -> Result<runtime::RemoteObject> {
        let (initial, max) = self.config.eval_backoff();
        let mut backoff = Backoff::new(initial, max);

        let page = self;
        let declaration = sprint_fn_this(js);
        let declaration = declaration.as_str();

        retry(&self.token, &mut backoff, move || async move {
            page.try_call_function(by_value, this, declaration, args)
                .await
        })
        .await
    }

    /// One attempt; `Ok(None)` asks for a retry
    async fn try_call_function(
        &self,
        by_value: bool,
        this: Option<&RemoteObjectId>,
        declaration: &str,
        args: &[Value],
    ) -> Result<Option<runtime::RemoteObject>> {
        let receiver = match this {
            Some(id) => id.clone(),
            None => match self.window_object_id() {
                Some(id) => id,
                None => match self.init_js().await {
                    Ok(id) => id,
                    Err(e) if e.is_context_destroyed() => {
                        debug!("Context destroyed while creating it: {}", e);
                        return Ok(None);
                    }
                    Err(e) => return Err(e),
                },
            },
        };

        let reply = self
            .call(&runtime::CallFunctionOn {
                function_declaration: declaration.to_string(),
                object_id: Some(receiver),
                arguments: args.iter().cloned().map(runtime::CallArgument::value).collect(),
                return_by_value: by_value,
                await_promise: true,
            })
            .await;

        let reply = match reply {
            Ok(reply) => reply,
            Err(e) if this.is_none() && e.is_context_destroyed() => {
                debug!("Execution context destroyed, recreating: {}", e);
                self.set_window_object_id(None);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        if let Some(exception) = reply.exception_details {
            return Err(Error::evaluation(exception.description()));
        }
        Ok(Some(reply.result))
    }

    /// Create the page's global context and cache its handle
    async fn init_js(&self) -> Result<RemoteObjectId> {
        let expression = format!(
            "{}\n//# sourceURL={}",
            sprint_fn_apply(assets::HELPER, &[json!(self.frame_id)]),
            HELPER_SOURCE_URL
        );

        let context_id = if self.is_iframe() {
            let world = self
                .call(&page::CreateIsolatedWorld {
                    frame_id: self.frame_id.clone(),
                    world_name: None,
                })
                .await?;
            Some(world.execution_context_id)
        } else {
            None
        };

        let reply = self
            .call(&runtime::Evaluate {
                expression,
                context_id,
                ..Default::default()
            })
            .await?;
        if let Some(exception) = reply.exception_details {
            return Err(Error::evaluation(exception.description()));
        }
        let window = reply
            .result
            .object_id
            .ok_or_else(|| Error::evaluation("helper script returned no object"))?;

        if self.config.trace {
            self.call(&runtime::CallFunctionOn {
                function_declaration: sprint_fn_this(&self.js_fn("initMouseTracer")),
                object_id: Some(window.clone()),
                arguments: vec![
                    runtime::CallArgument::value(json!(self.mouse.id())),
                    runtime::CallArgument::value(json!(assets::MOUSE_POINTER)),
                ],
                return_by_value: true,
                await_promise: true,
            })
            .await?;
        }

        self.set_window_object_id(Some(window.clone()));
        Ok(window)
    }

    fn window_object_id(&self) -> Option<RemoteObjectId> {
        lock(&self.window_object_id).clone()
    }

    fn set_window_object_id(&self, id: Option<RemoteObjectId>) {
        *lock(&self.window_object_id) = id;
    }

    /// Expression naming helper `name` in this frame's namespace
    pub(crate) fn js_fn(&self, name: &str) -> String {
        format!("{}{}.{}", HELPER_NAMESPACE, self.frame_id, name)
    }
}

/// Wrap a function expression so it runs with the receiver as `this`
pub(crate) fn sprint_fn_this(js: &str) -> String {
    format!("function() {{ return ({}).apply(this, arguments) }}", js)
}

/// Call expression applying `js` to JSON encoded `args`
pub(crate) fn sprint_fn_apply(js: &str, args: &[Value]) -> String {
    let args: Vec<String> = args.iter().map(Value::to_string).collect();
    format!("({})({})", js, args.join(", "))
}
