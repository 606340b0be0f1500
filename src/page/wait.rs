//! Wait primitives
//!
//! Every wait is two-phase: arming subscribes to the page's events right away
//! and returns a [`Waiter`]; blocking on the waiter yields the outcome. Events
//! that arrive between the two phases are not lost.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use serde_json::json;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error};

use super::idle::{IdleTracker, UrlFilter};
use super::Page;
use crate::cdp::protocol::{debugger, target};
use crate::cdp::{decode_as, CdpEvent, EventStream, ProtocolEvent};
use crate::{Error, Result};

/// Single-use handle to an armed wait.
///
/// Dropping it cancels the wait.
#[derive(Debug)]
pub struct Waiter<T> {
    rx: Option<oneshot::Receiver<Result<T>>>,
    label: &'static str,
    _guard: DropGuard,
}

impl<T: Send + 'static> Waiter<T> {
    /// Run `work` in the background until it finishes or `token` is cancelled
    pub(crate) fn spawn<F>(token: CancellationToken, label: &'static str, work: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let task_token = token.clone();

        tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                _ = task_token.cancelled() => Err(Error::Cancelled),
                result = work => result,
            };
            let _ = tx.send(result);
        });

        Self {
            rx: Some(rx),
            label,
            _guard: token.drop_guard(),
        }
    }

    /// Block until the armed wait completes.
    ///
    /// A second call fails with [`Error::WaitConsumed`].
    pub async fn wait(&mut self) -> Result<T> {
        let Some(rx) = self.rx.take() else {
            error!(wait = self.label, "Wait handle blocked on twice");
            return Err(Error::WaitConsumed);
        };
        rx.await.unwrap_or(Err(Error::Cancelled))
    }

    pub fn is_consumed(&self) -> bool {
        self.rx.is_none()
    }
}

/// Next event of a tap; ends with `Cancelled` if the tap's token fired and
/// `StreamClosed` if the bus closed
pub(crate) async fn next_event(stream: &mut EventStream) -> Result<Arc<CdpEvent>> {
    match stream.next().await {
        Some(event) => Ok(event),
        None if stream.is_cancelled() => Err(Error::Cancelled),
        None => Err(Error::StreamClosed),
    }
}

/// First event of type `E` on the tap
pub(crate) async fn next_of<E: ProtocolEvent>(stream: &mut EventStream) -> Result<E> {
    loop {
        let raw = next_event(stream).await?;
        if let Some(decoded) = decode_as::<E>(&raw) {
            return decoded;
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

impl Page {
    /// Arm a wait for the next event of type `E` on this page's session
    pub fn wait_event<E: ProtocolEvent>(&self) -> Waiter<E> {
        let token = self.token.child_token();
        let mut stream = self.event.subscribe(token.clone());

        Waiter::spawn(token, E::METHOD, async move { next_of::<E>(&mut stream).await })
    }

    /// Arm a wait for the page's network to go quiet.
    ///
    /// Completes once no request whose URL passes `includes`/`excludes` has
    /// been outstanding for `idle`. The idle timer starts at arm time.
    pub fn wait_request_idle(
        &self,
        idle: Duration,
        includes: &[&str],
        excludes: &[&str],
    ) -> Result<Waiter<()>> {
        let filter = UrlFilter::new(includes, excludes)?;
        let token = self.token.child_token();
        let mut stream = self.event.subscribe(token.clone());
        let mut tracker = IdleTracker::new(filter, idle, Instant::now());

        Ok(Waiter::spawn(token, "request idle", async move {
            loop {
                tokio::select! {
                    biased;
                    _ = sleep_until(tracker.deadline()) => return Ok(()),
                    event = stream.next() => match event {
                        Some(event) => tracker.observe(&event, Instant::now()),
                        None if stream.is_cancelled() => return Err(Error::Cancelled),
                        // Nothing more will ever arrive
                        None => return Ok(()),
                    },
                }
            }
        }))
    }

    /// Arm a wait for a page opened by this one (popup, `target=_blank`)
    pub fn wait_open(&self) -> Result<Waiter<Arc<Page>>> {
        let browser = self.browser()?;
        let token = self.token.child_token();
        let mut stream = browser.event().subscribe(token.clone());
        let opener = self.target_id.clone();

        Ok(Waiter::spawn(token, "open", async move {
            loop {
                let created = next_of::<target::TargetCreated>(&mut stream).await?;
                if created.target_info.opener_id.as_ref() == Some(&opener) {
                    debug!(target = %created.target_info.target_id, "Page opened");
                    return browser
                        .page_from_target_id(created.target_info.target_id)
                        .await;
                }
            }
        }))
    }

    /// Wait for the page's JavaScript to go idle, at most `timeout`
    pub async fn wait_idle(&self, timeout: Duration) -> Result<()> {
        self.eval(true, None, &self.js_fn("waitIdle"), &[json!(timeout.as_secs_f64())])
            .await?;
        Ok(())
    }

    /// Wait for the `load` event of the current document
    pub async fn wait_load(&self) -> Result<()> {
        self.eval(true, None, &self.js_fn("waitLoad"), &[]).await?;
        Ok(())
    }

    /// Pause the page's JavaScript and block until it is resumed
    pub async fn pause(&self) -> Result<()> {
        self.call(&debugger::Enable {}).await?;
        let mut resumed = self.wait_event::<debugger::Resumed>();
        self.call(&debugger::Pause {}).await?;
        resumed.wait().await?;
        Ok(())
    }
}
