//! Download interception
//!
//! Chrome is told to allow downloads into a directory and to pause matching
//! requests. The first paused request is re-issued from here over HTTP and
//! its response replayed to the page, so the caller gets the bytes in memory.
//! Both settings are domain-wide, so one interception runs per page at a time.

use base64::prelude::{Engine as _, BASE64_STANDARD};
use bytes::Bytes;
use reqwest::header::HeaderMap;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, instrument, warn};

use super::wait::{next_of, Waiter};
use super::Page;
use crate::cdp::protocol::{fetch, page};
use crate::cdp::{CallContext, Caller, EventStream};
use crate::{Error, Result};

/// A downloaded response
#[derive(Debug, Clone)]
pub struct Download {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Page {
    /// Arm interception of the next download whose URL matches `pattern`
    /// (every URL when empty); `dir` is where Chrome may save files.
    ///
    /// Waits for any earlier interception on this page to finish first.
    #[instrument(level = "debug", skip_all, fields(page = %self.id, dir = %dir))]
    pub async fn get_download_file(&self, dir: &str, pattern: &str) -> Result<Waiter<Download>> {
        let guard = tokio::select! {
            _ = self.token.cancelled() => return Err(Error::Cancelled),
            guard = self.download_lock.clone().lock_owned() => guard,
        };

        self.call(&page::SetDownloadBehavior {
            behavior: page::DownloadBehavior::Allow,
            download_path: Some(dir.to_string()),
        })
        .await?;

        let token = self.token.child_token();
        let mut stream = self.event.subscribe(token.clone());

        let patterns = if pattern.is_empty() {
            None
        } else {
            Some(vec![fetch::RequestPattern {
                url_pattern: Some(pattern.to_string()),
            }])
        };
        self.call(&fetch::Enable { patterns }).await?;

        let interception = Interception {
            ctx: self.call_context(),
            lock: Some(guard),
        };
        Ok(Waiter::spawn(token, "download", async move {
            let result = intercept(&interception.ctx, &mut stream).await;
            let cleanup = interception.finish().await;

            let download = result?;
            cleanup?;
            Ok(download)
        }))
    }
}

/// An armed interception holding the page's download lock
struct Interception {
    ctx: CallContext,
    lock: Option<OwnedMutexGuard<()>>,
}

impl Interception {
    async fn finish(mut self) -> Result<()> {
        let result = self.ctx.call(&fetch::Disable {}).await;
        self.lock.take();
        result.map(|_| ())
    }
}

impl Drop for Interception {
    fn drop(&mut self) {
        // Abandoned before finishing; the lock is held until Fetch is off
        if let Some(lock) = self.lock.take() {
            let ctx = self.ctx.clone();
            tokio::spawn(async move {
                match ctx.call(&fetch::Disable {}).await {
                    Err(e) if !e.is_cancelled() => {
                        warn!("Failed to disable request interception: {}", e)
                    }
                    _ => {}
                }
                drop(lock);
            });
        }
    }
}

async fn intercept(ctx: &CallContext, stream: &mut EventStream) -> Result<Download> {
    let paused = next_of::<fetch::RequestPaused>(stream).await?;
    let request = &paused.request;
    debug!(url = %request.url, "Intercepted download request");

    let method = reqwest::Method::from_bytes(request.method.as_bytes())
        .map_err(|e| Error::internal(format!("Invalid request method: {}", e)))?;
    let mut builder = reqwest::Client::new().request(method, &request.url);
    for (name, value) in &request.headers {
        if let Some(value) = value.as_str() {
            builder = builder.header(name.as_str(), value);
        }
    }
    if let Some(body) = &request.post_data {
        builder = builder.body(body.clone());
    }

    let response = tokio::select! {
        _ = ctx.token.cancelled() => return Err(Error::Cancelled),
        response = builder.send() => response?,
    };
    let status = response.status().as_u16();
    let headers = response.headers().clone();
    let body = tokio::select! {
        _ = ctx.token.cancelled() => return Err(Error::Cancelled),
        body = response.bytes() => body?,
    };

    let response_headers = headers
        .iter()
        .map(|(name, value)| fetch::HeaderEntry {
            name: name.to_string(),
            value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
        })
        .collect();

    ctx.call(&fetch::FulfillRequest {
        request_id: paused.request_id.clone(),
        response_code: i64::from(status),
        response_headers,
        body: Some(BASE64_STANDARD.encode(&body)),
    })
    .await?;

    Ok(Download {
        status,
        headers,
        body,
    })
}
