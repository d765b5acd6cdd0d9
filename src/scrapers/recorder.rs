//! Passive recorder for JSON-bodied network responses.
//!
//! The catalog SPA fetches article data over background requests; some
//! fields are easier to recover from those payloads than from the rendered
//! DOM. The recorder observes every response for the whole session and
//! retains the JSON ones, bounded by size. Entries are append-only and
//! unordered; they are discarded with the session.

use std::sync::Arc;

use anyhow::Result;
use chromiumoxide::cdp::browser_protocol::network::{
    EventResponseReceived, GetResponseBodyParams,
};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

/// Upper bound on a retained response body, in bytes.
const BODY_CEILING: usize = 2_000_000;

/// A captured JSON response.
#[derive(Debug, Clone)]
pub struct NetworkPayload {
    pub url: String,
    pub body: String,
}

/// Accumulates [`NetworkPayload`]s for the lifetime of a page.
pub struct ResponseRecorder {
    payloads: Arc<Mutex<Vec<NetworkPayload>>>,
    task: JoinHandle<()>,
}

impl ResponseRecorder {
    /// Attach to a page. Must happen before navigation so every response
    /// of the session is observed.
    pub async fn attach(page: &Page) -> Result<Self> {
        let mut events = page.event_listener::<EventResponseReceived>().await?;
        let payloads = Arc::new(Mutex::new(Vec::new()));
        let sink = payloads.clone();
        let page = page.clone();

        let task = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if !event.response.mime_type.to_lowercase().contains("json") {
                    continue;
                }
                let url = event.response.url.clone();
                // Body reads race page teardown; one failure must not stop
                // the stream.
                let body = match page
                    .execute(GetResponseBodyParams::new(event.request_id.clone()))
                    .await
                {
                    Ok(resp) => resp.result.body.clone(),
                    Err(e) => {
                        debug!("Could not read response body for {}: {}", url, e);
                        continue;
                    }
                };
                if body.is_empty() || body.len() >= BODY_CEILING {
                    continue;
                }
                debug!("Captured JSON payload ({} bytes) from {}", body.len(), url);
                sink.lock().await.push(NetworkPayload { url, body });
            }
        });

        Ok(Self { payloads, task })
    }

    /// Unordered snapshot of everything captured so far.
    pub async fn snapshot(&self) -> Vec<NetworkPayload> {
        self.payloads.lock().await.clone()
    }
}

impl Drop for ResponseRecorder {
    fn drop(&mut self) {
        self.task.abort();
    }
}
