//! Line-oriented service loop.
//!
//! Reads newline-delimited JSON requests and writes one JSON response per
//! request. A line is one of:
//!
//! - an entity change event, answered with an `EventResponse`
//! - an array of events, answered with a `BatchOperationSummary`
//! - `{"search": {"tenantId": "...", "body": ...}}`, answered with an `ApiResponse`

use serde::Serialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument};

use crate::config::Dependencies;
use crate::AppError;
use entity_search_ingest::EventResponse;
use entity_search_shared::{RequestContext, ServiceError};

/// The wired service.
pub struct Service {
    deps: Dependencies,
}

impl Service {
    pub fn new(deps: Dependencies) -> Self {
        Self { deps }
    }

    pub fn dependencies(&self) -> &Dependencies {
        &self.deps
    }

    /// Serve requests from `reader` until end of input or a shutdown signal.
    ///
    /// The tombstone janitor runs alongside and is stopped on the way out.
    #[instrument(skip_all)]
    pub async fn run<R, W>(
        &self,
        reader: R,
        mut writer: W,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), AppError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!("Starting entity search service");

        let (janitor_tx, janitor_rx) = broadcast::channel(1);
        let janitor = self.deps.janitor.clone();
        let janitor_handle = tokio::spawn(async move { janitor.run(janitor_rx).await });

        let mut lines = reader.lines();
        let result = loop {
            tokio::select! {
                line = lines.next_line() => {
                    match line {
                        Ok(Some(line)) => {
                            if let Some(response) = self.handle_line(&line).await {
                                if let Err(e) = write_line(&mut writer, &response).await {
                                    break Err(e);
                                }
                            }
                        }
                        Ok(None) => {
                            info!("Input stream ended");
                            break Ok(());
                        }
                        Err(e) => break Err(AppError::from(e)),
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Received shutdown signal");
                    break Ok(());
                }
            }
        };

        let _ = janitor_tx.send(());
        if let Err(e) = janitor_handle.await {
            error!(error = %e, "Tombstone janitor task failed");
        }

        info!("Service shutdown complete");
        result
    }

    /// Handle one input line. Blank lines produce no response.
    pub async fn handle_line(&self, line: &str) -> Option<String> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let response = match serde_json::from_str::<Value>(line) {
            Ok(Value::Array(events)) => self.handle_batch(events).await,
            Ok(Value::Object(mut object)) if object.contains_key("search") => {
                let search = object.remove("search").unwrap_or(Value::Null);
                self.handle_search(&search).await
            }
            Ok(event) => {
                let ctx = RequestContext::new("ingest");
                to_json(&self.deps.receiver.handle(&ctx, &event).await)
            }
            Err(e) => {
                debug!(error = %e, "Malformed input line");
                let err = ServiceError::invalid_input(format!("Malformed request line: {}", e));
                to_json(&EventResponse::from(&err))
            }
        };
        Some(response.to_string())
    }

    async fn handle_batch(&self, events: Vec<Value>) -> Value {
        let ctx = RequestContext::new("ingest_batch");
        match self.deps.receiver.handle_batch(&ctx, events).await {
            Ok(summary) => to_json(&summary),
            Err(err) => to_json(&EventResponse::from(&err)),
        }
    }

    async fn handle_search(&self, search: &Value) -> Value {
        let ctx = RequestContext::new("search");
        let tenant = search.get("tenantId").and_then(Value::as_str);
        let body = match search.get("body") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(body)) => body.clone(),
            Some(body) => body.to_string(),
        };
        to_json(&self.deps.search_handler.handle(&ctx, tenant, &body).await)
    }
}

fn to_json<T: Serialize>(response: &T) -> Value {
    serde_json::to_value(response).unwrap_or_else(|e| {
        error!(error = %e, "Failed to serialize response");
        json!({ "statusCode": 500, "message": "Internal error" })
    })
}

async fn write_line<W>(writer: &mut W, line: &str) -> Result<(), AppError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}
