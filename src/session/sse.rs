//! Event-stream response aggregation
//!
//! Some responses from the remote service arrive as a server-sent-event
//! stream instead of a single JSON document. Each frame is one
//! `data:`-prefixed line carrying a JSON-RPC message. This module consumes
//! such a stream incrementally and reduces it to the single outcome the
//! caller asked for:
//!
//! - the last `result` value seen wins (later frames overwrite earlier ones)
//! - a well-formed frame carrying an `error` field fails the call
//!   immediately, taking precedence over any previously captured result
//! - malformed frames and keepalive pings are skipped
//!
//! Only `data:` fields participate; `event:`/`id:`/`retry:` fields and SSE
//! comments are ignored, since the stream here is a response body rather
//! than a long-lived subscription.

use bytes::Bytes;
use futures::Stream;

use crate::error::{McplinkError, Result};

/// Consumes an SSE response body and returns the final `result` value.
///
/// Returns `Value::Null` when the stream ends without any `result` frame,
/// mirroring the absent-`result` case of a plain JSON response.
///
/// # Errors
///
/// Returns [`McplinkError::Protocol`] when a frame carries an `error` field
/// or when the underlying transport fails mid-stream.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use mcplink::session::sse::collect_stream_result;
///
/// # #[tokio::main]
/// # async fn main() {
/// let body = b"data: {\"result\": 1}\n\ndata: {\"result\": 2}\n\n".to_vec();
/// let stream = futures::stream::iter(vec![Ok::<_, reqwest::Error>(Bytes::from(body))]);
/// let result = collect_stream_result(stream).await.unwrap();
/// assert_eq!(result, serde_json::json!(2));
/// # }
/// ```
pub async fn collect_stream_result(
    byte_stream: impl Stream<Item = reqwest::Result<Bytes>>,
) -> Result<serde_json::Value> {
    use futures::StreamExt;

    // Buffer accumulates raw text between line boundaries.
    let mut buffer = String::new();
    let mut last_result: Option<serde_json::Value> = None;

    tokio::pin!(byte_stream);

    while let Some(chunk_result) = byte_stream.next().await {
        let chunk = chunk_result
            .map_err(|e| McplinkError::Protocol(format!("event stream aborted: {e}")))?;

        let text = match std::str::from_utf8(&chunk) {
            Ok(s) => s,
            Err(_) => continue,
        };
        buffer.push_str(text);

        // Frames are individual `data:` lines; process each complete line.
        while let Some(pos) = buffer.find('\n') {
            let line = buffer[..pos].trim_end_matches('\r').to_string();
            buffer = buffer[pos + 1..].to_string();
            apply_frame(&line, &mut last_result)?;
        }
    }

    // Process any trailing line without a final newline.
    if !buffer.is_empty() {
        let line = buffer.clone();
        apply_frame(&line, &mut last_result)?;
    }

    Ok(last_result.unwrap_or(serde_json::Value::Null))
}

/// Applies a single stream line to the running aggregation.
///
/// Non-`data:` lines and empty or `[ping]` payloads are ignored. A payload
/// that fails to parse as JSON is skipped rather than treated as an error; a
/// parsed payload with a non-null `error` field fails the call.
fn apply_frame(line: &str, last_result: &mut Option<serde_json::Value>) -> Result<()> {
    let Some(payload) = line.strip_prefix("data:") else {
        return Ok(());
    };
    let payload = payload.trim();

    if payload.is_empty() || payload.eq_ignore_ascii_case("[ping]") {
        return Ok(());
    }

    let parsed: serde_json::Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!("skipping malformed event frame: {e}");
            return Ok(());
        }
    };

    if let Some(error) = parsed.get("error") {
        if !error.is_null() {
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unspecified protocol error")
                .to_string();
            return Err(McplinkError::Protocol(message).into());
        }
    }

    if let Some(result) = parsed.get("result") {
        *last_result = Some(result.clone());
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
