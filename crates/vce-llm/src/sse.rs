//! Hand-rolled SSE-to-token parsing over a raw `reqwest` byte stream
//! (§4.6), in the same style as this codebase's OpenAI-compatible proxy
//! path: buffer partial lines across chunk boundaries, look for `data: `
//! prefixed lines, stop at the `[DONE]` sentinel.

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde::Deserialize;

use crate::error::LlmError;

#[derive(Debug, Deserialize)]
struct Delta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    delta: Delta,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    choices: Vec<Choice>,
}

fn find_newline(buf: &[u8]) -> Option<usize> {
    buf.iter().position(|&b| b == b'\n')
}

/// Parse one `data: ...` line into a token, if it carries content.
/// Returns `Ok(None)` for lines to skip (blank, non-`data:`, role-only
/// deltas) and the `[DONE]` sentinel is signalled as `Ok(None)` too —
/// callers detect end-of-stream by the outer stream ending, not by a
/// special return value here.
fn parse_sse_line(line: &str) -> Result<Option<String>, LlmError> {
    let line = line.trim_end_matches('\r');
    let Some(payload) = line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:")) else {
        return Ok(None);
    };
    let payload = payload.trim();
    if payload.is_empty() || payload == "[DONE]" {
        return Ok(None);
    }
    let chunk: ChatCompletionChunk = serde_json::from_str(payload)
        .map_err(|e| LlmError::Malformed(format!("{e}: {payload}")))?;
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content))
}

/// Consume a byte stream of vendor SSE frames, yielding one `String`
/// token per content delta. Buffers partial lines across chunk
/// boundaries the same way the proxy's ndjson translator does.
pub async fn for_each_token<S, F>(mut byte_stream: S, mut on_token: F) -> Result<(), LlmError>
where
    S: Stream<Item = reqwest::Result<Bytes>> + Unpin,
    F: FnMut(String),
{
    let mut buf: Vec<u8> = Vec::new();

    while let Some(next) = byte_stream.next().await {
        let bytes = next.map_err(|e| LlmError::Provider(e.to_string()))?;
        buf.extend_from_slice(&bytes);

        while let Some(idx) = find_newline(&buf) {
            let line_bytes: Vec<u8> = buf.drain(..=idx).collect();
            let line = String::from_utf8_lossy(&line_bytes[..line_bytes.len() - 1]).to_string();
            if let Some(token) = parse_sse_line(&line)? {
                on_token(token);
            }
        }
    }

    if !buf.is_empty() {
        let line = String::from_utf8_lossy(&buf).to_string();
        if let Some(token) = parse_sse_line(&line)? {
            on_token(token);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    #[tokio::test]
    async fn parses_tokens_across_chunk_boundaries() {
        let frames: Vec<reqwest::Result<Bytes>> = vec![
            Ok(Bytes::from_static(
                b"data: {\"choices\":[{\"delta\":{\"content\":\"Hel",
            )),
            Ok(Bytes::from_static(b"lo\"}}]}\n")),
            Ok(Bytes::from_static(
                b"data: {\"choices\":[{\"delta\":{\"content\":\" world\"}}]}\n",
            )),
            Ok(Bytes::from_static(b"data: [DONE]\n")),
        ];
        let mut tokens = Vec::new();
        for_each_token(stream::iter(frames), |t| tokens.push(t))
            .await
            .unwrap();
        assert_eq!(tokens, vec!["Hello".to_string(), " world".to_string()]);
    }

    #[tokio::test]
    async fn skips_role_only_deltas() {
        let frames: Vec<reqwest::Result<Bytes>> = vec![Ok(Bytes::from_static(
            b"data: {\"choices\":[{\"delta\":{}}]}\n",
        ))];
        let mut tokens: Vec<String> = Vec::new();
        for_each_token(stream::iter(frames), |t| tokens.push(t))
            .await
            .unwrap();
        assert!(tokens.is_empty());
    }
}
