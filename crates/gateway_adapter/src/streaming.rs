//! Streaming translation
//!
//! Re-frames the backend's SSE byte stream into discrete Messages-protocol
//! SSE frames. Backend network chunk boundaries do not align with logical
//! event boundaries, so the translator never assumes one read equals one
//! event: it buffers at most one partial line and emits events strictly in
//! input order.

use serde_json::Value;

use crate::tool_repair::{repair_tool_use_blocks, ToolRepairStats};

/// Per-stream state machine. One instance per in-flight streamed request;
/// never share across streams.
pub struct StreamTranslator {
    buffer: Vec<u8>,
    request_tools: Option<Vec<Value>>,
    stats: ToolRepairStats,
}

impl StreamTranslator {
    /// `request_tools` is the tool list declared by the original request;
    /// `None` disables tool repair on streamed blocks.
    pub fn new(request_tools: Option<Vec<Value>>) -> Self {
        Self {
            buffer: Vec::new(),
            request_tools,
            stats: ToolRepairStats::default(),
        }
    }

    /// Repair counters accumulated over the life of the stream.
    pub fn stats(&self) -> ToolRepairStats {
        self.stats
    }

    /// Feed one raw chunk; returns zero or more complete SSE frames, each
    /// already formatted as `data: {...}\n\n`.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut segments: Vec<Vec<u8>> = self
            .buffer
            .split(|byte| *byte == b'\n')
            .map(<[u8]>::to_vec)
            .collect();
        // The last segment is the (possibly empty) partial line.
        self.buffer = segments.pop().unwrap_or_default();

        let mut frames = Vec::new();
        for segment in segments {
            if let Some(frame) = self.translate_line(&segment) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Signal end of stream. A non-empty pending buffer means the upstream
    /// closed mid-line; the fragment is discarded, not surfaced.
    pub fn finish(&mut self) {
        let trailing = String::from_utf8_lossy(&self.buffer);
        if !trailing.trim().is_empty() {
            log::warn!("Trailing streaming buffer discarded");
        }
        self.buffer.clear();
    }

    fn translate_line(&mut self, line: &[u8]) -> Option<String> {
        let line = String::from_utf8_lossy(line);
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let data = if let Some(payload) = line.strip_prefix("data: ") {
            let payload = payload.trim();
            if payload == "[DONE]" {
                // Terminal marker passes through verbatim, never decoded.
                return Some("data: [DONE]\n\n".to_string());
            }
            payload
        } else if line.starts_with("event:") || line.starts_with("id:") {
            // SSE metadata lines carry nothing the client needs.
            return None;
        } else {
            // Tolerate backends that omit the `data:` prefix.
            line
        };

        if data.is_empty() {
            return None;
        }

        let mut event = match serde_json::from_str::<Value>(data) {
            Ok(event) => event,
            Err(_) => {
                log::warn!("Skipping malformed streaming event line");
                return None;
            }
        };

        self.repair_tool_use_event(&mut event);

        Some(format!("data: {event}\n\n"))
    }

    /// In-place repair of a `content_block_start` event carrying a tool_use
    /// block. The event itself is never dropped; a repair "drop" only
    /// replaces its payload with the substituted text block.
    fn repair_tool_use_event(&mut self, event: &mut Value) {
        let Some(tools) = &self.request_tools else {
            return;
        };
        if event.get("type").and_then(Value::as_str) != Some("content_block_start") {
            return;
        }
        let is_tool_use = event
            .get("content_block")
            .and_then(|block| block.get("type"))
            .and_then(Value::as_str)
            == Some("tool_use");
        if !is_tool_use {
            return;
        }

        let Some(block) = event.get("content_block").cloned() else {
            return;
        };
        let (mut repaired, stats) = repair_tool_use_blocks(&[block], Some(tools));
        if let Some(replacement) = repaired.pop() {
            event["content_block"] = replacement;
        }
        if !stats.is_empty() {
            log::info!(
                "Tool use repairs applied (streaming): added_ids={} parsed_stringified_input={} dropped_invalid_tools={}",
                stats.added_ids,
                stats.parsed_stringified_input,
                stats.dropped_invalid_tools,
            );
            self.stats.merge(&stats);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tools(names: &[&str]) -> Vec<Value> {
        names
            .iter()
            .map(|name| json!({"name": name, "input_schema": {}}))
            .collect()
    }

    fn collect_frames(translator: &mut StreamTranslator, chunks: &[&[u8]]) -> Vec<String> {
        let mut frames = Vec::new();
        for chunk in chunks {
            frames.extend(translator.push_chunk(chunk));
        }
        translator.finish();
        frames
    }

    #[test]
    fn reassembles_event_split_across_chunk_boundary() {
        let mut translator = StreamTranslator::new(None);
        let frames = collect_frames(
            &mut translator,
            &[
                b"data: {\"type\": \"content_block_delta\", \"ind",
                b"ex\": 0}\n\n",
            ],
        );
        assert_eq!(frames.len(), 1);
        let event: Value = serde_json::from_str(
            frames[0]
                .strip_prefix("data: ")
                .unwrap()
                .trim_end(),
        )
        .unwrap();
        assert_eq!(event["type"], json!("content_block_delta"));
        assert_eq!(event["index"], json!(0));
    }

    #[test]
    fn done_marker_passes_through_verbatim() {
        let mut translator = StreamTranslator::new(None);
        let frames = collect_frames(&mut translator, &[b"data: [DONE]\n"]);
        assert_eq!(frames, vec!["data: [DONE]\n\n".to_string()]);
    }

    #[test]
    fn sse_metadata_lines_are_ignored() {
        let mut translator = StreamTranslator::new(None);
        let frames = collect_frames(
            &mut translator,
            &[b"event: message_start\nid: 7\ndata: {\"type\": \"message_start\"}\n"],
        );
        assert_eq!(frames.len(), 1);
        assert!(frames[0].contains("message_start"));
    }

    #[test]
    fn bare_json_lines_are_tolerated() {
        let mut translator = StreamTranslator::new(None);
        let frames = collect_frames(&mut translator, &[b"{\"type\": \"ping\"}\n"]);
        assert_eq!(frames.len(), 1);
        assert!(frames[0].starts_with("data: {"));
    }

    #[test]
    fn malformed_line_is_skipped_and_stream_continues() {
        let mut translator = StreamTranslator::new(None);
        let frames = collect_frames(
            &mut translator,
            &[b"data: {broken\ndata: {\"type\": \"message_stop\"}\n"],
        );
        assert_eq!(frames.len(), 1);
        assert!(frames[0].contains("message_stop"));
    }

    #[test]
    fn event_order_is_preserved() {
        let mut translator = StreamTranslator::new(None);
        let input = b"data: {\"type\": \"content_block_start\", \"index\": 0}\ndata: {\"type\": \"content_block_delta\", \"index\": 0}\ndata: {\"type\": \"content_block_stop\", \"index\": 0}\n";
        let frames = collect_frames(&mut translator, &[input]);
        assert_eq!(frames.len(), 3);
        assert!(frames[0].contains("content_block_start"));
        assert!(frames[1].contains("content_block_delta"));
        assert!(frames[2].contains("content_block_stop"));
    }

    #[test]
    fn tool_use_block_start_is_repaired() {
        let mut translator = StreamTranslator::new(Some(tools(&["read_file"])));
        let event = json!({
            "type": "content_block_start",
            "index": 0,
            "content_block": {"type": "tool_use", "name": "read_file", "input": {}}
        });
        let frames =
            collect_frames(&mut translator, &[format!("data: {event}\n").as_bytes()]);
        assert_eq!(frames.len(), 1);
        let out: Value =
            serde_json::from_str(frames[0].strip_prefix("data: ").unwrap().trim_end()).unwrap();
        let id = out["content_block"]["id"].as_str().unwrap();
        assert!(id.starts_with("toolu_"));
        assert_eq!(translator.stats().added_ids, 1);
    }

    #[test]
    fn hallucinated_tool_start_keeps_event_with_text_payload() {
        let mut translator = StreamTranslator::new(Some(tools(&["read_file"])));
        let event = json!({
            "type": "content_block_start",
            "index": 0,
            "content_block": {
                "type": "tool_use",
                "id": "toolu_1",
                "name": "delete_everything",
                "input": {}
            }
        });
        let frames =
            collect_frames(&mut translator, &[format!("data: {event}\n").as_bytes()]);
        assert_eq!(frames.len(), 1);
        let out: Value =
            serde_json::from_str(frames[0].strip_prefix("data: ").unwrap().trim_end()).unwrap();
        assert_eq!(out["type"], json!("content_block_start"));
        assert_eq!(out["content_block"]["type"], json!("text"));
        assert!(out["content_block"]["text"]
            .as_str()
            .unwrap()
            .contains("not available"));
        assert_eq!(translator.stats().dropped_invalid_tools, 1);
    }

    #[test]
    fn no_repair_without_declared_tools() {
        let mut translator = StreamTranslator::new(None);
        let event = json!({
            "type": "content_block_start",
            "index": 0,
            "content_block": {"type": "tool_use", "name": "anything", "input": {}}
        });
        let frames =
            collect_frames(&mut translator, &[format!("data: {event}\n").as_bytes()]);
        let out: Value =
            serde_json::from_str(frames[0].strip_prefix("data: ").unwrap().trim_end()).unwrap();
        assert!(out["content_block"].get("id").is_none());
        assert!(translator.stats().is_empty());
    }

    #[test]
    fn trailing_partial_line_is_discarded() {
        let mut translator = StreamTranslator::new(None);
        let mut frames = translator.push_chunk(b"data: {\"type\": \"message_stop\"}\ndata: {\"trunc");
        translator.finish();
        frames.extend(translator.push_chunk(b"")); // nothing resurfaces
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn reemits_compact_json() {
        let mut translator = StreamTranslator::new(None);
        let frames = collect_frames(
            &mut translator,
            &[b"data: { \"type\" : \"ping\" , \"n\" : 1 }\n"],
        );
        assert_eq!(frames, vec!["data: {\"n\":1,\"type\":\"ping\"}\n\n".to_string()]);
    }
}
