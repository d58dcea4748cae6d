//! Tool dispatch bridge.
//!
//! Intercepts model-issued tool invocations mid-stream. A `toolUse` frame
//! records a [`PendingToolUse`]; the matching `contentEnd(type=TOOL)` hands
//! it here, where the query is extracted, resolved against the injected
//! [`QueryResolver`], and the answer re-injected into the inference stream as
//! a strict three-frame sequence:
//!
//! contentStart(TOOL, new contentName) -> toolResult -> contentEnd
//!
//! Resolver failures never abort the session: the same triplet goes out with
//! an explanatory error string as its content.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::inference::InferenceStream;
use crate::core::protocol::{
    Envelope, TOOL_RESULT_MAX_CHARS, TRUNCATION_MARKER, ToolUse,
};
use crate::core::resolver::QueryResolver;
use crate::errors::{ResolverError, StreamError};

/// Substituted when the resolver yields nothing usable.
const EMPTY_RESULT_FALLBACK: &str =
    "I couldn't process that request. Please try asking again.";

/// A tool invocation awaiting its closing `contentEnd(type=TOOL)`.
///
/// At most one exists per session, strictly between the `toolUse` frame and
/// the emission of its result triplet.
#[derive(Debug, Clone)]
pub struct PendingToolUse {
    /// Tool the model asked for
    pub tool_name: String,
    /// Correlation id echoed in the result's contentStart
    pub tool_use_id: String,
    /// Raw tool input as received
    pub content: Value,
    /// Owning prompt, once known from the closing contentEnd
    pub prompt_name: Option<String>,
}

impl PendingToolUse {
    /// Record a pending invocation from a `toolUse` frame.
    pub fn from_tool_use(tool_use: &ToolUse) -> Self {
        Self {
            tool_name: tool_use.tool_name.clone(),
            tool_use_id: tool_use.tool_use_id.clone(),
            content: tool_use.content.clone(),
            prompt_name: None,
        }
    }
}

/// Bridge between intercepted tool invocations and the external resolver.
pub struct ToolDispatcher {
    resolver: Arc<dyn QueryResolver>,
}

impl ToolDispatcher {
    /// Create a bridge around the resolver injected at session creation.
    pub fn new(resolver: Arc<dyn QueryResolver>) -> Self {
        Self { resolver }
    }

    /// Pull the query text out of a tool input.
    ///
    /// Accepts a raw string, a JSON object with a `query` field, or a string
    /// holding JSON with a `query` field.
    pub fn extract_query(content: &Value) -> String {
        match content {
            Value::String(text) => match serde_json::from_str::<Value>(text) {
                Ok(Value::Object(map)) => map
                    .get("query")
                    .and_then(Value::as_str)
                    .map(str::to_owned)
                    .unwrap_or_else(|| text.clone()),
                _ => text.clone(),
            },
            Value::Object(map) => match map.get("query") {
                Some(Value::String(query)) => query.clone(),
                Some(other) => other.to_string(),
                None => content.to_string(),
            },
            other => other.to_string(),
        }
    }

    /// Resolve a pending invocation. No timeout is applied here; the session's
    /// receive loop bounds the whole dispatch.
    pub async fn resolve(&self, pending: &PendingToolUse) -> Result<String, ResolverError> {
        let query = Self::extract_query(&pending.content);
        info!(
            tool_name = %pending.tool_name,
            tool_use_id = %pending.tool_use_id,
            "resolving tool query"
        );
        self.resolver.resolve(&query).await
    }

    /// User-facing substitute for a failed resolution.
    pub fn error_result(reason: &str) -> String {
        format!("Sorry, I encountered an error: {reason}")
    }

    /// Normalize resolved text to the voice-friendly bound.
    pub fn render_result(text: &str) -> String {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return EMPTY_RESULT_FALLBACK.to_string();
        }
        if trimmed.chars().count() > TOOL_RESULT_MAX_CHARS {
            let cut: String = trimmed.chars().take(TOOL_RESULT_MAX_CHARS).collect();
            format!("{cut}{TRUNCATION_MARKER}")
        } else {
            trimmed.to_string()
        }
    }

    /// Emit the result triplet for one invocation, exactly once, under a
    /// freshly generated contentName distinct from the model's.
    pub async fn emit_result(
        &self,
        stream: &dyn InferenceStream,
        prompt_name: &str,
        tool_use_id: &str,
        text: &str,
    ) -> Result<(), StreamError> {
        let content_name = Uuid::new_v4().to_string();
        let content = Self::render_result(text);

        stream
            .send(&Envelope::content_start_tool(
                prompt_name,
                &content_name,
                tool_use_id,
            ))
            .await?;
        stream
            .send(&Envelope::tool_result(prompt_name, &content_name, content))
            .await?;
        stream
            .send(&Envelope::content_end(prompt_name, &content_name))
            .await?;

        debug!(tool_use_id, content_name, "tool result re-injected");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::Mutex;

    use super::*;
    use crate::core::protocol::{ContentType, Event};
    use crate::errors::ConnectError;

    struct RecordingStream {
        sent: Mutex<Vec<Envelope>>,
    }

    impl RecordingStream {
        fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl InferenceStream for RecordingStream {
        async fn open(&self) -> Result<(), ConnectError> {
            Ok(())
        }

        async fn send(&self, envelope: &Envelope) -> Result<(), StreamError> {
            self.sent.lock().await.push(envelope.clone());
            Ok(())
        }

        async fn receive(&self) -> Option<Result<Envelope, StreamError>> {
            None
        }

        fn is_active(&self) -> bool {
            true
        }

        async fn shutdown(&self) {}
    }

    struct StaticResolver(&'static str);

    #[async_trait]
    impl QueryResolver for StaticResolver {
        async fn resolve(&self, _query: &str) -> Result<String, ResolverError> {
            Ok(self.0.to_string())
        }
    }

    struct FailingResolver;

    #[async_trait]
    impl QueryResolver for FailingResolver {
        async fn resolve(&self, _query: &str) -> Result<String, ResolverError> {
            Err(ResolverError::Request("backend unavailable".to_string()))
        }
    }

    #[test]
    fn test_extract_query_from_raw_string() {
        let content = json!("show beach photos");
        assert_eq!(ToolDispatcher::extract_query(&content), "show beach photos");
    }

    #[test]
    fn test_extract_query_from_object() {
        let content = json!({"query": "show beach photos"});
        assert_eq!(ToolDispatcher::extract_query(&content), "show beach photos");
    }

    #[test]
    fn test_extract_query_from_nested_json_string() {
        let content = json!("{\"query\":\"show beach photos\"}");
        assert_eq!(ToolDispatcher::extract_query(&content), "show beach photos");
    }

    #[test]
    fn test_extract_query_object_without_query_field() {
        let content = json!({"question": "anything"});
        let extracted = ToolDispatcher::extract_query(&content);
        assert!(extracted.contains("question"));
    }

    #[test]
    fn test_render_result_truncates_long_text() {
        let long = "a".repeat(900);
        let rendered = ToolDispatcher::render_result(&long);

        assert!(rendered.ends_with(TRUNCATION_MARKER));
        assert_eq!(
            rendered.chars().count(),
            TOOL_RESULT_MAX_CHARS + TRUNCATION_MARKER.chars().count()
        );
    }

    #[test]
    fn test_render_result_keeps_short_text() {
        assert_eq!(ToolDispatcher::render_result("42 photos"), "42 photos");
    }

    #[test]
    fn test_render_result_empty_falls_back() {
        assert_eq!(ToolDispatcher::render_result("  "), EMPTY_RESULT_FALLBACK);
    }

    #[tokio::test]
    async fn test_emit_result_sends_exact_triplet() {
        let stream = RecordingStream::new();
        let dispatcher = ToolDispatcher::new(Arc::new(StaticResolver("sunny beach album")));

        dispatcher
            .emit_result(&stream, "p1", "abc", "sunny beach album")
            .await
            .unwrap();

        let sent = stream.sent.lock().await;
        assert_eq!(sent.len(), 3);

        let content_name = match &sent[0].event {
            Event::ContentStart(start) => {
                assert_eq!(start.content_type, ContentType::Tool);
                assert_eq!(start.prompt_name, "p1");
                let tool_config = start.tool_result_input_configuration.as_ref().unwrap();
                assert_eq!(tool_config.tool_use_id, "abc");
                start.content_name.clone()
            }
            other => panic!("expected contentStart first, got {other:?}"),
        };

        match &sent[1].event {
            Event::ToolResult(result) => {
                assert_eq!(result.content_name, content_name);
                assert_eq!(result.content, "sunny beach album");
            }
            other => panic!("expected toolResult second, got {other:?}"),
        }

        match &sent[2].event {
            Event::ContentEnd(end) => assert_eq!(end.content_name, content_name),
            other => panic!("expected contentEnd last, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_resolve_propagates_resolver_failure() {
        let dispatcher = ToolDispatcher::new(Arc::new(FailingResolver));
        let pending = PendingToolUse {
            tool_name: "supervisorAgent".to_string(),
            tool_use_id: "abc".to_string(),
            content: json!({"query": "anything"}),
            prompt_name: None,
        };

        let result = dispatcher.resolve(&pending).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_error_result_wording() {
        let text = ToolDispatcher::error_result("backend unavailable");
        assert_eq!(text, "Sorry, I encountered an error: backend unavailable");
    }
}
