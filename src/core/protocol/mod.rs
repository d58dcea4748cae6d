//! Wire protocol codec for the bidirectional inference channel.
//!
//! Every frame exchanged on either side of the relay is a JSON object with a
//! single top-level `event` key whose value carries exactly one event kind.
//!
//! Client / relay events (sent to the backend):
//! - sessionStart - open an inference session with inference parameters
//! - promptStart - open a prompt with output and tool configuration
//! - contentStart - open a content block (TEXT, AUDIO or TOOL)
//! - textInput - text content for an open block
//! - audioInput - one base64 audio chunk for an open block
//! - toolResult - result content for a tool block
//! - contentEnd - close a content block
//! - promptEnd - close a prompt
//! - sessionEnd - close the session
//!
//! Backend events (received from the inference stream) reuse the same kinds,
//! plus `toolUse` announcing a model-issued tool invocation.
//!
//! Decoding transparently unwraps payloads where the true envelope is nested
//! as JSON text under a `body` field. This module is pure: no I/O.

use base64::prelude::*;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::DecodeError;

// =============================================================================
// Default configuration
// =============================================================================

/// Default system prompt injected at session bootstrap.
///
/// Domain queries are routed through the `supervisorAgent` tool; the voice
/// model itself only converses.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful voice assistant. \
    Whenever the user asks a question about their data or requests an action, \
    use the supervisorAgent tool to resolve it and answer from the tool result. \
    Keep spoken responses short and conversational.";

/// Marker appended to tool results cut down to the voice-friendly length.
pub const TRUNCATION_MARKER: &str = "... (truncated for voice)";

/// Maximum tool-result length in characters, before the truncation marker.
pub const TOOL_RESULT_MAX_CHARS: usize = 800;

/// Inference parameters sent with sessionStart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceConfiguration {
    /// Maximum tokens the model may generate per response
    pub max_tokens: u32,
    /// Nucleus sampling cutoff
    pub top_p: f32,
    /// Sampling temperature
    pub temperature: f32,
    /// Top-k sampling cutoff
    pub top_k: u32,
}

impl Default for InferenceConfiguration {
    // topP/temperature 1.0 and topK 1 keep tool calling reliable
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            top_p: 1.0,
            temperature: 1.0,
            top_k: 1,
        }
    }
}

/// Text output configuration for promptStart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextOutputConfiguration {
    /// MIME type of generated text
    pub media_type: String,
}

impl Default for TextOutputConfiguration {
    fn default() -> Self {
        Self {
            media_type: "text/plain".to_string(),
        }
    }
}

/// Audio output configuration for promptStart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioOutputConfiguration {
    /// MIME type of generated audio
    pub media_type: String,
    /// Output sample rate in Hz
    pub sample_rate_hertz: u32,
    /// Output sample width in bits
    pub sample_size_bits: u32,
    /// Output channel count
    pub channel_count: u32,
    /// Voice used for synthesis
    pub voice_id: String,
    /// Payload encoding on the wire
    pub encoding: String,
    /// Audio content class
    pub audio_type: String,
}

impl Default for AudioOutputConfiguration {
    fn default() -> Self {
        Self {
            media_type: "audio/lpcm".to_string(),
            sample_rate_hertz: 24000,
            sample_size_bits: 16,
            channel_count: 1,
            voice_id: "matthew".to_string(),
            encoding: "base64".to_string(),
            audio_type: "SPEECH".to_string(),
        }
    }
}

/// Audio input configuration for contentStart(AUDIO).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioInputConfiguration {
    /// MIME type of submitted audio
    pub media_type: String,
    /// Input sample rate in Hz
    pub sample_rate_hertz: u32,
    /// Input sample width in bits
    pub sample_size_bits: u32,
    /// Input channel count
    pub channel_count: u32,
    /// Audio content class
    pub audio_type: String,
    /// Payload encoding on the wire
    pub encoding: String,
}

impl Default for AudioInputConfiguration {
    fn default() -> Self {
        Self {
            media_type: "audio/lpcm".to_string(),
            sample_rate_hertz: 16000,
            sample_size_bits: 16,
            channel_count: 1,
            audio_type: "SPEECH".to_string(),
            encoding: "base64".to_string(),
        }
    }
}

/// Text input configuration for contentStart(TEXT) and tool result blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextInputConfiguration {
    /// MIME type of submitted text
    pub media_type: String,
}

impl Default for TextInputConfiguration {
    fn default() -> Self {
        Self {
            media_type: "text/plain".to_string(),
        }
    }
}

/// Tool-use output configuration for promptStart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolUseOutputConfiguration {
    /// MIME type of tool-use payloads emitted by the model
    pub media_type: String,
}

impl Default for ToolUseOutputConfiguration {
    fn default() -> Self {
        Self {
            media_type: "application/json".to_string(),
        }
    }
}

/// Tool registration block for promptStart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolConfiguration {
    /// Tools offered to the model for this prompt
    pub tools: Vec<ToolEntry>,
}

/// One tool entry inside the tool configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolEntry {
    /// Specification of the tool
    pub tool_spec: ToolSpec,
}

/// Tool specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSpec {
    /// Tool name as issued back in toolUse events
    pub name: String,
    /// Human-readable description shown to the model
    pub description: String,
    /// Input schema for the tool
    pub input_schema: ToolInputSchema,
}

/// JSON schema wrapper for a tool's input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInputSchema {
    /// Schema as JSON text
    pub json: String,
}

impl Default for ToolConfiguration {
    /// Registers the single `supervisorAgent` query-routing tool.
    fn default() -> Self {
        Self {
            tools: vec![ToolEntry {
                tool_spec: ToolSpec {
                    name: "supervisorAgent".to_string(),
                    description: "Routes user queries to specialized agents and returns the answer"
                        .to_string(),
                    input_schema: ToolInputSchema {
                        json: r#"{"$schema":"http://json-schema.org/draft-07/schema#","type":"object","properties":{"query":{"type":"string","description":"The user query to resolve"}},"required":["query"]}"#
                            .to_string(),
                    },
                },
            }],
        }
    }
}

// =============================================================================
// Event payloads
// =============================================================================

/// Content block type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentType {
    /// Text content
    #[serde(rename = "TEXT")]
    Text,
    /// Audio content
    #[serde(rename = "AUDIO")]
    Audio,
    /// Tool-use or tool-result content
    #[serde(rename = "TOOL")]
    Tool,
}

/// sessionStart payload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStart {
    /// Inference parameters for the whole session
    #[serde(default)]
    pub inference_configuration: InferenceConfiguration,
}

/// promptStart payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptStart {
    /// Prompt correlation key for every later event
    pub prompt_name: String,
    /// Text output settings
    #[serde(default)]
    pub text_output_configuration: TextOutputConfiguration,
    /// Audio output settings
    #[serde(default)]
    pub audio_output_configuration: AudioOutputConfiguration,
    /// Tool-use output settings
    #[serde(default)]
    pub tool_use_output_configuration: ToolUseOutputConfiguration,
    /// Tools offered for this prompt
    #[serde(default)]
    pub tool_configuration: ToolConfiguration,
}

/// Tool-result input configuration carried by contentStart(TOOL).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResultInputConfiguration {
    /// toolUse invocation this result answers
    pub tool_use_id: String,
    /// Result content type
    #[serde(rename = "type")]
    pub content_type: ContentType,
    /// Result text settings
    pub text_input_configuration: TextInputConfiguration,
}

/// contentStart payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentStart {
    /// Owning prompt
    pub prompt_name: String,
    /// Content correlation key for every later event in this block
    pub content_name: String,
    /// Block type
    #[serde(rename = "type")]
    pub content_type: ContentType,
    /// Whether the block participates in the live exchange
    pub interactive: bool,
    /// Role attached to the block, when any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Present on TEXT blocks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_input_configuration: Option<TextInputConfiguration>,
    /// Present on AUDIO blocks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_input_configuration: Option<AudioInputConfiguration>,
    /// Present on TOOL result blocks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_result_input_configuration: Option<ToolResultInputConfiguration>,
}

/// audioInput payload. `content` is base64-encoded audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioInput {
    /// Owning prompt
    pub prompt_name: String,
    /// Owning content block
    pub content_name: String,
    /// Base64-encoded audio chunk
    pub content: String,
}

/// textInput payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextInput {
    /// Owning prompt
    pub prompt_name: String,
    /// Owning content block
    pub content_name: String,
    /// Text content
    pub content: String,
}

/// toolUse payload (backend to relay).
///
/// `content` may be a raw string or a JSON object carrying a `query` field;
/// the dispatch bridge accepts both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolUse {
    /// Tool the model wants invoked
    pub tool_name: String,
    /// Correlation id echoed back with the result
    pub tool_use_id: String,
    /// Tool input
    #[serde(default)]
    pub content: Value,
}

/// contentEnd payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentEnd {
    /// Owning prompt
    pub prompt_name: String,
    /// Block being closed
    pub content_name: String,
    /// Block type, when the backend tags it
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<ContentType>,
}

/// toolResult payload (relay to backend).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    /// Owning prompt
    pub prompt_name: String,
    /// Tool result block
    pub content_name: String,
    /// Result text
    pub content: String,
}

/// promptEnd payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptEnd {
    /// Prompt being closed
    pub prompt_name: String,
}

/// sessionEnd payload. Triggers teardown whether sent or received.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionEnd {}

// =============================================================================
// Envelope
// =============================================================================

/// The single event carried by an envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    /// Open the inference session
    #[serde(rename = "sessionStart")]
    SessionStart(SessionStart),
    /// Open a prompt
    #[serde(rename = "promptStart")]
    PromptStart(PromptStart),
    /// Open a content block
    #[serde(rename = "contentStart")]
    ContentStart(ContentStart),
    /// Audio chunk
    #[serde(rename = "audioInput")]
    AudioInput(AudioInput),
    /// Text content
    #[serde(rename = "textInput")]
    TextInput(TextInput),
    /// Model-issued tool invocation
    #[serde(rename = "toolUse")]
    ToolUse(ToolUse),
    /// Close a content block
    #[serde(rename = "contentEnd")]
    ContentEnd(ContentEnd),
    /// Tool result re-injection
    #[serde(rename = "toolResult")]
    ToolResult(ToolResult),
    /// Close a prompt
    #[serde(rename = "promptEnd")]
    PromptEnd(PromptEnd),
    /// Close the session
    #[serde(rename = "sessionEnd")]
    SessionEnd(SessionEnd),
}

impl Event {
    /// Wire names of every kind this protocol defines.
    pub const KINDS: [&'static str; 10] = [
        "sessionStart",
        "promptStart",
        "contentStart",
        "audioInput",
        "textInput",
        "toolUse",
        "contentEnd",
        "toolResult",
        "promptEnd",
        "sessionEnd",
    ];

    /// Whether `kind` names an event this protocol defines.
    pub fn is_known_kind(kind: &str) -> bool {
        Self::KINDS.contains(&kind)
    }

    /// Wire name of this event's kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::SessionStart(_) => "sessionStart",
            Event::PromptStart(_) => "promptStart",
            Event::ContentStart(_) => "contentStart",
            Event::AudioInput(_) => "audioInput",
            Event::TextInput(_) => "textInput",
            Event::ToolUse(_) => "toolUse",
            Event::ContentEnd(_) => "contentEnd",
            Event::ToolResult(_) => "toolResult",
            Event::PromptEnd(_) => "promptEnd",
            Event::SessionEnd(_) => "sessionEnd",
        }
    }
}

/// One discrete protocol message exchanged over the duplex connection.
///
/// The optional `timestamp` (epoch milliseconds) is stamped by the relay on
/// frames taken off the inference stream before they are forwarded to the
/// client; it never appears on client-to-backend traffic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// The event this frame carries
    pub event: Event,
    /// Relay receive time in epoch milliseconds, outbound-to-client only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

impl Envelope {
    fn new(event: Event) -> Self {
        Self {
            event,
            timestamp: None,
        }
    }

    /// sessionStart with the given inference parameters.
    pub fn session_start(inference_configuration: InferenceConfiguration) -> Self {
        Self::new(Event::SessionStart(SessionStart {
            inference_configuration,
        }))
    }

    /// promptStart with default output and tool configuration.
    pub fn prompt_start(prompt_name: impl Into<String>) -> Self {
        Self::new(Event::PromptStart(PromptStart {
            prompt_name: prompt_name.into(),
            text_output_configuration: TextOutputConfiguration::default(),
            audio_output_configuration: AudioOutputConfiguration::default(),
            tool_use_output_configuration: ToolUseOutputConfiguration::default(),
            tool_configuration: ToolConfiguration::default(),
        }))
    }

    /// contentStart for a SYSTEM text block.
    pub fn content_start_text(
        prompt_name: impl Into<String>,
        content_name: impl Into<String>,
    ) -> Self {
        Self::new(Event::ContentStart(ContentStart {
            prompt_name: prompt_name.into(),
            content_name: content_name.into(),
            content_type: ContentType::Text,
            interactive: true,
            role: Some("SYSTEM".to_string()),
            text_input_configuration: Some(TextInputConfiguration::default()),
            audio_input_configuration: None,
            tool_result_input_configuration: None,
        }))
    }

    /// contentStart for an audio block with default input configuration.
    pub fn content_start_audio(
        prompt_name: impl Into<String>,
        content_name: impl Into<String>,
    ) -> Self {
        Self::new(Event::ContentStart(ContentStart {
            prompt_name: prompt_name.into(),
            content_name: content_name.into(),
            content_type: ContentType::Audio,
            interactive: true,
            role: None,
            text_input_configuration: None,
            audio_input_configuration: Some(AudioInputConfiguration::default()),
            tool_result_input_configuration: None,
        }))
    }

    /// contentStart for a tool-result block answering `tool_use_id`.
    pub fn content_start_tool(
        prompt_name: impl Into<String>,
        content_name: impl Into<String>,
        tool_use_id: impl Into<String>,
    ) -> Self {
        Self::new(Event::ContentStart(ContentStart {
            prompt_name: prompt_name.into(),
            content_name: content_name.into(),
            content_type: ContentType::Tool,
            interactive: true,
            role: Some("TOOL".to_string()),
            text_input_configuration: None,
            audio_input_configuration: None,
            tool_result_input_configuration: Some(ToolResultInputConfiguration {
                tool_use_id: tool_use_id.into(),
                content_type: ContentType::Text,
                text_input_configuration: TextInputConfiguration::default(),
            }),
        }))
    }

    /// textInput carrying arbitrary text.
    pub fn text_input(
        prompt_name: impl Into<String>,
        content_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::new(Event::TextInput(TextInput {
            prompt_name: prompt_name.into(),
            content_name: content_name.into(),
            content: content.into(),
        }))
    }

    /// audioInput carrying an already base64-encoded chunk.
    pub fn audio_input(
        prompt_name: impl Into<String>,
        content_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::new(Event::AudioInput(AudioInput {
            prompt_name: prompt_name.into(),
            content_name: content_name.into(),
            content: content.into(),
        }))
    }

    /// audioInput from raw audio bytes, base64-encoded here.
    pub fn audio_input_bytes(
        prompt_name: impl Into<String>,
        content_name: impl Into<String>,
        audio: &Bytes,
    ) -> Self {
        Self::audio_input(prompt_name, content_name, BASE64_STANDARD.encode(audio))
    }

    /// toolResult carrying resolved tool output.
    pub fn tool_result(
        prompt_name: impl Into<String>,
        content_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::new(Event::ToolResult(ToolResult {
            prompt_name: prompt_name.into(),
            content_name: content_name.into(),
            content: content.into(),
        }))
    }

    /// contentEnd closing a block.
    pub fn content_end(
        prompt_name: impl Into<String>,
        content_name: impl Into<String>,
    ) -> Self {
        Self::new(Event::ContentEnd(ContentEnd {
            prompt_name: prompt_name.into(),
            content_name: content_name.into(),
            content_type: None,
        }))
    }

    /// promptEnd closing a prompt.
    pub fn prompt_end(prompt_name: impl Into<String>) -> Self {
        Self::new(Event::PromptEnd(PromptEnd {
            prompt_name: prompt_name.into(),
        }))
    }

    /// sessionEnd.
    pub fn session_end() -> Self {
        Self::new(Event::SessionEnd(SessionEnd {}))
    }

    /// Serialize this envelope to canonical JSON wire form.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Decode one inbound payload into an [`Envelope`].
///
/// Payloads where the true envelope is nested as JSON text under a `body`
/// field are unwrapped transparently. Malformed JSON and unrecognized event
/// kinds are distinct, recoverable [`DecodeError`]s.
pub fn decode(payload: &str) -> Result<Envelope, DecodeError> {
    let mut value: Value = serde_json::from_str(payload)?;

    if let Some(body) = value.get("body").and_then(Value::as_str) {
        value = serde_json::from_str(body)?;
    }

    let event = value
        .get("event")
        .and_then(Value::as_object)
        .ok_or(DecodeError::MissingEvent)?;
    let kind = event.keys().next().cloned().ok_or(DecodeError::MissingEvent)?;
    if !Event::is_known_kind(&kind) {
        return Err(DecodeError::UnknownKind(kind));
    }

    serde_json::from_value(value).map_err(|source| DecodeError::InvalidFields { kind, source })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_start_defaults() {
        let envelope = Envelope::session_start(InferenceConfiguration::default());
        let json = envelope.encode().unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();

        let config = &value["event"]["sessionStart"]["inferenceConfiguration"];
        assert_eq!(config["maxTokens"], 1024);
        assert_eq!(config["topP"], 1.0);
        assert_eq!(config["temperature"], 1.0);
        assert_eq!(config["topK"], 1);
        assert!(value.get("timestamp").is_none());
    }

    #[test]
    fn test_prompt_start_registers_supervisor_tool() {
        let envelope = Envelope::prompt_start("p1");
        let json = envelope.encode().unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();

        let prompt = &value["event"]["promptStart"];
        assert_eq!(prompt["promptName"], "p1");
        assert_eq!(prompt["textOutputConfiguration"]["mediaType"], "text/plain");
        assert_eq!(
            prompt["audioOutputConfiguration"]["sampleRateHertz"],
            24000
        );
        assert_eq!(prompt["audioOutputConfiguration"]["voiceId"], "matthew");
        assert_eq!(
            prompt["toolConfiguration"]["tools"][0]["toolSpec"]["name"],
            "supervisorAgent"
        );
    }

    #[test]
    fn test_audio_content_start_defaults() {
        let envelope = Envelope::content_start_audio("p1", "c1");
        let json = envelope.encode().unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();

        let config = &value["event"]["contentStart"]["audioInputConfiguration"];
        assert_eq!(config["sampleRateHertz"], 16000);
        assert_eq!(config["sampleSizeBits"], 16);
        assert_eq!(config["channelCount"], 1);
        assert_eq!(config["encoding"], "base64");
        assert_eq!(value["event"]["contentStart"]["type"], "AUDIO");
    }

    #[test]
    fn test_tool_content_start_carries_tool_use_id() {
        let envelope = Envelope::content_start_tool("p1", "c9", "abc");
        let json = envelope.encode().unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();

        let start = &value["event"]["contentStart"];
        assert_eq!(start["type"], "TOOL");
        assert_eq!(start["role"], "TOOL");
        assert_eq!(start["toolResultInputConfiguration"]["toolUseId"], "abc");
        assert_eq!(start["toolResultInputConfiguration"]["type"], "TEXT");
    }

    #[test]
    fn test_round_trip_preserves_events() {
        let envelopes = [
            Envelope::session_start(InferenceConfiguration::default()),
            Envelope::prompt_start("p1"),
            Envelope::content_start_text("p1", "c0"),
            Envelope::content_start_audio("p1", "c1"),
            Envelope::content_start_tool("p1", "c2", "tool-1"),
            Envelope::text_input("p1", "c0", DEFAULT_SYSTEM_PROMPT),
            Envelope::audio_input("p1", "c1", "AAAA"),
            Envelope::tool_result("p1", "c2", "result text"),
            Envelope::content_end("p1", "c1"),
            Envelope::prompt_end("p1"),
            Envelope::session_end(),
        ];

        for envelope in envelopes {
            let decoded = decode(&envelope.encode().unwrap()).unwrap();
            assert_eq!(decoded, envelope);
        }
    }

    #[test]
    fn test_decode_tool_use() {
        let payload = r#"{"event":{"toolUse":{"toolName":"supervisorAgent","toolUseId":"abc","content":"{\"query\":\"show beach photos\"}"}}}"#;
        let envelope = decode(payload).unwrap();

        match envelope.event {
            Event::ToolUse(tool_use) => {
                assert_eq!(tool_use.tool_name, "supervisorAgent");
                assert_eq!(tool_use.tool_use_id, "abc");
                assert!(tool_use.content.as_str().unwrap().contains("beach"));
            }
            other => panic!("expected toolUse, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_content_end_with_type() {
        let payload =
            r#"{"event":{"contentEnd":{"promptName":"p1","contentName":"c1","type":"TOOL"}}}"#;
        let envelope = decode(payload).unwrap();

        match envelope.event {
            Event::ContentEnd(end) => {
                assert_eq!(end.content_type, Some(ContentType::Tool));
            }
            other => panic!("expected contentEnd, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_unwraps_body() {
        let inner = r#"{"event":{"promptEnd":{"promptName":"p1"}}}"#;
        let wrapped = serde_json::json!({ "body": inner }).to_string();
        let envelope = decode(&wrapped).unwrap();

        assert_eq!(envelope.event.kind(), "promptEnd");
    }

    #[test]
    fn test_decode_malformed_json() {
        match decode("{not json") {
            Err(DecodeError::Malformed(_)) => {}
            other => panic!("expected Malformed, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_unknown_kind() {
        let payload = r#"{"event":{"telepathyInput":{"content":"hello"}}}"#;
        match decode(payload) {
            Err(DecodeError::UnknownKind(kind)) => assert_eq!(kind, "telepathyInput"),
            other => panic!("expected UnknownKind, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_missing_event() {
        match decode(r#"{"hello":"world"}"#) {
            Err(DecodeError::MissingEvent) => {}
            other => panic!("expected MissingEvent, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_reads_optional_timestamp() {
        let payload = r#"{"event":{"promptEnd":{"promptName":"p1"}},"timestamp":123}"#;
        let envelope = decode(payload).unwrap();
        assert_eq!(envelope.timestamp, Some(123));
    }

    #[test]
    fn test_audio_input_bytes_is_base64() {
        let audio = Bytes::from(vec![0u8, 1, 2, 3]);
        let envelope = Envelope::audio_input_bytes("p1", "c1", &audio);

        match envelope.event {
            Event::AudioInput(input) => {
                let decoded = BASE64_STANDARD.decode(input.content).unwrap();
                assert_eq!(decoded, vec![0u8, 1, 2, 3]);
            }
            other => panic!("expected audioInput, got {other:?}"),
        }
    }
}
