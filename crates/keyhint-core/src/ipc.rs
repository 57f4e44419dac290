use crate::layout::RenderedBlock;
use crate::mapping::{KeyStroke, MappingEntry};
use crate::surface::{Anchor, Position};
use serde::{Deserialize, Serialize};

/// Messages from daemon to surfaces/clients (JSON-lines over Unix socket).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DaemonMsg {
    /// Show a hint popup. `id` pairs it with the later `HideHint`.
    #[serde(rename = "show_hint")]
    ShowHint {
        id: u64,
        content: RenderedBlock,
        background: String,
        anchor: Anchor,
        position: Position,
        /// 0 means no auto-fade.
        fade_ms: u64,
    },
    #[serde(rename = "hide_hint")]
    HideHint { id: u64 },
    /// Status response.
    #[serde(rename = "status")]
    Status {
        state: String,
        sort_order: String,
        delay_ms: u64,
        version: String,
    },
    /// Acknowledgement for commands.
    #[serde(rename = "ack")]
    Ack { ok: bool, message: String },
}

/// Messages from clients to daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMsg {
    /// Ask for a hint for the keys typed so far. `elapsed_ms` is how long
    /// ago the sequence started; the debounce window counts from there.
    #[serde(rename = "request_popup")]
    RequestPopup {
        #[serde(default)]
        anchor: Anchor,
        typed: Vec<KeyStroke>,
        mappings: Vec<MappingEntry>,
        #[serde(default)]
        elapsed_ms: u64,
    },
    /// Cancel any pending hint and hide the visible one.
    #[serde(rename = "dismiss")]
    Dismiss,
    /// Change an option such as `timeoutlen` at runtime.
    #[serde(rename = "set_option")]
    SetOption { name: String, value: String },
    /// Request current status.
    #[serde(rename = "get_status")]
    GetStatus,
    /// Surface client announcing itself (for routing ShowHint/HideHint).
    #[serde(rename = "register_surface")]
    RegisterSurface,
}

/// Serialize a message as a JSON line (with trailing newline).
pub fn encode(msg: &impl Serialize) -> String {
    let mut s = serde_json::to_string(msg).expect("serialize IPC message");
    s.push('\n');
    s
}

/// Deserialize a JSON line. Returns None on empty/whitespace input.
pub fn decode_daemon(line: &str) -> Option<DaemonMsg> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}

pub fn decode_client(line: &str) -> Option<ClientMsg> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_produces_single_trailing_newline() {
        let msg = DaemonMsg::ShowHint {
            id: 1,
            content: RenderedBlock::new("<table>\n</table>"),
            background: "#000".into(),
            anchor: Anchor::new(1, 2),
            position: Position::Above,
            fade_ms: 0,
        };
        let encoded = encode(&msg);
        assert!(encoded.ends_with('\n'));
        assert_eq!(encoded.matches('\n').count(), 1);
    }

    #[test]
    fn show_hint_carries_content_as_plain_string() {
        let msg = DaemonMsg::ShowHint {
            id: 7,
            content: RenderedBlock::new("<b>x</b>"),
            background: "#282828".into(),
            anchor: Anchor::new(3, 4),
            position: Position::Below,
            fade_ms: 1000,
        };
        let encoded = encode(&msg);
        assert!(encoded.contains(r#""type":"show_hint""#));
        assert!(encoded.contains(r#""content":"<b>x</b>""#));
        assert!(encoded.contains(r#""position":"below""#));
    }

    #[test]
    fn request_popup_decodes_with_defaults() {
        let line = r#"{"type":"request_popup","typed":["g"],"mappings":[{"key":"g","description":"top"}]}"#;
        match decode_client(line).expect("should decode") {
            ClientMsg::RequestPopup {
                anchor,
                typed,
                mappings,
                elapsed_ms,
            } => {
                assert_eq!(anchor, Anchor::default());
                assert_eq!(typed, vec![KeyStroke::new("g")]);
                assert_eq!(mappings, vec![MappingEntry::new("g", "top")]);
                assert_eq!(elapsed_ms, 0);
            }
            other => panic!("expected RequestPopup, got {:?}", other),
        }
    }

    #[test]
    fn hide_hint_decodes() {
        let decoded = decode_daemon(&encode(&DaemonMsg::HideHint { id: 9 })).expect("should decode");
        assert!(matches!(decoded, DaemonMsg::HideHint { id: 9 }));
    }

    #[test]
    fn simple_client_variants_decode() {
        for line in [
            r#"{"type":"dismiss"}"#,
            r#"{"type":"get_status"}"#,
            r#"{"type":"register_surface"}"#,
            r#"{"type":"set_option","name":"timeoutlen","value":"500"}"#,
        ] {
            assert!(decode_client(line).is_some(), "failed to decode: {}", line);
        }
    }

    #[test]
    fn decode_returns_none_for_empty_or_garbage() {
        assert!(decode_daemon("").is_none());
        assert!(decode_daemon("  \n").is_none());
        assert!(decode_daemon("{\"type\":\"unknown_variant\"}").is_none());
        assert!(decode_client("not json").is_none());
        assert!(decode_client("\n").is_none());
    }
}
