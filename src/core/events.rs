use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One discrete message pushed to the client over the chat SSE channel.
/// Events are delivered in strict emission order; clients ignore tags they
/// do not recognize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Thinking { content: String },
    ToolStart { tool: String, args: Value },
    ToolResult { tool: String, data: Value, success: bool },
    Text { content: String },
    Error { message: String },
}

/// Per-request event channel. Sending returns false once the client has
/// disconnected, which the orchestrator treats as a stop signal.
#[derive(Clone)]
pub struct EventSink {
    tx: tokio::sync::mpsc::Sender<StreamEvent>,
}

impl EventSink {
    pub fn new(tx: tokio::sync::mpsc::Sender<StreamEvent>) -> Self {
        Self { tx }
    }

    pub async fn emit(&self, event: StreamEvent) -> bool {
        self.tx.send(event).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn events_serialize_with_snake_case_tags() {
        let evt = StreamEvent::ToolStart {
            tool: "get_today_snapshot".to_string(),
            args: json!({}),
        };
        let v = serde_json::to_value(&evt).unwrap();
        assert_eq!(v["type"], "tool_start");
        assert_eq!(v["tool"], "get_today_snapshot");

        let evt = StreamEvent::ToolResult {
            tool: "get_revenue".to_string(),
            data: json!({ "total": 1200.0 }),
            success: true,
        };
        let v = serde_json::to_value(&evt).unwrap();
        assert_eq!(v["type"], "tool_result");
        assert_eq!(v["success"], true);
        assert_eq!(v["data"]["total"], 1200.0);
    }

    #[test]
    fn events_roundtrip_through_json() {
        let original = StreamEvent::Error {
            message: "tool loop exceeded".to_string(),
        };
        let text = serde_json::to_string(&original).unwrap();
        let parsed: StreamEvent = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, original);
    }

    #[tokio::test]
    async fn sink_reports_disconnect() {
        let (tx, rx) = tokio::sync::mpsc::channel(4);
        let sink = EventSink::new(tx);
        assert!(
            sink.emit(StreamEvent::Text {
                content: "hi".to_string()
            })
            .await
        );
        drop(rx);
        assert!(
            !sink
                .emit(StreamEvent::Text {
                    content: "gone".to_string()
                })
                .await
        );
    }
}
