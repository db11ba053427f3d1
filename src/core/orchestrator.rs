use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::core::context::ContextBuilder;
use crate::core::events::{EventSink, StreamEvent};
use crate::core::llm::{ChatMessage, ModelProvider};
use crate::tools::ToolExecutor;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Maximum tool-call rounds per request. The model is otherwise free to
    /// request tools forever; exceeding the cap terminates with an error
    /// event.
    pub max_tool_rounds: usize,
    /// Pacing delay between text chunks. Zero disables pacing (tests).
    pub text_chunk_delay: Duration,
    /// Words per text chunk.
    pub words_per_chunk: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: 5,
            text_chunk_delay: Duration::from_millis(25),
            words_per_chunk: 1,
        }
    }
}

fn build_system_prompt(context: &str) -> String {
    let mut prompt = String::from(
        "You are the AI concierge of a hotel management platform, assisting staff \
         with bookings, guests, rooms, and revenue.\n\n\
         RULES:\n\
         1. When a question needs live data, call one of the available tools. \
            Never invent numbers.\n\
         2. Only call tools from the catalog you were given.\n\
         3. If a tool fails, explain the failure briefly or try a different tool; \
            do not repeat the same failing call.\n\
         4. For pure knowledge questions, answer directly without tools.\n\
         5. Be concise. Answer the question, present the result, done.\n",
    );
    if !context.is_empty() {
        prompt.push('\n');
        prompt.push_str(context);
    }
    prompt
}

/// Splits text into chunks of `words_per_chunk` words, preserving original
/// whitespace so concatenating all chunks reproduces the input exactly.
pub fn chunk_text(text: &str, words_per_chunk: usize) -> Vec<String> {
    let per_chunk = words_per_chunk.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut words_in_current = 0;
    let mut in_word = false;

    for ch in text.chars() {
        if ch.is_whitespace() {
            if in_word {
                in_word = false;
                words_in_current += 1;
            }
            current.push(ch);
            if words_in_current >= per_chunk {
                chunks.push(std::mem::take(&mut current));
                words_in_current = 0;
            }
        } else {
            in_word = true;
            current.push(ch);
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Drives one chat request: model round-trips, sequential tool execution,
/// and the event stream, ending in streamed text, an error event, or client
/// disconnect. The caller observes stream closure when this future returns
/// and the sink is dropped.
pub struct Orchestrator {
    provider: Arc<dyn ModelProvider>,
    tools: Arc<ToolExecutor>,
    context: ContextBuilder,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        tools: Arc<ToolExecutor>,
        context: ContextBuilder,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            provider,
            tools,
            context,
            config,
        }
    }

    pub fn tools(&self) -> &ToolExecutor {
        &self.tools
    }

    pub fn context(&self) -> &ContextBuilder {
        &self.context
    }

    pub async fn run(&self, history: Vec<ChatMessage>, sink: EventSink) {
        // Ambient grounding is a nicety: if the snapshot cannot be computed,
        // the conversation proceeds without it.
        let context = match self.context.build().await {
            Ok(snapshot) => snapshot.to_prompt(),
            Err(e) => {
                warn!("Context snapshot unavailable, proceeding without: {}", e);
                String::new()
            }
        };

        let mut messages = vec![ChatMessage::system(build_system_prompt(&context))];
        messages.extend(history);

        let catalog = self.tools.registry().declarations();
        let mut rounds = 0usize;

        loop {
            let turn = match self.provider.send_turn(&messages, catalog).await {
                Ok(turn) => turn,
                Err(e) => {
                    warn!("Model provider failure: {}", e);
                    sink.emit(StreamEvent::Error {
                        message: format!("Model provider error: {}", e),
                    })
                    .await;
                    return;
                }
            };

            if turn.tool_calls.is_empty() {
                if !sink
                    .emit(StreamEvent::Thinking {
                        content: "Putting the answer together".to_string(),
                    })
                    .await
                {
                    return;
                }
                self.stream_text(&turn.text, &sink).await;
                return;
            }

            rounds += 1;
            if rounds > self.config.max_tool_rounds {
                warn!(
                    "Tool loop exceeded {} rounds, terminating request",
                    self.config.max_tool_rounds
                );
                sink.emit(StreamEvent::Error {
                    message: format!(
                        "tool loop exceeded ({} rounds)",
                        self.config.max_tool_rounds
                    ),
                })
                .await;
                return;
            }

            let thinking = if turn.text.trim().is_empty() {
                "Checking the hotel records".to_string()
            } else {
                turn.text.trim().to_string()
            };
            if !sink.emit(StreamEvent::Thinking { content: thinking }).await {
                return;
            }

            // Execute in the order received; tool_start goes out before the
            // call runs so the client can render progress with zero latency.
            let mut results = Vec::with_capacity(turn.tool_calls.len());
            for call in &turn.tool_calls {
                info!("Invoking tool {} (round {})", call.name, rounds);
                if !sink
                    .emit(StreamEvent::ToolStart {
                        tool: call.name.clone(),
                        args: call.arguments.clone(),
                    })
                    .await
                {
                    return;
                }

                let result = self.tools.execute(&call.name, &call.arguments).await;
                let data = result
                    .data
                    .clone()
                    .unwrap_or_else(|| json!({ "error": result.error }));
                if !sink
                    .emit(StreamEvent::ToolResult {
                        tool: result.name.clone(),
                        data,
                        success: result.success,
                    })
                    .await
                {
                    return;
                }
                results.push(result);
            }

            // The model always gets a result object per call, even for
            // failures, so the conversation can self-correct.
            messages.push(ChatMessage::tool_request(turn.text, turn.tool_calls));
            messages.push(ChatMessage::tool_results(results));
        }
    }

    async fn stream_text(&self, text: &str, sink: &EventSink) {
        let text = if text.trim().is_empty() {
            "I don't have an answer for that."
        } else {
            text
        };
        for chunk in chunk_text(text, self.config.words_per_chunk) {
            if !sink.emit(StreamEvent::Text { content: chunk }).await {
                return;
            }
            if !self.config.text_chunk_delay.is_zero() {
                tokio::time::sleep(self.config.text_chunk_delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::llm::{ModelTurn, ToolCallRequest};
    use crate::store::{HotelStore, InMemoryStore};
    use crate::tools::{ToolDeclaration, ToolHandler, ToolRegistry};
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use tokio::sync::Mutex;
    use tokio::sync::mpsc;

    struct ScriptedProvider {
        turns: Mutex<VecDeque<Result<ModelTurn>>>,
    }

    impl ScriptedProvider {
        fn new(turns: Vec<Result<ModelTurn>>) -> Self {
            Self {
                turns: Mutex::new(turns.into()),
            }
        }
    }

    #[async_trait]
    impl ModelProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }
        async fn send_turn(
            &self,
            _messages: &[ChatMessage],
            _tools: &[ToolDeclaration],
        ) -> Result<ModelTurn> {
            self.turns
                .lock()
                .await
                .pop_front()
                .unwrap_or_else(|| Err(anyhow!("script exhausted")))
        }
    }

    /// A misbehaving model that requests the same tool forever.
    struct LoopingProvider;

    #[async_trait]
    impl ModelProvider for LoopingProvider {
        fn name(&self) -> &str {
            "looping"
        }
        async fn send_turn(
            &self,
            _messages: &[ChatMessage],
            _tools: &[ToolDeclaration],
        ) -> Result<ModelTurn> {
            Ok(ModelTurn::tool_calls(vec![ToolCallRequest {
                name: "snapshot".to_string(),
                arguments: json!({}),
            }]))
        }
    }

    struct SnapshotHandler;

    #[async_trait]
    impl ToolHandler for SnapshotHandler {
        async fn run(&self, _args: &Value) -> Result<Value> {
            Ok(json!({ "arrivals": 5 }))
        }
    }

    fn test_tools() -> Arc<ToolExecutor> {
        let registry = ToolRegistry::new(vec![ToolDeclaration::new(
            "snapshot",
            "today's arrivals",
            json!({ "type": "object" }),
        )]);
        let mut executor = ToolExecutor::new(registry);
        executor.register("snapshot", Arc::new(SnapshotHandler));
        executor.verify().unwrap();
        Arc::new(executor)
    }

    fn test_context() -> ContextBuilder {
        ContextBuilder::new(Arc::new(InMemoryStore::empty()) as Arc<dyn HotelStore>)
    }

    fn test_config() -> OrchestratorConfig {
        OrchestratorConfig {
            max_tool_rounds: 5,
            text_chunk_delay: Duration::ZERO,
            words_per_chunk: 1,
        }
    }

    async fn collect_events(
        provider: Arc<dyn ModelProvider>,
        config: OrchestratorConfig,
    ) -> Vec<StreamEvent> {
        let orchestrator = Orchestrator::new(provider, test_tools(), test_context(), config);
        let (tx, mut rx) = mpsc::channel(64);
        let history = vec![ChatMessage::user("How many arrivals today?")];
        let run = orchestrator.run(history, EventSink::new(tx));
        let gather = async {
            let mut events = Vec::new();
            while let Some(evt) = rx.recv().await {
                events.push(evt);
            }
            events
        };
        let ((), events) = tokio::join!(run, gather);
        events
    }

    fn concat_text(events: &[StreamEvent]) -> String {
        events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Text { content } => Some(content.as_str()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn tool_round_then_text_produces_expected_sequence() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(ModelTurn::tool_calls(vec![ToolCallRequest {
                name: "snapshot".to_string(),
                arguments: json!({}),
            }])),
            Ok(ModelTurn::text("There are 5 arrivals today.")),
        ]));
        let events = collect_events(provider, test_config()).await;

        assert!(matches!(events[0], StreamEvent::Thinking { .. }));
        assert!(
            matches!(&events[1], StreamEvent::ToolStart { tool, .. } if tool == "snapshot")
        );
        match &events[2] {
            StreamEvent::ToolResult {
                tool,
                data,
                success,
            } => {
                assert_eq!(tool, "snapshot");
                assert!(*success);
                assert_eq!(data["arrivals"], 5);
            }
            other => panic!("expected tool_result, got {:?}", other),
        }
        assert!(matches!(events[3], StreamEvent::Thinking { .. }));
        assert!(concat_text(&events).contains('5'));
        assert!(!events.iter().any(|e| matches!(e, StreamEvent::Error { .. })));
    }

    #[tokio::test]
    async fn unknown_tool_yields_failed_result_and_conversation_continues() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(ModelTurn::tool_calls(vec![ToolCallRequest {
                name: "read_minds".to_string(),
                arguments: json!({}),
            }])),
            Ok(ModelTurn::text("I cannot do that, sorry.")),
        ]));
        let events = collect_events(provider, test_config()).await;

        let failed = events
            .iter()
            .find_map(|e| match e {
                StreamEvent::ToolResult { success, data, .. } => Some((*success, data.clone())),
                _ => None,
            })
            .expect("tool_result emitted for unknown tool");
        assert!(!failed.0);
        assert!(failed.1["error"].as_str().unwrap().contains("Unknown tool"));

        assert!(!events.iter().any(|e| matches!(e, StreamEvent::Error { .. })));
        assert!(concat_text(&events).contains("sorry"));
    }

    #[tokio::test]
    async fn loop_cap_terminates_with_error_event() {
        let mut config = test_config();
        config.max_tool_rounds = 3;
        let events = collect_events(Arc::new(LoopingProvider), config).await;

        let starts = events
            .iter()
            .filter(|e| matches!(e, StreamEvent::ToolStart { .. }))
            .count();
        assert_eq!(starts, 3);

        match events.last().unwrap() {
            StreamEvent::Error { message } => assert!(message.contains("tool loop exceeded")),
            other => panic!("expected terminal error event, got {:?}", other),
        }
        assert!(!events.iter().any(|e| matches!(e, StreamEvent::Text { .. })));
    }

    #[tokio::test]
    async fn provider_failure_emits_single_error_and_closes() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(anyhow!(
            "quota exhausted"
        ))]));
        let events = collect_events(provider, test_config()).await;

        assert_eq!(events.len(), 1);
        match &events[0] {
            StreamEvent::Error { message } => assert!(message.contains("quota exhausted")),
            other => panic!("expected error event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn every_tool_start_precedes_its_result() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(ModelTurn::tool_calls(vec![
                ToolCallRequest {
                    name: "snapshot".to_string(),
                    arguments: json!({ "n": 1 }),
                },
                ToolCallRequest {
                    name: "snapshot".to_string(),
                    arguments: json!({ "n": 2 }),
                },
            ])),
            Ok(ModelTurn::text("done")),
        ]));
        let events = collect_events(provider, test_config()).await;

        let mut open = 0i32;
        for evt in &events {
            match evt {
                StreamEvent::ToolStart { .. } => open += 1,
                StreamEvent::ToolResult { .. } => {
                    assert!(open > 0, "tool_result before its tool_start");
                    open -= 1;
                }
                _ => {}
            }
        }
        assert_eq!(open, 0);
    }

    #[tokio::test]
    async fn context_failure_degrades_gracefully() {
        struct NoStore;
        #[async_trait]
        impl HotelStore for NoStore {
            async fn ping(&self) -> Result<()> {
                Err(anyhow!("down"))
            }
            async fn all_bookings(&self) -> Result<Vec<crate::store::Booking>> {
                Err(anyhow!("down"))
            }
            async fn bookings_between(
                &self,
                _s: chrono::NaiveDate,
                _e: chrono::NaiveDate,
            ) -> Result<Vec<crate::store::Booking>> {
                Err(anyhow!("down"))
            }
            async fn room_counts(&self) -> Result<std::collections::HashMap<String, u32>> {
                Err(anyhow!("down"))
            }
            async fn update_booking_status(
                &self,
                _id: &str,
                _st: crate::store::BookingStatus,
            ) -> Result<crate::store::Booking> {
                Err(anyhow!("down"))
            }
        }

        let provider = Arc::new(ScriptedProvider::new(vec![Ok(ModelTurn::text(
            "Hello there.",
        ))]));
        let orchestrator = Orchestrator::new(
            provider,
            test_tools(),
            ContextBuilder::new(Arc::new(NoStore)),
            test_config(),
        );
        let (tx, mut rx) = mpsc::channel(16);
        let run = orchestrator.run(vec![ChatMessage::user("hi")], EventSink::new(tx));
        let gather = async {
            let mut events = Vec::new();
            while let Some(evt) = rx.recv().await {
                events.push(evt);
            }
            events
        };
        let ((), events) = tokio::join!(run, gather);

        assert!(concat_text(&events).contains("Hello"));
        assert!(!events.iter().any(|e| matches!(e, StreamEvent::Error { .. })));
    }

    #[tokio::test]
    async fn client_disconnect_stops_event_production() {
        let orchestrator = Orchestrator::new(
            Arc::new(LoopingProvider),
            test_tools(),
            test_context(),
            test_config(),
        );
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        // Must return promptly instead of looping through tool rounds for a
        // client that is gone.
        orchestrator
            .run(vec![ChatMessage::user("hi")], EventSink::new(tx))
            .await;
    }

    #[test]
    fn chunk_concatenation_reproduces_input() {
        let text = "There are  5 arrivals\ntoday, and 3 departures.";
        for per_chunk in 1..=4 {
            let chunks = chunk_text(text, per_chunk);
            assert!(chunks.iter().all(|c| !c.is_empty()));
            assert_eq!(chunks.concat(), text);
        }
    }

    #[test]
    fn chunking_respects_word_count() {
        let chunks = chunk_text("one two three four five", 2);
        assert_eq!(chunks, vec!["one two ", "three four ", "five"]);
    }

    #[test]
    fn system_prompt_embeds_context() {
        let prompt = build_system_prompt("CURRENT HOTEL STATE:\n- Arrivals today: 2\n");
        assert!(prompt.contains("AI concierge"));
        assert!(prompt.contains("Arrivals today: 2"));
        let bare = build_system_prompt("");
        assert!(!bare.contains("CURRENT HOTEL STATE"));
    }
}
