pub mod context;
pub mod events;
pub mod llm;
pub mod orchestrator;
