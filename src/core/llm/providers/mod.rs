mod gemini;

pub use gemini::GeminiProvider;
