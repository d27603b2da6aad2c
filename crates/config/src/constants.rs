//! Default endpoints, models and limits
//!
//! Single source of truth for values that otherwise end up duplicated
//! between settings defaults, the backend factory and tests.

/// Backend endpoints
pub mod endpoints {
    /// Local Ollama server
    pub const OLLAMA_DEFAULT: &str = "http://localhost:11434";

    /// Groq OpenAI-compatible API
    pub const GROQ_DEFAULT: &str = "https://api.groq.com/openai/v1";

    /// OpenAI API
    pub const OPENAI_DEFAULT: &str = "https://api.openai.com/v1";
}

/// Default model identifiers per provider
pub mod models {
    pub const OLLAMA_EXTRACTION: &str = "llama3.2";
    pub const OLLAMA_VALIDATION: &str = "llama3.2";
    pub const GROQ: &str = "llama-3.1-8b-instant";
    pub const OPENAI: &str = "gpt-4o-mini";
}

/// Environment variables holding provider credentials
pub mod credentials {
    pub const GROQ_API_KEY: &str = "GROQ_API_KEY";
    pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
}

/// Generation defaults
pub mod generation {
    /// Low temperature for structured outputs
    pub const TEMPERATURE: f32 = 0.1;
    pub const MAX_TOKENS: u32 = 500;
    pub const TIMEOUT_SECS: u64 = 30;
}

/// Provider names accepted by the backend factory
pub const SUPPORTED_PROVIDERS: &[&str] = &["ollama", "local", "groq", "openai"];
