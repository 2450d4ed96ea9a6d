pub mod openai_compat;
pub mod traits;

// Re-exports for convenience.
pub use openai_compat::OpenAiCompatProvider;
pub use traits::CompletionProvider;
