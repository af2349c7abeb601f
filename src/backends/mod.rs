pub mod openai_compatible;

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(feature = "huggingface")]
pub mod huggingface;

#[cfg(feature = "groq")]
pub mod groq;
