// src/services/mod.rs
pub mod openai_compat;
pub mod provider;
pub mod relay;
pub mod sse;
