//! Drover drives browser-based computer-use agents against sandboxed web
//! environments: a provider-agnostic sampling loop over an Anthropic-style
//! canonical conversation, with adapters for Anthropic-native and
//! OpenAI-compatible wire formats, bounded retry, and screenshot retention
//! under provider image caps.
pub mod agent;
pub mod errors;
pub mod models;
pub mod providers;
pub mod retention;
pub mod retry;
pub mod tools;
