//! These models represent the objects passed around by the sampling loop
//!
//! There are several related formats we need to interact with:
//! - the Anthropic messages wire format, sent to native/Bedrock/Vertex endpoints
//! - the OpenAI chat-completions wire format, sent to OpenAI-compatible endpoints
//! - tool invocations and results, exchanged with the tool collection
//!
//! These overlap but match none of the wire formats exactly. Provider adapters
//! convert to and from them at the edges; everything in between operates on
//! the canonical types defined here.
pub mod content;
pub mod message;
pub mod role;
pub mod tool;
