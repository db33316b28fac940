pub mod compose;
pub mod emotion;
pub mod sanitize;
pub mod selection;
pub mod template;
pub mod upstream;
pub mod username;

pub use compose::compose_prompt;
pub use emotion::Emotion;
pub use upstream::{parse_upstream_message, PromptDetails, PromptSource, UpstreamMessage};
pub use username::parse_username;
