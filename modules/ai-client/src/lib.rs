pub mod claude;
pub mod error;
pub mod openrouter;
pub mod provider;
pub mod util;

pub use claude::Claude;
pub use error::AiError;
pub use openrouter::OpenRouter;
pub use provider::{model_supports_vision, ChatInput, ChatProvider, Completion, ContentPart};
pub use util::truncate_to_char_boundary;
