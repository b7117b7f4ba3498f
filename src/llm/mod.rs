pub mod conversation;
pub mod gateway;
pub mod gateways;
pub mod models;
pub mod provider;

pub use conversation::Conversation;
pub use gateway::{ChatGateway, TextStream};
pub use models::{ChatMessage, MessageRole};
pub use provider::Provider;
