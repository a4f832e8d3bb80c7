//! Downstream consumers of the realtime event bus. Each runs on its own
//! subscription, so neither can hold the other back.

pub mod conversations;
pub mod messages;

pub use conversations::{ConversationAggregator, conversation_key, preview};
pub use messages::MessageStoreAdapter;
