pub mod hub;
pub mod messages;
pub mod ws;

pub use hub::{ChannelId, Hub, Subscription};
pub use messages::{MessageType, WsMessage, WsMessageMeta};
