pub mod chat_bot;
pub mod feed;
pub mod messaging;

pub use chat_bot::{
    BotApiEnvelope, Chat, GetUpdatesRequest, KeyboardButton, Location, Message,
    ReplyKeyboardMarkup, SendMessageRequest, Update,
};
pub use feed::{AutoGempaResponse, Gempa, InfoGempa};
pub use messaging::GatewayMessage;
