//! ChatBotRegistrar processor.
//!
//! Long-polls the chat bot for incoming messages. A shared location
//! subscribes the chat (or moves an existing subscription) to alerts for
//! that place; anything else is answered with a keyboard offering a
//! location button.

use super::device_registrar::RegistrationError;
use crate::collaborators::{ChatBotInbox, RecipientRegistry};
use crate::config::ChatRegistrationSettings;
use crate::geo::Coordinate;
use quakewatch_sdk::objects::{KeyboardButton, Message, ReplyKeyboardMarkup, SendMessageRequest};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const SHARE_LOCATION_BUTTON: &str = "Share location";
pub const HELP_BUTTON: &str = "Help";

const SAVED_REPLY: &str =
    "Your location has been saved. You will be alerted about earthquakes felt around it.";
const FAILED_REPLY: &str = "Your location could not be saved. Please try again later.";
const HELP_REPLY: &str =
    "Press 'Share location' to receive alerts for earthquakes felt where you are.";
const MENU_REPLY: &str = "Share your location or choose an option below:";

/// Time allowed on top of the long-poll wait before a poll is abandoned.
const POLL_GRACE: Duration = Duration::from_secs(10);

/// What was done with one incoming message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatAction {
    Registered,
    RegistrationFailed,
    Help,
    Menu,
}

fn menu_keyboard() -> ReplyKeyboardMarkup {
    ReplyKeyboardMarkup {
        keyboard: vec![
            vec![KeyboardButton {
                text: SHARE_LOCATION_BUTTON.to_string(),
                request_location: true,
            }],
            vec![KeyboardButton {
                text: HELP_BUTTON.to_string(),
                request_location: false,
            }],
        ],
        resize_keyboard: true,
    }
}

/// Subscribes chat-bot users who share their location.
#[derive(Clone)]
pub struct ChatBotRegistrar {
    inbox: Arc<dyn ChatBotInbox>,
    registry: Arc<dyn RecipientRegistry>,
    settings: ChatRegistrationSettings,
}

impl ChatBotRegistrar {
    pub fn new(
        inbox: Arc<dyn ChatBotInbox>,
        registry: Arc<dyn RecipientRegistry>,
        settings: ChatRegistrationSettings,
    ) -> Self {
        Self {
            inbox,
            registry,
            settings,
        }
    }

    /// Act on one message and reply to its chat.
    ///
    /// A failed reply is logged; it does not undo a registration.
    pub async fn handle_message(&self, message: &Message) -> ChatAction {
        let chat_id = message.chat.id;

        let action = match message.location {
            Some(shared) => match Coordinate::new(shared.latitude, shared.longitude) {
                Some(location) => match self.registry.register_chat_user(chat_id, location).await {
                    Ok(()) => {
                        info!(chat_id, %location, "Chat-bot user registered");
                        ChatAction::Registered
                    }
                    Err(e) => {
                        warn!(chat_id, error = %e, "Failed to store chat-bot user");
                        ChatAction::RegistrationFailed
                    }
                },
                None => {
                    warn!(
                        chat_id,
                        latitude = shared.latitude,
                        longitude = shared.longitude,
                        "Shared location is out of range"
                    );
                    ChatAction::RegistrationFailed
                }
            },
            None if message.text.as_deref().map(str::trim) == Some(HELP_BUTTON) => ChatAction::Help,
            None => ChatAction::Menu,
        };

        let (text, reply_markup) = match action {
            ChatAction::Registered => (SAVED_REPLY, None),
            ChatAction::RegistrationFailed => (FAILED_REPLY, None),
            ChatAction::Help => (HELP_REPLY, Some(menu_keyboard())),
            ChatAction::Menu => (MENU_REPLY, Some(menu_keyboard())),
        };
        let reply = SendMessageRequest {
            chat_id,
            text: text.to_string(),
            reply_markup,
        };
        if let Err(e) = self.inbox.reply(&reply).await {
            warn!(chat_id, error = %e, "Failed to reply to chat-bot message");
        }

        action
    }

    /// Poll once, handle every message received, and return the offset
    /// for the next poll.
    pub async fn poll_once(&self, offset: Option<i64>) -> Result<Option<i64>, RegistrationError> {
        let wait = self.settings.poll_timeout;
        let bound = wait + POLL_GRACE;
        let updates = tokio::time::timeout(bound, self.inbox.poll(offset, wait))
            .await
            .map_err(|_| RegistrationError::PollTimeout(bound))??;

        let mut next = offset;
        for update in updates {
            let after = update.update_id + 1;
            next = Some(next.map_or(after, |n| n.max(after)));
            match &update.message {
                Some(message) => {
                    let action = self.handle_message(message).await;
                    debug!(update_id = update.update_id, ?action, "Handled chat-bot message");
                }
                None => debug!(update_id = update.update_id, "Ignoring non-message update"),
            }
        }
        Ok(next)
    }

    /// Spawn the polling loop.
    pub fn start(self, mut shutdown_rx: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("ChatBotRegistrar started");
            let mut offset = None;
            loop {
                tokio::select! {
                    biased;

                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            info!("ChatBotRegistrar received shutdown signal");
                            break;
                        }
                    }

                    polled = self.poll_once(offset) => {
                        match polled {
                            Ok(next) => offset = next,
                            Err(e) => {
                                warn!(error = %e, "Chat-bot poll failed");
                                tokio::select! {
                                    biased;
                                    _ = shutdown_rx.changed() => break,
                                    _ = tokio::time::sleep(self.settings.retry_delay) => {}
                                }
                            }
                        }
                    }
                }
            }
            info!("ChatBotRegistrar shutdown complete");
        })
    }
}
