//! Messaging-app gateway payloads.

use serde::{Deserialize, Serialize};

/// Body posted to the messaging gateway.
///
/// `target` is the opaque recipient identifier, usually a phone number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayMessage {
    pub target: String,
    pub message: String,
}
