//! Boundaries to the systems the service depends on but does not own:
//! the upstream feed, the recipient directory and registry, the event
//! store, and the chat-bot inbox.
//!
//! Each boundary is a trait so the worker and notifier can be exercised
//! without a network or database; the production implementations talk to
//! the upstream HTTP endpoint and Postgres.

pub mod chat_inbox;
pub mod directory;
pub mod feed;
pub mod store;

pub use chat_inbox::ChatBotInbox;
pub use directory::{DirectoryError, PgDirectory, RecipientDirectory, RecipientRegistry};
pub use feed::{BmkgFeed, EarthquakeFeed, FeedError};
pub use store::{EventStore, PgEventStore, StoreError};
