//! Contract types shared between the storefront engine, the messaging
//! gateway and the admin panel: monetary amounts, catalog entries and the
//! declarative reply payload the gateway renders.

pub mod amount;
pub mod catalog;
pub mod reply;

pub use amount::Amount;
pub use catalog::Service;
pub use reply::{Button, ButtonStyle, Reply, SelectMenu, SelectOption};

/// Discord snowflake of a user.
pub type UserId = u64;

/// Discord snowflake of a ticket channel.
pub type ChannelId = u64;
