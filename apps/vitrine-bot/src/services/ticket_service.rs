use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use vitrine_shared::{ChannelId, UserId};

/// Registry of open tickets: at most one channel per user.
#[derive(Clone, Default)]
pub struct TicketService {
    open: Arc<Mutex<HashMap<UserId, ChannelId>>>,
}

impl TicketService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a ticket for the user. Returns the already-open channel
    /// if one exists, leaving the registry untouched.
    pub fn open(&self, user_id: UserId, channel_id: ChannelId) -> Result<(), ChannelId> {
        let mut open = self.open.lock().expect("ticket lock poisoned");
        match open.get(&user_id) {
            Some(existing) => Err(*existing),
            None => {
                open.insert(user_id, channel_id);
                Ok(())
            }
        }
    }

    pub fn channel(&self, user_id: UserId) -> Option<ChannelId> {
        self.open.lock().expect("ticket lock poisoned").get(&user_id).copied()
    }

    pub fn close(&self, user_id: UserId) -> Option<ChannelId> {
        self.open.lock().expect("ticket lock poisoned").remove(&user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_ticket_per_user() {
        let tickets = TicketService::new();
        assert!(tickets.open(1, 100).is_ok());
        assert_eq!(tickets.open(1, 200), Err(100));
        assert_eq!(tickets.channel(1), Some(100));
    }

    #[test]
    fn close_frees_the_slot() {
        let tickets = TicketService::new();
        tickets.open(1, 100).unwrap();
        assert_eq!(tickets.close(1), Some(100));
        assert!(tickets.open(1, 200).is_ok());
    }
}
