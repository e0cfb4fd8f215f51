//! Directory of live actors, keyed by address

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use tracing::debug;

use crate::address::Address;
use crate::error::{MeshError, MeshResult};
use crate::mailbox::MailboxSender;

/// Address -> mailbox lookup for every started, not yet stopped actor
#[derive(Default)]
pub struct Directory {
    entries: RwLock<HashMap<Address, MailboxSender>>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a live actor's mailbox
    pub fn register(&self, sender: MailboxSender) -> MeshResult<()> {
        let address = sender.owner().clone();
        debug!(%address, "Directory::register: called");
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.contains_key(&address) {
            debug!(%address, "Directory::register: address in use");
            return Err(MeshError::AddressInUse(address));
        }
        entries.insert(address, sender);
        Ok(())
    }

    /// Remove an actor's entry, but only if it still points at this mailbox
    pub fn deregister(&self, sender: &MailboxSender) -> bool {
        debug!(address = %sender.owner(), "Directory::deregister: called");
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match entries.get(sender.owner()) {
            Some(current) if current.same_mailbox(sender) => {
                entries.remove(sender.owner());
                true
            }
            _ => false,
        }
    }

    /// Find the live mailbox for an address
    pub fn lookup(&self, address: &Address) -> Option<MailboxSender> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(address).cloned()
    }

    /// Addresses of all live actors, sorted
    pub fn addresses(&self) -> Vec<Address> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut addresses: Vec<Address> = entries.keys().cloned().collect();
        addresses.sort();
        addresses
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
