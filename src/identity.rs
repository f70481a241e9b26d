use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

/// Opaque identity token for a live instance.
///
/// Tokens are minted from a forward-only counter, so no two instances ever
/// share one, live or dead. Structural equality of instances is irrelevant:
/// two equal values still get distinct tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity map assigning a distinct [`InstanceId`] per live instance.
///
/// Entries key on the allocation address and hold a weak reference, so the
/// map never extends an instance's lifetime. A stale entry whose instance
/// has been dropped never matches a new allocation at the same address: the
/// weak guard is dead, and a fresh token is minted instead.
#[derive(Default)]
pub struct IdentityMap {
    next: u64,
    entries: HashMap<usize, Entry>,
}

struct Entry {
    object: Weak<dyn Any>,
    id: InstanceId,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token for `object`, minting one on first sight.
    pub fn token_for(&mut self, object: &Rc<dyn Any>) -> InstanceId {
        let addr = Self::addr(object);
        if let Some(entry) = self.entries.get(&addr) {
            if entry.object.strong_count() > 0 {
                return entry.id;
            }
        }
        self.next += 1;
        let id = InstanceId(self.next);
        self.entries.insert(
            addr,
            Entry {
                object: Rc::downgrade(object),
                id,
            },
        );
        id
    }

    /// Token for `object` if one was minted and the instance is still live.
    /// Never mints.
    pub fn lookup(&self, object: &Rc<dyn Any>) -> Option<InstanceId> {
        self.entries
            .get(&Self::addr(object))
            .filter(|entry| entry.object.strong_count() > 0)
            .map(|entry| entry.id)
    }

    /// Drop entries whose instance has been freed.
    pub fn sweep(&mut self) {
        self.entries
            .retain(|_, entry| entry.object.strong_count() > 0);
    }

    fn addr(object: &Rc<dyn Any>) -> usize {
        Rc::as_ptr(object) as *const () as usize
    }
}
