use parking_lot::Mutex;
use shortly_core::error::Result;
use shortly_core::{Storage, UserId};

/// Hands out strictly increasing user ids.
///
/// Seeded once from the highest id already stored so new users never reuse
/// an owner id. The counter has its own lock, independent of storage.
#[derive(Debug, Default)]
pub struct UserIdAllocator {
    last: Mutex<UserId>,
}

impl UserIdAllocator {
    /// Creates an allocator whose first id is `last_id + 1`.
    pub fn new(last_id: UserId) -> Self {
        Self {
            last: Mutex::new(last_id.max(0)),
        }
    }

    /// Creates an allocator seeded from `storage`.
    pub async fn from_storage<S: Storage + ?Sized>(storage: &S) -> Result<Self> {
        Ok(Self::new(storage.get_max_user_id().await?))
    }

    pub fn next_id(&self) -> UserId {
        let mut last = self.last.lock();
        *last += 1;
        *last
    }

    /// The most recently issued id, or the seed if none was issued yet.
    pub fn last_id(&self) -> UserId {
        *self.last.lock()
    }
}
