//! Authenticated owner context.

use serde::{Deserialize, Serialize};

use crate::ResourceId;

/// The authenticated account on whose behalf an operation runs.
///
/// Every engine operation takes this explicitly; there is no ambient session
/// state. How the account was authenticated is the caller's concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerContext {
    pub account: ResourceId,
}

impl OwnerContext {
    pub fn new(account: ResourceId) -> Self {
        Self { account }
    }

    /// Whether this context may act on a job owned by `owner`.
    pub fn owns(&self, owner: ResourceId) -> bool {
        self.account == owner
    }
}
