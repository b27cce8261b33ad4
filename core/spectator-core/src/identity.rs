//! Identity resolution seam.

use std::collections::HashMap;

use async_trait::async_trait;
use spectator_protocol::UserId;

use crate::types::UserProfile;

/// Asynchronous user lookup. `None` means the user does not exist; the
/// synchronizer never retries.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, user_id: UserId) -> Option<UserProfile>;
}

/// Resolver backed by a fixed profile directory.
#[derive(Debug, Default, Clone)]
pub struct StaticIdentityResolver {
    profiles: HashMap<UserId, UserProfile>,
}

impl StaticIdentityResolver {
    pub fn new<I>(profiles: I) -> Self
    where
        I: IntoIterator<Item = UserProfile>,
    {
        Self {
            profiles: profiles.into_iter().map(|p| (p.id, p)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[async_trait]
impl IdentityResolver for StaticIdentityResolver {
    async fn resolve(&self, user_id: UserId) -> Option<UserProfile> {
        self.profiles.get(&user_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_known_users_only() {
        let resolver = StaticIdentityResolver::new([UserProfile::new(UserId(7), "peppy")]);
        let profile = resolver.resolve(UserId(7)).await.expect("user 7");
        assert_eq!(profile.username, "peppy");
        assert!(resolver.resolve(UserId(8)).await.is_none());
    }
}
