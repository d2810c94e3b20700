use std::sync::Arc;

use async_trait::async_trait;
use parley_protocol::User;
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::IdentityError;
use crate::persist::IdentityCache;
use crate::provider::IdentityProvider;

/// Identity provider that generates ids locally and remembers the last
/// identity in an [`IdentityCache`].
pub struct LocalIdentity {
    cache: Arc<dyn IdentityCache>,
    current: watch::Sender<Option<User>>,
}

impl LocalIdentity {
    /// Resume the cached identity, if any. An unreadable cache starts
    /// signed out.
    pub fn new(cache: Arc<dyn IdentityCache>) -> Self {
        let resumed = match cache.load() {
            Ok(user) => user,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable identity cache");
                None
            }
        };

        if let Some(user) = &resumed {
            tracing::debug!(user = %user.id, username = %user.username, "Resumed saved identity");
        }

        let (current, _) = watch::channel(resumed);
        Self { cache, current }
    }

    pub fn current(&self) -> Option<User> {
        self.current.borrow().clone()
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentity {
    async fn sign_in(&self, display_name: &str) -> Result<User, IdentityError> {
        let username = display_name.trim();
        if username.is_empty() {
            return Err(IdentityError::EmptyName);
        }

        let user = User::new(Uuid::now_v7().to_string(), username);
        self.cache.save(&user)?;
        self.current.send_replace(Some(user.clone()));
        Ok(user)
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        self.cache.clear()?;
        self.current.send_replace(None);
        Ok(())
    }

    fn identity_changes(&self) -> watch::Receiver<Option<User>> {
        self.current.subscribe()
    }
}
