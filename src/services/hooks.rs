//! Lifecycle hook bus.
//!
//! Handlers are registered per event and run in registration order. Each
//! handler receives the user as returned by the previous one; the first
//! error stops the chain.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::{RwLock, broadcast};
use tracing::debug;

use crate::domain::events::AccountEvent;
use crate::models::user::User;
use crate::services::user_status_service::StatusError;

/// Extension points fired around a status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookEvent {
    BeforeActivateUser,
    AfterActivateUser,
    AfterDeactivateUser,
}

impl HookEvent {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BeforeActivateUser => "beforeActivateUser",
            Self::AfterActivateUser => "afterActivateUser",
            Self::AfterDeactivateUser => "afterDeactivateUser",
        }
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A handler attached to one or more hook events.
#[async_trait]
pub trait LifecycleHook: Send + Sync {
    fn name(&self) -> &str;

    /// Handles the event and returns the (possibly modified) user for the next handler.
    async fn call(&self, event: HookEvent, user: User) -> anyhow::Result<User>;
}

/// Handle returned by [`HookRegistry::register`], used to deregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

type Handlers = Vec<(HookId, Arc<dyn LifecycleHook>)>;

#[derive(Default)]
pub struct HookRegistry {
    next_id: AtomicU64,
    handlers: RwLock<HashMap<HookEvent, Handlers>>,
}

impl HookRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, event: HookEvent, hook: Arc<dyn LifecycleHook>) -> HookId {
        let id = HookId(self.next_id.fetch_add(1, Ordering::Relaxed));
        debug!(event = %event, hook = hook.name(), "Registering lifecycle hook");
        self.handlers
            .write()
            .await
            .entry(event)
            .or_default()
            .push((id, hook));
        id
    }

    /// Removes a handler. Returns false if it was not registered.
    pub async fn deregister(&self, id: HookId) -> bool {
        let mut handlers = self.handlers.write().await;
        for list in handlers.values_mut() {
            if let Some(pos) = list.iter().position(|(hid, _)| *hid == id) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    pub async fn handler_count(&self, event: HookEvent) -> usize {
        self.handlers.read().await.get(&event).map_or(0, Vec::len)
    }

    /// Runs every handler of `event` in order, threading the user through them.
    ///
    /// The handler list is snapshotted first so handlers may (de)register hooks.
    pub async fn run(&self, event: HookEvent, user: User) -> Result<User, StatusError> {
        let handlers: Vec<Arc<dyn LifecycleHook>> = self
            .handlers
            .read()
            .await
            .get(&event)
            .map(|list| list.iter().map(|(_, hook)| Arc::clone(hook)).collect())
            .unwrap_or_default();

        let mut current = user;
        for hook in handlers {
            debug!(event = %event, hook = hook.name(), user_id = %current.id, "Running lifecycle hook");
            current = hook
                .call(event, current)
                .await
                .map_err(|source| StatusError::Hook { event, source })?;
        }

        Ok(current)
    }
}

/// Publishes every hook event it is attached to on a broadcast channel.
pub struct BroadcastHook {
    sender: broadcast::Sender<AccountEvent>,
}

impl BroadcastHook {
    #[must_use]
    pub const fn new(sender: broadcast::Sender<AccountEvent>) -> Self {
        Self { sender }
    }

    /// Registers this hook for all lifecycle events.
    pub async fn attach(self, registry: &HookRegistry) -> Vec<HookId> {
        let hook: Arc<dyn LifecycleHook> = Arc::new(self);
        let mut ids = Vec::with_capacity(3);
        for event in [
            HookEvent::BeforeActivateUser,
            HookEvent::AfterActivateUser,
            HookEvent::AfterDeactivateUser,
        ] {
            ids.push(registry.register(event, Arc::clone(&hook)).await);
        }
        ids
    }
}

#[async_trait]
impl LifecycleHook for BroadcastHook {
    fn name(&self) -> &str {
        "broadcast"
    }

    async fn call(&self, event: HookEvent, user: User) -> anyhow::Result<User> {
        let user_id = user.id.clone();
        let username = user.username.clone();
        let message = match event {
            HookEvent::BeforeActivateUser => AccountEvent::UserActivating { user_id, username },
            HookEvent::AfterActivateUser => AccountEvent::UserActivated { user_id, username },
            HookEvent::AfterDeactivateUser => AccountEvent::UserDeactivated { user_id, username },
        };
        // No subscribers is not an error.
        let _ = self.sender.send(message);
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserId;
    use std::sync::Mutex;

    fn user() -> User {
        User {
            id: UserId::new("u1"),
            username: Some("bob".to_string()),
            name: None,
            active: false,
            emails: vec![],
            roles: vec![],
            deactivation_reason: None,
        }
    }

    struct Renamer {
        suffix: &'static str,
        seen: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl LifecycleHook for Renamer {
        fn name(&self) -> &str {
            self.suffix
        }

        async fn call(&self, _event: HookEvent, mut user: User) -> anyhow::Result<User> {
            let name = format!("{}{}", user.name.unwrap_or_default(), self.suffix);
            self.seen.lock().unwrap().push(name.clone());
            user.name = Some(name);
            Ok(user)
        }
    }

    struct Failing;

    #[async_trait]
    impl LifecycleHook for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn call(&self, _event: HookEvent, _user: User) -> anyhow::Result<User> {
            anyhow::bail!("rejected")
        }
    }

    #[tokio::test]
    async fn handlers_fold_in_registration_order() {
        let registry = HookRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for suffix in ["a", "b", "c"] {
            registry
                .register(
                    HookEvent::BeforeActivateUser,
                    Arc::new(Renamer {
                        suffix,
                        seen: Arc::clone(&seen),
                    }),
                )
                .await;
        }

        let out = registry
            .run(HookEvent::BeforeActivateUser, user())
            .await
            .unwrap();
        assert_eq!(out.name.as_deref(), Some("abc"));
        assert_eq!(*seen.lock().unwrap(), vec!["a", "ab", "abc"]);
    }

    #[tokio::test]
    async fn events_are_isolated() {
        let registry = HookRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        registry
            .register(
                HookEvent::AfterActivateUser,
                Arc::new(Renamer {
                    suffix: "x",
                    seen: Arc::clone(&seen),
                }),
            )
            .await;

        let out = registry
            .run(HookEvent::AfterDeactivateUser, user())
            .await
            .unwrap();
        assert_eq!(out, user());
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failure_stops_the_chain() {
        let registry = HookRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        registry
            .register(HookEvent::AfterDeactivateUser, Arc::new(Failing))
            .await;
        registry
            .register(
                HookEvent::AfterDeactivateUser,
                Arc::new(Renamer {
                    suffix: "late",
                    seen: Arc::clone(&seen),
                }),
            )
            .await;

        let err = registry
            .run(HookEvent::AfterDeactivateUser, user())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StatusError::Hook {
                event: HookEvent::AfterDeactivateUser,
                ..
            }
        ));
        assert_eq!(err.to_string(), "Hook 'afterDeactivateUser' failed: rejected");
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn deregister_removes_handler() {
        let registry = HookRegistry::new();
        let id = registry
            .register(HookEvent::AfterActivateUser, Arc::new(Failing))
            .await;
        assert_eq!(registry.handler_count(HookEvent::AfterActivateUser).await, 1);

        assert!(registry.deregister(id).await);
        assert!(!registry.deregister(id).await);
        assert_eq!(registry.handler_count(HookEvent::AfterActivateUser).await, 0);
        assert!(registry.run(HookEvent::AfterActivateUser, user()).await.is_ok());
    }

    #[tokio::test]
    async fn broadcast_hook_publishes_events() {
        let registry = HookRegistry::new();
        let (tx, mut rx) = broadcast::channel(8);
        let ids = BroadcastHook::new(tx).attach(&registry).await;
        assert_eq!(ids.len(), 3);

        registry
            .run(HookEvent::AfterDeactivateUser, user())
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(
            event,
            AccountEvent::UserDeactivated {
                user_id: UserId::new("u1"),
                username: Some("bob".to_string()),
            }
        );
        assert_eq!(event.user_id(), &UserId::new("u1"));
    }
}
