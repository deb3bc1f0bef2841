//! Default implementation of the `UserStatusService` trait.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::db::Store;
use crate::domain::UserId;
use crate::models::user::User;
use crate::services::gateway::{RoomGateway, SubscriptionGateway, UserGateway};
use crate::services::hooks::{HookEvent, HookRegistry};
use crate::services::notification::{MailSender, NotificationDispatcher};
use crate::services::ownership::{
    ConversationCloser, OwnershipReconciler, OwnershipRelinquisher, StoreConversationCloser,
    StoreRelinquisher,
};
use crate::services::policy::PolicyGuard;
use crate::services::reactivator::ConversationReactivator;
use crate::services::user_status_service::{StatusError, StatusOutcome, UserStatusService};

/// Runs status transitions against the gateways, in a fixed order:
/// guard, reconcile, before-hook, write, after-hook, side effects, notify.
pub struct DefaultUserStatusService {
    users: Arc<dyn UserGateway>,
    rooms: Arc<dyn RoomGateway>,
    subscriptions: Arc<dyn SubscriptionGateway>,
    guard: PolicyGuard,
    reconciler: OwnershipReconciler,
    reactivator: ConversationReactivator,
    hooks: Arc<HookRegistry>,
    dispatcher: NotificationDispatcher,
    mailer: Arc<dyn MailSender>,
}

impl DefaultUserStatusService {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        users: Arc<dyn UserGateway>,
        rooms: Arc<dyn RoomGateway>,
        subscriptions: Arc<dyn SubscriptionGateway>,
        relinquisher: Arc<dyn OwnershipRelinquisher>,
        closer: Arc<dyn ConversationCloser>,
        hooks: Arc<HookRegistry>,
        dispatcher: NotificationDispatcher,
        mailer: Arc<dyn MailSender>,
    ) -> Self {
        Self {
            guard: PolicyGuard::new(Arc::clone(&users), Arc::clone(&rooms)),
            reconciler: OwnershipReconciler::new(relinquisher, closer),
            reactivator: ConversationReactivator::new(Arc::clone(&users), Arc::clone(&rooms)),
            users,
            rooms,
            subscriptions,
            hooks,
            dispatcher,
            mailer,
        }
    }

    /// Wires every gateway and the default collaborators to a single [`Store`].
    #[must_use]
    pub fn with_store(
        store: Store,
        hooks: Arc<HookRegistry>,
        dispatcher: NotificationDispatcher,
        mailer: Arc<dyn MailSender>,
    ) -> Self {
        let rooms: Arc<dyn RoomGateway> = Arc::new(store.clone());
        Self::new(
            Arc::new(store.clone()),
            Arc::clone(&rooms),
            Arc::new(store),
            Arc::new(StoreRelinquisher::new(Arc::clone(&rooms))),
            Arc::new(StoreConversationCloser::new(Arc::clone(&rooms))),
            hooks,
            dispatcher,
            mailer,
        )
    }

    #[must_use]
    pub const fn guard(&self) -> &PolicyGuard {
        &self.guard
    }

    /// Deactivates the user, then records why the account was disabled.
    ///
    /// The reason is only stored once the transition has completed, so a
    /// blocked or failed request leaves the record untouched.
    pub async fn deactivate_with_reason(
        &self,
        user_id: &UserId,
        reason: &str,
        confirm_relinquish: bool,
    ) -> Result<StatusOutcome, StatusError> {
        let outcome = self
            .transition_user_status(user_id, false, confirm_relinquish)
            .await?;

        if let StatusOutcome::Transitioned { .. } = outcome {
            self.users.set_deactivation_reason(user_id, reason).await?;
        }

        Ok(outcome)
    }

    async fn deactivate(&self, user: &User, confirm_relinquish: bool) -> Result<(), StatusError> {
        // Without a username the user cannot own anything.
        if user.username.is_some() {
            let plan = self.guard.can_deactivate(user, confirm_relinquish).await?;
            self.reconciler.reconcile(user, &plan).await?;
        }

        self.users.set_user_active(&user.id, false).await?;

        if user.active {
            self.hooks
                .run(HookEvent::AfterDeactivateUser, user.clone())
                .await?;
        }

        self.sync_subscriptions(user, false).await?;

        let tokens = self.users.unset_login_tokens(&user.id).await?;
        let locked = self
            .rooms
            .set_direct_read_only_by_user_id(&user.id, None, true, false)
            .await?;
        debug!(
            user_id = %user.id,
            tokens,
            locked,
            "Invalidated sessions and locked direct rooms"
        );

        Ok(())
    }

    async fn activate(&self, user: &User) -> Result<(), StatusError> {
        if !user.active {
            self.hooks
                .run(HookEvent::BeforeActivateUser, user.clone())
                .await?;
        }

        self.users.set_user_active(&user.id, true).await?;

        if !user.active {
            self.hooks
                .run(HookEvent::AfterActivateUser, user.clone())
                .await?;
        }

        self.sync_subscriptions(user, true).await?;

        self.users.unset_deactivation_reason(&user.id).await?;
        self.reactivator.reactivate(&user.id).await?;

        Ok(())
    }

    async fn sync_subscriptions(&self, user: &User, active: bool) -> Result<(), StatusError> {
        if let Some(username) = &user.username {
            let updated = self
                .subscriptions
                .set_archived_by_username(username, !active)
                .await?;
            debug!(user_id = %user.id, archived = !active, updated, "Synced subscription archive state");
        }
        Ok(())
    }

    /// Sends the status email if one is due. Returns whether one was requested.
    async fn notify(&self, user: &User, active: bool) -> bool {
        let Some(request) = self.dispatcher.decide(user, active) else {
            return false;
        };

        if let Err(e) = self.mailer.send(request).await {
            warn!(user_id = %user.id, error = %e, "Failed to send status-change email");
        }
        true
    }
}

#[async_trait]
impl UserStatusService for DefaultUserStatusService {
    async fn transition_user_status(
        &self,
        user_id: &UserId,
        active: bool,
        confirm_relinquish: bool,
    ) -> Result<StatusOutcome, StatusError> {
        let Some(user) = self.users.find_user_by_id(user_id).await? else {
            debug!(user_id = %user_id, "Status change requested for unknown user");
            return Ok(StatusOutcome::NotFound);
        };

        if active {
            self.activate(&user).await?;
        } else {
            self.deactivate(&user, confirm_relinquish).await?;
        }

        info!(
            user_id = %user.id,
            username = user.username.as_deref().unwrap_or_default(),
            was_active = user.active,
            active,
            "User status updated"
        );

        let notified = self.notify(&user, active).await;
        Ok(StatusOutcome::Transitioned { notified })
    }
}
