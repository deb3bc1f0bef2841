pub mod gateway;
pub use gateway::{RoomGateway, SubscriptionGateway, UserGateway};

pub mod hooks;
pub use hooks::{BroadcastHook, HookEvent, HookId, HookRegistry, LifecycleHook};

pub mod notification;
pub use notification::{
    ConfigTemplates, EmailRequest, EmailTemplates, LogMailer, MailSender, NotificationDispatcher,
    OutboxMailer,
};

pub mod ownership;
pub use ownership::{
    ConversationCloser, DeactivationPlan, OwnershipAction, OwnershipReconciler,
    OwnershipRelinquisher, SingleOwnedRoom, StoreConversationCloser, StoreRelinquisher,
};

pub mod policy;
pub use policy::{BlockReason, GuardVerdict, PolicyGuard};

pub mod reactivator;
pub use reactivator::ConversationReactivator;

pub mod user_status_service;
pub mod user_status_service_impl;
pub use user_status_service::{StatusError, StatusOutcome, UserStatusService};
pub use user_status_service_impl::DefaultUserStatusService;
