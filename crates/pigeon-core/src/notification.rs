//! Routing of non-chat control messages to subsystem handlers.
//!
//! The handlers belong to the owning SDK (friend, user, group, signaling,
//! work-moments, business, super-group, conversation). The pipeline only
//! calls into them; anything they need to feed back travels over the shared
//! command channel they were constructed with.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::constant;
use crate::protocol::MsgData;

/// One subsystem's notification entry point.
#[async_trait]
pub trait NotificationHandler: Send + Sync {
    async fn do_notification(&self, msg: &MsgData);
}

/// Whether the routed message continues into classification or is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Keep processing: classify, persist, aggregate.
    Continue,
    /// The handler owns the message; no storage, no conversation update.
    Consumed,
}

/// Handler slots for every subsystem the pipeline routes to.
#[derive(Default, Clone)]
pub struct NotificationRouter {
    pub friend: Option<Arc<dyn NotificationHandler>>,
    pub user: Option<Arc<dyn NotificationHandler>>,
    pub group: Option<Arc<dyn NotificationHandler>>,
    pub signaling: Option<Arc<dyn NotificationHandler>>,
    pub work_moments: Option<Arc<dyn NotificationHandler>>,
    pub business: Option<Arc<dyn NotificationHandler>>,
    pub super_group: Option<Arc<dyn NotificationHandler>>,
    pub conversation: Option<Arc<dyn NotificationHandler>>,
}

impl NotificationRouter {
    async fn dispatch(
        &self,
        slot: &Option<Arc<dyn NotificationHandler>>,
        name: &'static str,
        msg: &MsgData,
    ) {
        match slot {
            Some(handler) => handler.do_notification(msg).await,
            None => warn!(
                handler = name,
                content_type = msg.content_type,
                "notification handler not set"
            ),
        }
    }

    pub async fn notify_conversation(&self, msg: &MsgData) {
        self.dispatch(&self.conversation, "conversation", msg).await;
    }

    pub async fn notify_super_group(&self, msg: &MsgData) {
        self.dispatch(&self.super_group, "super_group", msg).await;
    }

    pub async fn notify_business(&self, msg: &MsgData) {
        self.dispatch(&self.business, "business", msg).await;
    }

    /// Session-level routing of notification content types, applied before
    /// the sender/receiver classification.
    ///
    /// Signaling and work-moments consume their messages; the rest continue
    /// into classification and are stored like any notification.
    pub async fn route_session(&self, msg: &MsgData) -> RouteOutcome {
        let t = msg.content_type;
        match msg.session_type {
            constant::SINGLE_CHAT_TYPE => {
                if t > constant::FRIEND_NOTIFICATION_BEGIN && t < constant::FRIEND_NOTIFICATION_END
                {
                    self.dispatch(&self.friend, "friend", msg).await;
                } else if t > constant::USER_NOTIFICATION_BEGIN
                    && t < constant::USER_NOTIFICATION_END
                {
                    self.dispatch(&self.user, "user", msg).await;
                } else if t == constant::GROUP_APPLICATION_REJECTED_NOTIFICATION
                    || t == constant::GROUP_APPLICATION_ACCEPTED_NOTIFICATION
                    || t == constant::JOIN_GROUP_APPLICATION_NOTIFICATION
                {
                    // group application traffic rides the 1-to-1 session
                    self.dispatch(&self.group, "group", msg).await;
                } else if t > constant::SIGNALING_NOTIFICATION_BEGIN
                    && t < constant::SIGNALING_NOTIFICATION_END
                {
                    self.dispatch(&self.signaling, "signaling", msg).await;
                    return RouteOutcome::Consumed;
                } else if t == constant::WORK_MOMENT_NOTIFICATION {
                    self.dispatch(&self.work_moments, "work_moments", msg).await;
                    return RouteOutcome::Consumed;
                }
            }
            constant::GROUP_CHAT_TYPE | constant::SUPER_GROUP_CHAT_TYPE => {
                if t > constant::GROUP_NOTIFICATION_BEGIN && t < constant::GROUP_NOTIFICATION_END {
                    self.dispatch(&self.group, "group", msg).await;
                } else if t > constant::SIGNALING_NOTIFICATION_BEGIN
                    && t < constant::SIGNALING_NOTIFICATION_END
                {
                    self.dispatch(&self.signaling, "signaling", msg).await;
                    return RouteOutcome::Consumed;
                }
            }
            _ => {}
        }
        RouteOutcome::Continue
    }
}
