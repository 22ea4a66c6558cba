//! Dispatch of inbound messages
//!
//! Two lookup tables drive dispatch: one from message kind to the cached
//! result set that goes stale, one from message kind to the toast shown to
//! the user. [`dispatch`] applies both through the injected collaborators.

use tracing::{debug, info};

use crate::types::{
    CacheTarget, EntityKind, MessageKind, MutationAction, Notification, NotificationVariant,
    RealtimeMessage,
};

/// Query-cache layer: marks a named result set as stale
pub trait CacheInvalidator: Send + Sync {
    fn invalidate(&self, target: &CacheTarget);
}

/// Toast layer
pub trait Notifier: Send + Sync {
    fn show(&self, notification: &Notification);
}

/// Fields tried, in order, to name the record in a notification
const LABEL_FIELDS: [&str; 5] = ["name", "title", "description", "client_name", "id"];

/// Result set invalidated by a mutation of `entity`.
///
/// Sale items are cached per sale; without a `sale_id` the whole sales list is refetched.
pub fn invalidation_target(entity: EntityKind, message: &RealtimeMessage) -> CacheTarget {
    match entity {
        EntityKind::Client => CacheTarget::from("clients"),
        EntityKind::Sale => CacheTarget::from("sales"),
        EntityKind::SaleItem => match message.data_field("sale_id") {
            Some(sale_id) => CacheTarget::new(format!("sales/{sale_id}/items")),
            None => CacheTarget::from("sales"),
        },
        EntityKind::Service => CacheTarget::from("services"),
        EntityKind::PaymentMethod => CacheTarget::from("payment-methods"),
        EntityKind::ExpenseCategory => CacheTarget::from("expense-categories"),
        EntityKind::Expense => CacheTarget::from("expenses"),
        EntityKind::Ticket => CacheTarget::from("tickets"),
        EntityKind::QuickLink => CacheTarget::from("quick-links"),
    }
}

/// Human label for an entity, `None` when its mutations are silent
fn entity_label(entity: EntityKind) -> Option<&'static str> {
    match entity {
        EntityKind::Client => Some("Client"),
        EntityKind::Sale => Some("Sale"),
        EntityKind::SaleItem => Some("Sale item"),
        EntityKind::Service => Some("Service"),
        EntityKind::PaymentMethod => Some("Payment method"),
        EntityKind::ExpenseCategory => Some("Expense category"),
        EntityKind::Expense => Some("Expense"),
        EntityKind::Ticket => Some("Ticket"),
        EntityKind::QuickLink => None,
    }
}

/// Toast for a mutation, if the entity announces its changes
pub fn notification_for(
    entity: EntityKind,
    action: MutationAction,
    message: &RealtimeMessage,
) -> Option<Notification> {
    let label = entity_label(entity)?;

    let (verb, variant) = match action {
        MutationAction::Created => ("created", NotificationVariant::Success),
        MutationAction::Updated => ("updated", NotificationVariant::Default),
        MutationAction::Deleted => ("deleted", NotificationVariant::Destructive),
    };

    let subject = LABEL_FIELDS
        .iter()
        .find_map(|field| message.data_field(field));

    let body = match subject {
        Some(subject) => format!("{subject} was {verb}"),
        None => format!("A {} was {verb}", label.to_lowercase()),
    };

    Some(Notification {
        title: format!("{label} {verb}"),
        body,
        variant,
    })
}

/// What dispatch did with one message
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// `ping` / `pong`
    KeepAlive,
    /// Hub greeting
    Connection,
    Mutation {
        target: CacheTarget,
        notification: Option<Notification>,
    },
    /// A type this client does not know; nothing happened
    Ignored(String),
}

impl DispatchOutcome {
    /// Whether the message should raise the activity flag. Keep-alive
    /// traffic and unrecognized types never do.
    pub fn marks_activity(&self) -> bool {
        !matches!(self, DispatchOutcome::KeepAlive | DispatchOutcome::Ignored(_))
    }
}

/// Apply the dispatch tables to one message.
///
/// Collaborators are called synchronously, cache invalidation first.
pub fn dispatch(
    message: &RealtimeMessage,
    invalidator: &dyn CacheInvalidator,
    notifier: &dyn Notifier,
) -> DispatchOutcome {
    match message.kind() {
        MessageKind::Ping | MessageKind::Pong => DispatchOutcome::KeepAlive,
        MessageKind::Connection => {
            debug!("realtime hub acknowledged connection");
            DispatchOutcome::Connection
        }
        MessageKind::Mutation { entity, action } => {
            let target = invalidation_target(entity, message);
            debug!(msg_type = %message.msg_type, cache_key = %target, "invalidating cached queries");
            invalidator.invalidate(&target);

            let notification = notification_for(entity, action, message);
            if let Some(notification) = &notification {
                notifier.show(notification);
            }

            DispatchOutcome::Mutation {
                target,
                notification,
            }
        }
        MessageKind::Unknown(msg_type) => {
            info!(msg_type = %msg_type, "ignoring unrecognized realtime message");
            DispatchOutcome::Ignored(msg_type)
        }
    }
}
