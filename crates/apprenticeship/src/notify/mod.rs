//! Outbound student notifications.
//!
//! Status transitions never talk to the messaging channel directly. They enqueue a
//! [`NotificationJob`] on a [`NotificationOutbox`]; the [`DeliveryWorker`] drains the outbox
//! through a [`Notifier`] and retries failed sends on its own schedule.

pub mod message;
pub mod notifier;
pub mod outbox;
pub mod telegram;
pub mod worker;

pub use message::ConfirmationTemplate;
pub use notifier::{LogNotifier, Notifier, NotifyError};
pub use outbox::{InMemoryOutbox, NotificationJob, NotificationOutbox, OutboxError};
pub use telegram::TelegramNotifier;
pub use worker::{DeliveryReport, DeliveryWorker, RetryPolicy};
