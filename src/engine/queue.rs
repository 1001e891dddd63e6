use tokio::sync::mpsc::error::TrySendError;
use tracing::warn;

use crate::engine::notify::EmailMessage;
use crate::state::AppState;

/// Hands an email to the sender worker. Email is best-effort: a full or
/// closed queue drops the message with a warning.
pub fn enqueue_email(state: &AppState, message: EmailMessage) {
    match state.email_tx.try_send(message) {
        Ok(()) => state.metrics.emails_in_queue.inc(),
        Err(TrySendError::Full(message)) => {
            warn!(to = %message.to, "email queue full; dropping message");
            state.metrics.emails_total.with_label_values(&["dropped"]).inc();
        }
        Err(TrySendError::Closed(message)) => {
            warn!(to = %message.to, "email queue closed; dropping message");
            state.metrics.emails_total.with_label_values(&["dropped"]).inc();
        }
    }
}
