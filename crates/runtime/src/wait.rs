//! One-shot waits driven by document change notifications.

use std::future::Future;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::dom::{DocumentChange, ElementId, HostDocument, Selector};

#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    #[error("document change stream closed")]
    Closed,
}

/// Resolve with the first `Some` produced by `probe`.
///
/// The probe runs once up front and again after every change notification.
/// If the receiver lagged behind, the probe still runs, so no change is
/// missed. Dropping the returned future drops the subscription.
pub async fn wait_until<T, F>(mut changes: broadcast::Receiver<DocumentChange>, mut probe: F) -> Result<T, WaitError>
where
    F: FnMut() -> Option<T>,
{
    if let Some(found) = probe() {
        return Ok(found);
    }
    loop {
        match changes.recv().await {
            Ok(_) | Err(RecvError::Lagged(_)) => {
                if let Some(found) = probe() {
                    return Ok(found);
                }
            }
            Err(RecvError::Closed) => return Err(WaitError::Closed),
        }
    }
}

/// Wait until an element matching `selector` is attached.
pub fn wait_for_element<'a, D>(document: &'a D, selector: &'a Selector) -> impl Future<Output = Result<ElementId, WaitError>> + Send + 'a
where
    D: HostDocument + ?Sized,
{
    // Subscribe before the first probe so an insertion in between is not lost.
    let changes = document.subscribe();
    wait_until(changes, move || document.query(selector))
}
