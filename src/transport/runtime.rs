use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::transport::{connection::Transport, ports::LinkEventReceiver};

/// Feeds link events into the transport one at a time, in arrival order,
/// until cancelled or every sender is gone.
#[tracing::instrument(name = "link_event_pump", target = "transport", skip_all)]
pub async fn pump_link_events(
    transport: Arc<Transport>,
    mut events_rx: LinkEventReceiver,
    shutdown: CancellationToken,
) -> usize {
    let mut handled = 0usize;
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            event = events_rx.recv() => {
                let Some(event) = event else {
                    break;
                };
                transport.handle_link_event(event);
                handled = handled.saturating_add(1);
            }
        }
    }

    tracing::debug!(target: "transport", handled = handled, "link_event_pump_stopped");
    handled
}
