use tokio::sync::watch;

/// Why the router was asked to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Interrupt,
    Terminate,
}

/// Broadcasts a one-way stop request to every listener. The first reason wins.
#[derive(Clone)]
pub struct Shutdown {
    sender: watch::Sender<Option<StopReason>>,
}

#[derive(Clone)]
pub struct ShutdownListener {
    receiver: watch::Receiver<Option<StopReason>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self { sender }
    }

    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn trigger(&self, reason: StopReason) {
        let accepted = self.sender.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        });
        if accepted {
            tracing::info!(target: "lifecycle", ?reason, "shutdown triggered");
        }
    }
}

impl ShutdownListener {
    /// Resolves once shutdown has been requested, immediately if it already was.
    pub async fn notified(&mut self) -> Option<StopReason> {
        match self.receiver.wait_for(Option::is_some).await {
            Ok(reason) => *reason,
            Err(_) => None,
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.receiver.borrow().is_some()
    }
}

/// Triggers shutdown on Ctrl-C, or SIGTERM on unix.
pub fn install_signal_handlers(shutdown: Shutdown) {
    tokio::spawn(async move {
        let reason = wait_for_signal().await;
        shutdown.trigger(reason);
    });
}

#[cfg(unix)]
async fn wait_for_signal() -> StopReason {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(terminate) => terminate,
        Err(err) => {
            tracing::warn!(target: "lifecycle", error = %err, "SIGTERM handler unavailable");
            let _ = tokio::signal::ctrl_c().await;
            return StopReason::Interrupt;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => StopReason::Interrupt,
        _ = terminate.recv() => StopReason::Terminate,
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> StopReason {
    let _ = tokio::signal::ctrl_c().await;
    StopReason::Interrupt
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn listeners_observe_trigger() {
        let shutdown = Shutdown::new();
        let mut listener = shutdown.subscribe();
        assert!(!listener.is_triggered());

        let trigger = shutdown.clone();
        tokio::spawn(async move { trigger.trigger(StopReason::Terminate) });

        let reason = tokio::time::timeout(Duration::from_secs(1), listener.notified())
            .await
            .unwrap();
        assert_eq!(reason, Some(StopReason::Terminate));
        assert!(listener.is_triggered());
    }

    #[tokio::test]
    async fn late_subscribers_see_earlier_trigger() {
        let shutdown = Shutdown::new();
        shutdown.trigger(StopReason::Interrupt);
        let mut listener = shutdown.subscribe();
        let reason = tokio::time::timeout(Duration::from_secs(1), listener.notified())
            .await
            .unwrap();
        assert_eq!(reason, Some(StopReason::Interrupt));
    }

    #[tokio::test]
    async fn first_reason_is_kept() {
        let shutdown = Shutdown::new();
        shutdown.trigger(StopReason::Terminate);
        shutdown.trigger(StopReason::Interrupt);
        assert_eq!(shutdown.subscribe().notified().await, Some(StopReason::Terminate));
    }
}
