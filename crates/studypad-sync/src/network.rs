//! Network availability signal
//!
//! The sync scheduler gates passes on connectivity and treats an
//! offline→online edge as a reconnect trigger. The signal itself comes from
//! an external collaborator (the application shell); [`StaticNetworkMonitor`]
//! is the in-process implementation it drives, and the one tests use.

use tokio::sync::watch;

/// Observable online/offline state
pub trait NetworkMonitor: Send + Sync {
    /// Current connectivity
    fn is_online(&self) -> bool;

    /// A receiver that yields on every connectivity change
    fn subscribe(&self) -> watch::Receiver<bool>;
}

/// A connectivity signal updated by the application shell
pub struct StaticNetworkMonitor {
    state: watch::Sender<bool>,
}

impl StaticNetworkMonitor {
    /// Creates a monitor with the given initial connectivity
    pub fn new(online: bool) -> Self {
        let (state, _) = watch::channel(online);
        Self { state }
    }

    /// Updates connectivity; subscribers observe the change
    pub fn set_online(&self, online: bool) {
        self.state.send_replace(online);
    }
}

impl NetworkMonitor for StaticNetworkMonitor {
    fn is_online(&self) -> bool {
        *self.state.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }
}
