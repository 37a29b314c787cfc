use tokio::sync::broadcast;
use tracing::trace;

/// Caller-visible views that can go stale after a state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadModel {
    Vehicles,
    Points,
    Cards,
    Slots,
}

/// "Re-fetch now" notice for the listed read models.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshSignal {
    pub models: Vec<ReadModel>,
}

impl RefreshSignal {
    pub fn new(models: &[ReadModel]) -> Self {
        Self {
            models: models.to_vec(),
        }
    }

    /// Everything a settled parking fee can change.
    pub fn after_payment() -> Self {
        Self::new(&[ReadModel::Vehicles, ReadModel::Points, ReadModel::Cards])
    }

    pub fn covers(&self, model: ReadModel) -> bool {
        self.models.contains(&model)
    }
}

const CHANNEL_CAPACITY: usize = 16;

/// Fan-out of refresh signals to every interested view.
#[derive(Debug, Clone)]
pub struct RefreshHub {
    sender: broadcast::Sender<RefreshSignal>,
}

impl Default for RefreshHub {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RefreshSignal> {
        self.sender.subscribe()
    }

    pub fn notify(&self, signal: RefreshSignal) {
        // Nobody listening is fine: the next read fetches fresh data anyway.
        if self.sender.send(signal).is_err() {
            trace!("refresh signal dropped, no subscribers");
        }
    }
}
