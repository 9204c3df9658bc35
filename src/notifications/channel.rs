//! In-process notifier backed by a bounded mpsc channel

use tokio::sync::mpsc;

use super::{Notifier, VerdictEvent};

pub struct ChannelNotifier {
    tx: mpsc::Sender<VerdictEvent>,
}

impl ChannelNotifier {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<VerdictEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait::async_trait]
impl Notifier for ChannelNotifier {
    fn name(&self) -> &str {
        "channel"
    }

    async fn notify(&self, event: &VerdictEvent) -> anyhow::Result<()> {
        self.tx
            .send(event.clone())
            .await
            .map_err(|_| anyhow::anyhow!("verdict receiver dropped"))
    }

    fn is_enabled(&self) -> bool {
        !self.tx.is_closed()
    }
}
