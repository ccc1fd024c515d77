use tokio::sync::oneshot::{Receiver, Sender};
use tracing::debug;

/// A signal indicating that a session should shut down
#[derive(Debug)]
pub struct ShutdownSignal {
    /// Acknowledged once the receiver has finished tearing down
    pub sender: Option<Sender<()>>,
}

/// Controller that can broadcast shutdown signals to the runtimes it owns
pub struct ShutdownController {
    subscribers: Vec<Sender<ShutdownSignal>>,
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownController {
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }

    /// Get a new receiver for this controller
    pub fn subscribe(&mut self) -> ShutdownReceiver {
        let (sender, receiver) = tokio::sync::oneshot::channel();
        self.subscribers.push(sender);
        ShutdownReceiver { receiver }
    }

    /// Signal all receivers to shut down and wait for their acknowledgments
    pub async fn signal_shutdown(self) {
        debug!("Signaling shutdown to all subscribers");
        let mut acks = Vec::new();
        for sender in self.subscribers {
            let (responder, receiver) = tokio::sync::oneshot::channel();
            acks.push(receiver);
            match sender.send(ShutdownSignal {
                sender: Some(responder),
            }) {
                Ok(_) => debug!("Shutdown signal sent"),
                Err(_) => debug!("Subscriber already gone"),
            }
        }

        for ack in acks {
            if ack.await.is_err() {
                debug!("Subscriber dropped before acknowledging shutdown");
            }
        }
    }
}

/// Receiver that can wait for shutdown signals
pub struct ShutdownReceiver {
    pub receiver: Receiver<ShutdownSignal>,
}

impl ShutdownReceiver {
    /// Wait for a shutdown signal to be received
    pub async fn wait_for_shutdown(self) -> ShutdownSignal {
        debug!("Waiting for shutdown signal");
        match self.receiver.await {
            Ok(signal) => signal,
            Err(_) => {
                debug!("Shutdown channel closed, using default signal");
                ShutdownSignal { sender: None }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn signal_reaches_every_subscriber() {
        let mut controller = ShutdownController::new();
        let first = controller.subscribe();
        let second = controller.subscribe();

        let ack_tasks = [first, second].map(|receiver| {
            tokio::spawn(async move {
                let signal = receiver.wait_for_shutdown().await;
                if let Some(sender) = signal.sender {
                    let _ = sender.send(());
                }
            })
        });

        controller.signal_shutdown().await;
        for task in ack_tasks {
            task.await.unwrap();
        }
    }
}
