use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum TimerKind {
    PingInterval,
    DisconnectTimeout,
    ConnectTimeout,
    Reconnect,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct TimerFired {
    pub kind: TimerKind,
    token: u64,
}

/// The four per-connection timers.
///
/// Each armed timer is a sleeping task; cancelling aborts it. A firing that
/// raced with its own cancellation carries a stale token and is rejected by
/// `accept`.
pub(crate) struct Timers {
    tx: mpsc::UnboundedSender<TimerFired>,
    next_token: u64,
    armed: HashMap<TimerKind, (u64, JoinHandle<()>)>,
}

impl Timers {
    pub fn new(tx: mpsc::UnboundedSender<TimerFired>) -> Self {
        Self {
            tx,
            next_token: 0,
            armed: HashMap::new(),
        }
    }

    pub fn schedule(&mut self, kind: TimerKind, after: Duration) {
        self.cancel(kind);

        self.next_token += 1;
        let fired = TimerFired {
            kind,
            token: self.next_token,
        };
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = tx.send(fired);
        });
        self.armed.insert(kind, (fired.token, handle));
    }

    pub fn cancel(&mut self, kind: TimerKind) {
        if let Some((_, handle)) = self.armed.remove(&kind) {
            handle.abort();
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, (_, handle)) in self.armed.drain() {
            handle.abort();
        }
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.armed.contains_key(&kind)
    }

    /// Disarms and returns the kind if `fired` is the current arming of its timer.
    pub fn accept(&mut self, fired: TimerFired) -> Option<TimerKind> {
        match self.armed.get(&fired.kind) {
            Some((token, _)) if *token == fired.token => {
                self.armed.remove(&fired.kind);
                Some(fired.kind)
            }
            _ => None,
        }
    }
}

impl Drop for Timers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
