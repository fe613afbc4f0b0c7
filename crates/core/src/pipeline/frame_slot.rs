use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, RecvError, Sender, TrySendError};

/// How the capture side behaves when the processing side has not yet taken
/// the previous item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotMode {
    /// Replace the waiting item; the replaced one is dropped and counted.
    LatestWins,
    /// Wait until the slot is free; nothing is ever dropped.
    Blocking,
}

/// Capture side of a single-slot handoff.
pub struct SlotSender<T> {
    tx: Sender<T>,
    // Second handle on the slot, used to evict a stale item.
    evict: Option<Receiver<T>>,
    dropped: Arc<AtomicUsize>,
}

/// Processing side of a single-slot handoff.
pub struct SlotReceiver<T> {
    rx: Receiver<T>,
    dropped: Arc<AtomicUsize>,
}

/// Creates a one-item channel between a capture thread and the processing
/// loop. Dropping the sender ends the stream once the slot is empty.
pub fn frame_slot<T>(mode: SlotMode) -> (SlotSender<T>, SlotReceiver<T>) {
    let (tx, rx) = crossbeam_channel::bounded(1);
    let dropped = Arc::new(AtomicUsize::new(0));
    let evict = match mode {
        SlotMode::LatestWins => Some(rx.clone()),
        SlotMode::Blocking => None,
    };
    (
        SlotSender {
            tx,
            evict,
            dropped: Arc::clone(&dropped),
        },
        SlotReceiver { rx, dropped },
    )
}

impl<T> SlotSender<T> {
    /// Hands `item` over. Returns it back when the receiver is gone.
    ///
    /// In latest-wins mode the receiver side is never seen as gone, since
    /// the sender holds a handle on the slot itself; the capture loop stops
    /// on its cancel flag instead.
    pub fn send(&self, mut item: T) -> Result<(), T> {
        let Some(evict) = &self.evict else {
            return self.tx.send(item).map_err(|e| e.into_inner());
        };
        loop {
            match self.tx.try_send(item) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Full(back)) => {
                    if evict.try_recv().is_ok() {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                    item = back;
                }
                Err(TrySendError::Disconnected(back)) => return Err(back),
            }
        }
    }
}

impl<T> SlotReceiver<T> {
    /// Blocks for the next item; `Err` once the sender is gone and the slot
    /// is empty.
    pub fn recv(&self) -> Result<T, RecvError> {
        self.rx.recv()
    }

    /// Items evicted so far.
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_wins_keeps_newest_and_counts_drops() {
        let (tx, rx) = frame_slot(SlotMode::LatestWins);
        for i in 0..4 {
            tx.send(i).unwrap();
        }
        drop(tx);

        assert_eq!(rx.recv().unwrap(), 3);
        assert!(rx.recv().is_err());
        assert_eq!(rx.dropped(), 3);
    }

    #[test]
    fn test_blocking_delivers_everything_in_order() {
        let (tx, rx) = frame_slot(SlotMode::Blocking);
        let producer = std::thread::spawn(move || {
            for i in 0..20 {
                tx.send(i).unwrap();
            }
        });

        let mut received = Vec::new();
        while let Ok(i) = rx.recv() {
            received.push(i);
        }
        producer.join().unwrap();

        assert_eq!(received, (0..20).collect::<Vec<_>>());
        assert_eq!(rx.dropped(), 0);
    }

    #[test]
    fn test_blocking_send_fails_when_receiver_gone() {
        let (tx, rx) = frame_slot(SlotMode::Blocking);
        drop(rx);
        assert_eq!(tx.send(7), Err(7));
    }
}
