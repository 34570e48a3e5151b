use std::num::NonZeroUsize;

use crossbeam_channel::{Receiver, Sender};

/// Counting semaphore limiting how many parallel nodes run at once.
///
/// Every token in the channel is one free slot.
pub(crate) struct Slots {
    give: Sender<()>,
    take: Receiver<()>,
}

impl Slots {
    pub(crate) fn new(count: NonZeroUsize) -> Self {
        let (give, take) = crossbeam_channel::bounded(count.get());
        for _ in 0..count.get() {
            give.send(()).expect("channel has room for every slot");
        }
        Self { give, take }
    }

    pub(crate) fn acquire(&self) {
        // Both ends live in `self`, so this only returns once a slot is free.
        let _ = self.take.recv();
    }

    pub(crate) fn release(&self) {
        let _ = self.give.send(());
    }
}
