//! # Teletext insertion
//!
//! Teletext packets are copied into the encoder's VBI data register by DMA,
//! paced by the encoder, one field at a time. Two interrupts drive the
//! engine and may run on different CPUs:
//!
//! - vsync calls [`update_hw`](TeletextEngine::update_hw), which looks at
//!   the oldest queued entry and, if it's due and for this field, programs
//!   the line mask and hands it to DMA,
//! - DMA completion calls [`dma_completed`](TeletextEngine::dma_completed),
//!   which retires the finished entry and starts the next one.
//!
//! At most one transfer runs at a time (`current`), with at most one more
//! waiting behind it (`pending`). Entries go out in submission order.
//!
//! ```text
//! queue_metadata -> [ ring ] --update_hw--> pending --dma_completed--> current --dma_completed--> released
//!                             \____________(current free)____________/
//! ```

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use log::{debug, error, trace, warn};
use rtrb::{Consumer, Producer, PushError, RingBuffer};
use spin::Mutex;
use thiserror::Error;

use crate::config::TeletextConfig;
use crate::hw::{DmaSubsystem, TeletextRegisters};
use crate::mode::FieldParity;

mod node;
mod regs;

pub use node::{TargetField, TeletextLine, TeletextMetadata, FIRST_VBI_LINE, LAST_VBI_LINE, MAX_TELETEXT_LINES, TELETEXT_LINE_BYTES, VBI_LINE_MASK};
pub use regs::{TeletextControl, TeletextSystem};

use node::{line_descriptors, TeletextNode};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
pub enum TeletextError {
    #[error("teletext not started")]
    NotStarted,
    #[error("teletext system {system:?} not available on {lines_per_frame} line rasters")]
    UnsupportedSystem { system: TeletextSystem, lines_per_frame: u32 },
    #[error("no DMA channel available")]
    ChannelUnavailable,
    #[error("could not create DMA transfer")]
    QueueUnavailable,
    #[error("teletext queue full")]
    QueueFull,
    #[error("queue depth must be at least 1")]
    InvalidQueueDepth,
    #[error("line mask {0:#x} selects lines outside the VBI")]
    InvalidLineMask(u32),
    #[error("{got} lines supplied, mask selects {expected}")]
    LineCount { expected: usize, got: usize },
    #[error("{0} bytes is not a whole number of packets")]
    PacketSize(usize),
}

/// What the vsync handler knows about the field that just started.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FieldTick {
    pub parity: FieldParity,
    pub now_us: u64,
    pub field_duration_us: u32,
}

impl FieldTick {
    /// Entries presenting later than this stay queued.
    pub fn due_limit_us(&self) -> u64 {
        self.now_us + u64::from(self.field_duration_us) * 3 / 2
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct TeletextStats {
    pub queued: u32,
    pub delivered: u32,
    /// Head entry held back because its presentation time is too far out.
    pub deferred_not_due: u32,
    /// Head entry held back for the other field.
    pub deferred_parity: u32,
    /// Head entry due, but the DMA pipeline was still full.
    pub late: u32,
    pub failed: u32,
    pub released: u32,
}

#[derive(Default)]
struct Counters {
    queued: AtomicU32,
    delivered: AtomicU32,
    deferred_not_due: AtomicU32,
    deferred_parity: AtomicU32,
    late: AtomicU32,
    failed: AtomicU32,
    released: AtomicU32,
}

impl Counters {
    fn bump(counter: &AtomicU32) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

struct Slots<X> {
    current: Option<TeletextNode<X>>,
    pending: Option<TeletextNode<X>>,
}

pub struct TeletextEngine<D: DmaSubsystem, R: TeletextRegisters> {
    dma: D,
    config: TeletextConfig,
    channel: Mutex<Option<D::Channel>>,

    // The ring ends need `&mut` and the engine is shared by `&self`. The
    // producer lock is only taken on the submit path, so it never contends;
    // the consumer lock is shared by the vsync handler and flush/stop.
    submit: Mutex<Producer<TeletextNode<D::Transfer>>>,
    queue: Mutex<Consumer<TeletextNode<D::Transfer>>>,
    slots: Mutex<Slots<D::Transfer>>,
    regs: Mutex<R>,

    next_index: AtomicUsize,
    idle: AtomicBool,
    counters: Counters,
}

impl<D: DmaSubsystem, R: TeletextRegisters> TeletextEngine<D, R> {
    pub fn new(dma: D, regs: R, config: TeletextConfig) -> Result<Self, TeletextError> {
        if config.queue_depth == 0 {
            return Err(TeletextError::InvalidQueueDepth);
        }
        let (producer, consumer) = RingBuffer::new(config.queue_depth);

        Ok(Self {
            dma,
            config,
            channel: Mutex::new(None),
            submit: Mutex::new(producer),
            queue: Mutex::new(consumer),
            slots: Mutex::new(Slots { current: None, pending: None }),
            regs: Mutex::new(regs),
            next_index: AtomicUsize::new(0),
            idle: AtomicBool::new(true),
            counters: Counters::default(),
        })
    }

    /// Claims the DMA channel and programs the line format for `system`.
    pub fn start(&self, system: TeletextSystem, lines_per_frame: u32) -> Result<(), TeletextError> {
        let Some(line_size) = system.line_size(lines_per_frame) else {
            warn!(target: "teletext", "system {:?} unsupported on {} lines", system, lines_per_frame);
            return Err(TeletextError::UnsupportedSystem { system, lines_per_frame });
        };

        {
            let mut channel = self.channel.lock();
            if channel.is_none() {
                let claimed = self
                    .dma
                    .get_channel(self.config.dma_pacing, 1, self.config.channel_flags)
                    .ok_or(TeletextError::ChannelUnavailable)?;
                *channel = Some(claimed);
            }
        }

        let mut ctl = TeletextControl::default();
        ctl.set_system(system as u8);
        ctl.set_line_size(line_size);
        self.regs.lock().write_control(ctl);

        debug!(target: "teletext", "started system {:?}, {} byte lines", system, line_size);
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.channel.lock().is_some()
    }

    /// True when the last vsync found nothing queued.
    pub fn is_idle(&self) -> bool {
        self.idle.load(Ordering::Relaxed)
    }

    pub fn queued(&self) -> usize {
        self.queue.lock().slots()
    }

    pub fn in_flight(&self) -> usize {
        let slots = self.slots.lock();
        usize::from(slots.current.is_some()) + usize::from(slots.pending.is_some())
    }

    pub fn stats(&self) -> TeletextStats {
        let c = &self.counters;
        TeletextStats {
            queued: c.queued.load(Ordering::Relaxed),
            delivered: c.delivered.load(Ordering::Relaxed),
            deferred_not_due: c.deferred_not_due.load(Ordering::Relaxed),
            deferred_parity: c.deferred_parity.load(Ordering::Relaxed),
            late: c.late.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            released: c.released.load(Ordering::Relaxed),
        }
    }

    pub fn registers(&self) -> spin::MutexGuard<'_, R> {
        self.regs.lock()
    }

    fn construct_node(&self, metadata: TeletextMetadata, index: usize) -> Result<TeletextNode<D::Transfer>, TeletextError> {
        let descriptors = line_descriptors(&metadata, self.config.data_register)?;

        let channel = self.channel.lock();
        let channel = channel.as_ref().ok_or(TeletextError::NotStarted)?;
        let transfer = self
            .dma
            .create_transfer(channel, &descriptors, self.config.dma_pacing, self.config.transfer_flags, index)
            .ok_or(TeletextError::QueueUnavailable)?;

        Ok(TeletextNode { index, metadata, transfer })
    }

    /// Submits an entry. On success returns the index that DMA completion
    /// will report for it.
    pub fn queue_metadata(&self, metadata: TeletextMetadata) -> Result<usize, TeletextError> {
        metadata.validate()?;

        let index = self.next_index.fetch_add(1, Ordering::Relaxed);
        let node = self.construct_node(metadata, index).inspect_err(|e| {
            warn!(target: "teletext", "entry {} refused: {}", index, e);
        })?;

        let pushed = self.submit.lock().push(node);
        match pushed {
            Ok(()) => {
                Counters::bump(&self.counters.queued);
                trace!(target: "teletext", "queued entry {}", index);
                Ok(index)
            }
            Err(PushError::Full(node)) => {
                warn!(target: "teletext", "queue full, dropping entry {}", index);
                self.dma.delete_transfer(node.transfer);
                Err(TeletextError::QueueFull)
            }
        }
    }

    /// Vsync handler.
    pub fn update_hw(&self, tick: FieldTick) {
        let mut queue = self.queue.lock();

        let Ok(head) = queue.peek() else {
            self.idle.store(true, Ordering::Relaxed);
            return;
        };
        self.idle.store(false, Ordering::Relaxed);

        if head.metadata.presentation_time_us.is_some_and(|pts| pts > tick.due_limit_us()) {
            Counters::bump(&self.counters.deferred_not_due);
            return;
        }

        if !head.metadata.field.matches(tick.parity) {
            Counters::bump(&self.counters.deferred_parity);
            return;
        }

        let line_mask = head.metadata.valid_line_mask;
        let index = head.index;

        let failed = {
            let mut slots = self.slots.lock();
            if slots.pending.is_some() {
                Counters::bump(&self.counters.late);
                trace!(target: "teletext", "entry {} late, pipeline full", index);
                return;
            }

            // the encoder latches these on the next field, ahead of the DMA
            {
                let mut regs = self.regs.lock();
                let mut ctl = regs.control();
                ctl.set_enable(true);
                regs.write_control(ctl);
                regs.write_line_mask(tick.parity, line_mask);
            }

            let Ok(node) = queue.pop() else {
                return;
            };
            drop(queue);

            if slots.current.is_some() {
                slots.pending = Some(node);
                None
            } else if self.dma.start_transfer(&node.transfer) {
                slots.current = Some(node);
                None
            } else {
                Some(node)
            }
        };

        if let Some(node) = failed {
            error!(target: "teletext", "DMA refused to start entry {}", node.index);
            Counters::bump(&self.counters.failed);
            self.release(node);
        }
    }

    /// DMA completion handler for the transfer created with `cookie`.
    pub fn dma_completed(&self, cookie: usize) {
        let (finished, failed) = {
            let mut slots = self.slots.lock();
            match slots.current.as_ref() {
                Some(node) if node.index == cookie => {}
                _ => {
                    warn!(target: "teletext", "completion for {} which isn't in flight", cookie);
                    return;
                }
            }

            let finished = slots.current.take();
            slots.current = slots.pending.take();

            let mut failed = None;
            if let Some(next) = slots.current.as_ref() {
                if !self.dma.start_transfer(&next.transfer) {
                    failed = slots.current.take();
                }
            }
            (finished, failed)
        };

        if let Some(node) = finished {
            Counters::bump(&self.counters.delivered);
            self.release(node);
        }
        if let Some(node) = failed {
            error!(target: "teletext", "DMA refused to start entry {}", node.index);
            Counters::bump(&self.counters.failed);
            self.release(node);
        }
    }

    fn release(&self, node: TeletextNode<D::Transfer>) {
        self.dma.delete_transfer(node.transfer);
        Counters::bump(&self.counters.released);
    }

    /// Halts the channel and disables insertion. Queued entries are kept.
    pub fn stop_dma_engine(&self) {
        if let Some(channel) = self.channel.lock().as_ref() {
            self.dma.stop_channel(channel);
        }

        let mut regs = self.regs.lock();
        let mut ctl = regs.control();
        ctl.set_enable(false);
        regs.write_control(ctl);
    }

    /// Releases everything that hasn't been handed to DMA yet.
    pub fn flush(&self) {
        let mut flushed = 0;
        loop {
            let next = self.queue.lock().pop();
            match next {
                Ok(node) => {
                    self.release(node);
                    flushed += 1;
                }
                Err(_) => break,
            }
        }
        if flushed > 0 {
            debug!(target: "teletext", "flushed {} entries", flushed);
        }
    }

    /// Stops insertion and releases every entry, queued or in flight.
    pub fn stop(&self) {
        self.stop_dma_engine();

        let (current, pending) = {
            let mut slots = self.slots.lock();
            (slots.current.take(), slots.pending.take())
        };
        for node in [current, pending].into_iter().flatten() {
            self.release(node);
        }

        self.flush();

        if let Some(channel) = self.channel.lock().take() {
            self.dma.release_channel(channel);
            debug!(target: "teletext", "stopped");
        }
        self.idle.store(true, Ordering::Relaxed);
    }
}

impl<D: DmaSubsystem, R: TeletextRegisters> Drop for TeletextEngine<D, R> {
    fn drop(&mut self) {
        self.stop();
    }
}
