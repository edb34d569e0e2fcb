//! Local Scheduler
//!
//! A per-thread cooperative executor. Two kinds of work run here:
//!
//! 1. Futures spawned with [`spawn_local`], such as registry resolutions.
//!    They make progress whenever the host calls [`run_until_stalled`] or
//!    [`tick`].
//! 2. Frame callbacks queued with [`request_frame`], the stand-in for an
//!    animation frame. [`tick`] runs the frames that were queued before it
//!    started; frames requested while ticking wait for the next tick.
//!
//! Nothing here blocks. A host embeds the scheduler by calling `tick` from
//! its own event loop.

use std::cell::RefCell;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_executor::{LocalPool, LocalSpawner};
use futures_util::task::LocalSpawnExt;
use tracing::{trace, warn};

thread_local! {
    static POOL: RefCell<LocalPool> = RefCell::new(LocalPool::new());
    static SPAWNER: LocalSpawner = POOL.with(|pool| pool.borrow().spawner());
    static FRAMES: RefCell<Vec<(FrameId, Box<dyn FnOnce()>)>> = RefCell::new(Vec::new());
}

/// Identifier of a queued frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(u64);

impl FrameId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Spawn a future on this thread's executor.
pub fn spawn_local<F>(future: F)
where
    F: Future<Output = ()> + 'static,
{
    SPAWNER.with(|spawner| {
        if let Err(err) = spawner.spawn_local(future) {
            warn!(%err, "failed to spawn local task");
        }
    });
}

/// Poll every spawned future until none can make progress.
///
/// Calling this from inside a running task does nothing.
pub fn run_until_stalled() {
    POOL.with(|pool| match pool.try_borrow_mut() {
        Ok(mut pool) => pool.run_until_stalled(),
        Err(_) => trace!("executor already running"),
    });
}

/// Queue `callback` for the next [`tick`].
pub fn request_frame<F>(callback: F) -> FrameId
where
    F: FnOnce() + 'static,
{
    let id = FrameId::new();
    FRAMES.with(|frames| frames.borrow_mut().push((id, Box::new(callback))));
    trace!(?id, "frame requested");
    id
}

/// Drop a queued frame. Returns whether it was still queued.
pub fn cancel_frame(id: FrameId) -> bool {
    FRAMES.with(|frames| {
        let mut frames = frames.borrow_mut();
        let before = frames.len();
        frames.retain(|(queued, _)| *queued != id);
        frames.len() != before
    })
}

pub fn pending_frames() -> usize {
    FRAMES.with(|frames| frames.borrow().len())
}

/// Drive spawned futures, then run the queued frames.
///
/// Returns the number of frames run.
pub fn tick() -> usize {
    run_until_stalled();
    let frames = FRAMES.with(|frames| std::mem::take(&mut *frames.borrow_mut()));
    let count = frames.len();
    for (_, callback) in frames {
        callback();
    }
    run_until_stalled();
    count
}
