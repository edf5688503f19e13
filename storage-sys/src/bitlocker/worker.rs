// SPDX-License-Identifier: GPL-3.0-only

//! Dedicated BitLocker status worker
//!
//! The status property can only be read from the thread that initialized its
//! COM apartment, so every query is funneled to one long-lived OS thread:
//!
//! ```text
//! caller ──StatusRequest──▶ [capacity 1] ──▶ worker thread (probe bound once)
//!        ◀──── one-shot reply per request ──────┘
//! ```
//!
//! The worker loop runs on a current-thread tokio runtime driven by the bound
//! thread itself, so `select!` between cancellation and the request channel
//! never moves work to another thread.
//!
//! A panic inside the loop is caught, logged with the backtrace taken when it
//! was raised, and a fresh
//! worker thread takes over the same channels. The request being served at
//! that moment loses its reply sender, so its caller gets
//! [`SysError::WorkerFault`] instead of waiting forever.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, Once, PoisonError};
use std::thread::{self, JoinHandle};

use storage_types::BitlockerStatus;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::probe::{EncryptionProbe, ProbeFactory};
use crate::error::{Result, SysError};

const WORKER_THREAD_NAME: &str = "bitlocker-worker";

thread_local! {
    /// Backtrace of the last panic raised on this worker thread.
    static PANIC_TRACE: RefCell<Option<Backtrace>> = const { RefCell::new(None) };
}

static PANIC_HOOK: Once = Once::new();

/// Chain a panic hook that records the backtrace of worker thread panics
/// before unwinding discards the faulting frames.
fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if thread::current().name() == Some(WORKER_THREAD_NAME) {
                PANIC_TRACE.with(|trace| *trace.borrow_mut() = Some(Backtrace::force_capture()));
            }
            previous(info);
        }));
    });
}

fn take_panic_trace() -> Option<Backtrace> {
    PANIC_TRACE.with(|trace| trace.borrow_mut().take())
}

/// One status query and the slot its answer is delivered to.
#[derive(Debug)]
pub struct StatusRequest {
    pub volume_path: String,
    pub reply: oneshot::Sender<Result<BitlockerStatus>>,
}

type ThreadSlot = Arc<Mutex<Option<JoinHandle<()>>>>;

/// Handle to the running worker.
///
/// Queries block the calling thread until answered and must not be issued
/// from inside an async runtime.
pub struct BitlockerWorker {
    requests: mpsc::Sender<StatusRequest>,
    cancel: CancellationToken,
    thread: ThreadSlot,
}

struct WorkerContext<F> {
    factory: F,
    requests: mpsc::Receiver<StatusRequest>,
    cancel: CancellationToken,
    thread: ThreadSlot,
    ready: bool,
}

impl BitlockerWorker {
    /// Spawn the worker thread and wait until its probe is bound.
    ///
    /// A bind failure is returned here and the worker is not restarted.
    pub fn start<F: ProbeFactory>(factory: F) -> Result<Self> {
        install_panic_hook();

        let (requests, receiver) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let thread: ThreadSlot = Arc::new(Mutex::new(None));

        let context = WorkerContext {
            factory,
            requests: receiver,
            cancel: cancel.clone(),
            thread: Arc::clone(&thread),
            ready: false,
        };

        let (ready_tx, ready_rx) = oneshot::channel();
        spawn_worker(context, ready_tx)?;

        let init = ready_rx.blocking_recv().unwrap_or_else(|_| {
            Err(SysError::WorkerFault(
                "worker exited during initialization".to_string(),
            ))
        });

        if let Err(error) = init {
            join_worker(&thread);
            return Err(error);
        }

        info!("BitLocker worker ready");
        Ok(Self {
            requests,
            cancel,
            thread,
        })
    }

    /// Query the protection status of `volume_path`.
    ///
    /// Paths without a drive reference (no `:`) are answered with
    /// [`BitlockerStatus::NotApplicable`].
    pub fn query_status(&self, volume_path: &str) -> Result<BitlockerStatus> {
        let (reply, response) = oneshot::channel();

        self.requests
            .blocking_send(StatusRequest {
                volume_path: volume_path.to_string(),
                reply,
            })
            .map_err(|_| SysError::WorkerUnavailable)?;

        response.blocking_recv().map_err(|_| {
            SysError::WorkerFault(format!("request for {volume_path} was dropped"))
        })?
    }

    /// Cancel the worker and wait for its thread to release the probe.
    pub fn stop(self) {
        self.cancel.cancel();
        join_worker(&self.thread);
        debug!("BitLocker worker stopped");
    }
}

/// Spawn a worker thread and record it as the current one.
///
/// The slot stays locked until the handle is stored, so a replacement spawned
/// by the new thread can never be overwritten by its predecessor. The thread
/// logs to the spawning thread's subscriber.
fn spawn_worker<F: ProbeFactory>(
    context: WorkerContext<F>,
    ready: oneshot::Sender<Result<()>>,
) -> Result<()> {
    let slot = Arc::clone(&context.thread);
    let mut current = slot.lock().unwrap_or_else(PoisonError::into_inner);
    let dispatch = tracing::dispatcher::get_default(|dispatch| dispatch.clone());

    let handle = thread::Builder::new()
        .name(WORKER_THREAD_NAME.to_string())
        .spawn(move || {
            tracing::dispatcher::with_default(&dispatch, || run_worker(context, ready))
        })?;
    *current = Some(handle);
    Ok(())
}

fn run_worker<F: ProbeFactory>(mut context: WorkerContext<F>, ready: oneshot::Sender<Result<()>>) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| serve(&mut context, ready)));

    let Err(payload) = outcome else {
        return;
    };

    let stack = take_panic_trace().unwrap_or_else(Backtrace::force_capture);
    error!(
        panic = %panic_message(payload.as_ref()),
        %stack,
        "BitLocker worker panicked"
    );

    if !context.ready {
        error!("BitLocker worker panicked during initialization, not restarting");
        return;
    }

    restart(context);
}

fn restart<F: ProbeFactory>(mut context: WorkerContext<F>) {
    context.ready = false;

    let (ready_tx, ready_rx) = oneshot::channel();
    if let Err(error) = spawn_worker(context, ready_tx) {
        error!(%error, "BitLocker worker restart failed");
        return;
    }

    match ready_rx.blocking_recv() {
        Ok(Ok(())) => info!("BitLocker worker restarted"),
        Ok(Err(error)) => error!(%error, "BitLocker worker restart failed"),
        Err(_) => error!("BitLocker worker restart failed: worker exited during initialization"),
    }
}

fn serve<F: ProbeFactory>(context: &mut WorkerContext<F>, ready: oneshot::Sender<Result<()>>) {
    let runtime = match tokio::runtime::Builder::new_current_thread().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            let _ = ready.send(Err(SysError::Io(error)));
            return;
        }
    };

    let mut probe = match context.factory.bind() {
        Ok(probe) => probe,
        Err(error) => {
            let _ = ready.send(Err(error));
            return;
        }
    };

    context.ready = true;
    if ready.send(Ok(())).is_err() {
        warn!("Nobody is waiting for the BitLocker worker to become ready");
    }

    let WorkerContext {
        requests, cancel, ..
    } = context;

    runtime.block_on(async {
        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!("BitLocker worker cancelled");
                    break;
                }
                request = requests.recv() => {
                    let Some(request) = request else {
                        debug!("BitLocker worker handle dropped");
                        break;
                    };

                    let response = answer(&mut probe, &request.volume_path);
                    if request.reply.send(response).is_err() {
                        warn!(volume = %request.volume_path, "BitLocker status caller went away");
                    }
                }
            }
        }
    });
}

fn answer<P: EncryptionProbe>(probe: &mut P, volume_path: &str) -> Result<BitlockerStatus> {
    if !volume_path.contains(':') {
        return Ok(BitlockerStatus::NotApplicable);
    }

    probe
        .protection_status(volume_path)
        .map(BitlockerStatus::from_code)
}

/// Join the current worker thread, and any replacement it spawned while
/// being joined.
fn join_worker(slot: &ThreadSlot) {
    loop {
        let handle = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
        let Some(handle) = handle else {
            break;
        };

        if handle.join().is_err() {
            warn!("BitLocker worker thread panicked while stopping");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
