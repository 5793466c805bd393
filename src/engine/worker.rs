use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use futures::channel::oneshot;
use parking_lot::Mutex;

use crate::engine::assets::AssetSource;
use crate::engine::state::EngineState;
use crate::engine::{DviConverter, EngineModule};
use crate::foundation::error::EngineError;
use crate::options::RenderOptions;

/// Options for [`EngineWorker::spawn`].
#[derive(Clone, Debug)]
pub struct EngineWorkerOpts {
    /// Name of the worker thread.
    pub thread_name: String,
    /// Capacity of the request channel. Only one batch talks to the engine at a time, so this
    /// rarely holds more than a single message.
    pub channel_capacity: usize,
}

impl Default for EngineWorkerOpts {
    fn default() -> Self {
        Self {
            thread_name: "inktex-engine".to_string(),
            channel_capacity: 16,
        }
    }
}

enum Message {
    Load {
        assets: Arc<dyn AssetSource>,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    Run {
        source: String,
        options: RenderOptions,
        reply: oneshot::Sender<Result<String, EngineError>>,
    },
}

/// Isolated engine context: one OS thread owning the module, converter, and loaded state.
pub struct EngineWorker;

impl EngineWorker {
    /// Start the worker thread and return a handle for talking to it.
    pub fn spawn(
        module: Arc<dyn EngineModule>,
        converter: Arc<dyn DviConverter>,
        opts: EngineWorkerOpts,
    ) -> std::io::Result<EngineHandle> {
        let (tx, rx) = async_channel::bounded::<Message>(opts.channel_capacity.max(1));
        let stopped = Arc::new(AtomicBool::new(false));
        let worker_stopped = stopped.clone();

        let join = std::thread::Builder::new()
            .name(opts.thread_name)
            .spawn(move || {
                let mut state: Option<EngineState> = None;
                while let Ok(msg) = rx.recv_blocking() {
                    // Messages still queued after teardown are dropped, which cancels their
                    // replies.
                    if worker_stopped.load(Ordering::Acquire) {
                        continue;
                    }
                    handle_message(module.as_ref(), converter.as_ref(), &mut state, msg);
                }
                tracing::debug!("engine worker exiting");
            })?;

        Ok(EngineHandle {
            tx,
            stopped,
            join: Arc::new(Mutex::new(Some(join))),
        })
    }
}

fn handle_message(
    module: &dyn EngineModule,
    converter: &dyn DviConverter,
    state: &mut Option<EngineState>,
    msg: Message,
) {
    match msg {
        Message::Load { assets, reply } => {
            let result = if state.is_some() {
                Err(EngineError::AlreadyLoaded)
            } else {
                guarded(|| EngineState::load(module, assets)).map(|loaded| {
                    *state = Some(loaded);
                })
            };
            let _ = reply.send(result);
        }
        Message::Run {
            source,
            options,
            reply,
        } => {
            let result = match state.as_ref() {
                Some(loaded) => guarded(|| loaded.run(module, converter, &source, &options)),
                None => Err(EngineError::NotLoaded),
            };
            let _ = reply.send(result);
        }
    }
}

// A panicking engine must fail only the request it was running, not the worker.
fn guarded<T>(f: impl FnOnce() -> Result<T, EngineError>) -> Result<T, EngineError> {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        let msg = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "engine panicked".to_string());
        Err(EngineError::execution(msg))
    })
}

/// Async client for an [`EngineWorker`]. Cheap to clone.
#[derive(Clone)]
pub struct EngineHandle {
    tx: async_channel::Sender<Message>,
    stopped: Arc<AtomicBool>,
    join: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("stopped", &self.is_stopped())
            .finish_non_exhaustive()
    }
}

impl EngineHandle {
    /// Load the engine code and snapshot from `origin`. Only the first call can succeed.
    pub async fn load(&self, origin: Arc<dyn AssetSource>) -> Result<(), EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(Message::Load {
            assets: origin,
            reply,
        })
        .await?;
        rx.await.map_err(|_| EngineError::WorkerGone)?
    }

    /// Render one request on the worker thread.
    pub async fn run(&self, source: String, options: RenderOptions) -> Result<String, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(Message::Run {
            source,
            options,
            reply,
        })
        .await?;
        rx.await.map_err(|_| EngineError::WorkerGone)?
    }

    async fn send(&self, msg: Message) -> Result<(), EngineError> {
        if self.is_stopped() {
            return Err(EngineError::WorkerGone);
        }
        self.tx.send(msg).await.map_err(|_| EngineError::WorkerGone)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Tear down the worker. A run already executing is allowed to finish on its own but its
    /// result is discarded; queued and later requests fail with [`EngineError::WorkerGone`].
    ///
    /// Does not wait for the thread; see [`EngineHandle::join`].
    pub fn shutdown(&self) {
        if !self.stopped.swap(true, Ordering::AcqRel) {
            self.tx.close();
            tracing::debug!("engine worker shut down");
        }
    }

    /// Block until the worker thread has exited. Call after [`EngineHandle::shutdown`].
    pub fn join(&self) {
        if let Some(join) = self.join.lock().take()
            && join.join().is_err()
        {
            tracing::error!("engine worker thread panicked");
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/engine/worker.rs"]
mod tests;
