//! Execution host: a pool of event loops for listeners and tunnels.
//!
//! Each [`IoContext`] is a current-thread tokio runtime driven by its own
//! named worker thread. Accept loops run on the dedicated default context;
//! tunnels are distributed over the remaining contexts round-robin. The host
//! also carries the optional protect hook consulted before every outbound
//! connect.

pub mod platform;

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("failed to start worker: {0}")]
    Io(#[from] std::io::Error),
}

/// Outbound socket about to connect, as seen by the protect hook.
#[derive(Debug, Clone, Copy)]
pub struct ProtectTarget {
    /// Raw descriptor of the outbound socket (-1 where unavailable).
    pub fd: i32,
    /// Local endpoint the outbound socket is bound to.
    pub bound: SocketAddr,
    /// Peer endpoint of the inbound connection being served.
    pub peer: SocketAddr,
    /// Destination the socket is about to connect to.
    pub remote: SocketAddr,
}

/// Host-process callback that exempts a socket from VPN/firewall routing.
/// Returning `false` aborts the connect.
pub type ProtectHook = Arc<dyn Fn(&ProtectTarget) -> bool + Send + Sync>;

/// One event loop: a current-thread runtime parked on a worker thread until
/// the context is stopped.
pub struct IoContext {
    handle: Handle,
    stop: CancellationToken,
}

impl IoContext {
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: std::future::Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(future)
    }

    fn stop(&self) {
        self.stop.cancel();
    }
}

fn spawn_context(name: String) -> Result<Arc<IoContext>, HostError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let handle = runtime.handle().clone();
    let stop = CancellationToken::new();
    let parked = stop.clone();
    std::thread::Builder::new().name(name).spawn(move || {
        platform::raise_thread_priority();
        runtime.block_on(parked.cancelled());
        runtime.shutdown_background();
    })?;
    Ok(Arc::new(IoContext { handle, stop }))
}

#[derive(Default)]
struct HostState {
    contexts: VecDeque<Arc<IoContext>>,
    default: Option<Arc<IoContext>>,
}

/// Pool of execution contexts shared by every listener bound to it.
pub struct IoHost {
    state: Mutex<HostState>,
    protect: Mutex<Option<ProtectHook>>,
    fin: AtomicBool,
    concurrency: usize,
}

impl IoHost {
    /// `concurrent <= 0` means one context per hardware thread.
    pub fn new(concurrent: i32) -> Arc<Self> {
        let concurrency = if concurrent <= 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            concurrent as usize
        };
        Arc::new(Self {
            state: Mutex::new(HostState::default()),
            protect: Mutex::new(None),
            fin: AtomicBool::new(false),
            concurrency,
        })
    }

    /// Starts the worker threads. Idempotent; a no-op after `close()`.
    ///
    /// With concurrency 1 the default context doubles as the sole relay
    /// context. Otherwise the default context only serves accept loops and
    /// `concurrency` extra contexts carry the tunnels.
    pub fn start(&self) -> Result<(), HostError> {
        if self.fin.load(Ordering::SeqCst) {
            return Ok(());
        }
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.default.is_none() {
            let default = spawn_context("wirelink-io-0".to_string())?;
            if self.concurrency == 1 {
                state.contexts.push_back(default.clone());
            }
            state.default = Some(default);
        }
        if self.concurrency > 1 {
            while state.contexts.len() < self.concurrency {
                let name = format!("wirelink-io-{}", state.contexts.len() + 1);
                state.contexts.push_back(spawn_context(name)?);
            }
        }
        debug!(contexts = state.contexts.len(), "execution host started");
        Ok(())
    }

    /// Next relay context, rotate-and-reinsert. `None` before `start()` and
    /// after `close()`.
    pub fn get(&self) -> Option<Arc<IoContext>> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if self.concurrency == 1 {
            return state.contexts.front().cloned();
        }
        let ctx = state.contexts.pop_front()?;
        state.contexts.push_back(ctx.clone());
        Some(ctx)
    }

    /// The accept-loop context.
    pub fn default_context(&self) -> Option<Arc<IoContext>> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.default.clone()
    }

    pub fn set_protect(&self, hook: Option<ProtectHook>) {
        let mut guard = self.protect.lock().unwrap_or_else(|e| e.into_inner());
        *guard = hook;
    }

    /// Consults the protect hook. No hook installed means allowed.
    pub fn protect(&self, target: &ProtectTarget) -> bool {
        let hook = {
            let guard = self.protect.lock().unwrap_or_else(|e| e.into_inner());
            guard.clone()
        };
        match hook {
            Some(hook) => hook(target),
            None => true,
        }
    }

    /// Stops every context. One-shot; later calls are no-ops. Workers are
    /// not joined, their runtimes shut down in the background.
    pub fn close(&self) {
        if self.fin.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(default) = state.default.take() {
            default.stop();
        }
        for ctx in state.contexts.drain(..) {
            ctx.stop();
        }
        debug!("execution host closed");
    }
}

impl Drop for IoHost {
    fn drop(&mut self) {
        self.close();
    }
}
