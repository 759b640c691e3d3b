//! Shutdown coordinator
//!
//! Runs the close callbacks registered by independent subsystems exactly once
//! and concurrently. A failing callback is recorded and never holds up the
//! rest of the shutdown.
//!
//! Once draining has started, new registrations are rejected with
//! [`AppError::ShutdownStarted`]; the rejected callback is dropped unrun.

use crate::tool::context_wait::panic_message;
use crate::tool::error::AppError;
use futures::future::{self, BoxFuture};
use parking_lot::Mutex;
use std::future::Future;
use std::ops::Deref;
use std::sync::{Arc, OnceLock};
use tokio::sync::watch;
use tracing::{error, info, warn};

pub type CloseFn = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<()>> + Send>;

/// Boxes an async closure into a [`CloseFn`].
pub fn close_fn<F, Fut>(f: F) -> CloseFn
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Box::new(move || -> BoxFuture<'static, anyhow::Result<()>> { Box::pin(f()) })
}

/// OS termination signals the closer can listen for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGINT / Ctrl-C
    Interrupt,
    /// SIGTERM (falls back to Ctrl-C off unix)
    Terminate,
}

impl ShutdownSignal {
    fn listen(self) -> Result<BoxFuture<'static, ()>, AppError> {
        match self {
            ShutdownSignal::Interrupt => Ok(Box::pin(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!("Failed to listen for ctrl-c: {}", e);
                    future::pending::<()>().await;
                }
            })),
            #[cfg(unix)]
            ShutdownSignal::Terminate => {
                use tokio::signal::unix::{signal, SignalKind};

                let mut stream = signal(SignalKind::terminate()).map_err(|e| {
                    AppError::Internal(format!("failed to install SIGTERM handler: {}", e))
                })?;
                Ok(Box::pin(async move {
                    stream.recv().await;
                }))
            }
            #[cfg(not(unix))]
            ShutdownSignal::Terminate => ShutdownSignal::Interrupt.listen(),
        }
    }
}

/// Outcome of a drain
#[derive(Debug, Clone, Default)]
pub struct ShutdownReport {
    /// Number of callbacks run
    pub executed: usize,
    /// Rendered failures, one per failed or panicked callback
    pub failures: Vec<String>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Default)]
struct Pending {
    funcs: Vec<CloseFn>,
    draining: bool,
}

pub struct Closer {
    pending: Mutex<Pending>,
    /// `Some` once the drain task has finished every callback.
    done: Arc<watch::Sender<Option<ShutdownReport>>>,
}

impl Default for Closer {
    fn default() -> Self {
        Self::new()
    }
}

impl Closer {
    pub fn new() -> Self {
        let (done, _) = watch::channel(None);
        Self {
            pending: Mutex::new(Pending::default()),
            done: Arc::new(done),
        }
    }

    /// Creates a closer that runs [`Closer::close_all`] on the first of
    /// `signals`. Must be called inside a tokio runtime.
    pub fn with_signals(signals: &[ShutdownSignal]) -> Result<Arc<Self>, AppError> {
        let closer = Arc::new(Self::new());
        spawn_signal_listener(closer.clone(), signals)?;
        Ok(closer)
    }

    /// Registers a close callback.
    pub fn add<F, Fut>(&self, f: F) -> Result<(), AppError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.add_all(vec![close_fn(f)])
    }

    pub fn add_all<I>(&self, funcs: I) -> Result<(), AppError>
    where
        I: IntoIterator<Item = CloseFn>,
    {
        let mut pending = self.pending.lock();
        if pending.draining {
            warn!("Shutdown already started, close callback rejected");
            return Err(AppError::ShutdownStarted);
        }
        pending.funcs.extend(funcs);
        Ok(())
    }

    /// Runs every registered callback once. Concurrent and later callers wait
    /// for that single run and get its report.
    ///
    /// The drain runs on its own task, so dropping a caller does not stop it.
    pub async fn close_all(&self) -> ShutdownReport {
        self.start_drain();
        self.report().await
    }

    /// Waits for the drain to finish without starting it.
    pub async fn wait(&self) {
        self.report().await;
    }

    pub fn is_closed(&self) -> bool {
        self.done.borrow().is_some()
    }

    fn start_drain(&self) {
        let funcs = {
            let mut pending = self.pending.lock();
            if pending.draining {
                return;
            }
            pending.draining = true;
            std::mem::take(&mut pending.funcs)
        };

        let done = self.done.clone();
        tokio::spawn(async move {
            let report = run_callbacks(funcs).await;
            done.send_replace(Some(report));
        });
    }

    async fn report(&self) -> ShutdownReport {
        let mut rx = self.done.subscribe();
        // The sender lives as long as `self`, so the channel never closes here.
        let report = match rx.wait_for(Option::is_some).await {
            Ok(report) => (*report).clone().unwrap_or_default(),
            Err(_) => ShutdownReport::default(),
        };
        report
    }
}

async fn run_callbacks(funcs: Vec<CloseFn>) -> ShutdownReport {
    info!("Running {} close callbacks", funcs.len());

    let handles = funcs
        .into_iter()
        .map(|f| tokio::spawn(async move { f().await }))
        .collect::<Vec<_>>();

    let mut report = ShutdownReport {
        executed: handles.len(),
        failures: Vec::new(),
    };

    for joined in future::join_all(handles).await {
        let failure = match joined {
            Ok(Ok(())) => continue,
            Ok(Err(e)) => AppError::ShutdownCallbackFailed(format!("{:#}", e)),
            Err(join_err) if join_err.is_panic() => AppError::ShutdownCallbackFailed(format!(
                "panicked: {}",
                panic_message(join_err.into_panic())
            )),
            Err(join_err) => AppError::ShutdownCallbackFailed(join_err.to_string()),
        };
        error!("{}", failure);
        report.failures.push(failure.to_string());
    }

    info!(
        "Close callbacks finished ({} failed)",
        report.failures.len()
    );
    report
}

/// Triggers `closer.close_all()` on the first of `signals`, then drops every
/// signal listener.
pub fn spawn_signal_listener<C>(closer: C, signals: &[ShutdownSignal]) -> Result<(), AppError>
where
    C: Deref<Target = Closer> + Send + 'static,
{
    if signals.is_empty() {
        return Ok(());
    }

    let listeners = signals
        .iter()
        .map(|signal| signal.listen())
        .collect::<Result<Vec<_>, _>>()?;

    spawn_shutdown_trigger(closer, async move {
        let _ = future::select_all(listeners).await;
        info!("Shutdown signal received");
    });
    Ok(())
}

/// Runs `closer.close_all()` once `trigger` resolves.
pub fn spawn_shutdown_trigger<C, F>(closer: C, trigger: F)
where
    C: Deref<Target = Closer> + Send + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        trigger.await;
        closer.close_all().await;
    });
}

static GLOBAL_CLOSER: OnceLock<Closer> = OnceLock::new();

/// Process-wide closer
pub fn global() -> &'static Closer {
    GLOBAL_CLOSER.get_or_init(Closer::new)
}

/// Hooks the global closer up to OS signals.
pub fn listen_global(signals: &[ShutdownSignal]) -> Result<(), AppError> {
    spawn_signal_listener(global(), signals)
}

pub fn add<F, Fut>(f: F) -> Result<(), AppError>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    global().add(f)
}

pub async fn close_all() -> ShutdownReport {
    global().close_all().await
}

pub async fn wait() {
    global().wait().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_close_all_without_callbacks() {
        let closer = Closer::new();
        assert!(!closer.is_closed());

        let report = closer.close_all().await;
        assert_eq!(report.executed, 0);
        assert!(report.is_clean());
        assert!(closer.is_closed());
        closer.wait().await;
    }

    #[tokio::test]
    async fn test_registration_rejected_after_close() {
        let closer = Closer::new();
        closer.close_all().await;

        let err = closer.add(|| async { Ok(()) }).unwrap_err();
        assert!(matches!(err, AppError::ShutdownStarted));
    }
}
