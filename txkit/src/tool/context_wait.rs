//! Races an operation against context cancellation

use crate::context::Context;
use crate::tool::error::AppError;
use std::future::Future;
use tracing::debug;

/// Runs `operation` on its own task and returns its result, or the context's
/// cancellation reason if the context fires first.
///
/// An operation that loses the race keeps running detached; the caller does
/// not wait for it. A context that has already fired fails before dispatch.
pub async fn handle_error_with_context<T, F>(ctx: &Context, operation: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>> + Send + 'static,
    T: Send + 'static,
{
    if let Some(reason) = ctx.err() {
        return Err(AppError::Canceled(reason));
    }

    let handle = tokio::spawn(operation);

    tokio::select! {
        biased;

        joined = handle => match joined {
            Ok(result) => result,
            Err(join_err) if join_err.is_panic() => {
                Err(AppError::Panic(panic_message(join_err.into_panic())))
            }
            Err(join_err) => Err(AppError::Internal(join_err.to_string())),
        },
        reason = ctx.done() => {
            debug!("operation abandoned: {}", reason);
            Err(AppError::Canceled(reason))
        }
    }
}

/// Renders a panic payload the way `std` prints it.
pub fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
