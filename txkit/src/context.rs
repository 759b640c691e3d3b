//! Request-scoped execution context.
//!
//! A [`Context`] is never mutated: every `with_*` call returns a new, derived
//! context. Values attached to a context are visible to it and to everything
//! derived from it, never to its ancestors or siblings. Cancellation flows the
//! same way, from parent to children.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a context stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Canceled,
    DeadlineExceeded,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Canceled => write!(f, "context canceled"),
            CancelReason::DeadlineExceeded => write!(f, "context deadline exceeded"),
        }
    }
}

struct ValueNode {
    key: TypeId,
    value: Arc<dyn Any + Send + Sync>,
    parent: Option<Arc<ValueNode>>,
}

#[derive(Clone)]
pub struct Context {
    values: Option<Arc<ValueNode>>,
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// Root context: never canceled, no deadline, no values.
    pub fn background() -> Self {
        Self {
            values: None,
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Derives a context carrying `value`. A later value of the same type
    /// shadows earlier ones for this context and its descendants.
    pub fn with_value<T: Any + Send + Sync>(&self, value: T) -> Self {
        Self {
            values: Some(Arc::new(ValueNode {
                key: TypeId::of::<T>(),
                value: Arc::new(value),
                parent: self.values.clone(),
            })),
            token: self.token.clone(),
            deadline: self.deadline,
        }
    }

    /// Nearest value of type `T` in this context's lineage.
    pub fn value<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let key = TypeId::of::<T>();
        let mut node = self.values.as_ref();
        while let Some(current) = node {
            if current.key == key {
                return current.value.clone().downcast::<T>().ok();
            }
            node = current.parent.as_ref();
        }
        None
    }

    /// Derives a cancelable context. Canceling the returned token cancels the
    /// new context and its descendants, but not `self`.
    pub fn with_cancel(&self) -> (Self, CancellationToken) {
        let token = self.token.child_token();
        let ctx = Self {
            values: self.values.clone(),
            token: token.clone(),
            deadline: self.deadline,
        };
        (ctx, token)
    }

    /// Derives a context that expires at `deadline`, or at the parent's
    /// deadline if that comes first.
    pub fn with_deadline(&self, deadline: Instant) -> (Self, CancellationToken) {
        let (mut ctx, token) = self.with_cancel();
        ctx.deadline = Some(match self.deadline {
            Some(parent) if parent < deadline => parent,
            _ => deadline,
        });
        (ctx, token)
    }

    pub fn with_timeout(&self, timeout: Duration) -> (Self, CancellationToken) {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Non-blocking check; `None` while the context is still live.
    pub fn err(&self) -> Option<CancelReason> {
        if self.token.is_cancelled() {
            return Some(CancelReason::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(CancelReason::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context is canceled or its deadline passes.
    pub async fn done(&self) -> CancelReason {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => CancelReason::Canceled,
                    _ = tokio::time::sleep_until(deadline) => CancelReason::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                CancelReason::Canceled
            }
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("canceled", &self.token.is_cancelled())
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}
