//! Query context propagation for correlation IDs.
//!
//! Every aggregator operation runs inside a [`QueryContext`] so that log
//! lines from concurrently running adapters can be tied back to the query
//! that spawned them. Spawned tasks do not inherit task-locals; callers
//! re-scope with [`current_context`] before spawning.

use std::cell::RefCell;
use std::future::Future;
use uuid::Uuid;

/// Per-query context with correlation ID.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryContext {
    request_id: String,
    operation: &'static str,
}

impl QueryContext {
    /// Creates a context with a generated ID.
    #[must_use]
    pub fn new(operation: &'static str) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            operation,
        }
    }

    /// Creates a context with an existing request ID.
    #[must_use]
    pub fn from_id(request_id: impl Into<String>, operation: &'static str) -> Self {
        Self {
            request_id: request_id.into(),
            operation,
        }
    }

    /// Returns the request ID.
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Returns the aggregator operation this query belongs to.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        self.operation
    }
}

tokio::task_local! {
    static TASK_CONTEXT: QueryContext;
}

thread_local! {
    static THREAD_CONTEXT: RefCell<Option<QueryContext>> = const { RefCell::new(None) };
}

/// Guard that restores the previous thread-local context on drop.
pub struct QueryContextGuard {
    previous: Option<QueryContext>,
}

impl Drop for QueryContextGuard {
    fn drop(&mut self) {
        THREAD_CONTEXT.with(|slot| {
            *slot.borrow_mut() = self.previous.take();
        });
    }
}

/// Enters a query context for synchronous flows, such as blocking-pool work.
#[must_use]
pub fn enter_query_context(context: QueryContext) -> QueryContextGuard {
    let previous = THREAD_CONTEXT.with(|slot| slot.borrow_mut().replace(context));
    QueryContextGuard { previous }
}

/// Scopes a query context across an async future.
pub async fn scope_query_context<F, T>(context: QueryContext, fut: F) -> T
where
    F: Future<Output = T>,
{
    TASK_CONTEXT.scope(context, fut).await
}

/// Returns the current context, if any.
#[must_use]
pub fn current_context() -> Option<QueryContext> {
    if let Ok(ctx) = TASK_CONTEXT.try_with(Clone::clone) {
        return Some(ctx);
    }
    THREAD_CONTEXT.with(|slot| slot.borrow().clone())
}

/// Returns the current request ID, if set.
#[must_use]
pub fn current_request_id() -> Option<String> {
    current_context().map(|ctx| ctx.request_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_context_guard_restores_previous() {
        assert!(current_request_id().is_none());
        {
            let _guard = enter_query_context(QueryContext::from_id("thread-test", "search"));
            assert_eq!(current_request_id().as_deref(), Some("thread-test"));
        }
        assert!(current_request_id().is_none());
    }

    #[tokio::test]
    async fn test_scope_propagates_across_await() {
        let context = QueryContext::from_id("async-test", "search");
        let observed = scope_query_context(context, async {
            tokio::task::yield_now().await;
            current_context()
        })
        .await
        .unwrap();
        assert_eq!(observed.request_id(), "async-test");
        assert_eq!(observed.operation(), "search");
    }

    #[tokio::test]
    async fn test_spawned_task_needs_rescoping() {
        let context = QueryContext::from_id("parent", "health");
        scope_query_context(context, async {
            let bare = tokio::spawn(async { current_request_id() }).await.unwrap();
            assert!(bare.is_none());

            let inherited = current_context().unwrap();
            let scoped = tokio::spawn(scope_query_context(inherited, async {
                current_request_id()
            }))
            .await
            .unwrap();
            assert_eq!(scoped.as_deref(), Some("parent"));
        })
        .await;
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(
            QueryContext::new("search").request_id(),
            QueryContext::new("search").request_id()
        );
    }
}
