//! Ambient audit attribution for the current task.
//!
//! A request handler wraps its work in [`scope`] (or [`with_actor`]) and every
//! record appended inside picks up the actor, request id, and remote address
//! without threading them through each call. The context lives in a tokio
//! task-local: it does not leak across concurrent requests, and tasks spawned
//! with `tokio::spawn` start without one. Forward it explicitly:
//!
//! ```no_run
//! # async fn demo() {
//! use chron_db::context;
//!
//! let ctx = context::current().unwrap_or_default();
//! tokio::spawn(context::scope(ctx, async {
//!     // appends here keep the parent's attribution
//! }));
//! # }
//! ```

use std::future::Future;

use chron_core::actor::Actor;
use chron_core::ids;

tokio::task_local! {
    static AMBIENT: AuditContext;
}

/// Attribution applied to appends that do not set their own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditContext {
    pub actor: Option<Actor>,
    pub request_id: Option<String>,
    pub remote_address: Option<String>,
    /// Appends inside a suppressed context are not recorded.
    pub suppressed: bool,
}

impl AuditContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn actor(mut self, actor: impl Into<Actor>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    #[must_use]
    pub fn request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    #[must_use]
    pub fn remote_address(mut self, remote_address: impl Into<String>) -> Self {
        self.remote_address = Some(remote_address.into());
        self
    }

    #[must_use]
    pub const fn suppressed(mut self) -> Self {
        self.suppressed = true;
        self
    }

    /// Fields set here win; unset fields fall back to `outer`.
    /// Suppression is sticky: an inner scope cannot lift an outer one.
    #[must_use]
    pub fn layered_over(self, outer: &Self) -> Self {
        Self {
            actor: self.actor.or_else(|| outer.actor.clone()),
            request_id: self.request_id.or_else(|| outer.request_id.clone()),
            remote_address: self.remote_address.or_else(|| outer.remote_address.clone()),
            suppressed: self.suppressed || outer.suppressed,
        }
    }
}

/// Snapshot of the ambient context, or `None` outside any scope.
#[must_use]
pub fn current() -> Option<AuditContext> {
    AMBIENT.try_with(Clone::clone).ok()
}

/// Whether appends from the current task are suppressed.
#[must_use]
pub fn is_suppressed() -> bool {
    AMBIENT.try_with(|ctx| ctx.suppressed).unwrap_or(false)
}

fn enter(ctx: AuditContext) -> AuditContext {
    match current() {
        Some(outer) => ctx.layered_over(&outer),
        None => {
            let mut ctx = ctx;
            if ctx.request_id.is_none() {
                ctx.request_id = Some(ids::request_token());
            }
            ctx
        }
    }
}

/// Run `fut` with `ctx` layered over the enclosing context.
///
/// A top-level scope without a request id mints one, so every record
/// appended within it shares one correlation token.
pub async fn scope<F: Future>(ctx: AuditContext, fut: F) -> F::Output {
    AMBIENT.scope(enter(ctx), fut).await
}

/// Attribute every append inside `fut` to `actor`.
///
/// The previous actor is back in effect once `fut` completes, returns an
/// error, panics, or is dropped.
pub async fn with_actor<A, F>(actor: A, fut: F) -> F::Output
where
    A: Into<Actor>,
    F: Future,
{
    scope(AuditContext::new().actor(actor), fut).await
}

/// Synchronous form of [`with_actor`].
pub fn with_actor_sync<A, R>(actor: A, f: impl FnOnce() -> R) -> R
where
    A: Into<Actor>,
{
    AMBIENT.sync_scope(enter(AuditContext::new().actor(actor)), f)
}

/// Run `fut` with auditing suppressed: appends return `Suppressed`.
pub async fn without_auditing<F: Future>(fut: F) -> F::Output {
    scope(AuditContext::new().suppressed(), fut).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn no_context_outside_scope() {
        assert!(current().is_none());
        assert!(!is_suppressed());
    }

    #[tokio::test]
    async fn with_actor_sets_and_restores() {
        with_actor("alice", async {
            assert_eq!(current().unwrap().actor, Some(Actor::named("alice")));
            with_actor("bob", async {
                assert_eq!(current().unwrap().actor, Some(Actor::named("bob")));
            })
            .await;
            assert_eq!(current().unwrap().actor, Some(Actor::named("alice")));
        })
        .await;
        assert!(current().is_none());
    }

    #[tokio::test]
    async fn top_level_scope_mints_one_request_id() {
        with_actor("alice", async {
            let outer = current().unwrap().request_id.unwrap();
            assert!(outer.starts_with("req-"));
            let inner = with_actor("bob", async { current().unwrap().request_id }).await;
            assert_eq!(inner.as_deref(), Some(outer.as_str()));
        })
        .await;
    }

    #[tokio::test]
    async fn explicit_request_id_is_kept() {
        let ctx = AuditContext::new().request_id("req-fixed");
        let seen = scope(ctx, async { current().unwrap().request_id }).await;
        assert_eq!(seen.as_deref(), Some("req-fixed"));
    }

    #[tokio::test]
    async fn suppression_is_sticky() {
        without_auditing(async {
            assert!(is_suppressed());
            with_actor("alice", async { assert!(is_suppressed()) }).await;
        })
        .await;
        assert!(!is_suppressed());
    }

    #[tokio::test]
    async fn restored_after_error() {
        let result: Result<(), &str> = with_actor("alice", async { Err("boom") }).await;
        assert!(result.is_err());
        assert!(current().is_none());
    }

    #[test]
    fn sync_scope_restores() {
        let seen = with_actor_sync("carol", || current().and_then(|c| c.actor));
        assert_eq!(seen, Some(Actor::named("carol")));
        assert!(current().is_none());
    }

    #[test]
    fn sync_scope_restores_after_panic() {
        let result = std::panic::catch_unwind(|| with_actor_sync("dave", || panic!("fail")));
        assert!(result.is_err());
        assert!(current().is_none());
    }

    #[tokio::test]
    async fn spawned_tasks_do_not_inherit() {
        let handle = with_actor("alice", async { tokio::spawn(async { current() }) }).await;
        assert!(handle.await.unwrap().is_none());
    }

    #[tokio::test]
    async fn explicit_forwarding_into_spawned_task() {
        let handle = with_actor("alice", async {
            let ctx = current().unwrap_or_default();
            tokio::spawn(scope(ctx, async { current().and_then(|c| c.actor) }))
        })
        .await;
        assert_eq!(handle.await.unwrap(), Some(Actor::named("alice")));
    }
}
