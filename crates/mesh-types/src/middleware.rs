//! Classic `(ctx, next)` middleware chain.
//!
//! Middleware run in insertion order; each decides whether and how to call
//! `next`. The chain past the last middleware resolves to `R::default()`.

use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use crate::plugin::Plugin;

/// Continuation handed to a middleware.
pub type Next<C, R> = Arc<dyn Fn(C) -> BoxFuture<'static, R> + Send + Sync>;

pub type Middleware<C, R> = Arc<dyn Fn(C, Next<C, R>) -> BoxFuture<'static, R> + Send + Sync>;

/// Box an async closure as a [`Middleware`].
pub fn middleware_fn<C, R, F, Fut>(f: F) -> Middleware<C, R>
where
    C: 'static,
    R: 'static,
    F: Fn(C, Next<C, R>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
{
    Arc::new(move |ctx: C, next: Next<C, R>| -> BoxFuture<'static, R> {
        Box::pin(f(ctx, next))
    })
}

pub struct MiddlewareChain<C, R> {
    name: String,
    middleware: RwLock<Vec<Middleware<C, R>>>,
    entry: RwLock<Next<C, R>>,
}

impl<C, R> MiddlewareChain<C, R>
where
    C: Send + 'static,
    R: Default + Send + 'static,
{
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_middleware(name, Vec::new())
    }

    pub fn with_middleware(name: impl Into<String>, middleware: Vec<Middleware<C, R>>) -> Self {
        let entry = compose(&middleware);
        Self {
            name: name.into(),
            middleware: RwLock::new(middleware),
            entry: RwLock::new(entry),
        }
    }

    /// Append a middleware and rebuild the entry point.
    ///
    /// Runs already in flight keep the chain they started with.
    pub fn add(&self, middleware: Middleware<C, R>) {
        let mut chain = self.middleware.write();
        chain.push(middleware);
        *self.entry.write() = compose(&chain);
    }

    pub fn len(&self) -> usize {
        self.middleware.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current entry point of the chain.
    pub fn entry(&self) -> Next<C, R> {
        Arc::clone(&self.entry.read())
    }

    pub async fn run(&self, ctx: C) -> R {
        let entry = self.entry();
        entry(ctx).await
    }
}

fn compose<C, R>(middleware: &[Middleware<C, R>]) -> Next<C, R>
where
    C: Send + 'static,
    R: Default + Send + 'static,
{
    let terminal: Next<C, R> =
        Arc::new(|_ctx: C| -> BoxFuture<'static, R> { Box::pin(async { R::default() }) });

    middleware.iter().rev().fold(terminal, |next, mw| {
        let mw = Arc::clone(mw);
        let wrapped: Next<C, R> = Arc::new(move |ctx: C| mw(ctx, Arc::clone(&next)));
        wrapped
    })
}

#[async_trait]
impl<C, R> Plugin for MiddlewareChain<C, R>
where
    C: Send + 'static,
    R: Default + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
