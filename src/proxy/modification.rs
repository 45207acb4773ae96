//! The single extension point of the pipeline.

use std::future::ready;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::error::ModificationError;
use crate::proxy::chain::ProxyChain;

/// One step of a request or response stage.
///
/// Header tweaks and whole-body rewrites implement the same method, so the
/// chain runs them uniformly. Constructors may validate or precompute, but
/// the chain is only touched when `apply` runs.
///
/// Plain closures `Fn(&mut ProxyChain) -> Result<(), ModificationError>`
/// implement this trait directly. Modifications that need to await
/// implement it on a struct and return a boxed future.
pub trait Modification: Send + Sync {
    fn apply<'a>(&'a self, chain: &'a mut ProxyChain) -> BoxFuture<'a, Result<(), ModificationError>>;
}

impl<F> Modification for F
where
    F: Fn(&mut ProxyChain) -> Result<(), ModificationError> + Send + Sync,
{
    fn apply<'a>(&'a self, chain: &'a mut ProxyChain) -> BoxFuture<'a, Result<(), ModificationError>> {
        Box::pin(ready(self(chain)))
    }
}

/// Shared handle to a modification; the same instance may be queued many
/// times and runs once per queue entry.
pub type ModificationRef = Arc<dyn Modification>;

/// Wraps a synchronous closure.
pub fn modification<F>(f: F) -> ModificationRef
where
    F: Fn(&mut ProxyChain) -> Result<(), ModificationError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wraps an async closure that receives the chain for the duration of the
/// returned future.
pub fn async_modification<F>(f: F) -> ModificationRef
where
    F: for<'a> Fn(&'a mut ProxyChain) -> BoxFuture<'a, Result<(), ModificationError>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(AsyncFn(f))
}

struct AsyncFn<F>(F);

impl<F> Modification for AsyncFn<F>
where
    F: for<'a> Fn(&'a mut ProxyChain) -> BoxFuture<'a, Result<(), ModificationError>> + Send + Sync,
{
    fn apply<'a>(&'a self, chain: &'a mut ProxyChain) -> BoxFuture<'a, Result<(), ModificationError>> {
        (self.0)(chain)
    }
}

/// Runs `mods` in order, stopping at the first failure.
///
/// Composes several modifications into one queue entry.
pub fn sequence(mods: Vec<ModificationRef>) -> ModificationRef {
    async_modification(move |chain| {
        let mods = mods.clone();
        Box::pin(async move {
            for m in &mods {
                m.apply(chain).await?;
            }
            Ok(())
        })
    })
}

