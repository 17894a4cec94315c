//! Deferred values.
//!
//! A [`Deferred`] stands for a value that is only known once the provisioning
//! engine has created some resource (a generated password, the name of a
//! release). Composition code derives new values with [`Deferred::map`],
//! [`Deferred::zip`] and [`Deferred::combine`] and never inspects the value
//! itself. Only the engine awaits [`Deferred::resolve`].
//!
//! Every derived value is computed at most once, however many consumers hold
//! a clone of it.

use futures::channel::oneshot;
use futures::future::{self, BoxFuture, FutureExt, Shared};
use std::fmt;
use std::future::Future;
use thiserror::Error;

/// A deferred value was dropped by its producer without being resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("deferred value '{label}' was never resolved")]
pub struct Unresolved {
    label: String,
}

impl Unresolved {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

type SharedResult<T> = Shared<BoxFuture<'static, Result<T, Unresolved>>>;

/// A value that will be produced later by the provisioning engine.
pub struct Deferred<T> {
    future: SharedResult<T>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            future: self.future.clone(),
        }
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Deferred(..)")
    }
}

impl<T: Clone + Send + Sync + 'static> Deferred<T> {
    /// A deferred value that is already known.
    pub fn known(value: T) -> Self {
        Self::from_future(future::ready(Ok(value)))
    }

    /// A deferred value and the [`Resolver`] the engine uses to supply it.
    ///
    /// If the resolver is dropped unused, the value and everything derived
    /// from it fail with [`Unresolved`] carrying `label`.
    pub fn pending(label: impl Into<String>) -> (Self, Resolver<T>) {
        let (sender, receiver) = oneshot::channel();
        let label = label.into();
        let future = receiver.map(move |value| value.map_err(|_| Unresolved::new(label)));
        (Self::from_future(future), Resolver { sender })
    }

    fn from_future<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, Unresolved>> + Send + 'static,
    {
        Self {
            future: future.boxed().shared(),
        }
    }

    pub fn map<U, F>(&self, f: F) -> Deferred<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        Deferred::from_future(self.future.clone().map(move |value| value.map(f)))
    }

    /// Like [`Deferred::map`], for derivations that can fail once the value is known.
    pub fn try_map<U, F>(&self, f: F) -> Deferred<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> Result<U, Unresolved> + Send + 'static,
    {
        Deferred::from_future(self.future.clone().map(move |value| value.and_then(f)))
    }

    /// Pair this value with another one.
    pub fn zip<U>(&self, other: &Deferred<U>) -> Deferred<(T, U)>
    where
        U: Clone + Send + Sync + 'static,
    {
        let joined = future::join(self.future.clone(), other.future.clone());
        Deferred::from_future(
            joined.map(|(left, right)| left.and_then(|left| right.map(|right| (left, right)))),
        )
    }

    /// Collect many deferred values, keeping their order.
    pub fn all<I>(items: I) -> Deferred<Vec<T>>
    where
        I: IntoIterator<Item = Deferred<T>>,
    {
        let pending: Vec<_> = items.into_iter().map(|item| item.future).collect();
        Deferred::from_future(
            future::join_all(pending).map(|values| values.into_iter().collect()),
        )
    }

    /// Combine many deferred values into one with `f`.
    pub fn combine<I, U, F>(items: I, f: F) -> Deferred<U>
    where
        I: IntoIterator<Item = Deferred<T>>,
        U: Clone + Send + Sync + 'static,
        F: FnOnce(Vec<T>) -> U + Send + 'static,
    {
        Self::all(items).map(f)
    }

    /// The value if it is available without waiting. Meant for reporting.
    pub fn peek(&self) -> Option<T> {
        self.future.clone().now_or_never().and_then(Result::ok)
    }

    /// Wait for the value. Only the provisioning engine should call this.
    pub async fn resolve(self) -> Result<T, Unresolved> {
        self.future.await
    }
}

impl<T: Clone + Send + Sync + 'static> From<T> for Deferred<T> {
    fn from(value: T) -> Self {
        Self::known(value)
    }
}

impl From<&str> for Deferred<String> {
    fn from(value: &str) -> Self {
        Self::known(value.to_string())
    }
}

/// Supplies the value of a [`Deferred`] created with [`Deferred::pending`].
pub struct Resolver<T> {
    sender: oneshot::Sender<T>,
}

impl<T> Resolver<T> {
    pub fn resolve(self, value: T) {
        // Nobody waiting on the value is not an error for the producer.
        let _ = self.sender.send(value);
    }
}

impl<T> fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Resolver(..)")
    }
}
