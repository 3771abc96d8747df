//! The invoke-or-fetch wrapper around a computation
//!
//! [`Memoized`] holds everything that identifies a cached computation — its
//! name, declared parameters, and key policy — plus the computation itself
//! and, optionally, a [`ResultStore`]. Its one operation, [`Memoized::call`],
//! either fetches a persisted result or runs the computation and persists
//! the outcome. Without a store the wrapper is a plain pass-through.

use crate::Result;
use crate::key::{CallArgs, KeyPolicy, ParameterBinding, Signature};
use crate::store::ResultStore;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::PathBuf;

/// A unit of work whose results are worth persisting.
///
/// The single method receives the fully bound arguments; identity, declared
/// parameters, and key policy live on the [`Memoized`] wrapper. Implemented
/// for any `Fn(&ParameterBinding) -> Result<T>` closure.
pub trait Computation {
    /// Result type persisted by the store.
    type Output;

    /// Run the computation against bound arguments.
    ///
    /// # Errors
    ///
    /// Implementations surface their own failures; the wrapper propagates
    /// them unchanged and persists nothing.
    fn run(&self, binding: &ParameterBinding) -> Result<Self::Output>;
}

impl<T, F> Computation for F
where
    F: Fn(&ParameterBinding) -> Result<T>,
{
    type Output = T;

    fn run(&self, binding: &ParameterBinding) -> Result<T> {
        self(binding)
    }
}

/// A named computation bound to its parameter list, key policy, and
/// (optionally) a result store.
///
/// The name is the computation's identity within a cache root: two different
/// computations must never share one. It is fixed at construction.
pub struct Memoized<C> {
    name: String,
    signature: Signature,
    policy: KeyPolicy,
    store: Option<ResultStore>,
    computation: C,
}

impl<C: Computation> Memoized<C> {
    /// Wrap a computation under a stable name, keying on every parameter,
    /// without a store (pass-through until [`with_store`](Self::with_store)).
    #[must_use]
    pub fn new(name: impl Into<String>, signature: Signature, computation: C) -> Self {
        Self {
            name: name.into(),
            signature,
            policy: KeyPolicy::default(),
            store: None,
            computation,
        }
    }

    /// Set the key policy.
    #[must_use]
    pub fn with_policy(mut self, policy: KeyPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Attach a result store; calls are persisted from now on.
    #[must_use]
    pub fn with_store(mut self, store: ResultStore) -> Self {
        self.store = Some(store);
        self
    }

    /// The computation's stable name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Entry directory a call with `args` would use, or `None` in
    /// pass-through mode.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid policy or arguments
    /// that do not bind.
    pub fn entry_dir(&self, args: &CallArgs) -> Result<Option<PathBuf>> {
        self.policy.validate(&self.signature)?;
        let binding = self.signature.bind(args)?;
        Ok(self.store.as_ref().map(|store| {
            store.entry_dir(&self.name, &self.policy.derive_key(&binding, &self.signature))
        }))
    }

    /// Invoke-or-fetch: return the persisted result for these arguments, or
    /// run the computation and persist its result.
    ///
    /// Policy validation and argument binding happen first, on every call,
    /// before any computation or I/O.
    ///
    /// # Errors
    ///
    /// Configuration errors from the policy or binding, corruption and I/O
    /// errors from the store, and whatever the computation itself returns.
    pub fn call(&self, args: &CallArgs) -> Result<C::Output>
    where
        C::Output: Serialize + DeserializeOwned,
    {
        self.policy.validate(&self.signature)?;
        let binding = self.signature.bind(args)?;
        let Some(store) = &self.store else {
            return self.computation.run(&binding);
        };
        let key = self.policy.derive_key(&binding, &self.signature);
        store.get_or_compute(&self.name, &key, || self.computation.run(&binding))
    }
}
