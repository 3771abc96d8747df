//! Function-level, disk-backed memoization
//!
//! This crate persists the results of expensive computations so that calls
//! with equivalent arguments — across process restarts and across worker
//! processes sharing one cache directory — return the stored result instead
//! of recomputing it. It targets batch pipelines where a single call costs
//! seconds to hours.
//!
//! # Overview
//!
//! Every cached call composes three pieces:
//! - Key derivation: actual arguments are bound against the computation's
//!   declared parameter list (defaults applied) and filtered by a key
//!   policy into an ordered list of `(name, value)` pairs.
//! - Key encoding: the pairs become path segments, either literally
//!   (`name_value`) or as a single collision-resistant digest.
//! - The result store: reads an entry whose completion marker is durable,
//!   or runs the computation and persists data-then-marker through atomic
//!   renames, so crashes and concurrent writers never leave a trusted but
//!   wrong entry behind.
//!
//! # Usage
//!
//! ```no_run
//! use memo_cache::{
//!     CacheConfig, CallArgs, KeyPolicy, Memoized, Parameter, ParameterBinding,
//!     ResultStore, Signature,
//! };
//!
//! # fn main() -> memo_cache::Result<()> {
//! let signature = Signature::new(vec![
//!     Parameter::required("x"),
//!     Parameter::required("y"),
//!     Parameter::with_default("verbose", false),
//! ])?;
//! let add = Memoized::new("add", signature, |binding: &ParameterBinding| -> memo_cache::Result<i64> {
//!     let term = |name: &str| binding.get(name).and_then(|v| v.as_i64()).unwrap_or(0);
//!     Ok(term("x") + term("y"))
//! })
//! .with_policy(KeyPolicy::new().exclude("verbose"))
//! .with_store(ResultStore::new(CacheConfig::discover()?));
//!
//! let sum = add.call(&CallArgs::new().arg(1).arg(2))?; // computes
//! let same = add.call(&CallArgs::new().named("y", 2).named("x", 1))?; // cache hit
//! assert_eq!(sum, same);
//! # Ok(())
//! # }
//! ```
//!
//! The store never evicts, expires, or invalidates entries; deleting them is
//! an external concern.

mod error;

pub mod computation;
pub mod config;
pub mod encode;
pub mod key;
pub mod store;

// Re-export error types at crate root
pub use error::{Error, Result};

// Re-export main types
pub use computation::{Computation, Memoized};
pub use config::CacheConfig;
pub use encode::{KeyEncoding, encode_key};
pub use key::{
    CacheKey, CallArgs, KeyPolicy, Parameter, ParameterBinding, Signature, stringify,
};
pub use store::{DATA_FILE, EntryState, MARKER_FILE, ResultStore};
