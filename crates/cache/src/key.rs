//! Parameter binding and cache-key derivation
//!
//! A computation declares its parameters once as a [`Signature`]; each call
//! supplies a [`CallArgs`] mix of positional and named values. Binding merges
//! the two with declared defaults into a [`ParameterBinding`] ordered by the
//! declaration, so a call's cache identity never depends on call-site
//! argument style. A [`KeyPolicy`] then filters the binding down to the
//! [`CacheKey`] that identifies the entry on disk.

use crate::{Error, Result};
use serde_json::Value;

/// One declared parameter of a computation.
#[derive(Debug, Clone)]
pub struct Parameter {
    name: String,
    default: Option<Value>,
}

impl Parameter {
    /// Declare a parameter the caller must always supply.
    #[must_use]
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
        }
    }

    /// Declare a parameter with a default value.
    #[must_use]
    pub fn with_default(name: impl Into<String>, default: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            default: Some(default.into()),
        }
    }

    /// Parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared default value, if any.
    #[must_use]
    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }
}

/// The declared parameter list of a computation, in declaration order.
#[derive(Debug, Clone)]
pub struct Signature {
    params: Vec<Parameter>,
}

impl Signature {
    /// Build a signature from parameters in declaration order.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if two parameters share a name.
    pub fn new(params: Vec<Parameter>) -> Result<Self> {
        for (i, param) in params.iter().enumerate() {
            if params[..i].iter().any(|p| p.name == param.name) {
                return Err(Error::configuration(format!(
                    "duplicate parameter `{}` in signature",
                    param.name
                )));
            }
        }
        Ok(Self { params })
    }

    /// Declared parameters in declaration order.
    #[must_use]
    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    /// Look up a declared parameter by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Bind a call's arguments against this signature, applying defaults.
    ///
    /// Positional arguments fill declared parameters left to right; named
    /// arguments fill the remainder. The resulting binding holds every
    /// declared parameter exactly once, in declaration order.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for excess positional arguments, an
    /// unknown or doubly assigned name, or a missing required parameter.
    /// These are caller mistakes, raised before any computation or I/O.
    pub fn bind(&self, args: &CallArgs) -> Result<ParameterBinding> {
        if args.positional.len() > self.params.len() {
            return Err(Error::configuration(format!(
                "too many positional arguments: got {}, signature declares {}",
                args.positional.len(),
                self.params.len()
            )));
        }

        let mut slots: Vec<Option<Value>> = vec![None; self.params.len()];
        for (slot, value) in slots.iter_mut().zip(&args.positional) {
            *slot = Some(value.clone());
        }
        for (name, value) in &args.named {
            let index = self
                .params
                .iter()
                .position(|p| &p.name == name)
                .ok_or_else(|| {
                    Error::configuration(format!("unknown argument `{name}`"))
                })?;
            if slots[index].is_some() {
                return Err(Error::configuration(format!(
                    "argument `{name}` assigned more than once"
                )));
            }
            slots[index] = Some(value.clone());
        }

        let mut pairs = Vec::with_capacity(self.params.len());
        for (param, slot) in self.params.iter().zip(slots) {
            let value = match slot {
                Some(value) => value,
                None => param.default.clone().ok_or_else(|| {
                    Error::configuration(format!(
                        "missing required argument `{}`",
                        param.name
                    ))
                })?,
            };
            pairs.push((param.name.clone(), value));
        }
        Ok(ParameterBinding { pairs })
    }
}

/// Arguments for one call, positional and named.
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    positional: Vec<Value>,
    named: Vec<(String, Value)>,
}

impl CallArgs {
    /// Empty argument list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    #[must_use]
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Append a named argument.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.named.push((name.into(), value.into()));
        self
    }
}

/// Every declared parameter bound to a value, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterBinding {
    pairs: Vec<(String, Value)>,
}

impl ParameterBinding {
    /// Bound `(name, value)` pairs in declaration order.
    #[must_use]
    pub fn pairs(&self) -> &[(String, Value)] {
        &self.pairs
    }

    /// Bound value of a parameter.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.pairs
            .iter()
            .find_map(|(n, v)| (n == name).then_some(v))
    }
}

/// Which bound parameters contribute to the cache key.
///
/// Two mutually exclusive modes: exclusion (drop the named parameters,
/// optionally only while they hold their declared default) or inclusion
/// (the named parameters alone constitute the key). Supplying both modes,
/// or naming a parameter the signature does not declare, is a configuration
/// error caught before the computation runs.
#[derive(Debug, Clone, Default)]
pub struct KeyPolicy {
    exclude: Vec<String>,
    exclude_if_default: Vec<String>,
    include: Option<Vec<String>>,
}

impl KeyPolicy {
    /// Policy that keys on every bound parameter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop a parameter from the key regardless of its value.
    ///
    /// Typical for parameters that cannot affect the result, such as a
    /// worker count or a verbosity flag.
    #[must_use]
    pub fn exclude(mut self, name: impl Into<String>) -> Self {
        self.exclude.push(name.into());
        self
    }

    /// Drop a parameter from the key only while its bound value equals its
    /// declared default — whether the caller omitted it or passed the
    /// default explicitly.
    ///
    /// This keeps the keys of old entries valid when a computation grows a
    /// new optional parameter.
    #[must_use]
    pub fn exclude_if_default(mut self, name: impl Into<String>) -> Self {
        self.exclude_if_default.push(name.into());
        self
    }

    /// Key on this parameter alone (with any others passed to `include`);
    /// everything else is ignored regardless of value.
    #[must_use]
    pub fn include(mut self, name: impl Into<String>) -> Self {
        self.include.get_or_insert_with(Vec::new).push(name.into());
        self
    }

    /// Check this policy against a signature.
    ///
    /// Runs on every call: it is cheap, and a policy edited after the
    /// computation was registered is still caught.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when inclusion and exclusion modes are
    /// combined, or when a policy field names a parameter the signature does
    /// not declare.
    pub fn validate(&self, signature: &Signature) -> Result<()> {
        if self.include.is_some()
            && (!self.exclude.is_empty() || !self.exclude_if_default.is_empty())
        {
            return Err(Error::configuration(
                "inclusion and exclusion key policies are mutually exclusive; \
                 supply `include` or `exclude`/`exclude_if_default`, not both",
            ));
        }
        let fields = [
            ("exclude", &self.exclude),
            ("exclude_if_default", &self.exclude_if_default),
        ];
        for (field, names) in fields {
            for name in names {
                if signature.get(name).is_none() {
                    return Err(Error::configuration(format!(
                        "`{name}` is not a parameter of the computation; \
                         fix the names in `{field}`"
                    )));
                }
            }
        }
        if let Some(include) = &self.include {
            for name in include {
                if signature.get(name).is_none() {
                    return Err(Error::configuration(format!(
                        "`{name}` is not a parameter of the computation; \
                         fix the names in `include`"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Filter a binding down to the pairs that identify the cache entry.
    ///
    /// Output order is the signature's declaration order. The policy must
    /// have been validated against the same signature first.
    #[must_use]
    pub fn derive_key(&self, binding: &ParameterBinding, signature: &Signature) -> CacheKey {
        let pairs = binding
            .pairs()
            .iter()
            .filter(|(name, value)| !self.drops(name, value, signature))
            .map(|(name, value)| (name.clone(), stringify(value)))
            .collect();
        CacheKey { pairs }
    }

    fn drops(&self, name: &str, value: &Value, signature: &Signature) -> bool {
        if let Some(include) = &self.include {
            return !include.iter().any(|n| n == name);
        }
        if self.exclude.iter().any(|n| n == name) {
            return true;
        }
        if self.exclude_if_default.iter().any(|n| n == name)
            && let Some(default) = signature.get(name).and_then(Parameter::default)
        {
            // Equality is textual, the same relation that defines key
            // equivalence: an explicitly passed default and an omitted
            // parameter land on the same entry.
            return stringify(default) == stringify(value);
        }
        false
    }
}

/// The ordered `(name, stringified value)` pairs identifying one cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    pairs: Vec<(String, String)>,
}

impl CacheKey {
    /// Surviving pairs in declaration order.
    #[must_use]
    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }
}

/// Stringify an argument value for keys and path segments.
///
/// Strings render as their raw contents, every other value as its compact
/// JSON encoding. This one rendering defines key equivalence, the
/// exclude-if-default comparison, and literal path segments.
#[must_use]
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
