//! Parameter primitives.
//!
//! Each template entry is a [`Parameter`]: either an [`InitParameter`],
//! evaluated once when the kernel object is built, or an
//! [`UpdateParameter`], evaluated at build time and re-evaluated whenever the
//! object is patched for a new context.
//!
//! Values are produced by an [`Evaluator`], a tagged variant rather than an
//! opaque callback so that resolution can inspect constants and references.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;

use super::{KernelContext, TypeIdLookupStrategy};
use crate::util::{Error, Result, Value};

bitflags! {
    /// Context changes an update parameter depends on.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
    pub struct ParamFlags: u8 {
        /// Varies with the spectral index.
        const SPECTRAL = 1 << 0;
        /// Varies with scene geometry (sensor placement, extents).
        const GEOMETRIC = 1 << 1;
        /// Every kind of change.
        const ALL = Self::SPECTRAL.bits() | Self::GEOMETRIC.bits();
    }
}

/// Shared evaluation function.
pub type EvalFn = Arc<dyn Fn(&KernelContext) -> Result<Value> + Send + Sync>;

/// How a parameter value is computed.
#[derive(Clone)]
pub enum Evaluator {
    /// Fixed literal.
    Constant(Value),
    /// Pure function of the context.
    Function(EvalFn),
    /// Copy of the resolved value at another template path.
    Reference(String),
}

impl Evaluator {
    /// Wrap a context function.
    pub fn function<F, V>(f: F) -> Self
    where
        F: Fn(&KernelContext) -> Result<V> + Send + Sync + 'static,
        V: Into<Value>,
    {
        Self::Function(Arc::new(move |ctx: &KernelContext| f(ctx).map(Into::into)))
    }

    /// Evaluate against a context.
    ///
    /// References cannot be evaluated in isolation: they need the enclosing
    /// template, which resolves them itself.
    pub fn eval(&self, ctx: &KernelContext) -> Result<Value> {
        match self {
            Self::Constant(v) => Ok(v.clone()),
            Self::Function(f) => f(ctx),
            Self::Reference(target) => Err(Error::unresolved(
                target.as_str(),
                "reference evaluated outside of a template",
            )),
        }
    }

    /// Target path if this is a reference.
    pub fn reference_target(&self) -> Option<&str> {
        match self {
            Self::Reference(target) => Some(target),
            _ => None,
        }
    }

    /// Constant value if this is a constant.
    pub fn constant(&self) -> Option<&Value> {
        match self {
            Self::Constant(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(v) => f.debug_tuple("Constant").field(v).finish(),
            Self::Function(_) => f.write_str("Function(..)"),
            Self::Reference(p) => f.debug_tuple("Reference").field(p).finish(),
        }
    }
}

impl From<Value> for Evaluator {
    fn from(v: Value) -> Self {
        Self::Constant(v)
    }
}

/// Parameter evaluated once, when the kernel object is built.
#[derive(Clone, Debug)]
pub struct InitParameter {
    evaluator: Evaluator,
}

impl InitParameter {
    /// Parameter computed from the context.
    pub fn new<F, V>(f: F) -> Self
    where
        F: Fn(&KernelContext) -> Result<V> + Send + Sync + 'static,
        V: Into<Value>,
    {
        Self { evaluator: Evaluator::function(f) }
    }

    /// Constant parameter.
    pub fn constant(value: impl Into<Value>) -> Self {
        Self { evaluator: Evaluator::Constant(value.into()) }
    }

    /// Parameter copying the value at another template path.
    pub fn reference(target: impl Into<String>) -> Self {
        Self { evaluator: Evaluator::Reference(target.into()) }
    }

    /// Parameter with an explicit evaluator.
    pub fn from_evaluator(evaluator: Evaluator) -> Self {
        Self { evaluator }
    }

    /// Evaluate against a context.
    pub fn eval(&self, ctx: &KernelContext) -> Result<Value> {
        self.evaluator.eval(ctx)
    }

    /// The evaluator.
    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }
}

/// Parameter re-evaluated when a built object is patched.
#[derive(Clone, Debug)]
pub struct UpdateParameter {
    evaluator: Evaluator,
    flags: ParamFlags,
    lookup: Option<TypeIdLookupStrategy>,
    parameter_id: Option<String>,
}

impl UpdateParameter {
    /// Updatable parameter computed from the context.
    pub fn new<F, V>(f: F, flags: ParamFlags) -> Self
    where
        F: Fn(&KernelContext) -> Result<V> + Send + Sync + 'static,
        V: Into<Value>,
    {
        Self::from_evaluator(Evaluator::function(f), flags)
    }

    /// Updatable parameter holding a constant.
    pub fn constant(value: impl Into<Value>, flags: ParamFlags) -> Self {
        Self::from_evaluator(Evaluator::Constant(value.into()), flags)
    }

    /// Updatable parameter with an explicit evaluator.
    pub fn from_evaluator(evaluator: Evaluator, flags: ParamFlags) -> Self {
        Self { evaluator, flags, lookup: None, parameter_id: None }
    }

    /// Attach a lookup strategy used by traversal to find the backend id.
    pub fn with_lookup(mut self, lookup: TypeIdLookupStrategy) -> Self {
        self.lookup = Some(lookup);
        self
    }

    /// Replace the flags.
    pub fn with_flags(mut self, flags: ParamFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Replace the evaluator, keeping flags, lookup and resolved id.
    pub fn with_evaluator(mut self, evaluator: Evaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Set the resolved backend parameter id.
    pub fn with_parameter_id(mut self, id: impl Into<String>) -> Self {
        self.parameter_id = Some(id.into());
        self
    }

    pub(crate) fn set_parameter_id(&mut self, id: Option<String>) {
        self.parameter_id = id;
    }

    /// Evaluate against a context.
    pub fn eval(&self, ctx: &KernelContext) -> Result<Value> {
        self.evaluator.eval(ctx)
    }

    /// Whether the parameter takes part in updates.
    pub fn is_updatable(&self) -> bool {
        !self.flags.is_empty()
    }

    /// Flags.
    pub fn flags(&self) -> ParamFlags {
        self.flags
    }

    /// The evaluator.
    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    /// Lookup strategy, if any.
    pub fn lookup_strategy(&self) -> Option<&TypeIdLookupStrategy> {
        self.lookup.as_ref()
    }

    /// Backend parameter id resolved by traversal, if any.
    pub fn parameter_id(&self) -> Option<&str> {
        self.parameter_id.as_deref()
    }
}

/// Template entry.
#[derive(Clone, Debug)]
pub enum Parameter {
    Init(InitParameter),
    Update(UpdateParameter),
}

impl Parameter {
    /// Evaluate against a context.
    pub fn eval(&self, ctx: &KernelContext) -> Result<Value> {
        self.evaluator().eval(ctx)
    }

    /// The evaluator.
    pub fn evaluator(&self) -> &Evaluator {
        match self {
            Self::Init(p) => p.evaluator(),
            Self::Update(p) => p.evaluator(),
        }
    }

    /// Whether the entry takes part in updates.
    pub fn is_updatable(&self) -> bool {
        match self {
            Self::Init(_) => false,
            Self::Update(p) => p.is_updatable(),
        }
    }

    /// Borrow as an update parameter.
    pub fn as_update(&self) -> Option<&UpdateParameter> {
        match self {
            Self::Update(p) => Some(p),
            Self::Init(_) => None,
        }
    }

    /// Convert to an update parameter, rejecting init parameters.
    pub fn into_update(self, path: &str) -> Result<UpdateParameter> {
        match self {
            Self::Update(p) => Ok(p),
            Self::Init(_) => Err(Error::NotUpdatable { path: path.to_string() }),
        }
    }
}

impl From<InitParameter> for Parameter {
    fn from(p: InitParameter) -> Self {
        Self::Init(p)
    }
}

impl From<UpdateParameter> for Parameter {
    fn from(p: UpdateParameter) -> Self {
        Self::Update(p)
    }
}
