//! Ambient per-stub generation state.
//!
//! A [`GenerationContext`] lives for exactly one stub-generation pass. It owns the
//! identifier arena that gives every `(parameter, purpose)` pair a stable, collision-free
//! name, the flag that says whether the stub body executes within a single non-reentrant
//! frame (which gates the caller-allocated-buffer fast path), and the by-value contents
//! marshalling policy for the call.
//!
//! # Identifier discipline
//!
//! Identifiers are namespaced by parameter index, so parallel parameters of one stub can
//! never alias even though all parameters share one assembled operation sequence. The arena
//! replaces the naming-by-string-convention of older generators with an explicit mapping:
//!
//! - [`IdentifierArena::declare`] is get-or-create and idempotent; a name, once allocated,
//!   is never reused for a different pair
//! - [`IdentifierArena::resolve`] is lookup-only and fails with
//!   [`crate::Error::UnresolvedIdentifier`] for a pair that was never declared
//!
//! Stages *declare* the identifiers anchored to the signature itself ([`Purpose::Managed`],
//! [`Purpose::Native`]) and the scratch identifiers they both produce and consume (the view
//! purposes); they *resolve* identifiers another stage must have produced first (the
//! marshaller instance from `Setup`, the element count local). Resolving enforces stage
//! ordering: a consuming stage running before its producing stage is a bug, not a default.

use std::collections::HashMap;
use std::fmt;

use crate::{
    descriptor::ParamIndex,
    error::{Error, ParameterFailure},
    Result,
};

/// The purpose a generated identifier serves for its parameter.
///
/// Together with the parameter index, the purpose tag keys the identifier arena. One
/// parameter uses at most one identifier per purpose; stages that run more than once for a
/// pair (idempotent regeneration) receive the same name again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Purpose {
    /// The managed value of the position itself
    Managed,
    /// The native representation temporary
    Native,
    /// The per-parameter marshaller instance of a stateful adapter
    Marshaller,
    /// The element-count local of a collection parameter
    ElementCount,
    /// The caller-allocated stack buffer
    Buffer,
    /// The pinned alias of a value held stable across the invocation
    Pinned,
    /// A readable or writable view over the managed container
    ManagedView,
    /// A readable or writable view over the native container
    NativeView,
    /// A view reinterpreted to the counterpart element type
    CastView,
}

impl Purpose {
    /// The identifier suffix this purpose contributes.
    #[must_use]
    pub fn suffix(&self) -> &'static str {
        match self {
            Purpose::Managed => "managed",
            Purpose::Native => "native",
            Purpose::Marshaller => "marshaller",
            Purpose::ElementCount => "num_elements",
            Purpose::Buffer => "buffer",
            Purpose::Pinned => "pinned",
            Purpose::ManagedView => "managed_view",
            Purpose::NativeView => "native_view",
            Purpose::CastView => "cast_view",
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Explicit mapping from `(parameter, purpose)` to a generated identifier.
///
/// Insert-only: names are allocated on first declaration and never reused or dropped for
/// the lifetime of the pass. The generated names follow the `__{param}_{purpose}` scheme
/// (`__p0_native`, `__ret_managed`, ...), which keeps them readable in emitted stubs while
/// the arena itself remains the source of truth.
#[derive(Debug, Default)]
pub struct IdentifierArena {
    names: HashMap<(ParamIndex, Purpose), String>,
}

impl IdentifierArena {
    /// Creates an empty arena.
    #[must_use]
    pub fn new() -> Self {
        IdentifierArena {
            names: HashMap::new(),
        }
    }

    /// Returns the identifier for the pair, allocating it on first use.
    ///
    /// Idempotent: declaring the same pair twice yields the same name, which is what makes
    /// stage regeneration with identical inputs produce structurally equal operations.
    pub fn declare(&mut self, param: ParamIndex, purpose: Purpose) -> String {
        self.names
            .entry((param, purpose))
            .or_insert_with(|| format!("__{param}_{}", purpose.suffix()))
            .clone()
    }

    /// Returns the identifier for a pair that must already have been declared.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnresolvedIdentifier`] if the pair was never declared. This
    /// indicates an assembler/strategy ordering bug and is never silently defaulted.
    pub fn resolve(&self, param: ParamIndex, purpose: Purpose) -> Result<String> {
        self.names
            .get(&(param, purpose))
            .cloned()
            .ok_or(Error::UnresolvedIdentifier { param, purpose })
    }

    /// Number of identifiers allocated so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Is the arena empty?
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// The by-value contents marshalling policy of the call.
///
/// For container-typed parameters passed by value, the call site can narrow which direction
/// the *contents* travel independently of the parameter's own direction. `Out` is the
/// policy with teeth: the callee only writes, so the engine skips copying managed contents
/// in, clears the freshly allocated native memory instead, and populates the existing
/// managed container in place afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByValueContents {
    /// No explicit policy; contents follow the parameter direction
    #[default]
    Default,
    /// Contents travel into the callee only
    In,
    /// Contents travel out of the callee only
    Out,
    /// Contents travel both ways
    InOut,
}

impl ByValueContents {
    /// Does this policy marshal contents back out of the callee?
    #[must_use]
    pub fn marshals_out(&self) -> bool {
        matches!(self, ByValueContents::Out | ByValueContents::InOut)
    }

    /// Is this the "out"-only policy that skips copying contents in?
    #[must_use]
    pub fn is_out_only(&self) -> bool {
        matches!(self, ByValueContents::Out)
    }
}

/// Ambient state for one stub-generation pass.
///
/// Mutated only by identifier allocation; the single-frame flag and the by-value contents
/// policy are fixed at construction. The context is discarded after the pass - independent
/// passes for different signatures share no mutable state and may run concurrently.
#[derive(Debug)]
pub struct GenerationContext {
    arena: IdentifierArena,
    single_frame: bool,
    by_value_contents: ByValueContents,
}

impl GenerationContext {
    /// Creates the context for one stub-generation pass.
    ///
    /// `single_frame` must only be `true` when the stub body is known to execute within a
    /// single non-reentrant frame; it is the gate for stack-buffer allocation. Passing
    /// `true` for a stub whose native representations can escape the frame produces
    /// stubs that read deallocated stack memory.
    #[must_use]
    pub fn new(single_frame: bool, by_value_contents: ByValueContents) -> Self {
        GenerationContext {
            arena: IdentifierArena::new(),
            single_frame,
            by_value_contents,
        }
    }

    /// Does the stub body execute within a single non-reentrant frame?
    #[must_use]
    pub fn single_frame(&self) -> bool {
        self.single_frame
    }

    /// The by-value contents marshalling policy for this call.
    #[must_use]
    pub fn by_value_contents(&self) -> ByValueContents {
        self.by_value_contents
    }

    /// Returns the identifier for the pair, allocating it on first use.
    pub fn declare(&mut self, param: ParamIndex, purpose: Purpose) -> String {
        self.arena.declare(param, purpose)
    }

    /// Returns the identifier for a pair that must already have been declared.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnresolvedIdentifier`] if the pair was never declared.
    pub fn resolve(&self, param: ParamIndex, purpose: Purpose) -> Result<String> {
        self.arena.resolve(param, purpose)
    }

    /// Read-only access to the identifier arena.
    #[must_use]
    pub fn identifiers(&self) -> &IdentifierArena {
        &self.arena
    }
}

// Failure bookkeeping lives next to the context because both are per-pass state; the
// assembler drains it into Error::StubGeneration before emission.
pub(crate) struct FailureSink {
    failures: Vec<ParameterFailure>,
}

impl FailureSink {
    pub(crate) fn new() -> Self {
        FailureSink {
            failures: Vec::new(),
        }
    }

    pub(crate) fn record(&mut self, param: ParamIndex, error: Error) {
        self.failures.push(ParameterFailure {
            param,
            error: Box::new(error),
        });
    }

    pub(crate) fn has_failed(&self, param: ParamIndex) -> bool {
        self.failures.iter().any(|f| f.param == param)
    }

    pub(crate) fn into_result(self) -> Result<()> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(Error::StubGeneration(self.failures))
        }
    }
}
