//! Signature position descriptors consumed by the stub synthesis engine.
//!
//! Upstream signature analysis produces one [`ParameterDescriptor`] per position of a
//! foreign-function signature (plus one for the return slot) and resolves the marshaller
//! adapter that applies to each. This module holds those immutable descriptions; nothing in
//! here decides *which* adapter applies - that resolution is an external responsibility.
//!
//! # Key Components
//!
//! - [`crate::descriptor::TypeName`] - Semantic identity of a managed, marshaller, or native type
//! - [`crate::descriptor::ParamIndex`] - Position in the signature, including the return slot
//! - [`crate::descriptor::ByRefKind`] - How the position is passed in the managed signature
//! - [`crate::descriptor::MarshalDirection`] - Which way values cross the managed/native boundary
//! - [`crate::descriptor::ParameterDescriptor`] - The complete, immutable per-position description
//! - [`crate::descriptor::ElementLayout`] - One collection element representation
//!
//! # Lifecycle
//!
//! Descriptors are constructed once per signature analysis and are read-only for the remainder
//! of generation; no descriptor outlives one stub-generation pass.

use std::fmt;

/// Semantic identity of a type as seen by the generation engine.
///
/// Operations reference managed types, marshaller types, and native types exclusively through
/// these identities; the engine never inspects a type's structure beyond what the descriptors
/// and shapes declare. Rendering an identity into target-language syntax is the emission
/// backend's concern.
///
/// Two identities are the same type exactly when their names are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeName(String);

impl TypeName {
    /// Returns the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeName {
    fn from(name: &str) -> Self {
        TypeName(name.to_string())
    }
}

impl From<String> for TypeName {
    fn from(name: String) -> Self {
        TypeName(name)
    }
}

/// A position in a foreign-function signature.
///
/// Parameters are numbered from zero in declaration order; the return value occupies a
/// dedicated slot that orders after every parameter. The index namespaces all identifiers
/// generated for the position, so two parameters of one stub can never alias even though
/// they share one assembled operation sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ParamIndex {
    /// A parameter at the given zero-based position
    Param(u32),
    /// The return slot
    ReturnValue,
}

impl fmt::Display for ParamIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamIndex::Param(n) => write!(f, "p{n}"),
            ParamIndex::ReturnValue => f.write_str("ret"),
        }
    }
}

/// How a signature position is passed at the managed call site.
///
/// By-reference kinds matter to the caller-allocated-buffer fast path: a stack buffer is only
/// legal for positions whose native representation cannot be observed after the current frame
/// returns, which rules out `Ref` and `Out` by-reference passing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByRefKind {
    /// Passed by value
    ByValue,
    /// Passed by readonly reference (`in`)
    In,
    /// Passed by mutable reference (`ref`)
    Ref,
    /// Passed by write-only reference (`out`)
    Out,
}

/// Which way a value crosses the managed/native boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarshalDirection {
    /// The managed value is converted to native before the call
    ManagedToNative,
    /// The native value is converted to managed after the call
    NativeToManaged,
    /// Converted in both directions
    Bidirectional,
}

/// Immutable description of one signature position.
///
/// Created once per signature analysis and read-only thereafter. A descriptor carries no
/// behavior of its own; a [`crate::strategies::MarshallingStrategy`] consults it at every
/// stage to decide which operations the position contributes.
///
/// # Examples
///
/// ```rust
/// use interopgen::descriptor::{
///     ByRefKind, MarshalDirection, ParamIndex, ParameterDescriptor,
/// };
///
/// let param = ParameterDescriptor::new(
///     "string".into(),
///     MarshalDirection::ManagedToNative,
///     ByRefKind::ByValue,
///     ParamIndex::Param(0),
/// );
/// assert!(param.transfers_to_native());
/// assert!(!param.transfers_to_managed());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterDescriptor {
    /// The semantic managed type of this position
    pub managed_type: TypeName,
    /// Which way the value crosses the boundary
    pub direction: MarshalDirection,
    /// How the position is passed in the managed signature
    pub by_ref: ByRefKind,
    /// The position in the signature
    pub index: ParamIndex,
}

impl ParameterDescriptor {
    /// Creates a new descriptor for one signature position.
    #[must_use]
    pub fn new(
        managed_type: TypeName,
        direction: MarshalDirection,
        by_ref: ByRefKind,
        index: ParamIndex,
    ) -> Self {
        ParameterDescriptor {
            managed_type,
            direction,
            by_ref,
            index,
        }
    }

    /// Does this position require a managed-to-native transfer before the invocation?
    #[must_use]
    pub fn transfers_to_native(&self) -> bool {
        matches!(
            self.direction,
            MarshalDirection::ManagedToNative | MarshalDirection::Bidirectional
        )
    }

    /// Does this position require a native-to-managed transfer after the invocation?
    #[must_use]
    pub fn transfers_to_managed(&self) -> bool {
        matches!(
            self.direction,
            MarshalDirection::NativeToManaged | MarshalDirection::Bidirectional
        )
    }

    /// Is this position passed by value?
    #[must_use]
    pub fn is_by_value(&self) -> bool {
        matches!(self.by_ref, ByRefKind::ByValue)
    }
}

/// One collection element representation: its type identity and, when the representation has
/// a fixed byte layout, its size.
///
/// A pair of layouts determines whether element-wise copying between a managed and a native
/// container needs a reinterpreting cast:
///
/// - identical type names: the representations are the same, no cast is needed
/// - differing names but equal fixed sizes: a reinterpreting cast is well defined
/// - anything else: the mapping is ambiguous and the collection strategy refuses it at
///   construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementLayout {
    /// The element type identity
    pub ty: TypeName,
    /// Fixed byte size of the representation, `None` when the layout is not fixed
    pub size: Option<u32>,
}

impl ElementLayout {
    /// Creates a layout for an element type with a fixed byte size.
    #[must_use]
    pub fn sized(ty: TypeName, size: u32) -> Self {
        ElementLayout {
            ty,
            size: Some(size),
        }
    }

    /// Creates a layout for an element type without a fixed byte layout.
    #[must_use]
    pub fn opaque(ty: TypeName) -> Self {
        ElementLayout { ty, size: None }
    }

    /// Is `other` the same representation as `self`?
    #[must_use]
    pub fn is_identical(&self, other: &ElementLayout) -> bool {
        self.ty == other.ty
    }

    /// Can a view of `self` elements be reinterpreted as a view of `other` elements?
    ///
    /// Requires both layouts to declare a fixed byte size and the sizes to match. Identical
    /// representations are trivially reinterpretable, though callers short-circuit that case
    /// since the cast would be meaningless.
    #[must_use]
    pub fn is_reinterpretable_as(&self, other: &ElementLayout) -> bool {
        match (self.size, other.size) {
            (Some(a), Some(b)) => a == b,
            _ => self.is_identical(other),
        }
    }
}
