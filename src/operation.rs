//! Abstract operations and the stage pipeline they are partitioned by.
//!
//! An [`Operation`] is one unit of emitted stub behavior - declare a local, call an adapter
//! entry point, copy between views - expressed entirely through identifiers and type
//! identities, never target-language syntax. Operations are immutable once produced; the
//! assembler only concatenates them.
//!
//! The assembled stub is partitioned by [`Stage`]. The stage ordering is the wire format of
//! this engine: downstream renderers must preserve it exactly as produced, because
//! reordering across stage boundaries is not semantics-preserving (a pin released before
//! the invocation, or a cleanup hoisted above an unmarshal, corrupts the stub).
//!
//! # Key Components
//!
//! - [`crate::operation::EntryPoint`] - Names of the adapter entry points the engine can bind
//! - [`crate::operation::Operation`] - The abstract operation variants
//! - [`crate::operation::Stage`] - The fixed stage pipeline, iterable in assembled order
//! - [`crate::operation::StubOperations`] - One stub's assembled, stage-partitioned sequence

use std::fmt;

use strum::{Display, EnumIter};

use crate::descriptor::{ParamIndex, TypeName};

/// Adapter entry points the engine can bind a call to.
///
/// Free-standing entry points are invoked on the marshaller type
/// ([`Operation::AssignStaticCall`] / [`Operation::StaticCall`]); the `From*`/`To*` pairs
/// are instance members of stateful adapters. Overload disambiguation has already happened
/// upstream - each variant names exactly one resolved entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum EntryPoint {
    /// Free-standing managed-to-native conversion; the buffer-accepting overload appends
    /// the caller-allocated buffer as the final argument
    ConvertToUnmanaged,
    /// Free-standing native-to-managed conversion on the success path
    ConvertToManaged,
    /// Free-standing native-to-managed conversion that must succeed on every exit path
    ConvertToManagedFinally,
    /// Release of the native representation
    Free,
    /// Stateful capture of the managed value; the buffer-accepting overload appends the
    /// caller-allocated buffer as the final argument
    FromManaged,
    /// Stateful production of the native representation
    ToUnmanaged,
    /// Stateful capture of the post-call native value
    FromUnmanaged,
    /// Stateful production of the managed value on the success path
    ToManaged,
    /// Stateful production of the managed value on every exit path
    ToManagedFinally,
    /// Post-success notification hook, no return value
    OnInvoked,
    /// Allocates the native container; the final argument receives the element count
    AllocateContainerForUnmanagedElements,
    /// Readable view over the managed container
    GetManagedValuesSource,
    /// Writable view over the native container
    GetUnmanagedValuesDestination,
    /// Allocates the managed container sized to the element count
    AllocateContainerForManagedElements,
    /// Readable view over the native container
    GetUnmanagedValuesSource,
    /// Writable view over the managed container
    GetManagedValuesDestination,
}

/// One abstract unit of emitted stub behavior.
///
/// Operations reference values through arena-generated identifiers and types through
/// [`TypeName`] identities. Rendering into concrete target-language statements is the
/// emission backend's concern; the engine guarantees only ordering and pairing (every
/// allocation-producing operation has its releasing counterpart in `Cleanup` when the
/// adapter declares one).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Declare a local of the given type with no initializer
    DeclareLocal {
        /// The local's identifier
        name: String,
        /// The local's type
        ty: TypeName,
    },

    /// Declare a local holding a default-constructed marshaller instance
    ConstructMarshaller {
        /// The instance identifier
        name: String,
        /// The marshaller type being constructed
        marshaller: TypeName,
    },

    /// `target = Marshaller.EntryPoint(args...)` on the marshaller type
    AssignStaticCall {
        /// Identifier receiving the result
        target: String,
        /// The marshaller type the entry point belongs to
        marshaller: TypeName,
        /// The entry point being bound
        method: EntryPoint,
        /// Argument identifiers in call order
        args: Vec<String>,
    },

    /// `Marshaller.EntryPoint(args...)` on the marshaller type, for effect only
    StaticCall {
        /// The marshaller type the entry point belongs to
        marshaller: TypeName,
        /// The entry point being bound
        method: EntryPoint,
        /// Argument identifiers in call order
        args: Vec<String>,
    },

    /// `target = receiver.EntryPoint(args...)` on a marshaller instance
    AssignInstanceCall {
        /// Identifier receiving the result
        target: String,
        /// The marshaller instance identifier
        receiver: String,
        /// The entry point being bound
        method: EntryPoint,
        /// Argument identifiers in call order
        args: Vec<String>,
    },

    /// `receiver.EntryPoint(args...)` on a marshaller instance, for effect only
    InstanceCall {
        /// The marshaller instance identifier
        receiver: String,
        /// The entry point being bound
        method: EntryPoint,
        /// Argument identifiers in call order
        args: Vec<String>,
    },

    /// Allocate `len` elements of `element` on the current stack frame.
    ///
    /// Only legal when the surrounding context guarantees a single non-reentrant frame;
    /// the buffer is dead once that frame returns.
    StackAlloc {
        /// Identifier of the buffer view
        target: String,
        /// Element type of the buffer
        element: TypeName,
        /// Element count, the adapter-declared buffer-size constant
        len: usize,
    },

    /// Pin `source` for the remainder of the invocation window, exposing `pinned`.
    ///
    /// The pin scope opens here and must enclose every pinned-marshal operation and the
    /// invocation itself.
    Pin {
        /// Identifier of the pinned alias
        pinned: String,
        /// Identifier of the value being pinned
        source: String,
    },

    /// Zero the memory behind a writable view
    ClearView {
        /// The view to clear
        view: String,
    },

    /// Element-wise copy from a readable view to a writable view of the same element type
    CopyView {
        /// Source view identifier
        source: String,
        /// Target view identifier
        target: String,
    },

    /// Reinterpret a view of `from`-typed elements as a view of `to`-typed elements.
    ///
    /// Only emitted when the two element representations differ; identical representations
    /// skip the cast entirely.
    ReinterpretView {
        /// Identifier of the reinterpreted view
        target: String,
        /// Identifier of the view being reinterpreted
        source: String,
        /// Element type of the source view
        from: TypeName,
        /// Element type of the reinterpreted view
        to: TypeName,
    },

    /// The single invocation of the native function.
    ///
    /// Owned by the assembler, not by any strategy; inserted between the pin stages and
    /// the unmarshal stages.
    Invoke {
        /// Identity of the native entry point
        function: String,
        /// Argument identifiers in declaration order
        args: Vec<String>,
        /// Identifier receiving the native return value, if the signature has one
        result: Option<String>,
    },
}

impl Operation {
    /// The identifier this operation writes, if it produces a value.
    #[must_use]
    pub fn output(&self) -> Option<&str> {
        match self {
            Operation::DeclareLocal { name, .. } | Operation::ConstructMarshaller { name, .. } => {
                Some(name)
            }
            Operation::AssignStaticCall { target, .. }
            | Operation::AssignInstanceCall { target, .. }
            | Operation::StackAlloc { target, .. }
            | Operation::ReinterpretView { target, .. } => Some(target),
            Operation::Pin { pinned, .. } => Some(pinned),
            Operation::Invoke { result, .. } => result.as_deref(),
            Operation::StaticCall { .. }
            | Operation::InstanceCall { .. }
            | Operation::ClearView { .. }
            | Operation::CopyView { .. } => None,
        }
    }
}

/// Which exit paths of the stub a stage must execute on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPath {
    /// Only when the invocation and everything before it succeeded
    SuccessOnly,
    /// On every exit path - success, thrown failure, or early return
    Always,
}

/// The fixed stage pipeline of one stub, in assembled order.
///
/// The assembler iterates `Stage::iter()` and, within each stage, the parameters in
/// declaration order. The ordering encodes the lifetime invariants of the stub:
///
/// - `Setup` always precedes every other contribution of its parameter
/// - `Pin` precedes `PinnedMarshal` and `Invoke`, so the pin scope encloses both
/// - `UnmarshalCapture` directly follows `Invoke`, before any failure handling
/// - `GuaranteedUnmarshal` and `Cleanup` run on every exit path once `Setup` has run,
///   and `Cleanup` is last
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum Stage {
    /// One-time preparation per parameter
    Setup,
    /// Managed-to-native conversion not yet under a pin
    MarshalToNative,
    /// Acquisition of scoped pins over values whose addresses must stay stable
    Pin,
    /// Managed-to-native conversion that must execute under an active pin
    PinnedMarshal,
    /// The native invocation itself, owned by the assembler
    Invoke,
    /// Capture of native-side mutation immediately after invocation
    UnmarshalCapture,
    /// Native-to-managed conversion on the success path
    Unmarshal,
    /// Post-success notification hooks
    NotifyInvokeSucceeded,
    /// Native-to-managed conversion that must be available even on failure
    GuaranteedUnmarshal,
    /// Release of every resource acquired by earlier stages
    Cleanup,
}

impl Stage {
    /// Which exit paths this stage must execute on.
    ///
    /// Downstream renderers use this to place the `Always` stages in the region that runs
    /// regardless of how invocation terminated.
    #[must_use]
    pub fn execution_path(&self) -> ExecutionPath {
        match self {
            Stage::GuaranteedUnmarshal | Stage::Cleanup => ExecutionPath::Always,
            _ => ExecutionPath::SuccessOnly,
        }
    }
}

/// The contribution of one stage for one parameter (or the assembler itself).
///
/// `param` is `None` for the blocks the assembler owns, currently only the invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageBlock {
    /// The stage this block belongs to
    pub stage: Stage,
    /// The contributing parameter, `None` for assembler-owned blocks
    pub param: Option<ParamIndex>,
    /// The operations of this contribution, in emission order
    pub ops: Vec<Operation>,
}

/// One stub's assembled, stage-partitioned operation sequence.
///
/// Blocks appear in pipeline order, and within one stage in parameter declaration order.
/// Stages and parameters that contributed nothing are absent - absence of a capability
/// means "contributes nothing", never an error.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct StubOperations {
    blocks: Vec<StageBlock>,
}

impl StubOperations {
    /// Creates an empty sequence.
    #[must_use]
    pub fn new() -> Self {
        StubOperations { blocks: Vec::new() }
    }

    pub(crate) fn push_block(&mut self, block: StageBlock) {
        if !block.ops.is_empty() {
            self.blocks.push(block);
        }
    }

    /// All blocks in assembled order.
    #[must_use]
    pub fn blocks(&self) -> &[StageBlock] {
        &self.blocks
    }

    /// The blocks of one stage, in parameter declaration order.
    pub fn stage(&self, stage: Stage) -> impl Iterator<Item = &StageBlock> {
        self.blocks.iter().filter(move |b| b.stage == stage)
    }

    /// The operations of one stage, flattened across parameters.
    pub fn stage_ops(&self, stage: Stage) -> impl Iterator<Item = &Operation> {
        self.stage(stage).flat_map(|b| b.ops.iter())
    }

    /// Every operation a parameter contributed, across all stages.
    pub fn param_ops(&self, param: ParamIndex) -> impl Iterator<Item = &Operation> {
        self.blocks
            .iter()
            .filter(move |b| b.param == Some(param))
            .flat_map(|b| b.ops.iter())
    }

    /// Total operation count across all stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.iter().map(|b| b.ops.len()).sum()
    }

    /// Does the stub contain no operations?
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl fmt::Display for StubOperations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for block in &self.blocks {
            match block.param {
                Some(param) => writeln!(f, "[{} / {}]", block.stage, param)?,
                None => writeln!(f, "[{}]", block.stage)?,
            }
            for op in &block.ops {
                writeln!(f, "  {op:?}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_stage_pipeline_order() {
        let stages: Vec<Stage> = Stage::iter().collect();
        let position =
            |s: Stage| stages.iter().position(|x| *x == s).expect("stage missing");

        assert_eq!(stages[0], Stage::Setup);
        assert!(position(Stage::Pin) < position(Stage::PinnedMarshal));
        assert!(position(Stage::PinnedMarshal) < position(Stage::Invoke));
        assert!(position(Stage::Invoke) < position(Stage::UnmarshalCapture));
        assert!(position(Stage::Unmarshal) < position(Stage::GuaranteedUnmarshal));
        assert_eq!(*stages.last().unwrap(), Stage::Cleanup);
    }

    #[test]
    fn test_execution_paths() {
        assert_eq!(Stage::Cleanup.execution_path(), ExecutionPath::Always);
        assert_eq!(
            Stage::GuaranteedUnmarshal.execution_path(),
            ExecutionPath::Always
        );
        assert_eq!(Stage::Unmarshal.execution_path(), ExecutionPath::SuccessOnly);
        assert_eq!(Stage::Setup.execution_path(), ExecutionPath::SuccessOnly);
    }

    #[test]
    fn test_entry_point_names() {
        assert_eq!(
            EntryPoint::AllocateContainerForUnmanagedElements.to_string(),
            "AllocateContainerForUnmanagedElements"
        );
        assert_eq!(
            EntryPoint::ConvertToManagedFinally.to_string(),
            "ConvertToManagedFinally"
        );
    }

    #[test]
    fn test_operation_output() {
        let op = Operation::AssignStaticCall {
            target: "__p0_native".to_string(),
            marshaller: "Utf8StringMarshaller".into(),
            method: EntryPoint::ConvertToUnmanaged,
            args: vec!["__p0_managed".to_string()],
        };
        assert_eq!(op.output(), Some("__p0_native"));

        let free = Operation::StaticCall {
            marshaller: "Utf8StringMarshaller".into(),
            method: EntryPoint::Free,
            args: vec!["__p0_native".to_string()],
        };
        assert_eq!(free.output(), None);
    }

    #[test]
    fn test_empty_blocks_are_dropped() {
        let mut stub = StubOperations::new();
        stub.push_block(StageBlock {
            stage: Stage::Setup,
            param: Some(ParamIndex::Param(0)),
            ops: Vec::new(),
        });
        assert!(stub.is_empty());

        stub.push_block(StageBlock {
            stage: Stage::Setup,
            param: Some(ParamIndex::Param(0)),
            ops: vec![Operation::DeclareLocal {
                name: "__p0_native".to_string(),
                ty: "byte*".into(),
            }],
        });
        assert_eq!(stub.len(), 1);
        assert_eq!(stub.stage_ops(Stage::Setup).count(), 1);
        assert_eq!(stub.param_ops(ParamIndex::Param(0)).count(), 1);
    }
}
