//! # interopgen Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the interopgen library. Import this module to get quick access to the essential
//! types for marshalling-stub synthesis.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all interopgen operations
pub use crate::Error;

/// The result type used throughout interopgen
pub use crate::Result;

/// A single parameter's generation failure, aggregated by stub generation errors
pub use crate::ParameterFailure;

// ================================================================================================
// Signature Descriptors
// ================================================================================================

/// Descriptor types for signature positions and type identities
pub use crate::descriptor::{
    ByRefKind, ElementLayout, MarshalDirection, ParamIndex, ParameterDescriptor, TypeName,
};

// ================================================================================================
// Adapter Shapes
// ================================================================================================

/// Capability flag sets and the validated shape descriptor
pub use crate::shape::{CollectionShape, MarshallerShape, ShapeDescriptor};

// ================================================================================================
// Generation Context
// ================================================================================================

/// Per-stub ambient state and identifier management
pub use crate::context::{ByValueContents, GenerationContext, IdentifierArena, Purpose};

// ================================================================================================
// Operations and Stages
// ================================================================================================

/// The abstract operation vocabulary and the stage pipeline
pub use crate::operation::{
    EntryPoint, ExecutionPath, Operation, Stage, StageBlock, StubOperations,
};

// ================================================================================================
// Strategies
// ================================================================================================

/// The strategy contract and its adapter variants
pub use crate::strategies::{
    CallerAllocatedBufferDecorator, LinearCollectionStrategy, MarshallingStrategy,
    StatefulValueStrategy, StatelessValueStrategy, StrategyBox,
};

// ================================================================================================
// Assembly
// ================================================================================================

/// Stub assembly and parallel batching
pub use crate::assembler::{assemble_all, BoundParameter, NativeFunction, StubAssembler};
