//! Marshalling strategies - the polymorphic core of stub synthesis.
//!
//! A strategy implements the stage contract for one adapter variant: given a parameter
//! descriptor and the ambient generation context, each stage method returns the (possibly
//! empty) ordered operations that parameter contributes to the stage. The assembler drives
//! the stages in fixed pipeline order; a strategy never sees, and never depends on, another
//! parameter's contributions.
//!
//! # Variants
//!
//! - [`crate::strategies::StatelessValueStrategy`] - free-standing conversion entry points
//!   on the marshaller type, no instance state
//! - [`crate::strategies::StatefulValueStrategy`] - one marshaller instance per parameter,
//!   constructed in `Setup`, carrying all state between stages
//! - [`crate::strategies::CallerAllocatedBufferDecorator`] - layers the stack-buffer fast
//!   path over either value strategy
//! - [`crate::strategies::LinearCollectionStrategy`] - sequence-typed parameters whose
//!   elements may need per-element conversion or reinterpretation
//!
//! Selection of the variant (and of the adapter it binds) is an external responsibility;
//! this module consumes already-resolved type identities and capability shapes.
//!
//! # Contract invariants
//!
//! - Stage methods are pure functions of `(descriptor, context)`: generating a stage twice
//!   with identical inputs yields structurally equal operation sequences.
//! - A capability the adapter's shape does not declare contributes nothing - never an error.
//! - If `setup` ran for a parameter, `cleanup` must run for it on every exit path; the
//!   assembler guarantees the ordering, the strategy guarantees the pairing.

mod buffer;
mod collection;
mod stateful;
mod stateless;

pub use buffer::CallerAllocatedBufferDecorator;
pub use collection::LinearCollectionStrategy;
pub use stateful::StatefulValueStrategy;
pub use stateless::StatelessValueStrategy;

use crate::{
    context::GenerationContext,
    descriptor::{ParameterDescriptor, TypeName},
    operation::{Operation, Stage},
    shape::ShapeDescriptor,
    Result,
};

/// A boxed strategy as held by the assembler, one per bound parameter.
pub type StrategyBox = Box<dyn MarshallingStrategy>;

/// The stage contract every adapter variant implements.
///
/// Default implementations return empty sequences, so a variant only overrides the stages
/// its shape can contribute to. All stage methods take the descriptor and context by
/// reference and return owned operations; the only context mutation they may perform is
/// identifier allocation.
///
/// # Errors
///
/// Stage methods fail only on generation bugs (an identifier consumed before its producing
/// stage ran) - capability absence is handled by returning an empty sequence instead.
pub trait MarshallingStrategy: Send + Sync {
    /// The native representation type of this parameter.
    ///
    /// Pure query; the assembler uses it to declare the native temporary when
    /// [`MarshallingStrategy::uses_native_identifier`] is `true`.
    fn native_type(&self) -> &TypeName;

    /// The adapter's declared capability shape.
    fn shape(&self) -> &ShapeDescriptor;

    /// Does this parameter need a distinct native-side temporary?
    ///
    /// Pure query, consulted by the assembler to decide temporary allocation. When `true`,
    /// the assembler declares the native local ahead of the strategy's own `Setup`
    /// contribution.
    fn uses_native_identifier(&self) -> bool;

    /// One-time preparation, before any other stage of this parameter.
    fn setup(
        &self,
        _param: &ParameterDescriptor,
        _ctx: &mut GenerationContext,
    ) -> Result<Vec<Operation>> {
        Ok(Vec::new())
    }

    /// Managed-to-native conversion, not yet under a pin.
    fn marshal_to_native(
        &self,
        _param: &ParameterDescriptor,
        _ctx: &mut GenerationContext,
    ) -> Result<Vec<Operation>> {
        Ok(Vec::new())
    }

    /// The buffer-accepting managed-to-native conversion overload.
    ///
    /// Called by [`CallerAllocatedBufferDecorator`] in place of
    /// [`MarshallingStrategy::marshal_to_native`] when the stack-buffer fast path is
    /// eligible; `buffer` is the identifier of the caller-allocated buffer.
    ///
    /// # Errors
    ///
    /// The default fails with [`crate::Error::InvalidShape`]: an adapter without the
    /// buffer overload cannot be decorated, and the decorator rejects such shapes at
    /// construction already.
    fn marshal_with_buffer(
        &self,
        _param: &ParameterDescriptor,
        _ctx: &mut GenerationContext,
        _buffer: &str,
    ) -> Result<Vec<Operation>> {
        Err(invalid_shape_error!(
            "adapter does not expose a caller-allocated buffer conversion"
        ))
    }

    /// Acquisition of a scoped pin over a value whose address must stay stable across the
    /// invocation. Only adapters that require address stability contribute here.
    fn pin(
        &self,
        _param: &ParameterDescriptor,
        _ctx: &mut GenerationContext,
    ) -> Result<Vec<Operation>> {
        Ok(Vec::new())
    }

    /// Managed-to-native conversion that must execute under an active pin.
    fn pinned_marshal(
        &self,
        _param: &ParameterDescriptor,
        _ctx: &mut GenerationContext,
    ) -> Result<Vec<Operation>> {
        Ok(Vec::new())
    }

    /// Capture of native-side mutation into adapter state, immediately after invocation
    /// and before any failure handling.
    fn unmarshal_capture(
        &self,
        _param: &ParameterDescriptor,
        _ctx: &mut GenerationContext,
    ) -> Result<Vec<Operation>> {
        Ok(Vec::new())
    }

    /// Native-to-managed conversion on the success path.
    fn unmarshal(
        &self,
        _param: &ParameterDescriptor,
        _ctx: &mut GenerationContext,
    ) -> Result<Vec<Operation>> {
        Ok(Vec::new())
    }

    /// Native-to-managed conversion that must be available even when invocation failed.
    fn guaranteed_unmarshal(
        &self,
        _param: &ParameterDescriptor,
        _ctx: &mut GenerationContext,
    ) -> Result<Vec<Operation>> {
        Ok(Vec::new())
    }

    /// Post-success notification hook, no produced value.
    fn notify_invoke_succeeded(
        &self,
        _param: &ParameterDescriptor,
        _ctx: &mut GenerationContext,
    ) -> Result<Vec<Operation>> {
        Ok(Vec::new())
    }

    /// Release of every resource acquired by `setup` or the marshal stages. Must execute
    /// on every exit path once `setup` has run.
    fn cleanup(
        &self,
        _param: &ParameterDescriptor,
        _ctx: &mut GenerationContext,
    ) -> Result<Vec<Operation>> {
        Ok(Vec::new())
    }

    /// Dispatches one pipeline stage to its stage method.
    ///
    /// [`Stage::Invoke`] is assembler-owned and contributes nothing through any strategy.
    ///
    /// # Errors
    ///
    /// Propagates the stage method's error unchanged.
    fn generate(
        &self,
        stage: Stage,
        param: &ParameterDescriptor,
        ctx: &mut GenerationContext,
    ) -> Result<Vec<Operation>> {
        match stage {
            Stage::Setup => self.setup(param, ctx),
            Stage::MarshalToNative => self.marshal_to_native(param, ctx),
            Stage::Pin => self.pin(param, ctx),
            Stage::PinnedMarshal => self.pinned_marshal(param, ctx),
            Stage::Invoke => Ok(Vec::new()),
            Stage::UnmarshalCapture => self.unmarshal_capture(param, ctx),
            Stage::Unmarshal => self.unmarshal(param, ctx),
            Stage::NotifyInvokeSucceeded => self.notify_invoke_succeeded(param, ctx),
            Stage::GuaranteedUnmarshal => self.guaranteed_unmarshal(param, ctx),
            Stage::Cleanup => self.cleanup(param, ctx),
        }
    }
}
