//! The caller-allocated stack-buffer fast path, layered over either value strategy.
//!
//! Heap allocation during marshalling is pure overhead when the native representation only
//! has to live for the duration of one call. Adapters that declare the buffer overload let
//! the stub allocate a fixed-size buffer on its own stack frame and hand it to the
//! conversion instead - but the fast path is only *legal* under strict lifetime
//! conditions, which is why it is a decorator with one eligibility predicate rather than a
//! property of the adapters themselves.
//!
//! # Eligibility
//!
//! The stack buffer dies with the stub's frame, so the fast path requires, evaluated
//! identically for stateless and stateful inner strategies:
//!
//! 1. the context guarantees a single, non-reentrant frame, and
//! 2. the parameter is not passed by reference, or its by-reference kind is `in` -
//!    a `ref`/`out` parameter's written value must remain visible beyond the frame.
//!
//! When the predicate fails, every stage delegates to the inner strategy unmodified;
//! divergence between the two inner variants here would be a correctness bug.

use crate::{
    context::{GenerationContext, Purpose},
    descriptor::{ByRefKind, ParameterDescriptor, TypeName},
    operation::Operation,
    shape::{MarshallerShape, ShapeDescriptor},
    strategies::MarshallingStrategy,
    Result,
};

/// Decorator adding the stack-buffer fast path to an inner value strategy.
///
/// Intercepts only `MarshalToNative`; all other stages delegate unmodified. The buffer is
/// sized by the adapter-declared buffer-size constant, in elements of the adapter-declared
/// buffer element type.
///
/// # Examples
///
/// ```rust
/// use interopgen::prelude::*;
///
/// let inner = StatelessValueStrategy::new(
///     "Utf8StringMarshaller".into(),
///     "byte*".into(),
///     ShapeDescriptor::value(
///         MarshallerShape::TO_UNMANAGED
///             | MarshallerShape::CALLER_ALLOCATED_BUFFER
///             | MarshallerShape::FREE,
///     ),
/// )?;
/// let decorated = CallerAllocatedBufferDecorator::new(inner, "byte".into(), 256)?;
/// assert!(decorated.uses_native_identifier());
/// # Ok::<(), interopgen::Error>(())
/// ```
#[derive(Debug)]
pub struct CallerAllocatedBufferDecorator<S> {
    inner: S,
    buffer_element: TypeName,
    buffer_len: usize,
}

impl<S: MarshallingStrategy> CallerAllocatedBufferDecorator<S> {
    /// Wraps `inner` with the stack-buffer fast path.
    ///
    /// # Arguments
    ///
    /// * `inner` - The value strategy to decorate
    /// * `buffer_element` - Element type of the stack buffer
    /// * `buffer_len` - The adapter-declared buffer-size constant, in elements
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidShape`] if the inner adapter's shape does not
    /// declare the caller-allocated buffer overload.
    pub fn new(inner: S, buffer_element: TypeName, buffer_len: usize) -> Result<Self> {
        if !inner
            .shape()
            .marshaller
            .contains(MarshallerShape::CALLER_ALLOCATED_BUFFER)
        {
            return Err(invalid_shape_error!(
                "inner adapter does not declare CALLER_ALLOCATED_BUFFER"
            ));
        }
        Ok(CallerAllocatedBufferDecorator {
            inner,
            buffer_element,
            buffer_len,
        })
    }

    /// The eligibility predicate for the fast path.
    ///
    /// Must be evaluated identically regardless of the inner variant: the stack buffer is
    /// never valid outside a single frame, and never for output-direction by-reference
    /// parameters.
    #[must_use]
    pub fn eligible(&self, param: &ParameterDescriptor, ctx: &GenerationContext) -> bool {
        ctx.single_frame() && matches!(param.by_ref, ByRefKind::ByValue | ByRefKind::In)
    }

    /// The decorated inner strategy.
    #[must_use]
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: MarshallingStrategy> MarshallingStrategy for CallerAllocatedBufferDecorator<S> {
    fn native_type(&self) -> &TypeName {
        self.inner.native_type()
    }

    fn shape(&self) -> &ShapeDescriptor {
        self.inner.shape()
    }

    fn uses_native_identifier(&self) -> bool {
        self.inner.uses_native_identifier()
    }

    fn setup(
        &self,
        param: &ParameterDescriptor,
        ctx: &mut GenerationContext,
    ) -> Result<Vec<Operation>> {
        self.inner.setup(param, ctx)
    }

    fn marshal_to_native(
        &self,
        param: &ParameterDescriptor,
        ctx: &mut GenerationContext,
    ) -> Result<Vec<Operation>> {
        if !self.eligible(param, ctx) || !param.transfers_to_native() {
            return self.inner.marshal_to_native(param, ctx);
        }

        let buffer = ctx.declare(param.index, Purpose::Buffer);
        let mut ops = vec![Operation::StackAlloc {
            target: buffer.clone(),
            element: self.buffer_element.clone(),
            len: self.buffer_len,
        }];
        ops.extend(self.inner.marshal_with_buffer(param, ctx, &buffer)?);
        Ok(ops)
    }

    fn marshal_with_buffer(
        &self,
        param: &ParameterDescriptor,
        ctx: &mut GenerationContext,
        buffer: &str,
    ) -> Result<Vec<Operation>> {
        self.inner.marshal_with_buffer(param, ctx, buffer)
    }

    fn pin(
        &self,
        param: &ParameterDescriptor,
        ctx: &mut GenerationContext,
    ) -> Result<Vec<Operation>> {
        self.inner.pin(param, ctx)
    }

    fn pinned_marshal(
        &self,
        param: &ParameterDescriptor,
        ctx: &mut GenerationContext,
    ) -> Result<Vec<Operation>> {
        self.inner.pinned_marshal(param, ctx)
    }

    fn unmarshal_capture(
        &self,
        param: &ParameterDescriptor,
        ctx: &mut GenerationContext,
    ) -> Result<Vec<Operation>> {
        self.inner.unmarshal_capture(param, ctx)
    }

    fn unmarshal(
        &self,
        param: &ParameterDescriptor,
        ctx: &mut GenerationContext,
    ) -> Result<Vec<Operation>> {
        self.inner.unmarshal(param, ctx)
    }

    fn guaranteed_unmarshal(
        &self,
        param: &ParameterDescriptor,
        ctx: &mut GenerationContext,
    ) -> Result<Vec<Operation>> {
        self.inner.guaranteed_unmarshal(param, ctx)
    }

    fn notify_invoke_succeeded(
        &self,
        param: &ParameterDescriptor,
        ctx: &mut GenerationContext,
    ) -> Result<Vec<Operation>> {
        self.inner.notify_invoke_succeeded(param, ctx)
    }

    fn cleanup(
        &self,
        param: &ParameterDescriptor,
        ctx: &mut GenerationContext,
    ) -> Result<Vec<Operation>> {
        self.inner.cleanup(param, ctx)
    }
}
