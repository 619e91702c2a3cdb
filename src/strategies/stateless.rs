//! Value marshalling through free-standing conversion entry points.
//!
//! A stateless adapter exposes its conversions directly on the marshaller type - no
//! instance is constructed, and the native temporary is the sole communication channel
//! between stages. This is the simplest strategy shape and the baseline the decorator
//! composes over.

use crate::{
    context::{GenerationContext, Purpose},
    descriptor::{ParameterDescriptor, TypeName},
    operation::{EntryPoint, Operation},
    shape::{MarshallerShape, ShapeDescriptor},
    strategies::MarshallingStrategy,
    Result,
};

/// Strategy for adapters whose conversions are free-standing entry points.
///
/// Per stage, when the shape declares the capability and the direction requires the
/// transfer:
///
/// - `MarshalToNative` emits `native = Marshaller.ConvertToUnmanaged(managed)`
/// - `Unmarshal` emits `managed = Marshaller.ConvertToManaged(native)`, unless the shape
///   also declares the guaranteed conversion, which replaces the ordinary one
/// - `GuaranteedUnmarshal` emits `managed = Marshaller.ConvertToManagedFinally(native)`
/// - `NotifyInvokeSucceeded` emits `Marshaller.OnInvoked(native)`
/// - `Cleanup` emits `Marshaller.Free(native)`
///
/// # Examples
///
/// ```rust
/// use interopgen::prelude::*;
///
/// let strategy = StatelessValueStrategy::new(
///     "Utf8StringMarshaller".into(),
///     "byte*".into(),
///     ShapeDescriptor::value(MarshallerShape::TO_UNMANAGED | MarshallerShape::FREE),
/// )?;
/// assert!(strategy.uses_native_identifier());
/// # Ok::<(), interopgen::Error>(())
/// ```
#[derive(Debug)]
pub struct StatelessValueStrategy {
    marshaller: TypeName,
    native: TypeName,
    shape: ShapeDescriptor,
}

impl StatelessValueStrategy {
    /// Creates the strategy for one adapter.
    ///
    /// # Arguments
    ///
    /// * `marshaller` - Identity of the marshaller type carrying the entry points
    /// * `native` - Identity of the native representation type
    /// * `shape` - The adapter's declared capabilities
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidShape`] if the declared capability combination is
    /// internally inconsistent.
    pub fn new(marshaller: TypeName, native: TypeName, shape: ShapeDescriptor) -> Result<Self> {
        shape.validate()?;
        Ok(StatelessValueStrategy {
            marshaller,
            native,
            shape,
        })
    }
}

impl MarshallingStrategy for StatelessValueStrategy {
    fn native_type(&self) -> &TypeName {
        &self.native
    }

    fn shape(&self) -> &ShapeDescriptor {
        &self.shape
    }

    fn uses_native_identifier(&self) -> bool {
        true
    }

    fn marshal_to_native(
        &self,
        param: &ParameterDescriptor,
        ctx: &mut GenerationContext,
    ) -> Result<Vec<Operation>> {
        if !self.shape.marshaller.contains(MarshallerShape::TO_UNMANAGED)
            || !param.transfers_to_native()
        {
            return Ok(Vec::new());
        }

        let managed = ctx.declare(param.index, Purpose::Managed);
        let native = ctx.declare(param.index, Purpose::Native);
        Ok(vec![Operation::AssignStaticCall {
            target: native,
            marshaller: self.marshaller.clone(),
            method: EntryPoint::ConvertToUnmanaged,
            args: vec![managed],
        }])
    }

    fn marshal_with_buffer(
        &self,
        param: &ParameterDescriptor,
        ctx: &mut GenerationContext,
        buffer: &str,
    ) -> Result<Vec<Operation>> {
        if !self.shape.marshaller.contains(MarshallerShape::TO_UNMANAGED)
            || !param.transfers_to_native()
        {
            return Ok(Vec::new());
        }

        let managed = ctx.declare(param.index, Purpose::Managed);
        let native = ctx.declare(param.index, Purpose::Native);
        Ok(vec![Operation::AssignStaticCall {
            target: native,
            marshaller: self.marshaller.clone(),
            method: EntryPoint::ConvertToUnmanaged,
            args: vec![managed, buffer.to_string()],
        }])
    }

    fn unmarshal(
        &self,
        param: &ParameterDescriptor,
        ctx: &mut GenerationContext,
    ) -> Result<Vec<Operation>> {
        // The guaranteed conversion replaces the ordinary one.
        if self
            .shape
            .marshaller
            .contains(MarshallerShape::GUARANTEED_UNMARSHAL)
        {
            return Ok(Vec::new());
        }
        if !self.shape.marshaller.contains(MarshallerShape::TO_MANAGED)
            || !param.transfers_to_managed()
        {
            return Ok(Vec::new());
        }

        let managed = ctx.declare(param.index, Purpose::Managed);
        let native = ctx.declare(param.index, Purpose::Native);
        Ok(vec![Operation::AssignStaticCall {
            target: managed,
            marshaller: self.marshaller.clone(),
            method: EntryPoint::ConvertToManaged,
            args: vec![native],
        }])
    }

    fn guaranteed_unmarshal(
        &self,
        param: &ParameterDescriptor,
        ctx: &mut GenerationContext,
    ) -> Result<Vec<Operation>> {
        if !self
            .shape
            .marshaller
            .contains(MarshallerShape::GUARANTEED_UNMARSHAL)
            || !param.transfers_to_managed()
        {
            return Ok(Vec::new());
        }

        let managed = ctx.declare(param.index, Purpose::Managed);
        let native = ctx.declare(param.index, Purpose::Native);
        Ok(vec![Operation::AssignStaticCall {
            target: managed,
            marshaller: self.marshaller.clone(),
            method: EntryPoint::ConvertToManagedFinally,
            args: vec![native],
        }])
    }

    fn notify_invoke_succeeded(
        &self,
        param: &ParameterDescriptor,
        ctx: &mut GenerationContext,
    ) -> Result<Vec<Operation>> {
        if !self
            .shape
            .marshaller
            .contains(MarshallerShape::NOTIFY_INVOKE_SUCCEEDED)
        {
            return Ok(Vec::new());
        }

        let native = ctx.resolve(param.index, Purpose::Native)?;
        Ok(vec![Operation::StaticCall {
            marshaller: self.marshaller.clone(),
            method: EntryPoint::OnInvoked,
            args: vec![native],
        }])
    }

    fn cleanup(
        &self,
        param: &ParameterDescriptor,
        ctx: &mut GenerationContext,
    ) -> Result<Vec<Operation>> {
        if !self.shape.marshaller.contains(MarshallerShape::FREE) {
            return Ok(Vec::new());
        }

        let native = ctx.resolve(param.index, Purpose::Native)?;
        Ok(vec![Operation::StaticCall {
            marshaller: self.marshaller.clone(),
            method: EntryPoint::Free,
            args: vec![native],
        }])
    }
}
