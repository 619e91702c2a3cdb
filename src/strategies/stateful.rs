//! Value marshalling through a per-parameter marshaller instance.
//!
//! A stateful adapter is constructed once per parameter in `Setup` and carries everything
//! the later stages need in its own state: `Cleanup` is a bare `Free()` on the instance,
//! and the post-call native value flows back through `FromUnmanaged` before any managed
//! value is produced.
//!
//! The one ordering subtlety lives in `ToUnmanaged`: when the adapter also declares the
//! caller-allocated buffer overload, the native result may depend on a buffer supplied
//! while pinned, so the assignment is deferred from `MarshalToNative` to `PinnedMarshal`.

use crate::{
    context::{GenerationContext, Purpose},
    descriptor::{ParameterDescriptor, TypeName},
    operation::{EntryPoint, Operation},
    shape::{MarshallerShape, ShapeDescriptor},
    strategies::MarshallingStrategy,
    Result,
};

/// Strategy for adapters that marshal through instance members.
///
/// `Setup` constructs the instance under a context-scoped identifier; every other stage
/// resolves that identifier, so a stage running before `Setup` surfaces as
/// [`crate::Error::UnresolvedIdentifier`] instead of producing a dangling reference.
#[derive(Debug)]
pub struct StatefulValueStrategy {
    marshaller: TypeName,
    native: TypeName,
    shape: ShapeDescriptor,
}

impl StatefulValueStrategy {
    /// Creates the strategy for one adapter.
    ///
    /// # Arguments
    ///
    /// * `marshaller` - Identity of the marshaller type to instantiate per parameter
    /// * `native` - Identity of the native representation type
    /// * `shape` - The adapter's declared capabilities
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidShape`] if the declared capability combination is
    /// internally inconsistent.
    pub fn new(marshaller: TypeName, native: TypeName, shape: ShapeDescriptor) -> Result<Self> {
        shape.validate()?;
        Ok(StatefulValueStrategy {
            marshaller,
            native,
            shape,
        })
    }

    fn defers_to_pinned_marshal(&self) -> bool {
        self.shape
            .marshaller
            .contains(MarshallerShape::CALLER_ALLOCATED_BUFFER)
    }
}

impl MarshallingStrategy for StatefulValueStrategy {
    fn native_type(&self) -> &TypeName {
        &self.native
    }

    fn shape(&self) -> &ShapeDescriptor {
        &self.shape
    }

    fn uses_native_identifier(&self) -> bool {
        true
    }

    fn setup(
        &self,
        param: &ParameterDescriptor,
        ctx: &mut GenerationContext,
    ) -> Result<Vec<Operation>> {
        let name = ctx.declare(param.index, Purpose::Marshaller);
        Ok(vec![Operation::ConstructMarshaller {
            name,
            marshaller: self.marshaller.clone(),
        }])
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

        let instance = ctx.resolve(param.index, Purpose::Marshaller)?;
        let managed = ctx.declare(param.index, Purpose::Managed);
        let mut ops = vec![Operation::InstanceCall {
            receiver: instance.clone(),
            method: EntryPoint::FromManaged,
            args: vec![managed],
        }];

        if !self.defers_to_pinned_marshal() {
            let native = ctx.declare(param.index, Purpose::Native);
            ops.push(Operation::AssignInstanceCall {
                target: native,
                receiver: instance,
                method: EntryPoint::ToUnmanaged,
                args: Vec::new(),
            });
        }
        Ok(ops)
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

        // ToUnmanaged stays in PinnedMarshal: the result may point into the buffer.
        let instance = ctx.resolve(param.index, Purpose::Marshaller)?;
        let managed = ctx.declare(param.index, Purpose::Managed);
        Ok(vec![Operation::InstanceCall {
            receiver: instance,
            method: EntryPoint::FromManaged,
            args: vec![managed, buffer.to_string()],
        }])
    }

    fn pinned_marshal(
        &self,
        param: &ParameterDescriptor,
        ctx: &mut GenerationContext,
    ) -> Result<Vec<Operation>> {
        if !self.shape.marshaller.contains(MarshallerShape::TO_UNMANAGED)
            || !self.defers_to_pinned_marshal()
            || !param.transfers_to_native()
        {
            return Ok(Vec::new());
        }

        let instance = ctx.resolve(param.index, Purpose::Marshaller)?;
        let native = ctx.declare(param.index, Purpose::Native);
        Ok(vec![Operation::AssignInstanceCall {
            target: native,
            receiver: instance,
            method: EntryPoint::ToUnmanaged,
            args: Vec::new(),
        }])
    }

    fn unmarshal_capture(
        &self,
        param: &ParameterDescriptor,
        ctx: &mut GenerationContext,
    ) -> Result<Vec<Operation>> {
        let captures = self.shape.marshaller.contains(MarshallerShape::TO_MANAGED)
            || self
                .shape
                .marshaller
                .contains(MarshallerShape::GUARANTEED_UNMARSHAL);
        if !captures || !param.transfers_to_managed() {
            return Ok(Vec::new());
        }

        let instance = ctx.resolve(param.index, Purpose::Marshaller)?;
        let native = ctx.declare(param.index, Purpose::Native);
        Ok(vec![Operation::InstanceCall {
            receiver: instance,
            method: EntryPoint::FromUnmanaged,
            args: vec![native],
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

        let instance = ctx.resolve(param.index, Purpose::Marshaller)?;
        let managed = ctx.declare(param.index, Purpose::Managed);
        Ok(vec![Operation::AssignInstanceCall {
            target: managed,
            receiver: instance,
            method: EntryPoint::ToManaged,
            args: Vec::new(),
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

        let instance = ctx.resolve(param.index, Purpose::Marshaller)?;
        let managed = ctx.declare(param.index, Purpose::Managed);
        Ok(vec![Operation::AssignInstanceCall {
            target: managed,
            receiver: instance,
            method: EntryPoint::ToManagedFinally,
            args: Vec::new(),
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

        let instance = ctx.resolve(param.index, Purpose::Marshaller)?;
        Ok(vec![Operation::InstanceCall {
            receiver: instance,
            method: EntryPoint::OnInvoked,
            args: Vec::new(),
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

        // State carries everything needed; Free takes no arguments.
        let instance = ctx.resolve(param.index, Purpose::Marshaller)?;
        Ok(vec![Operation::InstanceCall {
            receiver: instance,
            method: EntryPoint::Free,
            args: Vec::new(),
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ByValueContents;
    use crate::descriptor::{ByRefKind, MarshalDirection, ParamIndex};

    fn strategy(shape: MarshallerShape) -> StatefulValueStrategy {
        StatefulValueStrategy::new(
            "HandleMarshaller".into(),
            "void*".into(),
            ShapeDescriptor::value(shape),
        )
        .unwrap()
    }

    fn bidirectional(index: u32) -> ParameterDescriptor {
        ParameterDescriptor::new(
            "SafeHandle".into(),
            MarshalDirection::Bidirectional,
            ByRefKind::Ref,
            ParamIndex::Param(index),
        )
    }

    #[test]
    fn test_setup_constructs_instance() {
        let strategy = strategy(MarshallerShape::TO_UNMANAGED);
        let param = bidirectional(0);
        let mut ctx = GenerationContext::new(false, ByValueContents::Default);

        let setup = strategy.setup(&param, &mut ctx).unwrap();
        assert_eq!(setup.len(), 1);
        assert!(matches!(
            &setup[0],
            Operation::ConstructMarshaller { name, .. } if name == "__p0_marshaller"
        ));
    }

    #[test]
    fn test_stage_before_setup_is_an_ordering_bug() {
        let strategy = strategy(MarshallerShape::TO_UNMANAGED);
        let param = bidirectional(0);
        let mut ctx = GenerationContext::new(false, ByValueContents::Default);

        let result = strategy.marshal_to_native(&param, &mut ctx);
        assert!(matches!(
            result.unwrap_err(),
            crate::Error::UnresolvedIdentifier {
                purpose: Purpose::Marshaller,
                ..
            }
        ));
    }

    #[test]
    fn test_to_unmanaged_in_marshal_stage_without_buffer_overload() {
        let strategy = strategy(MarshallerShape::TO_UNMANAGED);
        let param = bidirectional(0);
        let mut ctx = GenerationContext::new(false, ByValueContents::Default);

        strategy.setup(&param, &mut ctx).unwrap();
        let marshal = strategy.marshal_to_native(&param, &mut ctx).unwrap();
        assert_eq!(marshal.len(), 2);
        assert!(matches!(
            &marshal[1],
            Operation::AssignInstanceCall {
                method: EntryPoint::ToUnmanaged,
                ..
            }
        ));
        assert!(strategy.pinned_marshal(&param, &mut ctx).unwrap().is_empty());
    }

    #[test]
    fn test_to_unmanaged_deferred_when_buffer_overload_declared() {
        let strategy = strategy(
            MarshallerShape::TO_UNMANAGED | MarshallerShape::CALLER_ALLOCATED_BUFFER,
        );
        let param = bidirectional(0);
        let mut ctx = GenerationContext::new(true, ByValueContents::Default);

        strategy.setup(&param, &mut ctx).unwrap();
        let marshal = strategy.marshal_to_native(&param, &mut ctx).unwrap();
        assert_eq!(marshal.len(), 1);
        assert!(matches!(
            &marshal[0],
            Operation::InstanceCall {
                method: EntryPoint::FromManaged,
                ..
            }
        ));

        let pinned = strategy.pinned_marshal(&param, &mut ctx).unwrap();
        assert_eq!(pinned.len(), 1);
        assert!(matches!(
            &pinned[0],
            Operation::AssignInstanceCall {
                method: EntryPoint::ToUnmanaged,
                ..
            }
        ));
    }

    #[test]
    fn test_capture_precedes_managed_production() {
        let strategy = strategy(MarshallerShape::TO_MANAGED);
        let param = bidirectional(0);
        let mut ctx = GenerationContext::new(false, ByValueContents::Default);

        strategy.setup(&param, &mut ctx).unwrap();
        let capture = strategy.unmarshal_capture(&param, &mut ctx).unwrap();
        assert!(matches!(
            &capture[0],
            Operation::InstanceCall {
                method: EntryPoint::FromUnmanaged,
                ..
            }
        ));

        let unmarshal = strategy.unmarshal(&param, &mut ctx).unwrap();
        assert!(matches!(
            &unmarshal[0],
            Operation::AssignInstanceCall {
                method: EntryPoint::ToManaged,
                args,
                ..
            } if args.is_empty()
        ));
    }

    #[test]
    fn test_cleanup_takes_no_arguments() {
        let strategy = strategy(MarshallerShape::TO_UNMANAGED | MarshallerShape::FREE);
        let param = bidirectional(0);
        let mut ctx = GenerationContext::new(false, ByValueContents::Default);

        strategy.setup(&param, &mut ctx).unwrap();
        let cleanup = strategy.cleanup(&param, &mut ctx).unwrap();
        assert_eq!(cleanup.len(), 1);
        assert!(matches!(
            &cleanup[0],
            Operation::InstanceCall {
                method: EntryPoint::Free,
                args,
                ..
            } if args.is_empty()
        ));
    }
}
