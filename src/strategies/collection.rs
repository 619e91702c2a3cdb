//! Linear-collection marshalling: containers whose elements may need conversion.
//!
//! A linear collection crosses the boundary in two steps: allocate a container on the
//! destination side, then copy elements between a readable source view and a writable
//! destination view. Two optimizations complicate the picture:
//!
//! - **cast-skip**: when the managed and native element representations are bit-identical,
//!   the reinterpreting cast between the views is unnecessary (and in some target
//!   languages referentially meaningless), so it is skipped entirely; when they differ but
//!   share a fixed byte layout, exactly one reinterpretation precedes the copy.
//! - **by-value "out" contents**: a by-value container whose contents only travel out of
//!   the callee skips the copy-in altogether. The freshly allocated native memory is
//!   cleared instead, so the callee can never read uninitialized memory as meaningful
//!   input, and unmarshalling populates the *existing* managed container in place -
//!   allocating a fresh one would break container identity for the caller.
//!
//! Element representations that are neither identical nor layout-compatible have no
//! well-defined cast; that is [`crate::Error::AmbiguousElementMapping`], detected at
//! construction before any operation is emitted.

use crate::{
    context::{GenerationContext, Purpose},
    descriptor::{ElementLayout, ParameterDescriptor, TypeName},
    operation::{EntryPoint, Operation},
    shape::{CollectionShape, MarshallerShape, ShapeDescriptor},
    strategies::MarshallingStrategy,
    Result,
};

/// How a collection's managed and native element representations relate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ElementRelation {
    /// Bit-identical representations; views are used as-is
    Identical,
    /// Equal fixed byte layouts; one reinterpreting cast bridges the views
    Reinterpret,
}

/// Strategy for sequence-typed parameters marshalled through a stateless collection
/// adapter.
///
/// `Setup` declares the element-count local that carries the count between the marshal and
/// unmarshal stages; the native container handle is the communication channel for the
/// container itself, so [`MarshallingStrategy::uses_native_identifier`] is always `true`.
///
/// # Examples
///
/// ```rust
/// use interopgen::prelude::*;
///
/// // A blittable int[] parameter: elements are identical on both sides.
/// let strategy = LinearCollectionStrategy::new(
///     "ArrayMarshaller".into(),
///     "int*".into(),
///     ElementLayout::sized("int".into(), 4),
///     ElementLayout::sized("int".into(), 4),
///     ShapeDescriptor::collection(
///         MarshallerShape::TO_UNMANAGED,
///         CollectionShape::ALLOCATE_CONTAINER_FOR_UNMANAGED
///             | CollectionShape::GET_MANAGED_SOURCE
///             | CollectionShape::GET_UNMANAGED_DESTINATION,
///     ),
/// )?;
/// assert!(!strategy.requires_element_cast());
/// # Ok::<(), interopgen::Error>(())
/// ```
#[derive(Debug)]
pub struct LinearCollectionStrategy {
    marshaller: TypeName,
    native: TypeName,
    managed_element: ElementLayout,
    native_element: ElementLayout,
    relation: ElementRelation,
    shape: ShapeDescriptor,
}

impl LinearCollectionStrategy {
    /// Creates the strategy for one collection adapter.
    ///
    /// # Arguments
    ///
    /// * `marshaller` - Identity of the marshaller type carrying the entry points
    /// * `native` - Identity of the native container representation
    /// * `managed_element` - Layout of the managed element representation
    /// * `native_element` - Layout of the native element representation
    /// * `shape` - The adapter's declared capabilities
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidShape`] if the capability combination is
    /// inconsistent, or [`crate::Error::AmbiguousElementMapping`] if the element
    /// representations are neither identical nor in a known layout relationship.
    pub fn new(
        marshaller: TypeName,
        native: TypeName,
        managed_element: ElementLayout,
        native_element: ElementLayout,
        shape: ShapeDescriptor,
    ) -> Result<Self> {
        shape.validate()?;

        let relation = if managed_element.is_identical(&native_element) {
            ElementRelation::Identical
        } else if managed_element.is_reinterpretable_as(&native_element) {
            ElementRelation::Reinterpret
        } else {
            return Err(crate::Error::AmbiguousElementMapping {
                managed: managed_element.ty,
                native: native_element.ty,
            });
        };

        Ok(LinearCollectionStrategy {
            marshaller,
            native,
            managed_element,
            native_element,
            relation,
            shape,
        })
    }

    /// Do the element representations differ, requiring a reinterpreting cast?
    #[must_use]
    pub fn requires_element_cast(&self) -> bool {
        self.relation == ElementRelation::Reinterpret
    }

    /// Bridges a native-side view to the managed element type, applying cast-skip.
    ///
    /// Returns the identifier the copy should use in place of `native_view`, pushing the
    /// reinterpretation when one is needed.
    fn bridge_native_view(
        &self,
        param: &ParameterDescriptor,
        ctx: &mut GenerationContext,
        ops: &mut Vec<Operation>,
        native_view: &str,
    ) -> String {
        match self.relation {
            ElementRelation::Identical => native_view.to_string(),
            ElementRelation::Reinterpret => {
                let cast = ctx.declare(param.index, Purpose::CastView);
                ops.push(Operation::ReinterpretView {
                    target: cast.clone(),
                    source: native_view.to_string(),
                    from: self.native_element.ty.clone(),
                    to: self.managed_element.ty.clone(),
                });
                cast
            }
        }
    }

    /// The native-to-managed contents transfer, shared by the ordinary and guaranteed
    /// unmarshal stages.
    fn emit_unmarshal(
        &self,
        param: &ParameterDescriptor,
        ctx: &mut GenerationContext,
    ) -> Result<Vec<Operation>> {
        let in_place = param.is_by_value() && ctx.by_value_contents().marshals_out();
        if !in_place && !param.transfers_to_managed() {
            return Ok(Vec::new());
        }

        let managed = ctx.declare(param.index, Purpose::Managed);
        let native = ctx.declare(param.index, Purpose::Native);
        let count = ctx.resolve(param.index, Purpose::ElementCount)?;
        let mut ops = Vec::new();

        if in_place {
            // Populate the existing managed container; a fresh allocation would break
            // container identity for the caller.
            if !self
                .shape
                .collection
                .contains(CollectionShape::GET_UNMANAGED_DESTINATION | CollectionShape::GET_MANAGED_SOURCE)
            {
                return Ok(ops);
            }
            let native_view = ctx.declare(param.index, Purpose::NativeView);
            ops.push(Operation::AssignStaticCall {
                target: native_view.clone(),
                marshaller: self.marshaller.clone(),
                method: EntryPoint::GetUnmanagedValuesDestination,
                args: vec![native, count],
            });
            let managed_view = ctx.declare(param.index, Purpose::ManagedView);
            ops.push(Operation::AssignStaticCall {
                target: managed_view.clone(),
                marshaller: self.marshaller.clone(),
                method: EntryPoint::GetManagedValuesSource,
                args: vec![managed],
            });
            let source = self.bridge_native_view(param, ctx, &mut ops, &native_view);
            ops.push(Operation::CopyView {
                source,
                target: managed_view,
            });
            return Ok(ops);
        }

        if !self
            .shape
            .collection
            .contains(CollectionShape::ALLOCATE_CONTAINER_FOR_MANAGED)
        {
            return Ok(ops);
        }
        ops.push(Operation::AssignStaticCall {
            target: managed.clone(),
            marshaller: self.marshaller.clone(),
            method: EntryPoint::AllocateContainerForManagedElements,
            args: vec![native.clone(), count.clone()],
        });

        if !self
            .shape
            .collection
            .contains(CollectionShape::GET_UNMANAGED_SOURCE | CollectionShape::GET_MANAGED_DESTINATION)
        {
            return Ok(ops);
        }
        let native_view = ctx.declare(param.index, Purpose::NativeView);
        ops.push(Operation::AssignStaticCall {
            target: native_view.clone(),
            marshaller: self.marshaller.clone(),
            method: EntryPoint::GetUnmanagedValuesSource,
            args: vec![native, count],
        });
        let managed_view = ctx.declare(param.index, Purpose::ManagedView);
        ops.push(Operation::AssignStaticCall {
            target: managed_view.clone(),
            marshaller: self.marshaller.clone(),
            method: EntryPoint::GetManagedValuesDestination,
            args: vec![managed],
        });
        let source = self.bridge_native_view(param, ctx, &mut ops, &native_view);
        ops.push(Operation::CopyView {
            source,
            target: managed_view,
        });
        Ok(ops)
    }
}

impl MarshallingStrategy for LinearCollectionStrategy {
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
        let count = ctx.declare(param.index, Purpose::ElementCount);
        Ok(vec![Operation::DeclareLocal {
            name: count,
            ty: "int".into(),
        }])
    }

    fn marshal_to_native(
        &self,
        param: &ParameterDescriptor,
        ctx: &mut GenerationContext,
    ) -> Result<Vec<Operation>> {
        if !self.shape.marshaller.contains(MarshallerShape::TO_UNMANAGED)
            || !param.transfers_to_native()
            || !self
                .shape
                .collection
                .contains(CollectionShape::ALLOCATE_CONTAINER_FOR_UNMANAGED)
        {
            return Ok(Vec::new());
        }

        let managed = ctx.declare(param.index, Purpose::Managed);
        let native = ctx.declare(param.index, Purpose::Native);
        let count = ctx.resolve(param.index, Purpose::ElementCount)?;

        // The allocate call returns the container and writes the element count through
        // its final argument.
        let mut ops = vec![Operation::AssignStaticCall {
            target: native.clone(),
            marshaller: self.marshaller.clone(),
            method: EntryPoint::AllocateContainerForUnmanagedElements,
            args: vec![managed.clone(), count.clone()],
        }];

        if param.is_by_value() && ctx.by_value_contents().is_out_only() {
            // Contents only travel out: nothing to copy in, but the callee must never
            // read uninitialized native memory as meaningful input.
            if self
                .shape
                .collection
                .contains(CollectionShape::GET_UNMANAGED_DESTINATION)
            {
                let dest_view = ctx.declare(param.index, Purpose::NativeView);
                ops.push(Operation::AssignStaticCall {
                    target: dest_view.clone(),
                    marshaller: self.marshaller.clone(),
                    method: EntryPoint::GetUnmanagedValuesDestination,
                    args: vec![native, count],
                });
                ops.push(Operation::ClearView { view: dest_view });
            }
            return Ok(ops);
        }

        if !self
            .shape
            .collection
            .contains(CollectionShape::GET_MANAGED_SOURCE | CollectionShape::GET_UNMANAGED_DESTINATION)
        {
            return Ok(ops);
        }
        let source_view = ctx.declare(param.index, Purpose::ManagedView);
        ops.push(Operation::AssignStaticCall {
            target: source_view.clone(),
            marshaller: self.marshaller.clone(),
            method: EntryPoint::GetManagedValuesSource,
            args: vec![managed],
        });
        let dest_view = ctx.declare(param.index, Purpose::NativeView);
        ops.push(Operation::AssignStaticCall {
            target: dest_view.clone(),
            marshaller: self.marshaller.clone(),
            method: EntryPoint::GetUnmanagedValuesDestination,
            args: vec![native, count],
        });
        let target = self.bridge_native_view(param, ctx, &mut ops, &dest_view);
        ops.push(Operation::CopyView {
            source: source_view,
            target,
        });
        Ok(ops)
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
            || !self.shape.marshaller.contains(MarshallerShape::TO_MANAGED)
        {
            return Ok(Vec::new());
        }
        self.emit_unmarshal(param, ctx)
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
        {
            return Ok(Vec::new());
        }
        self.emit_unmarshal(param, ctx)
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
