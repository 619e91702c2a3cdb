//! Capability shapes declared by marshaller adapters.
//!
//! A *shape* is the declared set of operations a given adapter type supports for a native
//! type. Shapes are adapter-declared truth: the engine never emits an operation for a
//! capability the adapter does not declare, and the absence of a capability means
//! "contributes nothing" to the affected stage - never an error. The only errors a shape can
//! produce are internal inconsistencies, rejected by [`ShapeDescriptor::validate`] when a
//! strategy is constructed.
//!
//! # Key Components
//!
//! - [`crate::shape::MarshallerShape`] - Value-marshalling capability flags
//! - [`crate::shape::CollectionShape`] - Linear-collection capability flags
//! - [`crate::shape::ShapeDescriptor`] - The complete capability declaration of one adapter

use bitflags::bitflags;

use crate::Result;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// Value-marshalling capabilities an adapter can declare.
    pub struct MarshallerShape: u32 {
        /// Supports converting a managed value to its native representation
        const TO_UNMANAGED = 0x0001;
        /// Supports releasing the native representation
        const FREE = 0x0002;
        /// Supports converting a native value back to its managed representation
        const TO_MANAGED = 0x0004;
        /// Supports a managed conversion that must succeed even when invocation failed
        const GUARANTEED_UNMARSHAL = 0x0008;
        /// Supports a conversion overload that writes through a caller-supplied buffer
        const CALLER_ALLOCATED_BUFFER = 0x0010;
        /// Supports a post-success notification hook
        const NOTIFY_INVOKE_SUCCEEDED = 0x0020;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// Linear-collection capabilities an adapter can declare.
    ///
    /// Collection adapters move elements through *views*: a source view over the container
    /// being read and a destination view over the container being written. The allocator
    /// flags pair with the view flags of the same direction.
    pub struct CollectionShape: u32 {
        /// Supports allocating a native container sized to the element count
        const ALLOCATE_CONTAINER_FOR_UNMANAGED = 0x0001;
        /// Supports obtaining a writable view over the native container
        const GET_UNMANAGED_DESTINATION = 0x0002;
        /// Supports obtaining a readable view over the managed container
        const GET_MANAGED_SOURCE = 0x0004;
        /// Supports allocating a managed container sized to the element count
        const ALLOCATE_CONTAINER_FOR_MANAGED = 0x0008;
        /// Supports obtaining a readable view over the native container
        const GET_UNMANAGED_SOURCE = 0x0010;
        /// Supports obtaining a writable view over the managed container
        const GET_MANAGED_DESTINATION = 0x0020;
    }
}

/// The complete capability declaration of one marshaller adapter.
///
/// Value adapters leave the collection set empty; linear-collection adapters declare both
/// sets. Strategies validate the descriptor once at construction and thereafter treat it as
/// read-only truth about what the adapter can do.
///
/// # Examples
///
/// ```rust
/// use interopgen::shape::{MarshallerShape, ShapeDescriptor};
///
/// let shape = ShapeDescriptor::value(MarshallerShape::TO_UNMANAGED | MarshallerShape::FREE);
/// assert!(shape.validate().is_ok());
///
/// // A buffer overload without the conversion it overloads is inconsistent.
/// let bad = ShapeDescriptor::value(MarshallerShape::CALLER_ALLOCATED_BUFFER);
/// assert!(bad.validate().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeDescriptor {
    /// Value-marshalling capabilities
    pub marshaller: MarshallerShape,
    /// Linear-collection capabilities
    pub collection: CollectionShape,
}

impl ShapeDescriptor {
    /// Creates a shape for a value adapter with no collection capabilities.
    #[must_use]
    pub fn value(marshaller: MarshallerShape) -> Self {
        ShapeDescriptor {
            marshaller,
            collection: CollectionShape::empty(),
        }
    }

    /// Creates a shape for a linear-collection adapter.
    #[must_use]
    pub fn collection(marshaller: MarshallerShape, collection: CollectionShape) -> Self {
        ShapeDescriptor {
            marshaller,
            collection,
        }
    }

    /// Checks the declared capability combination for internal consistency.
    ///
    /// Validation rules:
    /// - `CALLER_ALLOCATED_BUFFER` requires `TO_UNMANAGED` (the buffer conversion is an
    ///   overload of the managed-to-native conversion)
    /// - the native-direction view getters require `ALLOCATE_CONTAINER_FOR_UNMANAGED`
    /// - the managed-direction view getters require `ALLOCATE_CONTAINER_FOR_MANAGED`
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidShape`] naming the inconsistent flags. Detected at
    /// strategy construction, fatal to that stub's generation.
    pub fn validate(&self) -> Result<()> {
        if self
            .marshaller
            .contains(MarshallerShape::CALLER_ALLOCATED_BUFFER)
            && !self.marshaller.contains(MarshallerShape::TO_UNMANAGED)
        {
            return Err(invalid_shape_error!(
                "CALLER_ALLOCATED_BUFFER declared without TO_UNMANAGED"
            ));
        }

        let needs_unmanaged_allocator =
            CollectionShape::GET_UNMANAGED_DESTINATION | CollectionShape::GET_MANAGED_SOURCE;
        if self.collection.intersects(needs_unmanaged_allocator)
            && !self
                .collection
                .contains(CollectionShape::ALLOCATE_CONTAINER_FOR_UNMANAGED)
        {
            return Err(invalid_shape_error!(
                "collection view getters declared without ALLOCATE_CONTAINER_FOR_UNMANAGED - {:?}",
                self.collection
            ));
        }

        let needs_managed_allocator =
            CollectionShape::GET_UNMANAGED_SOURCE | CollectionShape::GET_MANAGED_DESTINATION;
        if self.collection.intersects(needs_managed_allocator)
            && !self
                .collection
                .contains(CollectionShape::ALLOCATE_CONTAINER_FOR_MANAGED)
        {
            return Err(invalid_shape_error!(
                "collection view getters declared without ALLOCATE_CONTAINER_FOR_MANAGED - {:?}",
                self.collection
            ));
        }

        Ok(())
    }
}
