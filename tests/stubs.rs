//! Integration tests for full stub assembly.
//!
//! These tests drive realistic signatures end-to-end through the assembler: descriptors
//! and shapes in, one stage-partitioned operation sequence out, with the pairing and
//! ordering invariants checked on the assembled result.

use interopgen::prelude::*;
use interopgen::Error;

fn utf8_string_strategy(shape: MarshallerShape) -> Result<StrategyBox> {
    Ok(Box::new(StatelessValueStrategy::new(
        "Utf8StringMarshaller".into(),
        "byte*".into(),
        ShapeDescriptor::value(shape),
    )?))
}

fn blittable_array_strategy(
    marshaller: MarshallerShape,
    collection: CollectionShape,
) -> Result<StrategyBox> {
    Ok(Box::new(LinearCollectionStrategy::new(
        "ArrayMarshaller".into(),
        "int*".into(),
        ElementLayout::sized("int".into(), 4),
        ElementLayout::sized("int".into(), 4),
        ShapeDescriptor::collection(marshaller, collection),
    )?))
}

fn by_value_in(index: u32, managed: &str) -> ParameterDescriptor {
    ParameterDescriptor::new(
        managed.into(),
        MarshalDirection::ManagedToNative,
        ByRefKind::ByValue,
        ParamIndex::Param(index),
    )
}

fn count_ops<'a>(
    ops: impl Iterator<Item = &'a Operation>,
    matches: impl Fn(&Operation) -> bool,
) -> usize {
    ops.filter(|op| matches(op)).count()
}

/// A by-value "in" parameter of a blittable array type, marshalled by a stateless
/// linear-collection adapter that only converts towards native: setup declares the count
/// local, marshal allocates and copies with no element cast, and every later stage is
/// empty.
#[test]
fn test_blittable_array_in_parameter_end_to_end() -> Result<()> {
    let strategy = blittable_array_strategy(
        MarshallerShape::TO_UNMANAGED,
        CollectionShape::ALLOCATE_CONTAINER_FOR_UNMANAGED
            | CollectionShape::GET_MANAGED_SOURCE
            | CollectionShape::GET_UNMANAGED_DESTINATION,
    )?;
    let mut ctx = GenerationContext::new(true, ByValueContents::Default);
    let stub = StubAssembler::new(NativeFunction::new("sum_values"))
        .bind(BoundParameter::new(by_value_in(0, "int[]"), strategy))
        .assemble(&mut ctx)?;

    // Setup: the assembler-declared native container handle plus the count local.
    let setup: Vec<&Operation> = stub.stage_ops(Stage::Setup).collect();
    assert_eq!(setup.len(), 2);
    assert!(matches!(
        setup[1],
        Operation::DeclareLocal { name, .. } if name == "__p0_num_elements"
    ));

    // Marshal: exactly one container allocation, exactly one copy, no reinterpretation.
    assert_eq!(
        count_ops(stub.stage_ops(Stage::MarshalToNative), |op| matches!(
            op,
            Operation::AssignStaticCall {
                method: EntryPoint::AllocateContainerForUnmanagedElements,
                ..
            }
        )),
        1
    );
    assert_eq!(
        count_ops(stub.stage_ops(Stage::MarshalToNative), |op| matches!(
            op,
            Operation::CopyView { .. }
        )),
        1
    );
    assert_eq!(
        count_ops(stub.stage_ops(Stage::MarshalToNative), |op| matches!(
            op,
            Operation::ReinterpretView { .. }
        )),
        0
    );

    // All other stages contribute nothing; the invocation stands alone.
    assert_eq!(stub.stage_ops(Stage::Pin).count(), 0);
    assert_eq!(stub.stage_ops(Stage::PinnedMarshal).count(), 0);
    assert_eq!(stub.stage_ops(Stage::UnmarshalCapture).count(), 0);
    assert_eq!(stub.stage_ops(Stage::Unmarshal).count(), 0);
    assert_eq!(stub.stage_ops(Stage::NotifyInvokeSucceeded).count(), 0);
    assert_eq!(stub.stage_ops(Stage::GuaranteedUnmarshal).count(), 0);
    assert_eq!(stub.stage_ops(Stage::Cleanup).count(), 0);
    assert_eq!(stub.stage_ops(Stage::Invoke).count(), 1);
    Ok(())
}

/// The stack-buffer fast path is taken per parameter, not per stub: under a single frame,
/// the "in" by-reference string gets the buffer while the "ref" string next to it
/// delegates to the plain conversion.
#[test]
fn test_buffer_eligibility_is_per_parameter() -> Result<()> {
    let buffer_shape = MarshallerShape::TO_UNMANAGED
        | MarshallerShape::CALLER_ALLOCATED_BUFFER
        | MarshallerShape::FREE;

    let make_decorated = || -> Result<StrategyBox> {
        let inner = StatelessValueStrategy::new(
            "Utf8StringMarshaller".into(),
            "byte*".into(),
            ShapeDescriptor::value(buffer_shape),
        )?;
        Ok(Box::new(CallerAllocatedBufferDecorator::new(
            inner,
            "byte".into(),
            256,
        )?))
    };

    let in_param = ParameterDescriptor::new(
        "string".into(),
        MarshalDirection::ManagedToNative,
        ByRefKind::In,
        ParamIndex::Param(0),
    );
    let ref_param = ParameterDescriptor::new(
        "string".into(),
        MarshalDirection::Bidirectional,
        ByRefKind::Ref,
        ParamIndex::Param(1),
    );

    let mut ctx = GenerationContext::new(true, ByValueContents::Default);
    let stub = StubAssembler::new(NativeFunction::new("format_path"))
        .bind(BoundParameter::new(in_param, make_decorated()?))
        .bind(BoundParameter::new(ref_param, make_decorated()?))
        .assemble(&mut ctx)?;

    let p0_allocs = count_ops(stub.param_ops(ParamIndex::Param(0)), |op| {
        matches!(op, Operation::StackAlloc { .. })
    });
    let p1_allocs = count_ops(stub.param_ops(ParamIndex::Param(1)), |op| {
        matches!(op, Operation::StackAlloc { .. })
    });
    assert_eq!(p0_allocs, 1);
    assert_eq!(p1_allocs, 0);

    // Under a reentrant frame nothing takes the buffer path, direction regardless.
    let mut reentrant_ctx = GenerationContext::new(false, ByValueContents::Default);
    let reentrant = StubAssembler::new(NativeFunction::new("format_path"))
        .bind(BoundParameter::new(
            by_value_in(0, "string"),
            make_decorated()?,
        ))
        .assemble(&mut reentrant_ctx)?;
    assert_eq!(
        count_ops(reentrant.stage_ops(Stage::MarshalToNative), |op| matches!(
            op,
            Operation::StackAlloc { .. }
        )),
        0
    );
    Ok(())
}

/// Every parameter of a {ToUnmanaged, Free} signature pairs exactly one
/// allocation-producing conversion with exactly one free, and the frees land in the
/// stage that runs on every exit path.
#[test]
fn test_allocation_free_pairing_across_full_stub() -> Result<()> {
    let mut assembler = StubAssembler::new(NativeFunction::new("concat"));
    for index in 0..3 {
        assembler = assembler.bind(BoundParameter::new(
            by_value_in(index, "string"),
            utf8_string_strategy(MarshallerShape::TO_UNMANAGED | MarshallerShape::FREE)?,
        ));
    }

    let mut ctx = GenerationContext::new(false, ByValueContents::Default);
    let stub = assembler.assemble(&mut ctx)?;

    for index in 0..3 {
        let param = ParamIndex::Param(index);
        let conversions = count_ops(stub.param_ops(param), |op| {
            matches!(
                op,
                Operation::AssignStaticCall {
                    method: EntryPoint::ConvertToUnmanaged,
                    ..
                }
            )
        });
        let frees = count_ops(stub.param_ops(param), |op| {
            matches!(
                op,
                Operation::StaticCall {
                    method: EntryPoint::Free,
                    ..
                }
            )
        });
        assert_eq!(conversions, 1, "parameter {param} allocations");
        assert_eq!(frees, 1, "parameter {param} frees");
    }

    assert_eq!(Stage::Cleanup.execution_path(), ExecutionPath::Always);
    assert_eq!(stub.stage(Stage::Cleanup).count(), 3);
    Ok(())
}

/// A stateful out-handle parameter with guaranteed unmarshalling: the post-call value is
/// captured immediately after the invocation, the managed value is produced in the stage
/// that runs on every exit path, and the ordinary unmarshal stage stays empty.
#[test]
fn test_stateful_guaranteed_unmarshal_stub() -> Result<()> {
    let strategy: StrategyBox = Box::new(StatefulValueStrategy::new(
        "SafeHandleMarshaller".into(),
        "void*".into(),
        ShapeDescriptor::value(
            MarshallerShape::TO_MANAGED
                | MarshallerShape::GUARANTEED_UNMARSHAL
                | MarshallerShape::FREE,
        ),
    )?);
    let out_handle = ParameterDescriptor::new(
        "SafeFileHandle".into(),
        MarshalDirection::NativeToManaged,
        ByRefKind::Out,
        ParamIndex::Param(0),
    );

    let mut ctx = GenerationContext::new(false, ByValueContents::Default);
    let stub = StubAssembler::new(NativeFunction::new("open_file"))
        .bind(BoundParameter::new(out_handle, strategy))
        .assemble(&mut ctx)?;

    assert_eq!(
        count_ops(stub.stage_ops(Stage::UnmarshalCapture), |op| matches!(
            op,
            Operation::InstanceCall {
                method: EntryPoint::FromUnmanaged,
                ..
            }
        )),
        1
    );
    assert_eq!(stub.stage_ops(Stage::Unmarshal).count(), 0);
    assert_eq!(
        count_ops(stub.stage_ops(Stage::GuaranteedUnmarshal), |op| matches!(
            op,
            Operation::AssignInstanceCall {
                method: EntryPoint::ToManagedFinally,
                ..
            }
        )),
        1
    );

    // Cleanup is the last block of the assembled sequence.
    assert_eq!(stub.blocks().last().unwrap().stage, Stage::Cleanup);
    Ok(())
}

/// A by-value array whose contents only travel out: the native memory is cleared instead
/// of copied into, and unmarshalling populates the existing managed container in place.
#[test]
fn test_by_value_out_contents_array_stub() -> Result<()> {
    let strategy = blittable_array_strategy(
        MarshallerShape::TO_UNMANAGED | MarshallerShape::TO_MANAGED,
        CollectionShape::all(),
    )?;
    let mut ctx = GenerationContext::new(false, ByValueContents::Out);
    let stub = StubAssembler::new(NativeFunction::new("fill_buffer"))
        .bind(BoundParameter::new(by_value_in(0, "int[]"), strategy))
        .assemble(&mut ctx)?;

    assert_eq!(
        count_ops(stub.stage_ops(Stage::MarshalToNative), |op| matches!(
            op,
            Operation::ClearView { .. }
        )),
        1
    );
    assert_eq!(
        count_ops(stub.stage_ops(Stage::MarshalToNative), |op| matches!(
            op,
            Operation::CopyView { .. }
        )),
        0
    );

    assert_eq!(
        count_ops(stub.stage_ops(Stage::Unmarshal), |op| matches!(
            op,
            Operation::AssignStaticCall {
                method: EntryPoint::AllocateContainerForManagedElements,
                ..
            }
        )),
        0
    );
    assert_eq!(
        count_ops(stub.stage_ops(Stage::Unmarshal), |op| matches!(
            op,
            Operation::CopyView { .. }
        )),
        1
    );
    Ok(())
}

/// Elements that differ but share a layout get exactly one reinterpretation before each
/// copy, on both sides of the call.
#[test]
fn test_element_cast_emitted_once_per_copy() -> Result<()> {
    let strategy: StrategyBox = Box::new(LinearCollectionStrategy::new(
        "ArrayMarshaller".into(),
        "int*".into(),
        ElementLayout::sized("bool".into(), 4),
        ElementLayout::sized("int".into(), 4),
        ShapeDescriptor::collection(
            MarshallerShape::TO_UNMANAGED | MarshallerShape::TO_MANAGED,
            CollectionShape::all(),
        ),
    )?);
    let param = ParameterDescriptor::new(
        "bool[]".into(),
        MarshalDirection::Bidirectional,
        ByRefKind::Ref,
        ParamIndex::Param(0),
    );

    let mut ctx = GenerationContext::new(false, ByValueContents::Default);
    let stub = StubAssembler::new(NativeFunction::new("toggle_flags"))
        .bind(BoundParameter::new(param, strategy))
        .assemble(&mut ctx)?;

    for stage in [Stage::MarshalToNative, Stage::Unmarshal] {
        let casts = count_ops(stub.stage_ops(stage), |op| {
            matches!(op, Operation::ReinterpretView { .. })
        });
        let copies = count_ops(stub.stage_ops(stage), |op| {
            matches!(op, Operation::CopyView { .. })
        });
        assert_eq!(casts, 1, "{stage:?} casts");
        assert_eq!(copies, 1, "{stage:?} copies");
    }
    Ok(())
}

/// An ambiguous element mapping is rejected when the strategy is constructed, before any
/// operation exists to corrupt.
#[test]
fn test_ambiguous_element_mapping_fails_at_construction() {
    let result = LinearCollectionStrategy::new(
        "ArrayMarshaller".into(),
        "void**".into(),
        ElementLayout::opaque("object".into()),
        ElementLayout::sized("void*".into(), 8),
        ShapeDescriptor::collection(MarshallerShape::TO_UNMANAGED, CollectionShape::all()),
    );
    assert!(matches!(
        result.unwrap_err(),
        Error::AmbiguousElementMapping { managed, native }
            if managed.as_str() == "object" && native.as_str() == "void*"
    ));
}

/// Assembling the same signature twice from fresh contexts yields structurally equal
/// stubs: generation is a pure function of its inputs.
#[test]
fn test_generation_is_deterministic() -> Result<()> {
    let build = || -> Result<StubOperations> {
        let strategy = blittable_array_strategy(
            MarshallerShape::TO_UNMANAGED | MarshallerShape::FREE,
            CollectionShape::ALLOCATE_CONTAINER_FOR_UNMANAGED
                | CollectionShape::GET_MANAGED_SOURCE
                | CollectionShape::GET_UNMANAGED_DESTINATION,
        )?;
        let mut ctx = GenerationContext::new(true, ByValueContents::Default);
        StubAssembler::new(NativeFunction::new("sum_values"))
            .bind(BoundParameter::new(by_value_in(0, "int[]"), strategy))
            .assemble(&mut ctx)
    };

    assert_eq!(build()?, build()?);
    Ok(())
}

/// A batch of independent signatures assembles in parallel with positional results.
#[test]
fn test_parallel_batch_assembly() -> Result<()> {
    let mut batch = Vec::new();
    for index in 0..16u32 {
        let assembler = StubAssembler::new(NativeFunction::new(format!("entry_{index}")))
            .bind(BoundParameter::new(
                by_value_in(0, "string"),
                utf8_string_strategy(MarshallerShape::TO_UNMANAGED | MarshallerShape::FREE)?,
            ));
        batch.push((
            assembler,
            GenerationContext::new(index % 2 == 0, ByValueContents::Default),
        ));
    }

    let results = assemble_all(batch);
    assert_eq!(results.len(), 16);
    for result in results {
        let stub = result?;
        assert_eq!(stub.stage_ops(Stage::Invoke).count(), 1);
        assert_eq!(stub.stage_ops(Stage::Cleanup).count(), 1);
    }
    Ok(())
}
