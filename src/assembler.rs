//! Orchestration of strategies into one assembled stub.
//!
//! The [`StubAssembler`] owns the only cross-parameter logic in the engine: it drives every
//! bound parameter's strategy through the fixed stage pipeline, concatenates the
//! contributions in declaration order, declares the native temporaries the strategies
//! communicate through, and inserts the single native invocation between the pin stages and
//! the unmarshal stages.
//!
//! # Failure model
//!
//! Generation is fail-slow: one parameter's stage error never corrupts another parameter's
//! operation sequence. The assembler records the failure, skips the failed parameter's
//! remaining stages, finishes the rest of the signature, and reports every failure in one
//! [`crate::Error::StubGeneration`]. A stub with any failed parameter is not emitted.
//!
//! # Batching
//!
//! Independent stub-generation passes share no mutable state, so a signature set can be
//! assembled in parallel with [`assemble_all`]; each pass owns its context and is discarded
//! after use.

use rayon::prelude::*;

use crate::{
    context::{FailureSink, GenerationContext, Purpose},
    descriptor::{ParamIndex, ParameterDescriptor},
    operation::{Operation, Stage, StageBlock, StubOperations},
    strategies::StrategyBox,
    Result,
};
use strum::IntoEnumIterator;

/// Identity of the native entry point a stub invokes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeFunction {
    name: String,
}

impl NativeFunction {
    /// Creates the identity from the resolved entry-point name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        NativeFunction { name: name.into() }
    }

    /// The entry-point name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// One signature position bound to the strategy that marshals it.
///
/// Adapter resolution has already happened upstream; the binding simply pairs the immutable
/// descriptor with the strategy instance constructed for it. A binding lives for one
/// stub-generation pass.
pub struct BoundParameter {
    /// The signature position being marshalled
    pub descriptor: ParameterDescriptor,
    /// The strategy generating this position's operations
    pub strategy: StrategyBox,
}

impl BoundParameter {
    /// Binds a descriptor to its resolved strategy.
    #[must_use]
    pub fn new(descriptor: ParameterDescriptor, strategy: StrategyBox) -> Self {
        BoundParameter {
            descriptor,
            strategy,
        }
    }
}

/// Assembles the strategies of one signature into one ordered operation sequence.
///
/// Parameters are processed in binding order, which callers keep equal to declaration
/// order; the return slot, when present, is bound like any other position and receives the
/// invocation result.
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
/// let stub = StubAssembler::new(NativeFunction::new("set_window_title"))
///     .bind(BoundParameter::new(
///         ParameterDescriptor::new(
///             "string".into(),
///             MarshalDirection::ManagedToNative,
///             ByRefKind::ByValue,
///             ParamIndex::Param(0),
///         ),
///         Box::new(strategy),
///     ))
///     .assemble(&mut GenerationContext::new(true, ByValueContents::Default))?;
///
/// assert_eq!(stub.stage_ops(Stage::Invoke).count(), 1);
/// assert_eq!(stub.stage_ops(Stage::Cleanup).count(), 1);
/// # Ok::<(), interopgen::Error>(())
/// ```
pub struct StubAssembler {
    target: NativeFunction,
    params: Vec<BoundParameter>,
}

impl StubAssembler {
    /// Creates an assembler for one native entry point with no parameters bound yet.
    #[must_use]
    pub fn new(target: NativeFunction) -> Self {
        StubAssembler {
            target,
            params: Vec::new(),
        }
    }

    /// Binds the next signature position, in declaration order.
    #[must_use]
    pub fn bind(mut self, param: BoundParameter) -> Self {
        self.params.push(param);
        self
    }

    /// The bound positions, in binding order.
    #[must_use]
    pub fn parameters(&self) -> &[BoundParameter] {
        &self.params
    }

    /// Runs the full stage pipeline and returns the assembled stub.
    ///
    /// Stages run in [`Stage`] pipeline order; within each stage, parameters contribute in
    /// binding order. For every strategy that uses a native identifier, the native
    /// temporary is declared ahead of the strategy's own `Setup` contribution.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::StubGeneration`] aggregating every parameter that failed;
    /// the partial sequence is discarded, never emitted.
    pub fn assemble(&self, ctx: &mut GenerationContext) -> Result<StubOperations> {
        let mut failures = FailureSink::new();
        let mut stub = StubOperations::new();

        // Managed identifiers are anchored to the signature itself, not produced by any
        // stage; register them before the pipeline starts.
        for bound in &self.params {
            ctx.declare(bound.descriptor.index, Purpose::Managed);
        }

        for stage in Stage::iter() {
            if stage == Stage::Invoke {
                let op = self.invoke_operation(ctx);
                stub.push_block(StageBlock {
                    stage,
                    param: None,
                    ops: vec![op],
                });
                continue;
            }

            for bound in &self.params {
                let index = bound.descriptor.index;
                if failures.has_failed(index) {
                    continue;
                }

                let mut ops = Vec::new();
                if stage == Stage::Setup && bound.strategy.uses_native_identifier() {
                    let native = ctx.declare(index, Purpose::Native);
                    ops.push(Operation::DeclareLocal {
                        name: native,
                        ty: bound.strategy.native_type().clone(),
                    });
                }

                match bound.strategy.generate(stage, &bound.descriptor, ctx) {
                    Ok(generated) => {
                        ops.extend(generated);
                        stub.push_block(StageBlock {
                            stage,
                            param: Some(index),
                            ops,
                        });
                    }
                    Err(error) => failures.record(index, error),
                }
            }
        }

        failures.into_result()?;
        Ok(stub)
    }

    /// The single external invocation operation, owned by the assembler.
    fn invoke_operation(&self, ctx: &mut GenerationContext) -> Operation {
        let mut args = Vec::new();
        let mut result = None;

        for bound in &self.params {
            let index = bound.descriptor.index;
            let ident = if bound.strategy.uses_native_identifier() {
                ctx.declare(index, Purpose::Native)
            } else {
                ctx.declare(index, Purpose::Managed)
            };
            match index {
                ParamIndex::ReturnValue => result = Some(ident),
                ParamIndex::Param(_) => args.push(ident),
            }
        }

        Operation::Invoke {
            function: self.target.name.clone(),
            args,
            result,
        }
    }
}

/// Assembles a batch of independent stubs in parallel.
///
/// Each pair owns its context; nothing is shared between passes, so the batch is
/// embarrassingly parallel. Results are positional: the `i`-th result belongs to the
/// `i`-th input.
pub fn assemble_all(
    stubs: Vec<(StubAssembler, GenerationContext)>,
) -> Vec<Result<StubOperations>> {
    stubs
        .into_par_iter()
        .map(|(assembler, mut ctx)| assembler.assemble(&mut ctx))
        .collect()
}
