use thiserror::Error;

use crate::{
    context::Purpose,
    descriptor::{ParamIndex, TypeName},
};

macro_rules! invalid_shape_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::InvalidShape {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::InvalidShape {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Every failure mode of stub generation is a programming error in the adapter shape or the
/// signature descriptors, never a transient condition: nothing here is retried or silently
/// defaulted. Errors are local to one parameter's strategy; the assembler collects them per
/// parameter and aggregates them into [`Error::StubGeneration`] before reporting.
///
/// # Error Categories
///
/// ## Shape Errors
/// - [`Error::InvalidShape`] - An adapter declared an internally inconsistent capability set
///
/// ## Generation Errors
/// - [`Error::UnresolvedIdentifier`] - A stage consumed an identifier that was never registered
/// - [`Error::AmbiguousElementMapping`] - No well-defined cast between collection element types
/// - [`Error::StubGeneration`] - Aggregated per-parameter failures for one stub
#[derive(Error, Debug)]
pub enum Error {
    /// An adapter declares a capability combination that is internally inconsistent.
    ///
    /// Detected when a strategy is constructed, before any operation is emitted. A typical
    /// example is declaring the caller-allocated-buffer conversion without declaring the
    /// managed-to-native conversion it is an overload of. The error includes the source
    /// location where the inconsistency was detected for debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of the inconsistency
    /// * `file` - Source file in which the inconsistency was detected
    /// * `line` - Source line in which the inconsistency was detected
    #[error("Invalid marshaller shape - {file}:{line}: {message}")]
    InvalidShape {
        /// The message to be printed for the `InvalidShape` error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A stage requested an identifier for a `(parameter, purpose)` pair that was never
    /// registered.
    ///
    /// This indicates an assembler/strategy ordering bug, such as running `Cleanup` for a
    /// parameter whose `Setup` never executed. It is surfaced immediately and never silently
    /// defaulted.
    #[error("No identifier registered for parameter '{param}' with purpose '{purpose}'")]
    UnresolvedIdentifier {
        /// The signature position whose identifier was requested
        param: ParamIndex,
        /// The purpose tag the identifier was requested for
        purpose: Purpose,
    },

    /// No well-defined cast exists between a collection's managed and native element
    /// representations.
    ///
    /// The two element types are neither identical nor share a fixed byte layout of equal
    /// size, so element-wise reinterpretation would be meaningless. Fatal for the affected
    /// parameter; other parameters of the same stub may still be generated to collect all
    /// errors in one pass.
    #[error("No well-defined element mapping between '{managed}' and '{native}'")]
    AmbiguousElementMapping {
        /// The managed element type
        managed: TypeName,
        /// The native element type
        native: TypeName,
    },

    /// One or more parameters of a stub failed to generate.
    ///
    /// The assembler keeps generating the remaining parameters after a failure so that all
    /// problems of one signature surface in a single pass, but the stub as a whole is not
    /// emitted if any parameter failed. Each entry names the failed position and the
    /// underlying error.
    #[error("Stub generation failed for {} parameter(s)", .0.len())]
    StubGeneration(Vec<ParameterFailure>),
}

/// A single parameter's generation failure, as aggregated by [`Error::StubGeneration`].
///
/// Pairs the signature position with the error its strategy produced. The assembler records
/// at most one failure per parameter: once a stage fails, the remaining stages of that
/// parameter are skipped.
#[derive(Debug)]
pub struct ParameterFailure {
    /// The signature position that failed
    pub param: ParamIndex,
    /// The error produced by that parameter's strategy
    pub error: Box<Error>,
}

impl std::fmt::Display for ParameterFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.param, self.error)
    }
}
