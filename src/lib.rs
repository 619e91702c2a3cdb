// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(dead_code)]

//! # interopgen
//!
//! A marshalling-stub synthesis engine for source-generated .NET native interop.
//!
//! Given the already-resolved description of a foreign-function signature - per-parameter
//! managed types, directions, and marshaller capability shapes - `interopgen` produces the
//! exact, minimal, ordered sequence of abstract operations one interop stub needs: convert
//! managed values to their native representations, invoke the native function, convert
//! results back, and release every intermediate resource on every exit path. The output is
//! a stage-partitioned operation sequence for a separate emission backend to render into
//! target-language statements; this crate never parses attributes and never emits source
//! text itself.
//!
//! ## Features
//!
//! - **🧩 Polymorphic strategy core** - One stage contract, four adapter variants:
//!   stateless, stateful, caller-allocated-buffer decoration, and linear collections
//! - **📌 Lifetime-safe fast paths** - Stack-buffer allocation only under provably bounded
//!   lifetimes; pins enclose pinned marshalling and the invocation
//! - **🧹 Failure-safe cleanup** - Every resource acquired by a parameter's setup or
//!   marshal stages is released on success, thrown failure, or early return
//! - **🗂️ Collision-free identifiers** - An explicit arena namespaces every identifier by
//!   parameter and purpose; nothing relies on naming conventions
//! - **📋 Fail-slow diagnostics** - All failing parameters of a signature surface in one
//!   aggregated error; no partial stubs are emitted
//! - **⚡ Parallel batching** - Independent signatures assemble concurrently, sharing no
//!   mutable state
//!
//! ## Quick Start
//!
//! Add `interopgen` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! interopgen = "0.1"
//! ```
//!
//! Assemble a stub for `int strlen(string)`:
//!
//! ```rust
//! use interopgen::prelude::*;
//!
//! fn main() -> interopgen::Result<()> {
//!     let arg = BoundParameter::new(
//!         ParameterDescriptor::new(
//!             "string".into(),
//!             MarshalDirection::ManagedToNative,
//!             ByRefKind::ByValue,
//!             ParamIndex::Param(0),
//!         ),
//!         Box::new(StatelessValueStrategy::new(
//!             "Utf8StringMarshaller".into(),
//!             "byte*".into(),
//!             ShapeDescriptor::value(MarshallerShape::TO_UNMANAGED | MarshallerShape::FREE),
//!         )?),
//!     );
//!
//!     let mut ctx = GenerationContext::new(true, ByValueContents::Default);
//!     let stub = StubAssembler::new(NativeFunction::new("strlen"))
//!         .bind(arg)
//!         .assemble(&mut ctx)?;
//!
//!     for block in stub.blocks() {
//!         println!("{:?}: {} operation(s)", block.stage, block.ops.len());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ParameterDescriptor ─┐
//! ShapeDescriptor ─────┼─► MarshallingStrategy ─┐
//! GenerationContext ───┘    (per parameter)     ├─► StubAssembler ─► StubOperations
//!                           Invoke (assembler) ─┘    (per signature)  (stage-partitioned)
//! ```
//!
//! The engine is a pure transformation: descriptors and shapes are constructed once per
//! signature analysis and read-only thereafter; a strategy is constructed per parameter and
//! discarded with the pass; no entity outlives one stub generation. Stage ordering is the
//! engine's wire format - downstream renderers must preserve it exactly.

#[macro_use]
pub(crate) mod error;

/// Convenient re-exports of the most commonly used types and traits.
///
/// This module provides a curated selection of the most frequently used types
/// from across the interopgen library, allowing for convenient glob imports.
///
/// # Example
///
/// ```rust
/// use interopgen::prelude::*;
///
/// let shape = ShapeDescriptor::value(MarshallerShape::TO_UNMANAGED);
/// assert!(shape.validate().is_ok());
/// ```
pub mod prelude;

/// Signature position descriptors and type identities.
///
/// The immutable inputs of one generation pass: which managed type sits at which position,
/// which way its value crosses the boundary, and how collection elements lay out.
pub mod descriptor;

/// Adapter capability shapes.
///
/// Bitflag declarations of which operations a marshaller adapter supports, plus the
/// consistency validation applied when a strategy is constructed.
pub mod shape;

/// Ambient per-stub generation state.
///
/// The identifier arena, the single-frame flag gating stack allocation, and the by-value
/// contents policy of the call.
pub mod context;

/// Abstract operations and the stage pipeline.
///
/// The operation vocabulary strategies emit, the fixed stage order the assembler drives,
/// and the stage-partitioned output type.
pub mod operation;

/// Marshalling strategies.
///
/// The [`crate::strategies::MarshallingStrategy`] contract and its four variants:
/// stateless values, stateful values, the caller-allocated-buffer decorator, and linear
/// collections.
pub mod strategies;

/// Stub assembly.
///
/// Orchestrates the bound strategies of one signature through the stage pipeline,
/// inserts the native invocation, and aggregates per-parameter failures.
pub mod assembler;

/// Convenience `Result` type alias for all fallible interopgen operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for all interopgen operations.
pub use error::{Error, ParameterFailure};
