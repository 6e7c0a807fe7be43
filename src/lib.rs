//! Shader-fragment composition engine.
//!
//! Builds trees of fragment computation nodes, combines them under blend
//! operators, statically propagates optimization flags bottom-up, and serves
//! two consumers: WGSL-flavored shader text emission and CPU-side constant
//! folding that agree operator-for-operator.
#![forbid(unsafe_code)]

pub mod blend;
pub mod color;
pub mod compose;
pub mod emit;
pub mod error;
pub mod flags;
pub mod graph;
pub mod key;
pub mod node;

pub use blend::BlendOperator;
pub use color::PremulColor;
pub use compose::{ComposeBehavior, ComposeNode, compose, compose_with_behavior};
pub use emit::{ShaderTextBuilder, emit_program};
pub use error::{FragmixError, FragmixResult};
pub use flags::OptimizationFlags;
pub use graph::NodeSpec;
pub use key::ProgramKeyBuilder;
pub use node::{
    ConstColor, FragmentNode, OverrideInput, Passthrough, PremulInput, fold_constant, program_key,
    trees_equal,
};
