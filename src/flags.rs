use crate::blend::BlendOperator;

/// Static facts about a fragment node's output, derived bottom-up from its
/// children at construction time and never recomputed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OptimizationFlags {
    /// Output alpha is 1 whenever input alpha is 1.
    pub preserves_opaque_input: bool,
    /// Output is a pure function of the input color alone, and folding it on
    /// the CPU reproduces what the compiled shader would compute.
    pub constant_output_for_constant_input: bool,
}

impl OptimizationFlags {
    pub const NONE: Self = Self {
        preserves_opaque_input: false,
        constant_output_for_constant_input: false,
    };
    pub const ALL: Self = Self {
        preserves_opaque_input: true,
        constant_output_for_constant_input: true,
    };
}

/// How an operator propagates `preserves_opaque_input` from its children.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpacityRule {
    /// Opaque only when both sides are opaque (missing side assumed opaque is
    /// not safe here: the output is modulated by the present side).
    BothPreserve,
    /// Output alpha can be fully determined by the missing side; never opaque.
    NeverPreserves,
    /// Opaque iff dst is opaque; a missing dst passes the input through and
    /// is assumed opaque.
    DstPreserves,
    /// Opaque iff src is opaque, same missing-side assumption.
    SrcPreserves,
    /// Opaque if either side is opaque; these operators compute alpha as
    /// source-over.
    EitherPreserves,
}

pub fn opacity_rule(op: BlendOperator) -> OpacityRule {
    use BlendOperator::*;
    match op {
        Clear | ReplaceWithSrc | ReplaceWithDst => {
            panic!("trivial operator {} has no opacity rule", op.name())
        }
        SourceIn | DestinationIn | Modulate => OpacityRule::BothPreserve,
        SourceOut | DestinationOut | Xor => OpacityRule::NeverPreserves,
        SourceAtop => OpacityRule::DstPreserves,
        DestinationAtop | Screen => OpacityRule::SrcPreserves,
        _ => OpacityRule::EitherPreserves,
    }
}

/// Compute a compose node's flags from its operator and the flags of its
/// (possibly absent) children.
///
/// Panics if called with a trivial operator; the factory routes those to
/// dedicated nodes before construction.
pub fn compose_flags(
    op: BlendOperator,
    src: Option<OptimizationFlags>,
    dst: Option<OptimizationFlags>,
) -> OptimizationFlags {
    let preserves_opaque_input = match opacity_rule(op) {
        OpacityRule::BothPreserve => match (src, dst) {
            (Some(s), Some(d)) => s.preserves_opaque_input && d.preserves_opaque_input,
            (Some(s), None) => s.preserves_opaque_input,
            (None, Some(d)) => d.preserves_opaque_input,
            (None, None) => false,
        },
        OpacityRule::NeverPreserves => false,
        OpacityRule::DstPreserves => dst.is_none_or(|d| d.preserves_opaque_input),
        OpacityRule::SrcPreserves => src.is_none_or(|s| s.preserves_opaque_input),
        OpacityRule::EitherPreserves => {
            src.is_none_or(|s| s.preserves_opaque_input)
                || dst.is_none_or(|d| d.preserves_opaque_input)
        }
    };

    // The constant-output flag is independent of the opacity table: folding is
    // allowed only when the CPU reference matches the GPU for this operator
    // and every present child is itself foldable.
    let constant_output_for_constant_input = op.cpu_reference_matches_gpu()
        && src.is_none_or(|s| s.constant_output_for_constant_input)
        && dst.is_none_or(|d| d.constant_output_for_constant_input);

    OptimizationFlags {
        preserves_opaque_input,
        constant_output_for_constant_input,
    }
}
