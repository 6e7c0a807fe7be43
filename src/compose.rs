use std::any::Any;

use crate::blend::{self, BlendOperator};
use crate::color::PremulColor;
use crate::emit::{ShaderTextBuilder, blend_call};
use crate::flags::{OptimizationFlags, compose_flags};
use crate::key::ProgramKeyBuilder;
use crate::node::{ConstColor, FragmentNode, OverrideInput};

/// How the pipeline input color is distributed to the two sides of a blend.
///
/// `Default` is a construction-time request only: it resolves to `ComposeTwo`
/// when both children are present, else `ComposeOne`, and is never retained
/// on a constructed node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ComposeBehavior {
    Default,
    /// Children see literal opaque white; an absent side sees the raw input.
    ComposeOne,
    /// Both sides see the input with alpha forced to 1; the blended result is
    /// scaled back by the original input alpha.
    ComposeTwo,
    /// Like `ComposeOne`, but a present dst child sees the raw input color.
    MatchInput,
}

impl Default for ComposeBehavior {
    fn default() -> Self {
        Self::Default
    }
}

impl ComposeBehavior {
    pub fn name(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::ComposeOne => "compose-one",
            Self::ComposeTwo => "compose-two",
            Self::MatchInput => "match-input",
        }
    }
}

/// Blend of two optional child nodes under a non-trivial operator.
///
/// An absent child means "pass the true pipeline input through unchanged".
/// Operator, behavior, and flags are fixed at construction.
#[derive(Clone, Debug)]
pub struct ComposeNode {
    operator: BlendOperator,
    behavior: ComposeBehavior,
    flags: OptimizationFlags,
    children: [Option<Box<dyn FragmentNode>>; 2],
}

impl ComposeNode {
    /// Panics if `operator` is trivial; those never reach node construction
    /// (the factory routes them to dedicated nodes).
    pub fn new(
        src: Option<Box<dyn FragmentNode>>,
        dst: Option<Box<dyn FragmentNode>>,
        operator: BlendOperator,
        behavior: ComposeBehavior,
    ) -> Self {
        if operator.is_trivial() {
            panic!(
                "compose node constructed with trivial operator {}",
                operator.name()
            );
        }
        let behavior = match behavior {
            ComposeBehavior::Default => {
                if src.is_some() && dst.is_some() {
                    ComposeBehavior::ComposeTwo
                } else {
                    ComposeBehavior::ComposeOne
                }
            }
            resolved => resolved,
        };
        let flags = compose_flags(
            operator,
            src.as_deref().map(|n| n.flags()),
            dst.as_deref().map(|n| n.flags()),
        );
        Self {
            operator,
            behavior,
            flags,
            children: [src, dst],
        }
    }

    pub fn operator(&self) -> BlendOperator {
        self.operator
    }

    pub fn behavior(&self) -> ComposeBehavior {
        self.behavior
    }

    fn src(&self) -> Option<&dyn FragmentNode> {
        self.children[0].as_deref()
    }

    fn dst(&self) -> Option<&dyn FragmentNode> {
        self.children[1].as_deref()
    }
}

impl FragmentNode for ComposeNode {
    fn name(&self) -> &'static str {
        "Compose"
    }

    fn flags(&self) -> OptimizationFlags {
        self.flags
    }

    fn constant_output(&self, input: PremulColor) -> PremulColor {
        match self.behavior {
            ComposeBehavior::ComposeOne => {
                let src = self
                    .src()
                    .map_or(input, |n| n.constant_output(PremulColor::WHITE));
                let dst = self
                    .dst()
                    .map_or(input, |n| n.constant_output(PremulColor::WHITE));
                blend::apply(self.operator, src, dst)
            }
            ComposeBehavior::ComposeTwo => {
                let opaque = input.opaque();
                let src = self.src().map_or(opaque, |n| n.constant_output(opaque));
                let dst = self.dst().map_or(opaque, |n| n.constant_output(opaque));
                blend::apply(self.operator, src, dst).scale(input.a)
            }
            ComposeBehavior::MatchInput => {
                let src = self
                    .src()
                    .map_or(input, |n| n.constant_output(PremulColor::WHITE));
                let dst = self.dst().map_or(input, |n| n.constant_output(input));
                blend::apply(self.operator, src, dst)
            }
            ComposeBehavior::Default => {
                panic!("unresolved compose behavior during constant folding")
            }
        }
    }

    fn emit(&self, b: &mut ShaderTextBuilder, input_expr: &str) -> String {
        b.comment(format!(
            "{} blend: {}",
            self.behavior.name(),
            self.operator.name()
        ));
        match self.behavior {
            ComposeBehavior::ComposeOne => {
                let src = match self.src() {
                    Some(n) => n.emit(b, "vec4<f32>(1.0)"),
                    None => input_expr.to_string(),
                };
                let dst = match self.dst() {
                    Some(n) => n.emit(b, "vec4<f32>(1.0)"),
                    None => input_expr.to_string(),
                };
                let out = b.fresh("blend");
                b.line(format!("let {out} = {};", blend_call(self.operator, &src, &dst)));
                out
            }
            ComposeBehavior::ComposeTwo => {
                let opaque = b.fresh("opaque");
                b.line(format!("let {opaque} = vec4<f32>({input_expr}.rgb, 1.0);"));
                let src = match self.src() {
                    Some(n) => n.emit(b, &opaque),
                    None => opaque.clone(),
                };
                let dst = match self.dst() {
                    Some(n) => n.emit(b, &opaque),
                    None => opaque.clone(),
                };
                let out = b.fresh("blend");
                b.line(format!("var {out} = {};", blend_call(self.operator, &src, &dst)));
                b.line(format!("{out} = {out} * {input_expr}.a;"));
                out
            }
            ComposeBehavior::MatchInput => {
                let src = match self.src() {
                    Some(n) => n.emit(b, "vec4<f32>(1.0)"),
                    None => input_expr.to_string(),
                };
                let dst = match self.dst() {
                    Some(n) => n.emit(b, input_expr),
                    None => input_expr.to_string(),
                };
                let out = b.fresh("blend");
                b.line(format!("let {out} = {};", blend_call(self.operator, &src, &dst)));
                out
            }
            ComposeBehavior::Default => {
                panic!("unresolved compose behavior during shader emission")
            }
        }
    }

    fn write_key(&self, key: &mut ProgramKeyBuilder) {
        key.add_u32(self.operator as u32);
    }

    fn clone_node(&self) -> Box<dyn FragmentNode> {
        // Flags are copied verbatim, not recomputed.
        Box::new(self.clone())
    }

    fn local_eq(&self, other: &dyn FragmentNode) -> bool {
        // Program-caching dedup keys on the operator alone; child subtrees
        // are compared by the generic tree walk.
        other
            .as_any()
            .downcast_ref::<Self>()
            .is_some_and(|o| o.operator == self.operator)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn children(&self) -> &[Option<Box<dyn FragmentNode>>] {
        &self.children
    }
}

/// Builds the node for blending `src` over `dst` under `operator`, with
/// default behavior resolution. The single entry point for assembling blend
/// stages into a shader graph.
pub fn compose(
    src: Option<Box<dyn FragmentNode>>,
    dst: Option<Box<dyn FragmentNode>>,
    operator: BlendOperator,
) -> Box<dyn FragmentNode> {
    compose_with_behavior(src, dst, operator, ComposeBehavior::Default)
}

/// [`compose`] with an explicit input-handling behavior.
///
/// Trivial operators never construct a [`ComposeNode`]: Clear yields a
/// constant transparent node, ReplaceWithSrc/ReplaceWithDst wrap the kept
/// side so its effective input is opaque white and discard the other.
pub fn compose_with_behavior(
    src: Option<Box<dyn FragmentNode>>,
    dst: Option<Box<dyn FragmentNode>>,
    operator: BlendOperator,
    behavior: ComposeBehavior,
) -> Box<dyn FragmentNode> {
    match operator {
        BlendOperator::Clear => Box::new(ConstColor::new(PremulColor::TRANSPARENT)),
        BlendOperator::ReplaceWithSrc => Box::new(OverrideInput::opaque_white(src)),
        BlendOperator::ReplaceWithDst => Box::new(OverrideInput::opaque_white(dst)),
        _ => Box::new(ComposeNode::new(src, dst, operator, behavior)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Passthrough, PremulInput, fold_constant, program_key, trees_equal};

    fn close(a: PremulColor, b: PremulColor) {
        for (x, y) in a.to_array().iter().zip(b.to_array()) {
            assert!((x - y).abs() < 1e-6, "{a:?} != {b:?}");
        }
    }

    fn leaf(alpha: f32) -> Box<dyn FragmentNode> {
        Box::new(ConstColor::new(PremulColor::new(0.2, 0.3, 0.4, alpha)))
    }

    #[test]
    fn factory_returns_compose_nodes_for_non_trivial_operators() {
        for op in BlendOperator::ALL.into_iter().filter(|op| !op.is_trivial()) {
            let node = compose(Some(leaf(1.0)), Some(leaf(1.0)), op);
            let built = node
                .as_any()
                .downcast_ref::<ComposeNode>()
                .expect("non-trivial operator must build a compose node");
            assert_eq!(built.operator(), op);
        }
    }

    #[test]
    fn factory_clear_ignores_both_sides() {
        let node = compose(Some(leaf(1.0)), Some(leaf(0.5)), BlendOperator::Clear);
        assert!(node.children().is_empty());
        assert_eq!(
            fold_constant(node.as_ref(), PremulColor::WHITE),
            Some(PremulColor::TRANSPARENT)
        );
    }

    #[test]
    fn factory_replace_with_src_forces_opaque_white_input() {
        let node = compose(
            Some(Box::new(PremulInput)),
            Some(leaf(0.5)),
            BlendOperator::ReplaceWithSrc,
        );
        // dst is discarded; src sees opaque white, not the true input.
        let out = node.constant_output(PremulColor::new(0.9, 0.9, 0.9, 0.1));
        close(out, PremulColor::WHITE);
    }

    #[test]
    fn factory_replace_with_dst_is_symmetric() {
        let node = compose(
            Some(leaf(0.5)),
            Some(Box::new(Passthrough)),
            BlendOperator::ReplaceWithDst,
        );
        let out = node.constant_output(PremulColor::TRANSPARENT);
        close(out, PremulColor::WHITE);
    }

    #[test]
    fn default_behavior_resolves_on_child_presence() {
        let both = ComposeNode::new(
            Some(leaf(1.0)),
            Some(leaf(1.0)),
            BlendOperator::SourceOver,
            ComposeBehavior::Default,
        );
        assert_eq!(both.behavior(), ComposeBehavior::ComposeTwo);

        let one = ComposeNode::new(
            Some(leaf(1.0)),
            None,
            BlendOperator::SourceOver,
            ComposeBehavior::Default,
        );
        assert_eq!(one.behavior(), ComposeBehavior::ComposeOne);

        let none = ComposeNode::new(
            None,
            None,
            BlendOperator::SourceOver,
            ComposeBehavior::Default,
        );
        assert_eq!(none.behavior(), ComposeBehavior::ComposeOne);
    }

    #[test]
    #[should_panic(expected = "trivial operator")]
    fn trivial_operator_in_direct_construction_is_fatal() {
        let _ = ComposeNode::new(None, None, BlendOperator::Clear, ComposeBehavior::Default);
    }

    #[test]
    fn compose_one_without_children_blends_input_with_itself() {
        let node = ComposeNode::new(
            None,
            None,
            BlendOperator::SourceOver,
            ComposeBehavior::ComposeOne,
        );
        let input = PremulColor::new(0.5, 0.5, 0.5, 0.5);
        close(
            node.constant_output(input),
            blend::apply(BlendOperator::SourceOver, input, input),
        );
    }

    #[test]
    fn compose_two_scales_result_by_input_alpha() {
        let node = ComposeNode::new(
            Some(Box::new(Passthrough)),
            Some(Box::new(Passthrough)),
            BlendOperator::Multiply,
            ComposeBehavior::Default,
        );
        let input = PremulColor::new(0.2, 0.4, 0.6, 0.5);
        let opaque = input.opaque();
        let expected = blend::apply(BlendOperator::Multiply, opaque, opaque).scale(input.a);
        close(node.constant_output(input), expected);
    }

    #[test]
    fn match_input_feeds_raw_input_to_dst_only() {
        let node = ComposeNode::new(
            Some(Box::new(Passthrough)),
            Some(Box::new(Passthrough)),
            BlendOperator::SourceOver,
            ComposeBehavior::MatchInput,
        );
        let input = PremulColor::new(0.1, 0.2, 0.3, 0.4);
        let expected = blend::apply(BlendOperator::SourceOver, PremulColor::WHITE, input);
        close(node.constant_output(input), expected);
    }

    #[test]
    fn soft_light_and_color_burn_are_never_foldable() {
        for op in [BlendOperator::SoftLight, BlendOperator::ColorBurn] {
            let node = ComposeNode::new(
                Some(leaf(1.0)),
                Some(leaf(1.0)),
                op,
                ComposeBehavior::Default,
            );
            assert!(!node.flags().constant_output_for_constant_input, "{op:?}");
            assert!(fold_constant(&node, PremulColor::WHITE).is_none());
        }
    }

    #[test]
    fn multiply_with_absent_children_is_foldable_and_opacity_preserving() {
        let node = ComposeNode::new(None, None, BlendOperator::Multiply, ComposeBehavior::Default);
        assert!(node.flags().preserves_opaque_input);
        assert!(node.flags().constant_output_for_constant_input);
    }

    #[test]
    fn equality_keys_on_operator_alone() {
        let a = ComposeNode::new(None, None, BlendOperator::Screen, ComposeBehavior::ComposeOne);
        let b = ComposeNode::new(None, None, BlendOperator::Screen, ComposeBehavior::MatchInput);
        let c = ComposeNode::new(None, None, BlendOperator::Darken, ComposeBehavior::ComposeOne);
        assert!(a.local_eq(&b));
        assert!(!a.local_eq(&c));
        assert!(!a.local_eq(&Passthrough));
    }

    #[test]
    fn clone_copies_flags_verbatim_and_compares_equal() {
        let node = ComposeNode::new(
            Some(leaf(0.5)),
            Some(leaf(1.0)),
            BlendOperator::SourceAtop,
            ComposeBehavior::Default,
        );
        let cloned = node.clone_node();
        assert_eq!(cloned.flags(), node.flags());
        assert!(trees_equal(&node, cloned.as_ref()));
    }

    #[test]
    fn cache_key_is_one_u32_per_compose_node() {
        let inner = compose(None, None, BlendOperator::Screen);
        let outer = compose(Some(inner), None, BlendOperator::Darken);
        let key = program_key(outer.as_ref());
        assert_eq!(key.len(), 8);
        assert_eq!(&key[0..4], (BlendOperator::Darken as u32).to_le_bytes().as_slice());
        assert_eq!(&key[4..8], (BlendOperator::Screen as u32).to_le_bytes().as_slice());
    }
}
