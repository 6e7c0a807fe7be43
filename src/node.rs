use std::any::Any;

use crate::color::PremulColor;
use crate::emit::{ShaderTextBuilder, vec4_literal};
use crate::flags::OptimizationFlags;
use crate::key::ProgramKeyBuilder;

/// Capability set of a fragment computation node.
///
/// A node is immutable once constructed. Evaluation and emission are
/// read-only traversals; reuse across pipelines goes through [`clone_node`]
/// (exclusive parent-to-child ownership, no back-references, no cycles).
///
/// [`clone_node`]: FragmentNode::clone_node
pub trait FragmentNode: std::fmt::Debug {
    fn name(&self) -> &'static str;

    fn flags(&self) -> OptimizationFlags;

    /// Output color as if every pixel received `input`, computed with the CPU
    /// reference math. Only meaningful when
    /// [`OptimizationFlags::constant_output_for_constant_input`] is set; use
    /// [`fold_constant`] for the guarded form.
    fn constant_output(&self, input: PremulColor) -> PremulColor;

    /// Appends this node's shader code to `b`, reading its input from
    /// `input_expr`, and returns the expression naming its output.
    fn emit(&self, b: &mut ShaderTextBuilder, input_expr: &str) -> String;

    /// Contributes this node's key material to the program cache key. Child
    /// contributions are collected by [`program_key`], not here.
    fn write_key(&self, key: &mut ProgramKeyBuilder);

    /// Deep copy: freshly cloned children, identical operator/behavior/flags.
    fn clone_node(&self) -> Box<dyn FragmentNode>;

    /// Node-local equality against a same-kind node. Child subtrees are
    /// compared by [`trees_equal`], not here.
    fn local_eq(&self, other: &dyn FragmentNode) -> bool;

    fn as_any(&self) -> &dyn Any;

    /// Child slots, src first. Leaves have none.
    fn children(&self) -> &[Option<Box<dyn FragmentNode>>] {
        &[]
    }
}

impl Clone for Box<dyn FragmentNode> {
    fn clone(&self) -> Self {
        self.clone_node()
    }
}

/// Structural equality over whole trees: node-local state first, then child
/// lists pairwise.
pub fn trees_equal(a: &dyn FragmentNode, b: &dyn FragmentNode) -> bool {
    if !a.local_eq(b) {
        return false;
    }
    let (ca, cb) = (a.children(), b.children());
    ca.len() == cb.len()
        && ca.iter().zip(cb).all(|(x, y)| match (x, y) {
            (None, None) => true,
            (Some(x), Some(y)) => trees_equal(x.as_ref(), y.as_ref()),
            _ => false,
        })
}

/// Folds a node analytically when its flags allow it, without compiling or
/// invoking any shader.
pub fn fold_constant(node: &dyn FragmentNode, input: PremulColor) -> Option<PremulColor> {
    node.flags()
        .constant_output_for_constant_input
        .then(|| node.constant_output(input))
}

/// Collects the cache key of a whole tree, parent before children.
pub fn program_key(root: &dyn FragmentNode) -> Vec<u8> {
    let mut key = ProgramKeyBuilder::new();
    write_key_rec(root, &mut key);
    key.finish()
}

fn write_key_rec(node: &dyn FragmentNode, key: &mut ProgramKeyBuilder) {
    node.write_key(key);
    for child in node.children().iter().flatten() {
        write_key_rec(child.as_ref(), key);
    }
}

/// Identity node: output is the input, unchanged.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Passthrough;

impl FragmentNode for Passthrough {
    fn name(&self) -> &'static str {
        "Passthrough"
    }

    fn flags(&self) -> OptimizationFlags {
        OptimizationFlags::ALL
    }

    fn constant_output(&self, input: PremulColor) -> PremulColor {
        input
    }

    fn emit(&self, _b: &mut ShaderTextBuilder, input_expr: &str) -> String {
        input_expr.to_string()
    }

    fn write_key(&self, _key: &mut ProgramKeyBuilder) {}

    fn clone_node(&self) -> Box<dyn FragmentNode> {
        Box::new(*self)
    }

    fn local_eq(&self, other: &dyn FragmentNode) -> bool {
        other.as_any().downcast_ref::<Self>().is_some()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Emits a fixed color, ignoring the input entirely.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConstColor {
    color: PremulColor,
}

impl ConstColor {
    pub fn new(color: PremulColor) -> Self {
        Self { color }
    }

    pub fn color(&self) -> PremulColor {
        self.color
    }
}

impl FragmentNode for ConstColor {
    fn name(&self) -> &'static str {
        "ConstColor"
    }

    fn flags(&self) -> OptimizationFlags {
        OptimizationFlags {
            preserves_opaque_input: self.color.is_opaque(),
            constant_output_for_constant_input: true,
        }
    }

    fn constant_output(&self, _input: PremulColor) -> PremulColor {
        self.color
    }

    fn emit(&self, b: &mut ShaderTextBuilder, _input_expr: &str) -> String {
        let var = b.fresh("const");
        b.line(format!("let {var} = {};", vec4_literal(self.color)));
        var
    }

    fn write_key(&self, _key: &mut ProgramKeyBuilder) {}

    fn clone_node(&self) -> Box<dyn FragmentNode> {
        Box::new(*self)
    }

    fn local_eq(&self, other: &dyn FragmentNode) -> bool {
        other
            .as_any()
            .downcast_ref::<Self>()
            .is_some_and(|o| o.color == self.color)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Replaces the input its child observes with a fixed color. With no child,
/// the override color itself is the output.
#[derive(Clone, Debug)]
pub struct OverrideInput {
    child: [Option<Box<dyn FragmentNode>>; 1],
    color: PremulColor,
}

impl OverrideInput {
    pub fn new(child: Option<Box<dyn FragmentNode>>, color: PremulColor) -> Self {
        Self { child: [child], color }
    }

    /// The ReplaceWithSrc/ReplaceWithDst wrapping: the child's effective input
    /// is always opaque white instead of the true pipeline input.
    pub fn opaque_white(child: Option<Box<dyn FragmentNode>>) -> Self {
        Self::new(child, PremulColor::WHITE)
    }

    fn child(&self) -> Option<&dyn FragmentNode> {
        self.child[0].as_deref()
    }
}

impl FragmentNode for OverrideInput {
    fn name(&self) -> &'static str {
        "OverrideInput"
    }

    fn flags(&self) -> OptimizationFlags {
        match self.child() {
            Some(c) => OptimizationFlags {
                preserves_opaque_input: self.color.is_opaque()
                    && c.flags().preserves_opaque_input,
                constant_output_for_constant_input: c.flags().constant_output_for_constant_input,
            },
            None => OptimizationFlags {
                preserves_opaque_input: self.color.is_opaque(),
                constant_output_for_constant_input: true,
            },
        }
    }

    fn constant_output(&self, _input: PremulColor) -> PremulColor {
        match self.child() {
            Some(c) => c.constant_output(self.color),
            None => self.color,
        }
    }

    fn emit(&self, b: &mut ShaderTextBuilder, _input_expr: &str) -> String {
        let var = b.fresh("override");
        b.line(format!("let {var} = {};", vec4_literal(self.color)));
        match self.child() {
            Some(c) => c.emit(b, &var),
            None => var,
        }
    }

    fn write_key(&self, _key: &mut ProgramKeyBuilder) {}

    fn clone_node(&self) -> Box<dyn FragmentNode> {
        Box::new(self.clone())
    }

    fn local_eq(&self, other: &dyn FragmentNode) -> bool {
        other
            .as_any()
            .downcast_ref::<Self>()
            .is_some_and(|o| o.color == self.color)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn children(&self) -> &[Option<Box<dyn FragmentNode>>] {
        &self.child
    }
}

/// Scales the input's RGB by its alpha, passing alpha through.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PremulInput;

impl FragmentNode for PremulInput {
    fn name(&self) -> &'static str {
        "PremulInput"
    }

    fn flags(&self) -> OptimizationFlags {
        OptimizationFlags::ALL
    }

    fn constant_output(&self, input: PremulColor) -> PremulColor {
        PremulColor::new(
            input.r * input.a,
            input.g * input.a,
            input.b * input.a,
            input.a,
        )
    }

    fn emit(&self, b: &mut ShaderTextBuilder, input_expr: &str) -> String {
        let var = b.fresh("premul");
        b.line(format!("let {var} = {input_expr};"));
        let out = b.fresh("premul");
        b.line(format!("let {out} = vec4<f32>({var}.rgb * {var}.a, {var}.a);"));
        out
    }

    fn write_key(&self, _key: &mut ProgramKeyBuilder) {}

    fn clone_node(&self) -> Box<dyn FragmentNode> {
        Box::new(*self)
    }

    fn local_eq(&self, other: &dyn FragmentNode) -> bool {
        other.as_any().downcast_ref::<Self>().is_some()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
