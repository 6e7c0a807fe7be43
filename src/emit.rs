use crate::blend::BlendOperator;
use crate::color::PremulColor;
use crate::node::FragmentNode;

/// Append-only accumulator for generated shader source.
///
/// Nodes write formatted lines and never read them back; fresh variable names
/// are handed out from a single counter so child emissions cannot collide.
#[derive(Debug, Default)]
pub struct ShaderTextBuilder {
    text: String,
    indent: usize,
    next_var: u32,
}

impl ShaderTextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(&mut self, line: impl AsRef<str>) {
        for _ in 0..self.indent {
            self.text.push_str("    ");
        }
        self.text.push_str(line.as_ref());
        self.text.push('\n');
    }

    pub fn comment(&mut self, text: impl AsRef<str>) {
        self.line(format!("// {}", text.as_ref()));
    }

    pub fn indent(&mut self) {
        self.indent += 1;
    }

    pub fn dedent(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    /// Returns a new variable name with the given prefix.
    pub fn fresh(&mut self, prefix: &str) -> String {
        let name = format!("{prefix}{}", self.next_var);
        self.next_var += 1;
        name
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn finish(self) -> String {
        self.text
    }
}

/// Textual application of a blend operator to two expressions. The emitted
/// call's semantics are those of [`crate::blend::apply`] for the same
/// operator; the function bodies live in the renderer's shader prelude.
pub fn blend_call(op: BlendOperator, src_expr: &str, dst_expr: &str) -> String {
    format!("blend_{}({src_expr}, {dst_expr})", op.shader_fn())
}

pub(crate) fn vec4_literal(c: PremulColor) -> String {
    format!(
        "vec4<f32>({}, {}, {}, {})",
        fmt_f32(c.r),
        fmt_f32(c.g),
        fmt_f32(c.b),
        fmt_f32(c.a)
    )
}

fn fmt_f32(v: f32) -> String {
    if v == v.trunc() {
        format!("{v:.1}")
    } else {
        format!("{v}")
    }
}

/// Wraps a node tree into a complete fragment-function skeleton.
#[tracing::instrument(skip(root))]
pub fn emit_program(root: &dyn FragmentNode) -> String {
    let mut b = ShaderTextBuilder::new();
    b.line("fn compose_fragment(input: vec4<f32>) -> vec4<f32> {");
    b.indent();
    let out = root.emit(&mut b, "input");
    b.line(format!("return {out};"));
    b.dedent();
    b.line("}");
    b.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Passthrough;

    #[test]
    fn fresh_names_never_collide() {
        let mut b = ShaderTextBuilder::new();
        assert_eq!(b.fresh("v"), "v0");
        assert_eq!(b.fresh("blend"), "blend1");
        assert_eq!(b.fresh("v"), "v2");
    }

    #[test]
    fn lines_are_indented_and_terminated() {
        let mut b = ShaderTextBuilder::new();
        b.line("a");
        b.indent();
        b.line("b");
        b.dedent();
        b.line("c");
        assert_eq!(b.finish(), "a\n    b\nc\n");
    }

    #[test]
    fn vec4_literal_keeps_fractions_and_marks_integers() {
        let c = PremulColor::new(0.5, 1.0, 0.0, 0.25);
        assert_eq!(vec4_literal(c), "vec4<f32>(0.5, 1.0, 0.0, 0.25)");
    }

    #[test]
    fn blend_call_names_the_operator_function() {
        assert_eq!(
            blend_call(BlendOperator::SourceOver, "s", "d"),
            "blend_source_over(s, d)"
        );
        assert_eq!(
            blend_call(BlendOperator::ColorDodge, "a", "b"),
            "blend_color_dodge(a, b)"
        );
    }

    #[test]
    fn passthrough_program_returns_input() {
        let text = emit_program(&Passthrough);
        assert!(text.contains("return input;"));
    }
}
