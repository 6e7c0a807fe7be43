use crate::blend::BlendOperator;
use crate::color::PremulColor;
use crate::compose::{ComposeBehavior, compose_with_behavior};
use crate::error::{FragmixError, FragmixResult};
use crate::node::{ConstColor, FragmentNode, Passthrough, PremulInput};

/// JSON-facing description of a blend tree. Compiled into fragment nodes
/// through the composition factory.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub enum NodeSpec {
    Passthrough,
    Premul,
    Const {
        color: [f32; 4],
    },
    Blend {
        src: Option<Box<NodeSpec>>,
        dst: Option<Box<NodeSpec>>,
        operator: BlendOperator,
        #[serde(default)]
        behavior: ComposeBehavior,
    },
}

pub fn parse(json: &str) -> FragmixResult<NodeSpec> {
    serde_json::from_str(json).map_err(|e| FragmixError::serde(e.to_string()))
}

/// Validates and compiles a spec into an owned node tree.
#[tracing::instrument(skip(spec))]
pub fn build(spec: &NodeSpec) -> FragmixResult<Box<dyn FragmentNode>> {
    match spec {
        NodeSpec::Passthrough => Ok(Box::new(Passthrough)),
        NodeSpec::Premul => Ok(Box::new(PremulInput)),
        NodeSpec::Const { color } => Ok(Box::new(ConstColor::new(validate_color(*color)?))),
        NodeSpec::Blend {
            src,
            dst,
            operator,
            behavior,
        } => {
            let src = src.as_deref().map(build).transpose()?;
            let dst = dst.as_deref().map(build).transpose()?;
            Ok(compose_with_behavior(src, dst, *operator, *behavior))
        }
    }
}

fn validate_color(c: [f32; 4]) -> FragmixResult<PremulColor> {
    for v in c {
        if !v.is_finite() || !(0.0..=1.0).contains(&v) {
            return Err(FragmixError::validation(
                "const color channels must be finite and in [0, 1]",
            ));
        }
    }
    let [r, g, b, a] = c;
    if r > a || g > a || b > a {
        return Err(FragmixError::validation(
            "const color must be premultiplied (rgb <= alpha)",
        ));
    }
    Ok(PremulColor::new(r, g, b, a))
}
