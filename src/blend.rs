use crate::color::PremulColor;

/// Compositing operators, in cache-key ordinal order.
///
/// The first three are "trivial": their result depends on at most one side,
/// so the composition factory never builds a compose node for them.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum BlendOperator {
    Clear = 0,
    ReplaceWithSrc,
    ReplaceWithDst,
    SourceOver,
    DestinationOver,
    SourceIn,
    DestinationIn,
    SourceOut,
    DestinationOut,
    SourceAtop,
    DestinationAtop,
    Xor,
    Plus,
    Modulate,
    Screen,
    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    HardLight,
    SoftLight,
    Difference,
    Exclusion,
    Multiply,
    Hue,
    Saturation,
    Color,
    Luminosity,
}

impl BlendOperator {
    pub const ALL: [BlendOperator; 29] = [
        Self::Clear,
        Self::ReplaceWithSrc,
        Self::ReplaceWithDst,
        Self::SourceOver,
        Self::DestinationOver,
        Self::SourceIn,
        Self::DestinationIn,
        Self::SourceOut,
        Self::DestinationOut,
        Self::SourceAtop,
        Self::DestinationAtop,
        Self::Xor,
        Self::Plus,
        Self::Modulate,
        Self::Screen,
        Self::Overlay,
        Self::Darken,
        Self::Lighten,
        Self::ColorDodge,
        Self::ColorBurn,
        Self::HardLight,
        Self::SoftLight,
        Self::Difference,
        Self::Exclusion,
        Self::Multiply,
        Self::Hue,
        Self::Saturation,
        Self::Color,
        Self::Luminosity,
    ];

    pub fn is_trivial(self) -> bool {
        matches!(self, Self::Clear | Self::ReplaceWithSrc | Self::ReplaceWithDst)
    }

    pub fn is_separable(self) -> bool {
        !self.is_trivial() && !matches!(self, Self::Hue | Self::Saturation | Self::Color | Self::Luminosity)
    }

    /// Whether [`apply`] is numerically guaranteed to match a hardware
    /// rasterizer for this operator. The non-separable operators and
    /// SoftLight/ColorBurn diverge measurably on some GPUs, so constant
    /// folding must not use the CPU reference for them.
    pub fn cpu_reference_matches_gpu(self) -> bool {
        !matches!(
            self,
            Self::SoftLight | Self::ColorBurn | Self::Hue | Self::Saturation | Self::Color | Self::Luminosity
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Clear => "Clear",
            Self::ReplaceWithSrc => "ReplaceWithSrc",
            Self::ReplaceWithDst => "ReplaceWithDst",
            Self::SourceOver => "SourceOver",
            Self::DestinationOver => "DestinationOver",
            Self::SourceIn => "SourceIn",
            Self::DestinationIn => "DestinationIn",
            Self::SourceOut => "SourceOut",
            Self::DestinationOut => "DestinationOut",
            Self::SourceAtop => "SourceAtop",
            Self::DestinationAtop => "DestinationAtop",
            Self::Xor => "Xor",
            Self::Plus => "Plus",
            Self::Modulate => "Modulate",
            Self::Screen => "Screen",
            Self::Overlay => "Overlay",
            Self::Darken => "Darken",
            Self::Lighten => "Lighten",
            Self::ColorDodge => "ColorDodge",
            Self::ColorBurn => "ColorBurn",
            Self::HardLight => "HardLight",
            Self::SoftLight => "SoftLight",
            Self::Difference => "Difference",
            Self::Exclusion => "Exclusion",
            Self::Multiply => "Multiply",
            Self::Hue => "Hue",
            Self::Saturation => "Saturation",
            Self::Color => "Color",
            Self::Luminosity => "Luminosity",
        }
    }

    /// Snake-case name of the shader-side blend function for this operator.
    pub fn shader_fn(self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::ReplaceWithSrc => "replace_with_src",
            Self::ReplaceWithDst => "replace_with_dst",
            Self::SourceOver => "source_over",
            Self::DestinationOver => "destination_over",
            Self::SourceIn => "source_in",
            Self::DestinationIn => "destination_in",
            Self::SourceOut => "source_out",
            Self::DestinationOut => "destination_out",
            Self::SourceAtop => "source_atop",
            Self::DestinationAtop => "destination_atop",
            Self::Xor => "xor",
            Self::Plus => "plus",
            Self::Modulate => "modulate",
            Self::Screen => "screen",
            Self::Overlay => "overlay",
            Self::Darken => "darken",
            Self::Lighten => "lighten",
            Self::ColorDodge => "color_dodge",
            Self::ColorBurn => "color_burn",
            Self::HardLight => "hard_light",
            Self::SoftLight => "soft_light",
            Self::Difference => "difference",
            Self::Exclusion => "exclusion",
            Self::Multiply => "multiply",
            Self::Hue => "hue",
            Self::Saturation => "saturation",
            Self::Color => "color",
            Self::Luminosity => "luminosity",
        }
    }
}

/// CPU reference compositing: Porter-Duff coefficients plus separable and
/// non-separable blend math over premultiplied colors.
///
/// This is the single source of truth for constant folding; shader emission
/// produces calls whose semantics mirror this function operator-for-operator.
pub fn apply(op: BlendOperator, src: PremulColor, dst: PremulColor) -> PremulColor {
    let (s, d) = (src, dst);
    let (sa, da) = (s.a, d.a);
    match op {
        BlendOperator::Clear => PremulColor::TRANSPARENT,
        BlendOperator::ReplaceWithSrc => s,
        BlendOperator::ReplaceWithDst => d,
        BlendOperator::SourceOver => each(s, d, |s, d| s + d * (1.0 - sa)),
        BlendOperator::DestinationOver => each(s, d, |s, d| d + s * (1.0 - da)),
        BlendOperator::SourceIn => each(s, d, |s, _| s * da),
        BlendOperator::DestinationIn => each(s, d, |_, d| d * sa),
        BlendOperator::SourceOut => each(s, d, |s, _| s * (1.0 - da)),
        BlendOperator::DestinationOut => each(s, d, |_, d| d * (1.0 - sa)),
        BlendOperator::SourceAtop => each(s, d, |s, d| s * da + d * (1.0 - sa)),
        BlendOperator::DestinationAtop => each(s, d, |s, d| d * sa + s * (1.0 - da)),
        BlendOperator::Xor => each(s, d, |s, d| s * (1.0 - da) + d * (1.0 - sa)),
        BlendOperator::Plus => each(s, d, |s, d| (s + d).min(1.0)),
        BlendOperator::Modulate => each(s, d, |s, d| s * d),
        BlendOperator::Screen => each(s, d, |s, d| s + d - s * d),
        BlendOperator::Overlay => separable(s, d, |s, d, sa, da| {
            s * (1.0 - da)
                + d * (1.0 - sa)
                + if 2.0 * d <= da {
                    2.0 * s * d
                } else {
                    sa * da - 2.0 * (da - d) * (sa - s)
                }
        }),
        BlendOperator::Darken => separable(s, d, |s, d, sa, da| s + d - (s * da).max(d * sa)),
        BlendOperator::Lighten => separable(s, d, |s, d, sa, da| s + d - (s * da).min(d * sa)),
        BlendOperator::ColorDodge => separable(s, d, |s, d, sa, da| {
            if d == 0.0 {
                s * (1.0 - da)
            } else if s == sa {
                s + d * (1.0 - sa)
            } else {
                sa * da.min(d * sa / (sa - s)) + s * (1.0 - da) + d * (1.0 - sa)
            }
        }),
        BlendOperator::ColorBurn => separable(s, d, |s, d, sa, da| {
            if d == da {
                d + s * (1.0 - da)
            } else if s == 0.0 {
                d * (1.0 - sa)
            } else {
                sa * (da - da.min((da - d) * sa / s)) + s * (1.0 - da) + d * (1.0 - sa)
            }
        }),
        BlendOperator::HardLight => separable(s, d, |s, d, sa, da| {
            s * (1.0 - da)
                + d * (1.0 - sa)
                + if 2.0 * s <= sa {
                    2.0 * s * d
                } else {
                    sa * da - 2.0 * (da - d) * (sa - s)
                }
        }),
        BlendOperator::SoftLight => separable(s, d, |s, d, sa, da| {
            let m = if da > 0.0 { d / da } else { 0.0 };
            let s2 = 2.0 * s;
            let m4 = 4.0 * m;

            let dark_src = d * (sa + (s2 - sa) * (1.0 - m));
            let dark_dst = (m4 * m4 + m4) * (m - 1.0) + 7.0 * m;
            let lite_dst = m.sqrt() - m;
            let lite_src =
                d * sa + da * (s2 - sa) * if 4.0 * d <= da { dark_dst } else { lite_dst };
            s * (1.0 - da) + d * (1.0 - sa) + if s2 <= sa { dark_src } else { lite_src }
        }),
        BlendOperator::Difference => {
            separable(s, d, |s, d, sa, da| s + d - 2.0 * (s * da).min(d * sa))
        }
        BlendOperator::Exclusion => separable(s, d, |s, d, _, _| s + d - 2.0 * s * d),
        BlendOperator::Multiply => {
            separable(s, d, |s, d, sa, da| s * (1.0 - da) + d * (1.0 - sa) + s * d)
        }
        BlendOperator::Hue => {
            let mut c = [s.r * sa, s.g * sa, s.b * sa];
            set_sat(&mut c, sat([d.r, d.g, d.b]) * sa);
            set_lum(&mut c, lum([d.r, d.g, d.b]) * sa);
            non_separable(s, d, c)
        }
        BlendOperator::Saturation => {
            let mut c = [d.r * sa, d.g * sa, d.b * sa];
            set_sat(&mut c, sat([s.r, s.g, s.b]) * da);
            set_lum(&mut c, lum([d.r, d.g, d.b]) * sa);
            non_separable(s, d, c)
        }
        BlendOperator::Color => {
            let mut c = [s.r * da, s.g * da, s.b * da];
            set_lum(&mut c, lum([d.r, d.g, d.b]) * sa);
            non_separable(s, d, c)
        }
        BlendOperator::Luminosity => {
            let mut c = [d.r * sa, d.g * sa, d.b * sa];
            set_lum(&mut c, lum([s.r, s.g, s.b]) * da);
            non_separable(s, d, c)
        }
    }
}

fn each(s: PremulColor, d: PremulColor, f: impl Fn(f32, f32) -> f32) -> PremulColor {
    PremulColor::new(f(s.r, d.r), f(s.g, d.g), f(s.b, d.b), f(s.a, d.a))
}

/// Separable blend modes composite alpha as source-over and run the channel
/// rule on premultiplied values.
fn separable(s: PremulColor, d: PremulColor, f: impl Fn(f32, f32, f32, f32) -> f32) -> PremulColor {
    PremulColor::new(
        f(s.r, d.r, s.a, d.a),
        f(s.g, d.g, s.a, d.a),
        f(s.b, d.b, s.a, d.a),
        s.a + d.a - s.a * d.a,
    )
}

/// Final combine shared by the four HSL modes. `c` is the blended RGB in the
/// sa*da working space, already lum/sat adjusted.
fn non_separable(s: PremulColor, d: PremulColor, mut c: [f32; 3]) -> PremulColor {
    let (sa, da) = (s.a, d.a);
    clip_color(&mut c, sa * da);
    let combine = |s: f32, d: f32, c: f32| s * (1.0 - da) + d * (1.0 - sa) + c;
    PremulColor::new(
        combine(s.r, d.r, c[0]),
        combine(s.g, d.g, c[1]),
        combine(s.b, d.b, c[2]),
        sa + da - sa * da,
    )
}

fn lum(c: [f32; 3]) -> f32 {
    0.30 * c[0] + 0.59 * c[1] + 0.11 * c[2]
}

fn sat(c: [f32; 3]) -> f32 {
    c[0].max(c[1]).max(c[2]) - c[0].min(c[1]).min(c[2])
}

fn set_sat(c: &mut [f32; 3], s: f32) {
    let mn = c[0].min(c[1]).min(c[2]);
    let mx = c[0].max(c[1]).max(c[2]);
    for v in c.iter_mut() {
        *v = if mx > mn { (*v - mn) * s / (mx - mn) } else { 0.0 };
    }
}

fn set_lum(c: &mut [f32; 3], l: f32) {
    let diff = l - lum(*c);
    for v in c.iter_mut() {
        *v += diff;
    }
}

fn clip_color(c: &mut [f32; 3], a: f32) {
    let l = lum(*c);
    let mn = c[0].min(c[1]).min(c[2]);
    let mx = c[0].max(c[1]).max(c[2]);
    if mn < 0.0 && l != mn {
        for v in c.iter_mut() {
            *v = l + (*v - l) * l / (l - mn);
        }
    }
    if mx > a && mx != l {
        for v in c.iter_mut() {
            *v = l + (*v - l) * (a - l) / (mx - l);
        }
    }
    // The scaling above can leave a channel a hair below zero.
    for v in c.iter_mut() {
        *v = v.max(0.0);
    }
}
