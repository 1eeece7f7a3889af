//! Rewrites CSS Color 4 values the PDF canvas renderer can't parse into `rgb()`.
//!
//! `oklch`, `oklab`, `lch`, `lab` and `color(srgb …)` are converted exactly.
//! Anything else in those families (wide-gamut `color()` spaces, garbage)
//! gets a neutral per-property fallback.

/// Which resolved color of an element is being rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorProperty {
    Background,
    Text,
    BorderTop,
    BorderRight,
    BorderBottom,
    BorderLeft,
}

impl ColorProperty {
    pub const ALL: [ColorProperty; 6] = [
        ColorProperty::Background,
        ColorProperty::Text,
        ColorProperty::BorderTop,
        ColorProperty::BorderRight,
        ColorProperty::BorderBottom,
        ColorProperty::BorderLeft,
    ];

    pub fn css_name(self) -> &'static str {
        match self {
            Self::Background => "background-color",
            Self::Text => "color",
            Self::BorderTop => "border-top-color",
            Self::BorderRight => "border-right-color",
            Self::BorderBottom => "border-bottom-color",
            Self::BorderLeft => "border-left-color",
        }
    }

    pub fn fallback(self) -> &'static str {
        match self {
            Self::Background => "rgb(255, 255, 255)",
            Self::Text => "rgb(17, 24, 39)",
            _ => "rgb(209, 213, 219)",
        }
    }
}

const UNSUPPORTED_FUNCTIONS: [&str; 5] = ["oklch(", "oklab(", "lch(", "lab(", "color("];

pub fn is_unsupported(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    UNSUPPORTED_FUNCTIONS.iter().any(|func| lower.contains(func))
}

/// Safe replacement for `value`, or `None` when it can be left alone.
pub fn neutralize(value: &str, property: ColorProperty) -> Option<String> {
    if !is_unsupported(value) {
        return None;
    }
    Some(to_rgb(value).unwrap_or_else(|| property.fallback().to_string()))
}

/// Convert a single CSS Color 4 function to `rgb()`/`rgba()`.
pub fn to_rgb(value: &str) -> Option<String> {
    let value = value.trim().to_ascii_lowercase();
    let open = value.find('(')?;
    let close = value.rfind(')')?;
    if close <= open {
        return None;
    }
    let name = value[..open].trim();
    let (channels, alpha) = parse_arguments(&value[open + 1..close])?;

    let linear = match name {
        "oklab" => {
            let [l, a, b] = channels_n::<3>(&channels)?;
            oklab_to_linear_srgb(l.scaled(1.0), a.scaled(0.4), b.scaled(0.4))
        }
        "oklch" => {
            let [l, c, h] = channels_n::<3>(&channels)?;
            let (a, b) = polar(c.scaled(0.4), h.value());
            oklab_to_linear_srgb(l.scaled(1.0), a, b)
        }
        "lab" => {
            let [l, a, b] = channels_n::<3>(&channels)?;
            lab_to_linear_srgb(l.scaled(100.0), a.scaled(125.0), b.scaled(125.0))
        }
        "lch" => {
            let [l, c, h] = channels_n::<3>(&channels)?;
            let (a, b) = polar(c.scaled(150.0), h.value());
            lab_to_linear_srgb(l.scaled(100.0), a, b)
        }
        "color" => {
            let (space, rest) = channels.split_first()?;
            let Component::Ident(space) = space else {
                return None;
            };
            let [r, g, b] = channels_n::<3>(rest)?;
            let rgb = [r.scaled(1.0), g.scaled(1.0), b.scaled(1.0)];
            match space.as_str() {
                "srgb" => rgb.map(srgb_to_linear),
                "srgb-linear" => rgb,
                _ => return None,
            }
        }
        _ => return None,
    };

    let [r, g, b] = linear.map(|channel| {
        let encoded = linear_to_srgb(channel).clamp(0.0, 1.0);
        (encoded * 255.0).round() as u8
    });
    let alpha = alpha.map(|a| a.scaled(1.0).clamp(0.0, 1.0)).unwrap_or(1.0);
    if alpha >= 1.0 {
        Some(format!("rgb({r}, {g}, {b})"))
    } else {
        Some(format!("rgba({r}, {g}, {b}, {})", (alpha * 1000.0).round() / 1000.0))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Component {
    Number(f64),
    Percent(f64),
    Ident(String),
}

impl Component {
    fn value(&self) -> f64 {
        match self {
            Self::Number(n) => *n,
            Self::Percent(p) => *p,
            Self::Ident(_) => 0.0,
        }
    }

    /// Numbers pass through; `100%` maps to `full`.
    fn scaled(&self, full: f64) -> f64 {
        match self {
            Self::Number(n) => *n,
            Self::Percent(p) => p / 100.0 * full,
            Self::Ident(_) => 0.0,
        }
    }
}

fn parse_arguments(args: &str) -> Option<(Vec<Component>, Option<Component>)> {
    let (channels, alpha) = match args.split_once('/') {
        Some((channels, alpha)) => (channels, Some(alpha.trim())),
        None => (args, None),
    };

    let channels = channels
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
        .map(parse_component)
        .collect::<Option<Vec<_>>>()?;
    let alpha = match alpha {
        Some(token) => Some(parse_component(token)?),
        None => None,
    };
    Some((channels, alpha))
}

fn parse_component(token: &str) -> Option<Component> {
    if token == "none" {
        return Some(Component::Number(0.0));
    }
    if let Some(percent) = token.strip_suffix('%') {
        return percent.parse().ok().map(Component::Percent);
    }
    if let Some(turns) = token.strip_suffix("turn") {
        return turns.parse::<f64>().ok().map(|t| Component::Number(t * 360.0));
    }
    if let Some(radians) = token.strip_suffix("rad") {
        return radians
            .parse::<f64>()
            .ok()
            .map(|r| Component::Number(r.to_degrees()));
    }
    let number = token.strip_suffix("deg").unwrap_or(token);
    match number.parse::<f64>() {
        Ok(n) if n.is_finite() => Some(Component::Number(n)),
        Ok(_) => None,
        Err(_) if token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') => {
            Some(Component::Ident(token.to_string()))
        }
        Err(_) => None,
    }
}

fn channels_n<const N: usize>(channels: &[Component]) -> Option<[Component; N]> {
    channels.to_vec().try_into().ok()
}

fn polar(chroma: f64, hue_degrees: f64) -> (f64, f64) {
    let hue = hue_degrees.to_radians();
    (chroma * hue.cos(), chroma * hue.sin())
}

fn oklab_to_linear_srgb(l: f64, a: f64, b: f64) -> [f64; 3] {
    let l_ = (l + 0.396_337_777_4 * a + 0.215_803_757_3 * b).powi(3);
    let m_ = (l - 0.105_561_345_8 * a - 0.063_854_172_8 * b).powi(3);
    let s_ = (l - 0.089_484_177_5 * a - 1.291_485_548 * b).powi(3);
    [
        4.076_741_662_1 * l_ - 3.307_711_591_3 * m_ + 0.230_969_929_2 * s_,
        -1.268_438_004_6 * l_ + 2.609_757_401_1 * m_ - 0.341_319_396_5 * s_,
        -0.004_196_086_3 * l_ - 0.703_418_614_7 * m_ + 1.707_614_701 * s_,
    ]
}

/// CIE Lab (D50) through XYZ, Bradford-adapted to D65 linear sRGB.
fn lab_to_linear_srgb(l: f64, a: f64, b: f64) -> [f64; 3] {
    const EPSILON: f64 = 216.0 / 24389.0;
    const KAPPA: f64 = 24389.0 / 27.0;
    const WHITE_D50: [f64; 3] = [0.3457 / 0.3585, 1.0, (1.0 - 0.3457 - 0.3585) / 0.3585];

    let fy = (l + 16.0) / 116.0;
    let fx = fy + a / 500.0;
    let fz = fy - b / 200.0;

    let x = if fx.powi(3) > EPSILON { fx.powi(3) } else { (116.0 * fx - 16.0) / KAPPA };
    let y = if l > KAPPA * EPSILON { fy.powi(3) } else { l / KAPPA };
    let z = if fz.powi(3) > EPSILON { fz.powi(3) } else { (116.0 * fz - 16.0) / KAPPA };
    let [x, y, z] = [x * WHITE_D50[0], y * WHITE_D50[1], z * WHITE_D50[2]];

    [
        3.134_135_957 * x - 1.617_386_332 * y - 0.490_661_946 * z,
        -0.978_795_503 * x + 1.916_254_567 * y + 0.033_442_731 * z,
        0.071_955_380 * x - 0.228_976_826 * y + 1.405_386_058 * z,
    ]
}

fn srgb_to_linear(channel: f64) -> f64 {
    let magnitude = channel.abs();
    let linear = if magnitude <= 0.040_45 {
        magnitude / 12.92
    } else {
        ((magnitude + 0.055) / 1.055).powf(2.4)
    };
    linear.copysign(channel)
}

fn linear_to_srgb(channel: f64) -> f64 {
    let magnitude = channel.abs();
    let encoded = if magnitude <= 0.003_130_8 {
        magnitude * 12.92
    } else {
        1.055 * magnitude.powf(1.0 / 2.4) - 0.055
    };
    encoded.copysign(channel)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_unsupported_functions() {
        assert!(is_unsupported("oklch(0.7 0.1 200)"));
        assert!(is_unsupported("LAB(50% 20 -30)"));
        assert!(is_unsupported("color(display-p3 1 0 0)"));
        assert!(!is_unsupported("rgb(12, 34, 56)"));
        assert!(!is_unsupported("#ffffff"));
        assert!(!is_unsupported("transparent"));
    }

    #[test]
    fn converts_lightness_extremes() {
        assert_eq!(to_rgb("oklch(1 0 0)").as_deref(), Some("rgb(255, 255, 255)"));
        assert_eq!(to_rgb("oklab(0 0 0)").as_deref(), Some("rgb(0, 0, 0)"));
        assert_eq!(to_rgb("lab(100 0 0)").as_deref(), Some("rgb(255, 255, 255)"));
        assert_eq!(to_rgb("lch(0% 0 0deg)").as_deref(), Some("rgb(0, 0, 0)"));
        assert_eq!(to_rgb("oklch(100% 0 none)").as_deref(), Some("rgb(255, 255, 255)"));
    }

    #[test]
    fn keeps_alpha() {
        assert_eq!(
            to_rgb("oklab(0 0 0 / 0.5)").as_deref(),
            Some("rgba(0, 0, 0, 0.5)")
        );
        assert_eq!(
            to_rgb("oklch(1 0 0 / 25%)").as_deref(),
            Some("rgba(255, 255, 255, 0.25)")
        );
    }

    #[test]
    fn srgb_color_function_round_trips() {
        assert_eq!(
            to_rgb("color(srgb 1 0 0)").as_deref(),
            Some("rgb(255, 0, 0)")
        );
    }

    #[test]
    fn unconvertible_values_use_property_fallback() {
        assert_eq!(
            neutralize("color(display-p3 1 0 0)", ColorProperty::Background).as_deref(),
            Some("rgb(255, 255, 255)")
        );
        assert_eq!(
            neutralize("oklch(banana)", ColorProperty::Text).as_deref(),
            Some(ColorProperty::Text.fallback())
        );
        assert_eq!(neutralize("rgb(1, 2, 3)", ColorProperty::BorderTop), None);
    }
}
