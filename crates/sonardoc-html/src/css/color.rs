use std::f64::consts::PI;
use std::str::FromStr;

use csscolorparser::Color as CssColor;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Rgba {
    r: u8,
    g: u8,
    b: u8,
    a: f64,
}

/// Normalize a CSS color to an uppercase `#RRGGBB` string.
///
/// Accepts hex (3/4/6/8 digits), `rgb()`/`rgba()`, `hsl()`/`hsla()` and bare
/// named colors. Returns `None` when the value carries no usable color:
/// alpha 0, `transparent`, `currentcolor`, the CSS-wide keywords, unknown
/// functions and unparsable input.
pub fn normalize_css_color_to_hex(raw: &str) -> Option<String> {
    let value = strip_important(raw).trim();
    if value.is_empty() || is_colorless_keyword(value) {
        return None;
    }
    let lower = value.to_ascii_lowercase();
    let rgba = if let Some(digits) = lower.strip_prefix('#') {
        parse_hex(digits)
    } else if let Some(args) = function_args(&lower, &["rgb", "rgba"]) {
        parse_rgb(args)
    } else if let Some(args) = function_args(&lower, &["hsl", "hsla"]) {
        parse_hsl(args)
    } else if lower.chars().all(|c| c.is_ascii_alphabetic()) {
        parse_named(&lower)
    } else {
        None
    }?;
    if rgba.a <= 0.0 {
        return None;
    }
    Some(format!("#{:02X}{:02X}{:02X}", rgba.r, rgba.g, rgba.b))
}

/// Drop a trailing `!important` marker.
pub fn strip_important(value: &str) -> &str {
    if let Some(pos) = value.rfind('!')
        && value[pos + 1..].trim().eq_ignore_ascii_case("important")
    {
        return value[..pos].trim_end();
    }
    value
}

fn is_colorless_keyword(value: &str) -> bool {
    [
        "transparent",
        "currentcolor",
        "inherit",
        "initial",
        "unset",
        "revert",
        "none",
    ]
    .iter()
    .any(|k| value.eq_ignore_ascii_case(k))
}

fn function_args<'a>(value: &'a str, names: &[&str]) -> Option<&'a str> {
    for name in names {
        if let Some(rest) = value.strip_prefix(name) {
            let rest = rest.trim_start();
            if rest.starts_with('(') && rest.ends_with(')') {
                return Some(&rest[1..rest.len() - 1]);
            }
        }
    }
    None
}

fn split_args(args: &str) -> Vec<&str> {
    args.split(|c: char| c == ',' || c == '/' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_hex(digits: &str) -> Option<Rgba> {
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let nibble = |i: usize| Some(u8::from_str_radix(&digits[i..i + 1], 16).ok()? * 17);
    let pair = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
    match digits.len() {
        3 => Some(Rgba {
            r: nibble(0)?,
            g: nibble(1)?,
            b: nibble(2)?,
            a: 1.0,
        }),
        4 => Some(Rgba {
            r: nibble(0)?,
            g: nibble(1)?,
            b: nibble(2)?,
            a: f64::from(nibble(3)?) / 255.0,
        }),
        6 => Some(Rgba {
            r: pair(0)?,
            g: pair(2)?,
            b: pair(4)?,
            a: 1.0,
        }),
        8 => Some(Rgba {
            r: pair(0)?,
            g: pair(2)?,
            b: pair(4)?,
            a: f64::from(pair(6)?) / 255.0,
        }),
        _ => None,
    }
}

fn parse_rgb(args: &str) -> Option<Rgba> {
    let parts = split_args(args);
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }
    let channel = |s: &str| -> Option<u8> {
        let v = if let Some(pct) = s.strip_suffix('%') {
            pct.trim().parse::<f64>().ok()? * 2.55
        } else {
            s.parse::<f64>().ok()?
        };
        Some(v.round().clamp(0.0, 255.0) as u8)
    };
    Some(Rgba {
        r: channel(parts[0])?,
        g: channel(parts[1])?,
        b: channel(parts[2])?,
        a: match parts.get(3) {
            Some(a) => parse_alpha(a)?,
            None => 1.0,
        },
    })
}

fn parse_hsl(args: &str) -> Option<Rgba> {
    let parts = split_args(args);
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }
    let hue = parse_hue(parts[0])?;
    let fraction = |s: &str| -> Option<f64> {
        let v = s.strip_suffix('%').unwrap_or(s).trim();
        let v = v.parse::<f64>().ok()?;
        Some((v / 100.0).clamp(0.0, 1.0))
    };
    let (r, g, b) = hsl_to_rgb(hue, fraction(parts[1])?, fraction(parts[2])?);
    Some(Rgba {
        r,
        g,
        b,
        a: match parts.get(3) {
            Some(a) => parse_alpha(a)?,
            None => 1.0,
        },
    })
}

fn parse_hue(s: &str) -> Option<f64> {
    if let Some(v) = s.strip_suffix("deg") {
        v.parse().ok()
    } else if let Some(v) = s.strip_suffix("grad") {
        v.parse::<f64>().ok().map(|g| g * 0.9)
    } else if let Some(v) = s.strip_suffix("rad") {
        v.parse::<f64>().ok().map(|r| r * 180.0 / PI)
    } else if let Some(v) = s.strip_suffix("turn") {
        v.parse::<f64>().ok().map(|t| t * 360.0)
    } else {
        s.parse().ok()
    }
}

fn parse_alpha(s: &str) -> Option<f64> {
    let v = if let Some(pct) = s.strip_suffix('%') {
        pct.trim().parse::<f64>().ok()? / 100.0
    } else {
        s.parse::<f64>().ok()?
    };
    Some(v.clamp(0.0, 1.0))
}

fn hsl_to_rgb(hue: f64, saturation: f64, lightness: f64) -> (u8, u8, u8) {
    let to_byte = |v: f64| (v * 255.0).round().clamp(0.0, 255.0) as u8;
    if saturation == 0.0 {
        let v = to_byte(lightness);
        return (v, v, v);
    }
    let h = hue.rem_euclid(360.0) / 360.0;
    let q = if lightness < 0.5 {
        lightness * (1.0 + saturation)
    } else {
        lightness + saturation - lightness * saturation
    };
    let p = 2.0 * lightness - q;
    (
        to_byte(hue_to_channel(p, q, h + 1.0 / 3.0)),
        to_byte(hue_to_channel(p, q, h)),
        to_byte(hue_to_channel(p, q, h - 1.0 / 3.0)),
    )
}

fn hue_to_channel(p: f64, q: f64, mut t: f64) -> f64 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

fn parse_named(name: &str) -> Option<Rgba> {
    let c = CssColor::from_str(name).ok()?;
    Some(Rgba {
        r: (c.r * 255.0).round().clamp(0.0, 255.0) as u8,
        g: (c.g * 255.0).round().clamp(0.0, 255.0) as u8,
        b: (c.b * 255.0).round().clamp(0.0, 255.0) as u8,
        a: c.a,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equivalent_notations_agree() {
        let expected = Some("#AABBCC".to_string());
        assert_eq!(normalize_css_color_to_hex("#ABC"), expected);
        assert_eq!(normalize_css_color_to_hex("#aabbcc"), expected);
        assert_eq!(normalize_css_color_to_hex("rgb(170,187,204)"), expected);
        assert_eq!(normalize_css_color_to_hex("rgb(170 187 204 / 1)"), expected);
        assert_eq!(
            normalize_css_color_to_hex("hsl(210, 25%, 73.333%)"),
            expected
        );
        assert_eq!(
            normalize_css_color_to_hex("hsla(210deg, 25%, 73.333%, 0.5)"),
            expected
        );
    }

    #[test]
    fn transparent_and_keywords_have_no_color() {
        assert_eq!(normalize_css_color_to_hex("transparent"), None);
        assert_eq!(normalize_css_color_to_hex("rgba(0,0,0,0)"), None);
        assert_eq!(normalize_css_color_to_hex("currentcolor"), None);
        assert_eq!(normalize_css_color_to_hex("currentColor"), None);
        assert_eq!(normalize_css_color_to_hex("inherit"), None);
        assert_eq!(normalize_css_color_to_hex("#12345600"), None);
        assert_eq!(normalize_css_color_to_hex("#1230"), None);
        assert_eq!(normalize_css_color_to_hex("hsla(0, 50%, 50%, 0%)"), None);
    }

    #[test]
    fn hex_variants_with_alpha() {
        assert_eq!(
            normalize_css_color_to_hex("#f00c").as_deref(),
            Some("#FF0000")
        );
        assert_eq!(
            normalize_css_color_to_hex("#00ff0080").as_deref(),
            Some("#00FF00")
        );
        assert_eq!(normalize_css_color_to_hex("#12345"), None);
        assert_eq!(normalize_css_color_to_hex("#ggg"), None);
    }

    #[test]
    fn important_is_stripped() {
        assert_eq!(
            normalize_css_color_to_hex("#123456 !important").as_deref(),
            Some("#123456")
        );
        assert_eq!(strip_important("red ! IMPORTANT"), "red");
    }

    #[test]
    fn rgb_percentages_clamp() {
        assert_eq!(
            normalize_css_color_to_hex("rgb(100%, 0%, 300)").as_deref(),
            Some("#FF00FF")
        );
    }

    #[test]
    fn hsl_primaries_and_units() {
        assert_eq!(
            normalize_css_color_to_hex("hsl(0, 100%, 50%)").as_deref(),
            Some("#FF0000")
        );
        assert_eq!(
            normalize_css_color_to_hex("hsl(120, 100%, 50%)").as_deref(),
            Some("#00FF00")
        );
        assert_eq!(
            normalize_css_color_to_hex("hsl(0.5turn 100% 50%)").as_deref(),
            Some("#00FFFF")
        );
        assert_eq!(
            normalize_css_color_to_hex("hsl(0, 0%, 100%)").as_deref(),
            Some("#FFFFFF")
        );
    }

    #[test]
    fn named_colors_and_unknown_functions() {
        assert_eq!(
            normalize_css_color_to_hex("red").as_deref(),
            Some("#FF0000")
        );
        assert_eq!(
            normalize_css_color_to_hex("RebeccaPurple").as_deref(),
            Some("#663399")
        );
        assert_eq!(normalize_css_color_to_hex("notacolor"), None);
        assert_eq!(normalize_css_color_to_hex("lab(50% 40 59)"), None);
        assert_eq!(normalize_css_color_to_hex("var(--x)"), None);
    }
}
