//! CSS color parsing
//!
//! Converts `#hex`, SVG color names and `rgb()/rgba()/hsl()/hsla()`
//! functions into [`Color`] values, and functional notations into hex
//! strings.

use std::sync::OnceLock;

use regex::Regex;

use super::style::Color;
use crate::error::{Error, Result};

const ALPHA: &str = r"(0|1|0?\.\d+)";

struct ColorPatterns {
    rgb: Regex,
    rgba: Regex,
    hsl: Regex,
    hsla: Regex,
}

fn patterns() -> Option<&'static ColorPatterns> {
    static PATTERNS: OnceLock<Option<ColorPatterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            let channel = r"\s*(\d{1,3})\s*";
            let percent = r"\s*(\d{1,3})%\s*";
            Some(ColorPatterns {
                rgb: Regex::new(&format!(r"^rgb\({channel},{channel},{channel}\)")).ok()?,
                rgba: Regex::new(&format!(
                    r"^rgba\({channel},{channel},{channel},\s*{ALPHA}\s*\)"
                ))
                .ok()?,
                hsl: Regex::new(&format!(r"^hsl\({channel},{percent},{percent}\)")).ok()?,
                hsla: Regex::new(&format!(
                    r"^hsla\({channel},{percent},{percent},\s*{ALPHA}\s*\)"
                ))
                .ok()?,
            })
        })
        .as_ref()
}

fn channel(caps: &regex::Captures<'_>, i: usize) -> u32 {
    caps.get(i)
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .unwrap_or(0)
}

fn alpha(caps: &regex::Captures<'_>, i: usize) -> u8 {
    let a = caps
        .get(i)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(1.0);
    (a.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn clamp_u8(v: u32) -> u8 {
    v.min(255) as u8
}

/// Convert `rgb()`, `rgba()`, `hsl()` or `hsla()` notation to `#RRGGBB`
/// (or `#AARRGGBB` when an alpha channel is given)
///
/// Anything else is returned unchanged.
pub fn convert_color_to_hex(color: &str) -> String {
    let Some(p) = patterns() else {
        return color.to_string();
    };

    if let Some(caps) = p.rgb.captures(color) {
        let (r, g, b) = (channel(&caps, 1), channel(&caps, 2), channel(&caps, 3));
        return format!("#{:02X}{:02X}{:02X}", clamp_u8(r), clamp_u8(g), clamp_u8(b));
    }

    if let Some(caps) = p.rgba.captures(color) {
        let (r, g, b) = (channel(&caps, 1), channel(&caps, 2), channel(&caps, 3));
        let a = alpha(&caps, 4);
        return format!(
            "#{:02X}{:02X}{:02X}{:02X}",
            a,
            clamp_u8(r),
            clamp_u8(g),
            clamp_u8(b)
        );
    }

    if let Some(caps) = p.hsl.captures(color) {
        let (r, g, b) = hsl_to_rgb(
            channel(&caps, 1) as f64,
            channel(&caps, 2) as f64 / 100.0,
            channel(&caps, 3) as f64 / 100.0,
        );
        return format!("#{:02X}{:02X}{:02X}", r, g, b);
    }

    if let Some(caps) = p.hsla.captures(color) {
        let (r, g, b) = hsl_to_rgb(
            channel(&caps, 1) as f64,
            channel(&caps, 2) as f64 / 100.0,
            channel(&caps, 3) as f64 / 100.0,
        );
        let a = alpha(&caps, 4);
        return format!("#{:02X}{:02X}{:02X}{:02X}", a, r, g, b);
    }

    color.to_string()
}

/// Convert HSL to RGB
///
/// `h` is in degrees (0-360), `s` and `l` in 0.0-1.0. Hues outside
/// `0..360` yield black.
pub fn hsl_to_rgb(h: f64, s: f64, l: f64) -> (u8, u8, u8) {
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = l - c / 2.0;

    let (r, g, b) = if (0.0..60.0).contains(&h) {
        (c, x, 0.0)
    } else if (60.0..120.0).contains(&h) {
        (x, c, 0.0)
    } else if (120.0..180.0).contains(&h) {
        (0.0, c, x)
    } else if (180.0..240.0).contains(&h) {
        (0.0, x, c)
    } else if (240.0..300.0).contains(&h) {
        (x, 0.0, c)
    } else if (300.0..360.0).contains(&h) {
        (c, 0.0, x)
    } else {
        (0.0, 0.0, 0.0)
    };

    let to_byte = |v: f64| ((v + m) * 255.0).clamp(0.0, 255.0) as u8;
    (to_byte(r), to_byte(g), to_byte(b))
}

/// Parse `#rgb`, `#rrggbb` or `#aarrggbb`
///
/// The alpha channel is accepted but not kept.
pub fn parse_hex(s: &str) -> Option<Color> {
    let hex = s.strip_prefix('#')?;
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    match hex.len() {
        3 => {
            let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|n| n * 17);
            Some(Color::rgb(nibble(0)?, nibble(1)?, nibble(2)?))
        }
        6 => Some(Color::rgb(byte(0)?, byte(2)?, byte(4)?)),
        8 => Some(Color::rgb(byte(2)?, byte(4)?, byte(6)?)),
        _ => None,
    }
}

/// Look up an SVG color keyword, ignoring ASCII case
pub fn named_color(name: &str) -> Option<Color> {
    NAMED_COLORS
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|&(_, rgb)| Color::rgb((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8))
}

/// Parse any supported color notation
pub fn parse_color(s: &str) -> Result<Color> {
    let s = s.trim();
    let converted;
    let candidate = if s.starts_with('#') {
        s
    } else if let Some(c) = named_color(s) {
        return Ok(c);
    } else {
        converted = convert_color_to_hex(s);
        converted.as_str()
    };
    parse_hex(candidate).ok_or_else(|| Error::InvalidColor(s.to_string()))
}

/// Foreground that stays readable on `bg`: white on dark, black on light
pub fn contrast_fg(bg: Color) -> Color {
    match bg.lightness() {
        Some(l) if l < 128 => Color::WHITE,
        _ => Color::BLACK,
    }
}

static NAMED_COLORS: &[(&str, u32)] = &[
    ("aliceblue", 0xF0F8FF),
    ("antiquewhite", 0xFAEBD7),
    ("aqua", 0x00FFFF),
    ("aquamarine", 0x7FFFD4),
    ("azure", 0xF0FFFF),
    ("beige", 0xF5F5DC),
    ("bisque", 0xFFE4C4),
    ("black", 0x000000),
    ("blanchedalmond", 0xFFEBCD),
    ("blue", 0x0000FF),
    ("blueviolet", 0x8A2BE2),
    ("brown", 0xA52A2A),
    ("burlywood", 0xDEB887),
    ("cadetblue", 0x5F9EA0),
    ("chartreuse", 0x7FFF00),
    ("chocolate", 0xD2691E),
    ("coral", 0xFF7F50),
    ("cornflowerblue", 0x6495ED),
    ("cornsilk", 0xFFF8DC),
    ("crimson", 0xDC143C),
    ("cyan", 0x00FFFF),
    ("darkblue", 0x00008B),
    ("darkcyan", 0x008B8B),
    ("darkgoldenrod", 0xB8860B),
    ("darkgray", 0xA9A9A9),
    ("darkgreen", 0x006400),
    ("darkgrey", 0xA9A9A9),
    ("darkkhaki", 0xBDB76B),
    ("darkmagenta", 0x8B008B),
    ("darkolivegreen", 0x556B2F),
    ("darkorange", 0xFF8C00),
    ("darkorchid", 0x9932CC),
    ("darkred", 0x8B0000),
    ("darksalmon", 0xE9967A),
    ("darkseagreen", 0x8FBC8F),
    ("darkslateblue", 0x483D8B),
    ("darkslategray", 0x2F4F4F),
    ("darkslategrey", 0x2F4F4F),
    ("darkturquoise", 0x00CED1),
    ("darkviolet", 0x9400D3),
    ("deeppink", 0xFF1493),
    ("deepskyblue", 0x00BFFF),
    ("dimgray", 0x696969),
    ("dimgrey", 0x696969),
    ("dodgerblue", 0x1E90FF),
    ("firebrick", 0xB22222),
    ("floralwhite", 0xFFFAF0),
    ("forestgreen", 0x228B22),
    ("fuchsia", 0xFF00FF),
    ("gainsboro", 0xDCDCDC),
    ("ghostwhite", 0xF8F8FF),
    ("gold", 0xFFD700),
    ("goldenrod", 0xDAA520),
    ("gray", 0x808080),
    ("grey", 0x808080),
    ("green", 0x008000),
    ("greenyellow", 0xADFF2F),
    ("honeydew", 0xF0FFF0),
    ("hotpink", 0xFF69B4),
    ("indianred", 0xCD5C5C),
    ("indigo", 0x4B0082),
    ("ivory", 0xFFFFF0),
    ("khaki", 0xF0E68C),
    ("lavender", 0xE6E6FA),
    ("lavenderblush", 0xFFF0F5),
    ("lawngreen", 0x7CFC00),
    ("lemonchiffon", 0xFFFACD),
    ("lightblue", 0xADD8E6),
    ("lightcoral", 0xF08080),
    ("lightcyan", 0xE0FFFF),
    ("lightgoldenrodyellow", 0xFAFAD2),
    ("lightgray", 0xD3D3D3),
    ("lightgreen", 0x90EE90),
    ("lightgrey", 0xD3D3D3),
    ("lightpink", 0xFFB6C1),
    ("lightsalmon", 0xFFA07A),
    ("lightseagreen", 0x20B2AA),
    ("lightskyblue", 0x87CEFA),
    ("lightslategray", 0x778899),
    ("lightslategrey", 0x778899),
    ("lightsteelblue", 0xB0C4DE),
    ("lightyellow", 0xFFFFE0),
    ("lime", 0x00FF00),
    ("limegreen", 0x32CD32),
    ("linen", 0xFAF0E6),
    ("magenta", 0xFF00FF),
    ("maroon", 0x800000),
    ("mediumaquamarine", 0x66CDAA),
    ("mediumblue", 0x0000CD),
    ("mediumorchid", 0xBA55D3),
    ("mediumpurple", 0x9370DB),
    ("mediumseagreen", 0x3CB371),
    ("mediumslateblue", 0x7B68EE),
    ("mediumspringgreen", 0x00FA9A),
    ("mediumturquoise", 0x48D1CC),
    ("mediumvioletred", 0xC71585),
    ("midnightblue", 0x191970),
    ("mintcream", 0xF5FFFA),
    ("mistyrose", 0xFFE4E1),
    ("moccasin", 0xFFE4B5),
    ("navajowhite", 0xFFDEAD),
    ("navy", 0x000080),
    ("oldlace", 0xFDF5E6),
    ("olive", 0x808000),
    ("olivedrab", 0x6B8E23),
    ("orange", 0xFFA500),
    ("orangered", 0xFF4500),
    ("orchid", 0xDA70D6),
    ("palegoldenrod", 0xEEE8AA),
    ("palegreen", 0x98FB98),
    ("paleturquoise", 0xAFEEEE),
    ("palevioletred", 0xDB7093),
    ("papayawhip", 0xFFEFD5),
    ("peachpuff", 0xFFDAB9),
    ("peru", 0xCD853F),
    ("pink", 0xFFC0CB),
    ("plum", 0xDDA0DD),
    ("powderblue", 0xB0E0E6),
    ("purple", 0x800080),
    ("red", 0xFF0000),
    ("rosybrown", 0xBC8F8F),
    ("royalblue", 0x4169E1),
    ("saddlebrown", 0x8B4513),
    ("salmon", 0xFA8072),
    ("sandybrown", 0xF4A460),
    ("seagreen", 0x2E8B57),
    ("seashell", 0xFFF5EE),
    ("sienna", 0xA0522D),
    ("silver", 0xC0C0C0),
    ("skyblue", 0x87CEEB),
    ("slateblue", 0x6A5ACD),
    ("slategray", 0x708090),
    ("slategrey", 0x708090),
    ("snow", 0xFFFAFA),
    ("springgreen", 0x00FF7F),
    ("steelblue", 0x4682B4),
    ("tan", 0xD2B48C),
    ("teal", 0x008080),
    ("thistle", 0xD8BFD8),
    ("tomato", 0xFF6347),
    ("turquoise", 0x40E0D0),
    ("violet", 0xEE82EE),
    ("wheat", 0xF5DEB3),
    ("white", 0xFFFFFF),
    ("whitesmoke", 0xF5F5F5),
    ("yellow", 0xFFFF00),
    ("yellowgreen", 0x9ACD32),
];
