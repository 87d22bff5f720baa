//! Deterministic colors for applications. The same name always gets the same color, different
//! names may collide.

const SATURATION: f64 = 0.50;
const LIGHTNESS: f64 = 0.60;

/// Color used for idle segments.
pub const IDLE_COLOR: &str = "#6B7280";

/// Returns the display color of an application as `#RRGGBB`.
pub fn color(app_name: &str) -> String {
    let (red, green, blue) = rgb(app_name);
    format!("#{red:02X}{green:02X}{blue:02X}")
}

/// Same as [color] but as separate channels, for terminals.
pub fn rgb(app_name: &str) -> (u8, u8, u8) {
    let hash = app_name
        .bytes()
        .fold(0u64, |sum, byte| sum.wrapping_add(byte as u64));
    hsl_to_rgb((hash % 360) as f64, SATURATION, LIGHTNESS)
}

/// Parses `#RRGGBB` back into channels.
pub fn parse_hex(color: &str) -> Option<(u8, u8, u8)> {
    let hex = color.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |at: usize| u8::from_str_radix(hex.get(at..at + 2)?, 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

fn hsl_to_rgb(hue: f64, saturation: f64, lightness: f64) -> (u8, u8, u8) {
    let chroma = (1. - (2. * lightness - 1.).abs()) * saturation;
    let x = chroma * (1. - ((hue / 60.) % 2. - 1.).abs());
    let m = lightness - chroma / 2.;

    let (r, g, b) = match hue {
        h if h < 60. => (chroma, x, 0.),
        h if h < 120. => (x, chroma, 0.),
        h if h < 180. => (0., chroma, x),
        h if h < 240. => (0., x, chroma),
        h if h < 300. => (x, 0., chroma),
        _ => (chroma, 0., x),
    };

    // truncation, not rounding
    let channel = |v: f64| ((v + m) * 255.) as u8;
    (channel(r), channel(g), channel(b))
}

#[cfg(test)]
mod tests {
    use super::{color, hsl_to_rgb, parse_hex, rgb};

    fn is_hex_color(value: &str) -> bool {
        value.len() == 7
            && value.starts_with('#')
            && value[1..]
                .chars()
                .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
    }

    #[test]
    fn color_is_stable() {
        for name in ["Terminal", "Safari", "", "Visual Studio Code", "日本語"] {
            let first = color(name);
            assert_eq!(first, color(name));
            assert!(is_hex_color(&first), "{first}");
        }
    }

    #[test]
    fn color_matches_hue_from_byte_sum() {
        // "A" = 65 -> hue 65, second sector
        assert_eq!(rgb("A"), hsl_to_rgb(65., 0.5, 0.6));
        // empty name -> hue 0 -> pure red sector
        assert_eq!(color(""), "#CC6565");
    }

    #[test]
    fn primary_sectors() {
        assert_eq!(hsl_to_rgb(0., 0.5, 0.6), (204, 101, 101));
        assert_eq!(hsl_to_rgb(120., 0.5, 0.6), (101, 204, 101));
        assert_eq!(hsl_to_rgb(240., 0.5, 0.6), (101, 101, 204));
    }

    #[test]
    fn parse_hex_reverses_color() {
        for name in ["Terminal", "Firefox"] {
            assert_eq!(parse_hex(&color(name)), Some(rgb(name)));
        }
        assert_eq!(parse_hex("6B7280"), None);
        assert_eq!(parse_hex("#6B72"), None);
    }
}
