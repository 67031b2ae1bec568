//! Ratio -> pixel dimension derivation (§4.5): the image area is pinned
//! near `2^20` pixels and each edge is rounded to the nearest multiple of 8.
//! A malformed ratio string falls back to a square `1024x1024` image.

const TARGET_AREA: f64 = (1_u64 << 20) as f64;
const FALLBACK: (u32, u32) = (1024, 1024);

pub fn ratio_to_dimensions(ratio: &str) -> (u32, u32) {
    let Some((w_str, h_str)) = ratio.split_once(':') else {
        return FALLBACK;
    };
    let (Ok(w), Ok(h)) = (w_str.trim().parse::<f64>(), h_str.trim().parse::<f64>()) else {
        return FALLBACK;
    };
    if w <= 0.0 || h <= 0.0 {
        return FALLBACK;
    }
    let scale = (TARGET_AREA / (w * h)).sqrt();
    (
        round_to_multiple_of_8(w * scale),
        round_to_multiple_of_8(h * scale),
    )
}

fn round_to_multiple_of_8(value: f64) -> u32 {
    ((value / 8.0).round() * 8.0).max(8.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s4_three_by_two_ratio_matches_spec_example() {
        assert_eq!(ratio_to_dimensions("3:2"), (1256, 840));
    }

    #[test]
    fn s1_square_ratio_is_1024() {
        assert_eq!(ratio_to_dimensions("1:1"), (1024, 1024));
    }

    #[test]
    fn s4_malformed_ratio_falls_back_to_1024_square() {
        assert_eq!(ratio_to_dimensions("foo"), (1024, 1024));
        assert_eq!(ratio_to_dimensions("0:1"), (1024, 1024));
        assert_eq!(ratio_to_dimensions(""), (1024, 1024));
    }

    #[test]
    fn dimensions_are_always_multiples_of_8() {
        for ratio in ["16:9", "21:9", "5:4", "2:3"] {
            let (w, h) = ratio_to_dimensions(ratio);
            assert_eq!(w % 8, 0);
            assert_eq!(h % 8, 0);
        }
    }
}
