use serde::{Deserialize, Serialize};

/// Per-channel multiply applied to clone colour, in B, G, R order.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tint {
    pub blue: f32,
    pub green: f32,
    pub red: f32,
}

impl Tint {
    /// Blue chakra glow: `(255, 100, 100) / 255`.
    pub const CHAKRA: Tint = Tint {
        blue: 1.0,
        green: 100.0 / 255.0,
        red: 100.0 / 255.0,
    };

    pub const BLUE_BOOST: Tint = Tint {
        blue: 1.5,
        green: 1.0,
        red: 1.0,
    };

    pub const NONE: Tint = Tint {
        blue: 1.0,
        green: 1.0,
        red: 1.0,
    };

    pub fn from_bgr8(bgr: [u8; 3]) -> Self {
        Self {
            blue: bgr[0] as f32 / 255.0,
            green: bgr[1] as f32 / 255.0,
            red: bgr[2] as f32 / 255.0,
        }
    }

    pub fn ratios(&self) -> [f32; 3] {
        [self.blue, self.green, self.red]
    }

    pub fn is_valid(&self) -> bool {
        self.ratios().iter().all(|r| r.is_finite() && *r >= 0.0)
    }

    /// Multiply an interleaved BGR float buffer in place. No clamping.
    pub fn apply(&self, color: &mut [f32]) {
        let ratios = self.ratios();
        for px in color.chunks_exact_mut(3) {
            px[0] *= ratios[0];
            px[1] *= ratios[1];
            px[2] *= ratios[2];
        }
    }
}

impl Default for Tint {
    fn default() -> Self {
        Tint::CHAKRA
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chakra_matches_byte_ratios() {
        assert_eq!(Tint::from_bgr8([255, 100, 100]), Tint::CHAKRA);
    }

    #[test]
    fn apply_does_not_clamp() {
        let mut color = vec![200.0, 100.0, 50.0];
        Tint::BLUE_BOOST.apply(&mut color);
        assert_eq!(color, vec![300.0, 100.0, 50.0]);
    }

    #[test]
    fn rejects_negative_and_nan() {
        assert!(Tint::CHAKRA.is_valid());
        assert!(
            !Tint {
                blue: f32::NAN,
                ..Tint::NONE
            }
            .is_valid()
        );
        assert!(
            !Tint {
                red: -1.0,
                ..Tint::NONE
            }
            .is_valid()
        );
    }
}
