use super::super::common::PALM_INPUT_SIZE;

/// (stride, anchors per cell) for the 192px palm detector.
const LAYERS: [(u32, usize); 2] = [(8, 2), (16, 6)];

pub const NUM_ANCHORS: usize = 2016;

/// SSD anchor centres in normalized input coordinates, row-major per layer.
pub fn generate_anchors() -> Vec<[f32; 2]> {
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);
    for (stride, per_cell) in LAYERS {
        let grid = PALM_INPUT_SIZE.div_ceil(stride);
        for y in 0..grid {
            let cy = (y as f32 + 0.5) / grid as f32;
            for x in 0..grid {
                let cx = (x as f32 + 0.5) / grid as f32;
                for _ in 0..per_cell {
                    anchors.push([cx, cy]);
                }
            }
        }
    }
    anchors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_detector_output() {
        let anchors = generate_anchors();
        assert_eq!(anchors.len(), NUM_ANCHORS);
        assert_eq!(anchors[0], [0.5 / 24.0, 0.5 / 24.0]);
        assert_eq!(anchors[1], anchors[0]);
        assert_eq!(anchors[2], [1.5 / 24.0, 0.5 / 24.0]);
        // First anchor of the stride-16 layer.
        assert_eq!(anchors[24 * 24 * 2], [0.5 / 12.0, 0.5 / 12.0]);
        assert_eq!(anchors[NUM_ANCHORS - 1], [11.5 / 12.0, 11.5 / 12.0]);
    }
}
