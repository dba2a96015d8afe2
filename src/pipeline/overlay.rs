use crate::types::{Frame, Hand};

pub const CONNECTIONS: &[(usize, usize)] = &[
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 4),
    (0, 5),
    (5, 6),
    (6, 7),
    (7, 8),
    (0, 9),
    (9, 10),
    (10, 11),
    (11, 12),
    (0, 13),
    (13, 14),
    (14, 15),
    (15, 16),
    (0, 17),
    (17, 18),
    (18, 19),
    (19, 20),
    (5, 9),
    (9, 13),
    (13, 17),
];

const LINE_THICKNESS: i32 = 3;
const TEXT_SCALE: i32 = 4;
const TEXT_MARGIN: i32 = 16;

// BGR.
const LINE_COLOR: [u8; 3] = [255, 255, 255];
const POINT_COLOR: [u8; 3] = [0, 0, 255];
const ACTIVE_COLOR: [u8; 3] = [0, 255, 0];
const INACTIVE_COLOR: [u8; 3] = [0, 0, 255];
const FPS_COLOR: [u8; 3] = [0, 255, 255];

/// Debug view: every hand skeleton plus the seal state.
pub fn draw_debug(frame: &mut Frame, hands: &[Hand], active: bool) {
    for hand in hands {
        draw_hand(frame, hand);
    }
    draw_status(frame, active);
}

pub fn draw_hand(frame: &mut Frame, hand: &Hand) {
    let points: Vec<(f32, f32)> = hand
        .landmarks
        .iter()
        .map(|p| p.to_pixel(frame.width, frame.height))
        .collect();
    if points.len() < 2 {
        return;
    }

    for &(a, b) in CONNECTIONS {
        if let (Some(pa), Some(pb)) = (points.get(a), points.get(b)) {
            draw_line(frame, *pa, *pb, LINE_COLOR, LINE_THICKNESS);
        }
    }
    for &(x, y) in &points {
        draw_circle(frame, (x as i32, y as i32), LINE_THICKNESS + 1, POINT_COLOR);
    }
}

pub fn draw_status(frame: &mut Frame, active: bool) {
    let (text, color) = if active {
        ("SEAL: ACTIVE", ACTIVE_COLOR)
    } else {
        ("SEAL: INACTIVE", INACTIVE_COLOR)
    };
    draw_label(frame, text, TEXT_MARGIN, TEXT_MARGIN, TEXT_SCALE, color);
}

/// Drawn on the line below the status label.
pub fn draw_fps(frame: &mut Frame, fps: f32) {
    let y = TEXT_MARGIN + 7 * TEXT_SCALE;
    let text = format!("FPS: {}", fps.round() as i64);
    draw_label(frame, &text, TEXT_MARGIN, y, TEXT_SCALE, FPS_COLOR);
}

/// 3x5 bitmap text, each font pixel drawn as a `scale`-sized square.
pub fn draw_label(frame: &mut Frame, text: &str, x: i32, y: i32, scale: i32, color: [u8; 3]) {
    let scale = scale.max(1);
    let mut cx = x;
    for ch in text.chars() {
        for (row, bits) in char_glyph(ch).iter().enumerate() {
            for col in 0..3 {
                if bits & (1 << (2 - col)) == 0 {
                    continue;
                }
                let px = cx + col * scale;
                let py = y + row as i32 * scale;
                for dy in 0..scale {
                    for dx in 0..scale {
                        put_pixel_safe(frame, px + dx, py + dy, color);
                    }
                }
            }
        }
        cx += 4 * scale;
        if cx >= frame.width as i32 {
            break;
        }
    }
}

fn char_glyph(c: char) -> [u8; 5] {
    match c.to_ascii_uppercase() {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b001, 0b001],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        'A' => [0b111, 0b101, 0b111, 0b101, 0b101],
        'C' => [0b111, 0b100, 0b100, 0b100, 0b111],
        'E' => [0b111, 0b100, 0b111, 0b100, 0b111],
        'F' => [0b111, 0b100, 0b111, 0b100, 0b100],
        'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'N' => [0b111, 0b101, 0b101, 0b101, 0b101],
        'P' => [0b111, 0b101, 0b111, 0b100, 0b100],
        'S' => [0b111, 0b100, 0b111, 0b001, 0b111],
        'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'V' => [0b101, 0b101, 0b101, 0b010, 0b010],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        ' ' => [0b000; 5],
        _ => [0b000, 0b000, 0b010, 0b000, 0b000],
    }
}

/// Pixels a line may extend past the frame edge before it is cut.
const CLIP_MARGIN: f32 = 16.0;

/// Liang-Barsky clip of `p0 -> p1` against `[min, max]` on both axes.
/// `None` when nothing of the segment is inside or a coordinate is not finite.
fn clip_segment(
    p0: (f32, f32),
    p1: (f32, f32),
    min: (f32, f32),
    max: (f32, f32),
) -> Option<((f32, f32), (f32, f32))> {
    if ![p0.0, p0.1, p1.0, p1.1].iter().all(|v| v.is_finite()) {
        return None;
    }
    let (dx, dy) = (p1.0 - p0.0, p1.1 - p0.1);
    let (mut t0, mut t1) = (0.0f32, 1.0f32);
    for (p, q) in [
        (-dx, p0.0 - min.0),
        (dx, max.0 - p0.0),
        (-dy, p0.1 - min.1),
        (dy, max.1 - p0.1),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }
    Some((
        (p0.0 + t0 * dx, p0.1 + t0 * dy),
        (p0.0 + t1 * dx, p0.1 + t1 * dy),
    ))
}

fn draw_line(frame: &mut Frame, p0: (f32, f32), p1: (f32, f32), color: [u8; 3], thickness: i32) {
    let bounds_max = (
        frame.width as f32 + CLIP_MARGIN,
        frame.height as f32 + CLIP_MARGIN,
    );
    let Some((p0, p1)) = clip_segment(p0, p1, (-CLIP_MARGIN, -CLIP_MARGIN), bounds_max) else {
        return;
    };
    let (mut x0, mut y0) = (p0.0 as i32, p0.1 as i32);
    let (x1, y1) = (p1.0 as i32, p1.1 as i32);
    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let radius = (thickness.max(1) - 1) / 2;

    loop {
        for ox in -radius..=radius {
            for oy in -radius..=radius {
                if ox.abs() + oy.abs() <= radius {
                    put_pixel_safe(frame, x0 + ox, y0 + oy, color);
                }
            }
        }
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

fn draw_circle(frame: &mut Frame, center: (i32, i32), radius: i32, color: [u8; 3]) {
    let (cx, cy) = center;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                put_pixel_safe(frame, cx + dx, cy + dy, color);
            }
        }
    }
}

fn put_pixel_safe(frame: &mut Frame, x: i32, y: i32, color: [u8; 3]) {
    if x < 0 || y < 0 || x as u32 >= frame.width || y as u32 >= frame.height {
        return;
    }
    let idx = (y as usize * frame.width as usize + x as usize) * 3;
    frame.bgr[idx..idx + 3].copy_from_slice(&color);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Landmark, NUM_HAND_LANDMARKS};

    #[test]
    fn status_label_uses_state_colour() {
        let mut frame = Frame::filled(200, 60, [0, 0, 0]);
        draw_status(&mut frame, true);
        assert!(frame.bgr.chunks_exact(3).any(|px| px == ACTIVE_COLOR));
        assert!(!frame.bgr.chunks_exact(3).any(|px| px == INACTIVE_COLOR));

        let mut frame = Frame::filled(200, 60, [0, 0, 0]);
        draw_status(&mut frame, false);
        assert!(frame.bgr.chunks_exact(3).any(|px| px == INACTIVE_COLOR));
    }

    #[test]
    fn glyph_pixels_are_scaled() {
        let mut frame = Frame::filled(20, 20, [0, 0, 0]);
        draw_label(&mut frame, "1", 0, 0, 2, [9, 9, 9]);
        // Top row of '1' is 0b010: only the middle column, two pixels wide.
        assert_eq!(frame.pixel(0, 0), Some([0, 0, 0]));
        assert_eq!(frame.pixel(2, 0), Some([9, 9, 9]));
        assert_eq!(frame.pixel(3, 1), Some([9, 9, 9]));
        assert_eq!(frame.pixel(4, 0), Some([0, 0, 0]));
    }

    #[test]
    fn drawing_clips_at_edges() {
        let mut frame = Frame::filled(8, 8, [0, 0, 0]);
        let mut points = vec![Landmark::new(0.0, 0.0); NUM_HAND_LANDMARKS];
        points[20] = Landmark::new(2.0, -1.0);
        draw_hand(&mut frame, &Hand::new(points));
        draw_label(&mut frame, "FPS: 999", 6, 6, 4, FPS_COLOR);
        assert_eq!(frame.bgr.len(), 8 * 8 * 3);
    }

    #[test]
    fn far_off_frame_endpoint_is_clipped() {
        let mut frame = Frame::filled(32, 24, [0, 0, 0]);
        draw_line(&mut frame, (4.0, 4.0), (1.0e9, 4.0), [255, 255, 255], 1);
        assert_eq!(frame.pixel(4, 4), Some([255, 255, 255]));
        assert_eq!(frame.pixel(31, 4), Some([255, 255, 255]));
        assert_eq!(frame.pixel(4, 5), Some([0, 0, 0]));
    }

    #[test]
    fn segments_outside_or_not_finite_draw_nothing() {
        let mut frame = Frame::filled(32, 24, [0, 0, 0]);
        draw_line(&mut frame, (-500.0, -500.0), (-400.0, 1.0e8), [255, 255, 255], 3);
        draw_line(&mut frame, (f32::NAN, 2.0), (10.0, 10.0), [255, 255, 255], 1);
        assert!(frame.bgr.iter().all(|&v| v == 0));
    }

    #[test]
    fn clip_keeps_inside_segment_unchanged() {
        let clipped = clip_segment((1.0, 2.0), (10.0, 12.0), (0.0, 0.0), (20.0, 20.0));
        assert_eq!(clipped, Some(((1.0, 2.0), (10.0, 12.0))));
    }
}
