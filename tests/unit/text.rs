use super::*;

/// Fixed-advance layout that only breaks on '\n'.
struct Monospace {
    lines: Vec<(usize, String)>,
    advance: f64,
    line_height: f64,
}

impl Monospace {
    fn new(text: &str) -> Self {
        let mut lines = Vec::new();
        let mut start = 0;
        for line in text.split('\n') {
            lines.push((start, line.to_string()));
            start += line.chars().count() + 1;
        }
        Self {
            lines,
            advance: 10.0,
            line_height: 20.0,
        }
    }
}

impl MeasuredText for Monospace {
    fn width(&self) -> f64 {
        self.longest_line()
    }

    fn height(&self) -> f64 {
        self.lines.len() as f64 * self.line_height
    }

    fn longest_line(&self) -> f64 {
        self.lines
            .iter()
            .map(|(_, l)| l.chars().count() as f64 * self.advance)
            .fold(0.0, f64::max)
    }

    fn min_intrinsic_width(&self) -> f64 {
        self.advance
    }

    fn max_intrinsic_width(&self) -> f64 {
        self.longest_line()
    }

    fn alphabetic_baseline(&self) -> f64 {
        16.0
    }

    fn ideographic_baseline(&self) -> f64 {
        20.0
    }

    fn did_exceed_max_lines(&self) -> bool {
        false
    }

    fn line_metrics(&self) -> Vec<LineMetrics> {
        let last = self.lines.len() - 1;
        self.lines
            .iter()
            .enumerate()
            .map(|(i, (start, text))| {
                let len = text.chars().count();
                LineMetrics {
                    hard_break: i != last,
                    ascent: 16.0,
                    descent: 4.0,
                    unscaled_ascent: 16.0,
                    height: 20.0,
                    width: len as f64 * self.advance,
                    left: 0.0,
                    baseline: 16.0 + i as f64 * self.line_height,
                    line_number: i,
                    start_index: *start,
                    end_index: start + len,
                }
            })
            .collect()
    }

    fn boxes_for_range(
        &self,
        range: Range<usize>,
        _height_style: BoxHeightStyle,
        _width_style: BoxWidthStyle,
    ) -> Vec<TextBox> {
        self.line_metrics()
            .into_iter()
            .filter_map(|line| {
                let s = range.start.max(line.start_index);
                let e = range.end.min(line.end_index);
                (s < e).then(|| TextBox {
                    rect: Rect::new(
                        (s - line.start_index) as f64 * self.advance,
                        line.line_number as f64 * self.line_height,
                        (e - line.start_index) as f64 * self.advance,
                        (line.line_number + 1) as f64 * self.line_height,
                    ),
                    direction: TextDirection::Ltr,
                })
            })
            .collect()
    }

    fn placeholder_boxes(&self) -> Vec<TextBox> {
        Vec::new()
    }

    fn position_for_point(&self, point: Point) -> TextPosition {
        let row = ((point.y / self.line_height).max(0.0) as usize).min(self.lines.len() - 1);
        let (start, text) = &self.lines[row];
        let col = ((point.x / self.advance).round().max(0.0) as usize).min(text.chars().count());
        TextPosition {
            offset: start + col,
            affinity: Affinity::Downstream,
        }
    }

    fn word_boundary(&self, offset: usize) -> Range<usize> {
        offset..offset + 1
    }
}

#[test]
fn line_boundary_includes_line_end_offset() {
    let t = Monospace::new("hello\nworld wide");
    assert_eq!(t.line_boundary(0), Some(0..5));
    assert_eq!(t.line_boundary(5), Some(0..5));
    assert_eq!(t.line_boundary(6), Some(6..16));
    assert_eq!(t.line_boundary(99), None);
}

#[test]
fn line_number_follows_metrics() {
    let t = Monospace::new("a\nbb\nccc");
    assert_eq!(t.line_number_at(0), Some(0));
    assert_eq!(t.line_number_at(3), Some(1));
    assert_eq!(t.line_number_at(7), Some(2));
    assert_eq!(t.line_number_at(42), None);
}

#[test]
fn boxes_and_hit_testing_agree() {
    let t = Monospace::new("abc\ndefg");
    let boxes = t.boxes_for_range(2..6, BoxHeightStyle::Tight, BoxWidthStyle::Tight);
    assert_eq!(boxes.len(), 2);
    assert_eq!(boxes[0].rect, Rect::new(20.0, 0.0, 30.0, 20.0));
    assert_eq!(boxes[1].rect, Rect::new(0.0, 20.0, 20.0, 40.0));

    let pos = t.position_for_point(Point::new(21.0, 25.0));
    assert_eq!(pos.offset, 6);
    assert_eq!(t.line_number_at(pos.offset), Some(1));
}
