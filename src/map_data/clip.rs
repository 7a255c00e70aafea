use geo::{Line, Rect};

/// Clips `line` to `cell` (Liang-Barsky).
///
/// Cells are half-open: the lower edges belong to the cell, the upper edges
/// to the neighbor. A line lying exactly on a shared boundary therefore ends
/// up in the cell whose lower bound it lies on. Returns `None` when nothing
/// or only a single point is inside.
pub fn clip_line_to_cell(line: &Line<f64>, cell: &Rect<f64>) -> Option<Line<f64>> {
    let delta = line.delta();
    let min = cell.min();
    let max = cell.max();

    let mut t_enter = 0.0_f64;
    let mut t_exit = 1.0_f64;

    // (p, q, is upper bound) per boundary: the line is inside where p * t <= q
    let boundaries = [
        (-delta.x, line.start.x - min.x, false),
        (delta.x, max.x - line.start.x, true),
        (-delta.y, line.start.y - min.y, false),
        (delta.y, max.y - line.start.y, true),
    ];

    for (p, q, is_upper) in boundaries {
        if p == 0.0 {
            if q < 0.0 || (is_upper && q == 0.0) {
                return None;
            }
            continue;
        }
        let t = q / p;
        if p < 0.0 {
            if t > t_exit {
                return None;
            }
            t_enter = t_enter.max(t);
        } else {
            if t < t_enter {
                return None;
            }
            t_exit = t_exit.min(t);
        }
    }

    if t_exit <= t_enter {
        return None;
    }

    let start = if t_enter == 0.0 {
        line.start
    } else {
        line.start + delta * t_enter
    };
    let end = if t_exit == 1.0 {
        line.end
    } else {
        line.start + delta * t_exit
    };
    if start == end {
        return None;
    }
    Some(Line::new(start, end))
}

#[cfg(test)]
mod tests {
    use geo::coord;

    use super::*;

    fn unit_cell(x: f64, y: f64) -> Rect<f64> {
        Rect::new(coord! { x: x, y: y }, coord! { x: x + 1.0, y: y + 1.0 })
    }

    fn line(x0: f64, y0: f64, x1: f64, y1: f64) -> Line<f64> {
        Line::new(coord! { x: x0, y: y0 }, coord! { x: x1, y: y1 })
    }

    #[test]
    fn inside_line_is_unchanged() {
        let l = line(0.25, 0.25, 0.75, 0.5);
        assert_eq!(clip_line_to_cell(&l, &unit_cell(0.0, 0.0)), Some(l));
    }

    #[test]
    fn crossing_line_is_cut_at_both_sides() {
        let l = line(-0.5, 0.5, 1.5, 0.5);
        assert_eq!(
            clip_line_to_cell(&l, &unit_cell(0.0, 0.0)),
            Some(line(0.0, 0.5, 1.0, 0.5))
        );
    }

    #[test]
    fn direction_is_preserved() {
        let l = line(1.5, 0.5, -0.5, 0.5);
        assert_eq!(
            clip_line_to_cell(&l, &unit_cell(0.0, 0.0)),
            Some(line(1.0, 0.5, 0.0, 0.5))
        );
    }

    #[test]
    fn diagonal_is_cut() {
        let l = line(0.5, 0.5, 1.5, 1.5);
        assert_eq!(
            clip_line_to_cell(&l, &unit_cell(0.0, 0.0)),
            Some(line(0.5, 0.5, 1.0, 1.0))
        );
        assert_eq!(
            clip_line_to_cell(&l, &unit_cell(1.0, 1.0)),
            Some(line(1.0, 1.0, 1.5, 1.5))
        );
    }

    #[test]
    fn outside_line_is_none() {
        let l = line(2.0, 2.0, 3.0, 2.5);
        assert_eq!(clip_line_to_cell(&l, &unit_cell(0.0, 0.0)), None);
    }

    #[test]
    fn corner_touch_is_none() {
        // passes through (1, 1) only
        let l = line(0.5, 1.5, 1.5, 0.5);
        assert_eq!(clip_line_to_cell(&l, &unit_cell(1.0, 1.0)), None);
        assert!(clip_line_to_cell(&l, &unit_cell(0.0, 1.0)).is_some());
    }

    #[test]
    fn line_ending_on_boundary_does_not_leak() {
        let l = line(0.5, 0.5, 1.0, 0.5);
        assert_eq!(clip_line_to_cell(&l, &unit_cell(1.0, 0.0)), None);
        assert_eq!(clip_line_to_cell(&l, &unit_cell(0.0, 0.0)), Some(l));
    }

    #[test]
    fn boundary_line_belongs_to_upper_cell() {
        // horizontal at y = 1, shared by the cells at y 0..1 and 1..2
        let l = line(0.25, 1.0, 0.75, 1.0);
        assert_eq!(clip_line_to_cell(&l, &unit_cell(0.0, 0.0)), None);
        assert_eq!(clip_line_to_cell(&l, &unit_cell(0.0, 1.0)), Some(l));

        // vertical at x = 1
        let l = line(1.0, 0.25, 1.0, 0.75);
        assert_eq!(clip_line_to_cell(&l, &unit_cell(0.0, 0.0)), None);
        assert_eq!(clip_line_to_cell(&l, &unit_cell(1.0, 0.0)), Some(l));
    }
}
