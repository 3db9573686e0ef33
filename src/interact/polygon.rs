use super::{brush_span, Brush, Display, Event, Flow, Key, Pointer, Projection};
use crate::scan::Scan;
use itertools::Itertools;
use ndarray::{s, Array2, Array3, Zip};

/// Interactive polygon masking over the three summed projections.
///
/// Clicks collect vertices bound to the pane of the first click; `p`
/// rasterizes the closed polygon over that pane's grid and broadcasts the
/// inside pixels along the orthogonal axis. Edits accumulate on a private
/// gesture layer so that unmasking never erases the mask handed in by the
/// earlier stages; `finish` folds the layer into the session mask.
pub struct PolygonMasker<'a, D: Display> {
    scan: &'a mut Scan,
    layer: Array3<u8>,
    vertices: Vec<[i64; 2]>,
    active: Option<Projection>,
    paused: bool,
    brush: Brush,
    display: &'a mut D,
}

impl<'a, D: Display> PolygonMasker<'a, D> {
    pub fn new(scan: &'a mut Scan, display: &'a mut D) -> Self {
        let layer = Array3::zeros(scan.shape());
        let mut stage = Self {
            scan,
            layer,
            vertices: Vec::new(),
            active: None,
            paused: false,
            brush: Brush {
                half_width: 0,
                ceiling: 5,
            },
            display,
        };
        stage.draw_all();
        stage
    }

    /// Process one input event; events outside every pane are ignored
    pub fn handle(&mut self, event: &Event) -> Flow {
        match event {
            Event::Click {
                pointer: Some(pointer),
            } => {
                self.collect(*pointer);
                Flow::Continue
            }
            Event::KeyPress {
                key,
                pointer: Some(pointer),
            } => self.key_press(*key, *pointer),
            _ => Flow::Continue,
        }
    }

    /// Drain an event source until it quits or runs dry
    pub fn run<I: IntoIterator<Item = Event>>(&mut self, events: I) -> Flow {
        for event in events {
            if self.handle(&event) == Flow::Quit {
                return Flow::Quit;
            }
        }
        Flow::Continue
    }

    pub fn vertices(&self) -> &[[i64; 2]] {
        &self.vertices
    }
    pub fn paused(&self) -> bool {
        self.paused
    }
    pub fn brush(&self) -> Brush {
        self.brush
    }

    /// Fold the gesture layer into the session mask
    pub fn finish(self) {
        Zip::from(&mut self.scan.mask)
            .and(&self.layer)
            .for_each(|m, &edited| {
                if edited != 0 {
                    *m = 1;
                }
            });
    }

    fn collect(&mut self, pointer: Pointer) {
        if self.paused {
            return;
        }
        match self.active {
            Some(pane) if pane != pointer.projection => {
                // a polygon cannot span two different projections
                log::warn!("Select the polygon vertices within the same pane: restart masking...");
                self.vertices.clear();
                self.active = None;
            }
            _ => {
                if self.active.is_none() {
                    self.active = Some(pointer.projection);
                }
                self.vertices
                    .push([pointer.x.round() as i64, pointer.y.round() as i64]);
            }
        }
    }

    fn key_press(&mut self, key: Key, pointer: Pointer) -> Flow {
        match key {
            Key::Char('x') => self.paused = !self.paused,
            Key::Char('a') => {
                self.vertices.clear();
                self.active = None;
            }
            Key::Char('p') => self.apply(),
            Key::Char('m') => self.brush_edit(pointer, 1),
            Key::Char('b') => self.brush_edit(pointer, 0),
            Key::Up => self.brush.grow(),
            Key::Down => self.brush.shrink(),
            Key::Right => {
                self.brush.darker();
                self.draw_all();
            }
            Key::Left => {
                self.brush.brighter();
                self.draw_all();
            }
            Key::Char('q') => return Flow::Quit,
            _ => {}
        }
        Flow::Continue
    }

    fn apply(&mut self) {
        let pane = match self.active {
            Some(pane) => pane,
            None => return,
        };
        if self.vertices.len() < 3 {
            // upstream behaviour is undefined here; a degenerate polygon
            // encloses nothing and the gesture is kept untouched
            log::warn!("A mask polygon needs at least 3 vertices, ignoring");
            return;
        }
        let (rows, cols) = pane.plane_shape(self.scan.shape());
        for row in 0..rows {
            for col in 0..cols {
                if point_in_polygon(col as f64, row as f64, &self.vertices) {
                    self.fill(pane, row, col, 1);
                }
            }
        }
        self.vertices.clear();
        self.active = None;
        self.draw_all();
    }

    fn brush_edit(&mut self, pointer: Pointer, value: u8) {
        let pane = pointer.projection;
        let (rows, cols) = pane.plane_shape(self.scan.shape());
        let w = self.brush.half_width;
        if let (Some((r0, r1)), Some((c0, c1))) =
            (brush_span(pointer.y, w, rows), brush_span(pointer.x, w, cols))
        {
            for row in r0..=r1 {
                for col in c0..=c1 {
                    self.fill(pane, row, col, value);
                }
            }
        }
        self.draw_all();
    }

    // one projected pixel, broadcast along the pane axis
    fn fill(&mut self, pane: Projection, row: usize, col: usize, value: u8) {
        match pane {
            Projection::XY => self.layer.slice_mut(s![.., row, col]).fill(value),
            Projection::XZ => self.layer.slice_mut(s![row, .., col]).fill(value),
            Projection::YZ => self.layer.slice_mut(s![row, col, ..]).fill(value),
        }
    }

    fn draw_all(&mut self) {
        for pane in Projection::ALL {
            let image = self.masked_projection(pane);
            let title = pane.to_string();
            self.display
                .draw(pane, image.view(), self.brush.ceiling as f64, &title);
        }
    }

    // summed projection with every masked voxel blanked out
    fn masked_projection(&self, pane: Projection) -> Array2<f64> {
        let shape = self.scan.shape();
        let mut image = Array2::zeros(pane.plane_shape(shape));
        for ((z, y, x), &value) in self.scan.volume.indexed_iter() {
            if self.scan.mask[[z, y, x]] != 0 || self.layer[[z, y, x]] != 0 {
                continue;
            }
            let (row, col) = match pane {
                Projection::XY => (y, x),
                Projection::XZ => (z, x),
                Projection::YZ => (z, y),
            };
            image[[row, col]] += value;
        }
        image
    }
}

/// Even-odd ray cast over the closed polygon
pub fn point_in_polygon(x: f64, y: f64, vertices: &[[i64; 2]]) -> bool {
    let mut inside = false;
    for (a, b) in vertices.iter().circular_tuple_windows() {
        let (x1, y1) = (a[0] as f64, a[1] as f64);
        let (x2, y2) = (b[0] as f64, b[1] as f64);
        if (y1 > y) != (y2 > y) && x < (x2 - x1) * (y - y1) / (y2 - y1) + x1 {
            inside = !inside;
        }
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interact::NullDisplay;
    use ndarray::Array3;

    fn scan6() -> Scan {
        Scan::with_empty_mask(Array3::from_elem((6, 6, 6), 1f64))
    }

    fn click(projection: Projection, x: f64, y: f64) -> Event {
        Event::Click {
            pointer: Some(Pointer::new(projection, x, y)),
        }
    }

    fn key(key: Key, projection: Projection) -> Event {
        Event::KeyPress {
            key,
            pointer: Some(Pointer::new(projection, 0.0, 0.0)),
        }
    }

    #[test]
    fn triangle_applied_on_xy_broadcasts_along_z() {
        let mut scan = scan6();
        let mut display = NullDisplay;
        let mut stage = PolygonMasker::new(&mut scan, &mut display);
        for event in [
            click(Projection::XY, 1.0, 1.0),
            click(Projection::XY, 5.0, 1.0),
            click(Projection::XY, 1.0, 5.0),
            key(Key::Char('p'), Projection::XY),
        ] {
            stage.handle(&event);
        }
        assert!(stage.vertices().is_empty());
        assert_eq!(stage.handle(&key(Key::Char('q'), Projection::XY)), Flow::Quit);
        stage.finish();
        for z in 0..6 {
            assert_eq!(scan.mask[[z, 2, 2]], 1);
            assert_eq!(scan.mask[[z, 0, 0]], 0);
            assert_eq!(scan.mask[[z, 4, 4]], 0);
        }
    }

    #[test]
    fn switching_panes_discards_the_gesture() {
        let mut scan = scan6();
        let before_mask = scan.mask.clone();
        let mut display = NullDisplay;
        let mut stage = PolygonMasker::new(&mut scan, &mut display);
        stage.handle(&click(Projection::XY, 1.0, 1.0));
        stage.handle(&click(Projection::XY, 2.0, 1.0));
        stage.handle(&click(Projection::XZ, 3.0, 3.0));
        assert!(stage.vertices().is_empty());
        // collection restarts in the newly clicked pane
        stage.handle(&click(Projection::XZ, 3.0, 3.0));
        assert_eq!(stage.vertices().len(), 1);
        stage.finish();
        assert_eq!(scan.mask, before_mask);
    }

    #[test]
    fn applying_fewer_than_three_vertices_is_a_no_op() {
        let mut scan = scan6();
        let mut display = NullDisplay;
        let mut stage = PolygonMasker::new(&mut scan, &mut display);
        stage.handle(&click(Projection::XY, 1.0, 1.0));
        stage.handle(&click(Projection::XY, 4.0, 4.0));
        stage.handle(&key(Key::Char('p'), Projection::XY));
        // the gesture survives the attempt
        assert_eq!(stage.vertices().len(), 2);
        stage.finish();
        assert!(scan.mask.iter().all(|&m| m == 0));
    }

    #[test]
    fn pausing_suspends_collection_without_losing_vertices() {
        let mut scan = scan6();
        let mut display = NullDisplay;
        let mut stage = PolygonMasker::new(&mut scan, &mut display);
        stage.handle(&click(Projection::XY, 1.0, 1.0));
        stage.handle(&key(Key::Char('x'), Projection::XY));
        assert!(stage.paused());
        stage.handle(&click(Projection::XY, 2.0, 2.0));
        assert_eq!(stage.vertices().len(), 1);
        stage.handle(&key(Key::Char('x'), Projection::XY));
        stage.handle(&click(Projection::XY, 2.0, 2.0));
        assert_eq!(stage.vertices().len(), 2);
    }

    #[test]
    fn restart_discards_the_gesture() {
        let mut scan = scan6();
        let mut display = NullDisplay;
        let mut stage = PolygonMasker::new(&mut scan, &mut display);
        stage.handle(&click(Projection::XY, 1.0, 1.0));
        stage.handle(&click(Projection::XY, 2.0, 2.0));
        stage.handle(&key(Key::Char('a'), Projection::XY));
        assert!(stage.vertices().is_empty());
        stage.handle(&click(Projection::XZ, 0.0, 0.0));
        assert_eq!(stage.vertices().len(), 1);
    }

    #[test]
    fn brush_mark_broadcasts_and_unmask_spares_the_base_mask() {
        let mut scan = scan6();
        scan.mask[[0, 3, 2]] = 1;
        let mut display = NullDisplay;
        let mut stage = PolygonMasker::new(&mut scan, &mut display);
        // XZ pane: pointer x is X, pointer y is Z, broadcast along Y
        let pointer = Pointer::new(Projection::XZ, 2.0, 3.0);
        stage.handle(&Event::KeyPress {
            key: Key::Char('m'),
            pointer: Some(pointer),
        });
        stage.handle(&Event::KeyPress {
            key: Key::Char('b'),
            pointer: Some(pointer),
        });
        stage.finish();
        // the brush unmask only reverted its own layer
        assert_eq!(scan.mask[[0, 3, 2]], 1);
        assert_eq!(scan.mask[[3, 0, 2]], 0);
    }

    #[test]
    fn overlapping_edits_keep_the_mask_binary() {
        let mut scan = scan6();
        let mut display = NullDisplay;
        let mut stage = PolygonMasker::new(&mut scan, &mut display);
        for _ in 0..2 {
            for event in [
                click(Projection::XY, 0.0, 0.0),
                click(Projection::XY, 4.0, 0.0),
                click(Projection::XY, 0.0, 4.0),
                key(Key::Char('p'), Projection::XY),
            ] {
                stage.handle(&event);
            }
        }
        stage.handle(&Event::KeyPress {
            key: Key::Char('m'),
            pointer: Some(Pointer::new(Projection::XY, 1.0, 1.0)),
        });
        stage.finish();
        assert!(scan.mask.iter().all(|&m| m == 0 || m == 1));
        assert_eq!(scan.mask[[0, 1, 1]], 1);
    }

    #[test]
    fn events_outside_every_pane_change_nothing() {
        let mut scan = scan6();
        let mut display = NullDisplay;
        let mut stage = PolygonMasker::new(&mut scan, &mut display);
        stage.handle(&click(Projection::XY, 1.0, 1.0));
        for event in [
            Event::Click { pointer: None },
            Event::KeyPress {
                key: Key::Char('p'),
                pointer: None,
            },
            Event::KeyPress {
                key: Key::Char('q'),
                pointer: None,
            },
        ] {
            assert_eq!(stage.handle(&event), Flow::Continue);
        }
        assert_eq!(stage.vertices().len(), 1);
        stage.finish();
        assert!(scan.mask.iter().all(|&m| m == 0));
    }

    #[test]
    fn ray_cast_agrees_with_a_square() {
        let square = [[0i64, 0], [4, 0], [4, 4], [0, 4]];
        assert!(point_in_polygon(2.0, 2.0, &square));
        assert!(!point_in_polygon(5.0, 2.0, &square));
        assert!(!point_in_polygon(-1.0, -1.0, &square));
    }
}
