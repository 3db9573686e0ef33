use super::{brush_span, Brush, Display, Event, Flow, Key, Pointer, Projection};
use crate::scan::Scan;
use ndarray::{Array2, Axis};

/// Interactive removal of detector artifacts across three orthogonal
/// slice views.
///
/// `m` zeroes a brush-sized region of the volume and flags it in the mask;
/// `b` restores the region from the pristine snapshot taken at
/// construction. There is no multi-step undo: unmasking always goes back
/// to the pre-editing state.
pub struct AlienRemover<'a, D: Display> {
    scan: &'a mut Scan,
    pristine: Scan,
    cursor: [usize; 3],
    brush: Brush,
    display: &'a mut D,
}

impl<'a, D: Display> AlienRemover<'a, D> {
    pub fn new(scan: &'a mut Scan, starting_frame: [usize; 3], display: &'a mut D) -> Self {
        let pristine = scan.clone();
        let (nz, ny, nx) = scan.shape();
        let cursor = [
            starting_frame[0].min(nz.saturating_sub(1)),
            starting_frame[1].min(ny.saturating_sub(1)),
            starting_frame[2].min(nx.saturating_sub(1)),
        ];
        let mut stage = Self {
            scan,
            pristine,
            cursor,
            brush: Brush {
                half_width: 5,
                ceiling: 5,
            },
            display,
        };
        for pane in Projection::ALL {
            stage.draw_slice(pane);
        }
        stage
    }

    /// Process one input event; key presses outside every pane are ignored
    pub fn handle(&mut self, event: &Event) -> Flow {
        let (key, pointer) = match event {
            Event::KeyPress {
                key,
                pointer: Some(pointer),
            } => (*key, *pointer),
            _ => return Flow::Continue,
        };
        let pane = pointer.projection;
        match key {
            Key::Char('u') => self.step(pane, true),
            Key::Char('d') => self.step(pane, false),
            Key::Up => {
                self.brush.grow();
                self.draw_slice(pane);
            }
            Key::Down => {
                self.brush.shrink();
                self.draw_slice(pane);
            }
            Key::Right => {
                self.brush.darker();
                self.draw_slice(pane);
            }
            Key::Left => {
                self.brush.brighter();
                self.draw_slice(pane);
            }
            Key::Char('m') => self.edit(pane, &pointer, false),
            Key::Char('b') => self.edit(pane, &pointer, true),
            Key::Char('p') => self.draw_projection(pane),
            Key::Char('q') => return Flow::Quit,
            _ => {}
        }
        Flow::Continue
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

    pub fn cursor(&self) -> [usize; 3] {
        self.cursor
    }
    pub fn brush(&self) -> Brush {
        self.brush
    }

    fn extent(&self, pane: Projection) -> usize {
        let (nz, ny, nx) = self.scan.shape();
        [nz, ny, nx][pane.axis()]
    }

    fn step(&mut self, pane: Projection, forward: bool) {
        let axis = pane.axis();
        let extent = self.extent(pane);
        let frame = self.cursor[axis];
        self.cursor[axis] = if forward {
            (frame + 1).min(extent.saturating_sub(1))
        } else {
            frame.saturating_sub(1)
        };
        self.draw_slice(pane);
    }

    fn edit(&mut self, pane: Projection, pointer: &Pointer, restore: bool) {
        let (nz, ny, nx) = self.scan.shape();
        let w = self.brush.half_width;
        match pane {
            Projection::XY => {
                let z = self.cursor[0];
                if let (Some((y0, y1)), Some((x0, x1))) =
                    (brush_span(pointer.y, w, ny), brush_span(pointer.x, w, nx))
                {
                    for y in y0..=y1 {
                        for x in x0..=x1 {
                            self.set(restore, [z, y, x]);
                        }
                    }
                }
            }
            Projection::XZ => {
                let y = self.cursor[1];
                if let (Some((z0, z1)), Some((x0, x1))) =
                    (brush_span(pointer.y, w, nz), brush_span(pointer.x, w, nx))
                {
                    for z in z0..=z1 {
                        for x in x0..=x1 {
                            self.set(restore, [z, y, x]);
                        }
                    }
                }
            }
            Projection::YZ => {
                let x = self.cursor[2];
                if let (Some((z0, z1)), Some((y0, y1))) =
                    (brush_span(pointer.y, w, nz), brush_span(pointer.x, w, ny))
                {
                    for z in z0..=z1 {
                        for y in y0..=y1 {
                            self.set(restore, [z, y, x]);
                        }
                    }
                }
            }
        }
        self.draw_slice(pane);
    }

    fn set(&mut self, restore: bool, index: [usize; 3]) {
        if restore {
            self.scan.volume[index] = self.pristine.volume[index];
            self.scan.mask[index] = self.pristine.mask[index];
        } else {
            self.scan.volume[index] = 0f64;
            self.scan.mask[index] = 1;
        }
    }

    fn draw_slice(&mut self, pane: Projection) {
        let axis = pane.axis();
        let frame = self.cursor[axis];
        let extent = self.extent(pane);
        let image = self.scan.volume.index_axis(Axis(axis), frame);
        let title = format!("{} - Frame {}/{}", pane, frame + 1, extent);
        self.display
            .draw(pane, image, self.brush.ceiling as f64, &title);
    }

    fn draw_projection(&mut self, pane: Projection) {
        let image: Array2<f64> = self.scan.volume.sum_axis(Axis(pane.axis()));
        let title = format!("{} - Sum", pane);
        self.display
            .draw(pane, image.view(), self.brush.ceiling as f64, &title);
    }
}
