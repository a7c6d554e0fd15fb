use std::time::Instant;

/// Per-frame callbacks driven by [`FrameLoop`].
pub trait FrameApp {
    fn resize(&mut self, width: u32, height: u32);
    fn update(&mut self, dt: f32);
    fn draw(&mut self) -> anyhow::Result<()>;
}

/// Drives the resize/update/draw cadence. Resizes are coalesced so that at
/// most one reaches the app per frame, always before `update`.
pub struct FrameLoop {
    last_frame: Option<Instant>,
    pending_resize: Option<(u32, u32)>,
    max_dt: f32,
}

impl Default for FrameLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameLoop {
    pub fn new() -> Self {
        Self {
            last_frame: None,
            pending_resize: None,
            // Clamp so a stall (window drag, debugger) does not produce a
            // giant simulation step.
            max_dt: 0.1,
        }
    }

    /// Record a resize to apply at the start of the next frame. Zero
    /// dimensions are clamped to one.
    pub fn request_resize(&mut self, width: u32, height: u32) {
        self.pending_resize = Some((width.max(1), height.max(1)));
    }

    /// Run one frame: flush any pending resize, advance time, draw.
    pub fn run_frame(&mut self, app: &mut impl FrameApp) -> anyhow::Result<()> {
        let now = Instant::now();
        let dt = match self.last_frame {
            Some(last) => (now - last).as_secs_f32().min(self.max_dt),
            None => 0.0,
        };
        self.last_frame = Some(now);

        if let Some((width, height)) = self.pending_resize.take() {
            app.resize(width, height);
        }
        app.update(dt);
        app.draw()
    }
}
