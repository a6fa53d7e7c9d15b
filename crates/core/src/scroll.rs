/// Distance from the tail, in layout units, that still counts as "at bottom".
pub const PIN_TOLERANCE: f64 = 60.0;

/// Scroll geometry of the message log, as the browser reports it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

impl ScrollMetrics {
    pub fn new(scroll_top: f64, scroll_height: f64, client_height: f64) -> Self {
        Self {
            scroll_top,
            scroll_height,
            client_height,
        }
    }

    pub fn distance_from_bottom(&self) -> f64 {
        self.scroll_height - self.scroll_top - self.client_height
    }

    pub fn is_at_bottom(&self) -> bool {
        self.distance_from_bottom() < PIN_TOLERANCE
    }

    /// `scroll_top` value that shows the tail of the content.
    pub fn bottom_offset(&self) -> f64 {
        (self.scroll_height - self.client_height).max(0.0)
    }
}

/// What the log should do after new content lands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppendScroll {
    /// Hide the jump control and move to the new tail.
    Follow { scroll_top: f64 },
    /// Keep the reader's position and offer the jump control.
    Hold,
}

/// Tracks whether the log follows new messages.
///
/// Follow mode is decided from the last observed user position, so a tall reply never
/// unpins a reader who was already at the tail.
#[derive(Debug)]
pub struct ScrollController {
    pinned: bool,
    jump_visible: bool,
}

impl ScrollController {
    pub fn new() -> Self {
        Self {
            pinned: true,
            jump_visible: false,
        }
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    pub fn is_jump_visible(&self) -> bool {
        self.jump_visible
    }

    /// Handles a manual scroll. Returns whether the jump control should be visible.
    pub fn on_user_scroll(&mut self, metrics: ScrollMetrics) -> bool {
        self.pinned = metrics.is_at_bottom();
        self.jump_visible = !self.pinned;
        self.jump_visible
    }

    /// Handles a bubble append, given the geometry after insertion.
    pub fn on_content_appended(&mut self, metrics: ScrollMetrics) -> AppendScroll {
        if self.pinned {
            self.jump_visible = false;
            AppendScroll::Follow {
                scroll_top: metrics.bottom_offset(),
            }
        } else {
            self.jump_visible = true;
            AppendScroll::Hold
        }
    }

    /// Target for the jump control's smooth scroll.
    ///
    /// Visibility is left alone; the scroll events produced on the way down settle it.
    pub fn jump_target(&self, metrics: ScrollMetrics) -> f64 {
        metrics.scroll_height
    }
}

impl Default for ScrollController {
    fn default() -> Self {
        Self::new()
    }
}
