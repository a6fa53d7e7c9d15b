use crate::message::FormatStyle;
use crate::render::Bubble;
use crate::scroll::ScrollMetrics;

/// The page elements a session is bound to.
///
/// Implementations own the message log, the text box with its submit control, the format
/// selector and the jump-to-latest control. Creating or laying out those elements is not
/// their job.
pub trait ChatSurface {
    /// Current text of the message box.
    fn input_text(&self) -> String;

    fn clear_input(&mut self);

    /// Grows or shrinks the message box to fit its content.
    fn fit_input_height(&mut self);

    fn focus_input(&mut self);

    /// Enables or disables both the message box and the submit control.
    fn set_input_enabled(&mut self, enabled: bool);

    fn format_style(&self) -> FormatStyle;

    fn append_bubble(&mut self, bubble: &Bubble);

    /// Smoothly brings the last appended bubble into view, moving as little as possible.
    fn reveal_latest(&mut self);

    fn scroll_metrics(&self) -> ScrollMetrics;

    fn set_scroll_top(&mut self, scroll_top: f64);

    fn smooth_scroll_to(&mut self, scroll_top: f64);

    fn set_jump_visible(&mut self, visible: bool);
}
