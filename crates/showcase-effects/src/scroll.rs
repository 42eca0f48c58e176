use serde::Deserialize;

/// How far the page has been scrolled, as a percentage in `[0, 100]`.
/// Pages that fit in the viewport report 0.
pub fn scroll_progress(offset: f64, content_height: f64, viewport_height: f64) -> f64 {
    let scrollable = content_height - viewport_height;
    if !(scrollable > 0.0) || !offset.is_finite() {
        return 0.0;
    }
    (offset / scrollable * 100.0).clamp(0.0, 100.0)
}

/// "Scroll down" hint shown at the top of the page.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScrollIndicator {
    /// Offset in pixels past which the hint hides.
    pub hide_after: f64,
}

impl Default for ScrollIndicator {
    fn default() -> Self {
        Self { hide_after: 100.0 }
    }
}

impl ScrollIndicator {
    pub fn is_visible(&self, offset: f64) -> bool {
        offset <= self.hide_after
    }
}
