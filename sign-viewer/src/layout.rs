//! Page layout and visibility.
//!
//! Pages are stacked vertically in content space, centred horizontally, with
//! a gap between pages and padding around the flow. Client space is content
//! space shifted up by the scroll offset.

use sign_core::{nearest_rect, PageSize, Point, Rect};

/// A scroll position expressed relative to a page, so it survives relayout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollAnchor {
    /// Slot the viewport centre was on.
    pub slot: usize,
    /// Vertical position of the centre within the page, as a fraction of its height.
    pub offset_ratio: f64,
}

/// Computed page positions in content space.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageLayout {
    slots: Vec<Rect>,
    content_width: f64,
    content_height: f64,
}

impl PageLayout {
    /// Lay out pages at a scale for a viewport width.
    #[must_use]
    pub fn compute(
        pages: &[PageSize],
        scale: f64,
        viewport_width: f64,
        gap: f64,
        padding: f64,
    ) -> Self {
        let widest = pages
            .iter()
            .map(|page| page.width * scale)
            .fold(0.0_f64, f64::max);
        let content_width = viewport_width.max(widest + 2.0 * padding);

        let mut y = padding;
        let mut slots = Vec::with_capacity(pages.len());
        for (i, page) in pages.iter().enumerate() {
            if i > 0 {
                y += gap;
            }
            let size = page.scaled(scale);
            let x = (content_width - size.width) / 2.0;
            slots.push(Rect::new(x, y, size.width, size.height));
            y += size.height;
        }

        Self {
            slots,
            content_width,
            content_height: y + padding,
        }
    }

    /// Page rects in content space.
    #[must_use]
    pub fn slots(&self) -> &[Rect] {
        &self.slots
    }

    /// Rect of one slot.
    #[must_use]
    pub fn slot(&self, index: usize) -> Option<Rect> {
        self.slots.get(index).copied()
    }

    /// Total content width.
    #[must_use]
    pub fn content_width(&self) -> f64 {
        self.content_width
    }

    /// Total content height.
    #[must_use]
    pub fn content_height(&self) -> f64 {
        self.content_height
    }

    /// Largest valid scroll offset for a viewport height.
    #[must_use]
    pub fn max_scroll_top(&self, viewport_height: f64) -> f64 {
        (self.content_height - viewport_height).max(0.0)
    }

    /// Clamp a scroll offset into range.
    #[must_use]
    pub fn clamp_scroll(&self, scroll_top: f64, viewport_height: f64) -> f64 {
        scroll_top.clamp(0.0, self.max_scroll_top(viewport_height))
    }

    /// How visible a slot is, from 0 to 1.
    ///
    /// The larger of the visible fraction of the page and the fraction of the
    /// viewport the page covers, so a page taller than the viewport still
    /// counts as fully visible when it fills the screen.
    #[must_use]
    pub fn visibility(&self, index: usize, scroll_top: f64, viewport_height: f64) -> f64 {
        let Some(slot) = self.slot(index) else {
            return 0.0;
        };
        let top = slot.y.max(scroll_top);
        let bottom = slot.bottom().min(scroll_top + viewport_height);
        let visible = (bottom - top).max(0.0);
        if visible <= 0.0 {
            return 0.0;
        }
        let of_page = if slot.height > 0.0 { visible / slot.height } else { 0.0 };
        let of_viewport = if viewport_height > 0.0 {
            visible / viewport_height
        } else {
            0.0
        };
        of_page.max(of_viewport).min(1.0)
    }

    /// The most visible slot whose visibility reaches `threshold`.
    /// Ties go to the earlier slot.
    #[must_use]
    pub fn most_visible(
        &self,
        scroll_top: f64,
        viewport_height: f64,
        threshold: f64,
    ) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for index in 0..self.slots.len() {
            let ratio = self.visibility(index, scroll_top, viewport_height);
            if ratio >= threshold && ratio > 0.0 && best.is_none_or(|(_, r)| ratio > r) {
                best = Some((index, ratio));
            }
        }
        best.map(|(index, _)| index)
    }

    /// Slot containing a content-space point.
    #[must_use]
    pub fn slot_at(&self, point: Point) -> Option<usize> {
        self.slots.iter().position(|slot| slot.contains(point))
    }

    /// Slot nearest a content-space point. Ties go to the earlier slot.
    #[must_use]
    pub fn nearest_slot(&self, point: Point) -> Option<usize> {
        nearest_rect(point, self.slots.iter().copied())
    }

    /// Record where the viewport centre sits relative to the page under it.
    #[must_use]
    pub fn capture_anchor(&self, scroll_top: f64, viewport_height: f64) -> Option<ScrollAnchor> {
        let centre_y = scroll_top + viewport_height / 2.0;
        let slot = self
            .slots
            .iter()
            .position(|slot| centre_y >= slot.y && centre_y <= slot.bottom())
            .or_else(|| {
                let x = self.content_width / 2.0;
                self.nearest_slot(Point::new(x, centre_y))
            })?;
        let rect = self.slots[slot];
        let offset_ratio = if rect.height > 0.0 {
            (centre_y - rect.y) / rect.height
        } else {
            0.0
        };
        Some(ScrollAnchor { slot, offset_ratio })
    }

    /// Scroll offset that puts an anchor back at the viewport centre.
    #[must_use]
    pub fn restore_anchor(&self, anchor: ScrollAnchor, viewport_height: f64) -> f64 {
        let Some(rect) = self.slot(anchor.slot) else {
            return 0.0;
        };
        let centre_y = rect.y + anchor.offset_ratio * rect.height;
        self.clamp_scroll(centre_y - viewport_height / 2.0, viewport_height)
    }
}
