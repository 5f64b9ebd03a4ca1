//! Layout data types for label sheets

/// Where an absolute slot lands on the sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotPosition {
    /// Absolute slot index (across pages)
    pub slot: usize,
    /// Output page index
    pub page: usize,
    /// Index within the page (0..rows*cols)
    pub slot_on_page: usize,
    /// Row index (0 = top row)
    pub row: usize,
    /// Column index (0 = leftmost column)
    pub col: usize,
}

/// One page worth of slots, each either an item or empty
#[derive(Debug, Clone, PartialEq)]
pub struct PageSlots<T> {
    /// Output page index
    pub index: usize,
    /// Length is always rows * cols
    pub slots: Vec<Option<T>>,
}

impl<T> PageSlots<T> {
    /// Occupied slots with their index on the page
    pub fn occupied(&self) -> impl Iterator<Item = (usize, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.as_ref().map(|item| (idx, item)))
    }

    pub fn occupied_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

/// A rectangle in centimeters, origin at the page's top-left
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RectCm {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl RectCm {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Largest rect with the given aspect ratio centered inside this one
    /// (object-fit: contain).
    pub fn contain(&self, aspect_ratio: f32) -> RectCm {
        if !aspect_ratio.is_finite() || aspect_ratio <= 0.0 {
            return *self;
        }
        let own = self.width / self.height;
        if aspect_ratio > own {
            let height = self.width / aspect_ratio;
            RectCm::new(self.x, self.y + (self.height - height) / 2.0, self.width, height)
        } else {
            let width = self.height * aspect_ratio;
            RectCm::new(self.x + (self.width - width) / 2.0, self.y, width, self.height)
        }
    }
}
