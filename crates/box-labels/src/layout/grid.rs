//! Grid placement
//!
//! Maps an ordered selection onto the slots of a preset's grid. The item at
//! selection index `i` always lands in absolute slot `start_offset + i`;
//! absolute slots are split into pages of `rows * cols` slots.

use crate::preset::LabelPreset;
use crate::types::{LabelError, Result};

use super::{PageSlots, RectCm, SlotPosition};

// =============================================================================
// Validation
// =============================================================================

/// Check a user-chosen starting slot against the preset.
///
/// Offsets are never clamped: anything outside `0..rows*cols` is an
/// `InvalidOffset` error.
pub fn validate_offset(preset: &LabelPreset, start_offset: i64) -> Result<usize> {
    let total_slots = checked_total_slots(preset)?;
    if start_offset < 0 || start_offset as u64 >= total_slots as u64 {
        return Err(LabelError::InvalidOffset {
            offset: start_offset,
            total_slots,
        });
    }
    Ok(start_offset as usize)
}

fn checked_total_slots(preset: &LabelPreset) -> Result<usize> {
    preset.validate()?;
    Ok(preset.total_slots())
}

// =============================================================================
// Slot Math
// =============================================================================

/// Page, row and column of an absolute slot.
///
/// The preset must have at least one slot.
pub fn slot_position(preset: &LabelPreset, slot: usize) -> SlotPosition {
    let total_slots = preset.total_slots().max(1);
    let cols = preset.cols.max(1);
    let slot_on_page = slot % total_slots;
    SlotPosition {
        slot,
        page: slot / total_slots,
        slot_on_page,
        row: slot_on_page / cols,
        col: slot_on_page % cols,
    }
}

/// Number of pages needed for `item_count` items starting at `start_offset`.
///
/// An empty selection needs no pages.
pub fn page_count(preset: &LabelPreset, item_count: usize, start_offset: usize) -> usize {
    if item_count == 0 {
        return 0;
    }
    let total_slots = preset.total_slots().max(1);
    (start_offset + item_count).div_ceil(total_slots)
}

/// Physical rectangle of the label at (row, col), in centimeters from the
/// page's top-left corner.
pub fn slot_rect_cm(preset: &LabelPreset, row: usize, col: usize) -> RectCm {
    let (x, y) = preset.slot_origin_cm(row, col);
    RectCm::new(x, y, preset.label_width, preset.label_height)
}

// =============================================================================
// Placement
// =============================================================================

/// Fill the first page's window for the interactive preview.
///
/// Returns exactly `rows * cols` entries. Items whose slot falls past the
/// first page are simply absent.
pub fn place_on_page<'a, T>(
    preset: &LabelPreset,
    items: &'a [T],
    start_offset: usize,
) -> Result<Vec<Option<&'a T>>> {
    let total_slots = checked_total_slots(preset)?;
    validate_offset(preset, start_offset as i64)?;

    let mut slots: Vec<Option<&T>> = vec![None; total_slots];
    for (idx, item) in items.iter().enumerate() {
        let position = start_offset + idx;
        if position >= total_slots {
            break;
        }
        slots[position] = Some(item);
    }
    Ok(slots)
}

/// Assign every item to exactly one slot across as many pages as needed.
///
/// Slots before `start_offset` on the first page and after the last item on
/// the last page stay empty. An empty selection yields no pages.
pub fn place_all_pages<'a, T>(
    preset: &LabelPreset,
    items: &'a [T],
    start_offset: usize,
) -> Result<Vec<PageSlots<&'a T>>> {
    let total_slots = checked_total_slots(preset)?;
    validate_offset(preset, start_offset as i64)?;

    let count = page_count(preset, items.len(), start_offset);
    let mut pages: Vec<PageSlots<&T>> = (0..count)
        .map(|index| PageSlots {
            index,
            slots: vec![None; total_slots],
        })
        .collect();

    for (idx, item) in items.iter().enumerate() {
        let position = slot_position(preset, start_offset + idx);
        pages[position.page].slots[position.slot_on_page] = Some(item);
    }

    Ok(pages)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preset::builtin_presets;

    fn grid(rows: usize, cols: usize) -> LabelPreset {
        LabelPreset {
            rows,
            cols,
            ..builtin_presets().remove(0)
        }
    }

    #[test]
    fn test_slot_position() {
        let preset = grid(8, 3);

        let pos = slot_position(&preset, 7);
        assert_eq!(pos.page, 0);
        assert_eq!(pos.row, 2);
        assert_eq!(pos.col, 1);

        let pos = slot_position(&preset, 25);
        assert_eq!(pos.page, 1);
        assert_eq!(pos.slot_on_page, 1);
        assert_eq!(pos.row, 0);
        assert_eq!(pos.col, 1);
    }

    #[test]
    fn test_page_count() {
        let preset = grid(2, 4);
        assert_eq!(page_count(&preset, 0, 3), 0);
        assert_eq!(page_count(&preset, 1, 0), 1);
        assert_eq!(page_count(&preset, 8, 0), 1);
        assert_eq!(page_count(&preset, 9, 0), 2);
        assert_eq!(page_count(&preset, 3, 5), 1);
        assert_eq!(page_count(&preset, 4, 5), 2);
    }

    #[test]
    fn test_validate_offset_bounds() {
        let preset = grid(2, 4);
        assert_eq!(validate_offset(&preset, 0).unwrap(), 0);
        assert_eq!(validate_offset(&preset, 7).unwrap(), 7);
        assert!(matches!(
            validate_offset(&preset, 8),
            Err(LabelError::InvalidOffset { offset: 8, total_slots: 8 })
        ));
        assert!(matches!(
            validate_offset(&preset, -1),
            Err(LabelError::InvalidOffset { offset: -1, .. })
        ));
    }

    #[test]
    fn test_zero_slot_preset_rejected() {
        let preset = grid(0, 3);
        let items = ["a"];
        assert!(matches!(
            place_all_pages(&preset, &items, 0),
            Err(LabelError::InvalidPreset(_))
        ));
    }

    #[test]
    fn test_oversized_grid_is_an_error() {
        let preset = grid(1 << 33, 1 << 33);
        assert!(matches!(
            validate_offset(&preset, 0),
            Err(LabelError::InvalidPreset(_))
        ));
        assert!(matches!(
            place_all_pages(&preset, &["a"], 0),
            Err(LabelError::InvalidPreset(_))
        ));
    }

    #[test]
    fn test_place_on_page_truncates_to_window() {
        let preset = grid(2, 2);
        let items = ["a", "b", "c", "d", "e"];
        let window = place_on_page(&preset, &items, 2).unwrap();
        assert_eq!(window, vec![None, None, Some(&"a"), Some(&"b")]);
    }

    #[test]
    fn test_slot_rect() {
        let preset = grid(8, 3);
        let rect = slot_rect_cm(&preset, 2, 1);
        assert!((rect.x - 7.45).abs() < 1e-4);
        assert!((rect.y - 8.67).abs() < 1e-4);
        assert_eq!(rect.width, preset.label_width);
        assert_eq!(rect.height, preset.label_height);
    }
}
