//! Position arithmetic for ordered columns.
//!
//! Every function here is pure: it takes the current ordering of a column
//! (index = position) and returns the new ordering. Callers diff the result
//! against what is stored to decide which rows need rewriting.

/// Position for a new entry appended to a column holding `current_count` entries
pub fn append_position(current_count: usize) -> usize {
    current_count
}

/// Clamp an optional target index into `[0, len]`. A missing index means the tail.
pub fn clamp_index(target_index: Option<usize>, len: usize) -> usize {
    target_index.map_or(len, |index| index.min(len))
}

/// Result of planning a move
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovePlan<T> {
    /// New ordering of the source column. For a same-column reorder this is
    /// the whole result.
    pub source: Vec<T>,
    /// New ordering of the destination column, present only for transfers
    pub destination: Option<Vec<T>>,
    /// Final index of the moved entry
    pub index: usize,
}

impl<T> MovePlan<T> {
    /// True when the move stays within one column
    pub fn is_reorder(&self) -> bool {
        self.destination.is_none()
    }
}

/// Plan moving `item` out of `source` and into `destination` at `target_index`.
///
/// Pass `None` for `destination` to reorder within `source`. The target index
/// is clamped against the destination length after the item has been removed.
/// Returns `None` when `item` is not part of `source`.
pub fn compute_move_positions<T: Clone + PartialEq>(
    source: &[T],
    destination: Option<&[T]>,
    item: &T,
    target_index: Option<usize>,
) -> Option<MovePlan<T>> {
    let from = source.iter().position(|entry| entry == item)?;
    let mut remaining = source.to_vec();
    remaining.remove(from);

    match destination {
        None => {
            let index = clamp_index(target_index, remaining.len());
            remaining.insert(index, item.clone());
            Some(MovePlan {
                source: remaining,
                destination: None,
                index,
            })
        }
        Some(destination) => {
            let mut opened: Vec<T> = destination
                .iter()
                .filter(|entry| *entry != item)
                .cloned()
                .collect();
            let index = clamp_index(target_index, opened.len());
            opened.insert(index, item.clone());
            Some(MovePlan {
                source: remaining,
                destination: Some(opened),
                index,
            })
        }
    }
}

/// Remove `item` from `sequence` and close the gap.
///
/// Returns `None` when `item` is not part of `sequence`.
pub fn compute_delete_positions<T: Clone + PartialEq>(sequence: &[T], item: &T) -> Option<Vec<T>> {
    let index = sequence.iter().position(|entry| entry == item)?;
    let mut remaining = sequence.to_vec();
    remaining.remove(index);
    Some(remaining)
}

/// True when the positions, in any order, are exactly `0..n`
pub fn is_contiguous(positions: impl IntoIterator<Item = usize>) -> bool {
    let mut positions: Vec<usize> = positions.into_iter().collect();
    positions.sort_unstable();
    positions.iter().enumerate().all(|(i, p)| i == *p)
}
