//! Uniform grid used for proximity queries.
//!
//! The grid stores ids only. Positions are read back from the registry when a
//! query filters candidates, so a cell may lag behind an actor by at most the
//! writes of the current tick.

use std::collections::HashMap;

use glam::{IVec2, Vec2};

use crate::actor::ActorId;

/// Grid cell coordinate.
pub type Cell = IVec2;

#[derive(Clone, Debug)]
pub(crate) struct SpatialGrid {
    cell_size: f32,
    inv_cell_size: f32,
    cells: HashMap<Cell, Vec<ActorId>>,
}

impl SpatialGrid {
    pub(crate) fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            inv_cell_size: cell_size.recip(),
            cells: HashMap::new(),
        }
    }

    pub(crate) fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub(crate) fn cell_of(&self, position: Vec2) -> Cell {
        (position * self.inv_cell_size).floor().as_ivec2()
    }

    pub(crate) fn insert(&mut self, id: ActorId, cell: Cell) {
        self.cells.entry(cell).or_default().push(id);
    }

    pub(crate) fn remove(&mut self, id: ActorId, cell: Cell) -> bool {
        let Some(members) = self.cells.get_mut(&cell) else {
            return false;
        };
        let Some(index) = members.iter().position(|member| *member == id) else {
            return false;
        };
        members.swap_remove(index);
        if members.is_empty() {
            // Only populated cells stay in the map.
            self.cells.remove(&cell);
        }
        true
    }

    /// Moves `id` between cells. Returns the cell it now lives in.
    pub(crate) fn relocate(&mut self, id: ActorId, from: Cell, position: Vec2) -> Cell {
        let to = self.cell_of(position);
        if to != from {
            self.remove(id, from);
            self.insert(id, to);
        }
        to
    }

    /// Visits every id stored in cells overlapping the box `[min, max]`.
    ///
    /// Visiting order is unspecified; callers sort what they collect.
    pub(crate) fn for_each_in_bounds(&self, min: Vec2, max: Vec2, mut visit: impl FnMut(ActorId)) {
        let lo = self.cell_of(min);
        let hi = self.cell_of(max);

        // Cell coordinates saturate at the i32 range, so the area can exceed i64.
        let width = i64::from(hi.x) - i64::from(lo.x) + 1;
        let height = i64::from(hi.y) - i64::from(lo.y) + 1;
        let dense = width
            .checked_mul(height)
            .is_some_and(|span| span <= self.cells.len() as i64);

        if !dense {
            // Box covers more cells than are populated: walk the populated ones.
            for (cell, members) in &self.cells {
                if cell.x >= lo.x && cell.x <= hi.x && cell.y >= lo.y && cell.y <= hi.y {
                    members.iter().copied().for_each(&mut visit);
                }
            }
            return;
        }

        for y in lo.y..=hi.y {
            for x in lo.x..=hi.x {
                if let Some(members) = self.cells.get(&IVec2::new(x, y)) {
                    members.iter().copied().for_each(&mut visit);
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn cell_count(&self) -> usize {
        self.cells.len()
    }
}
