//! The building layout: a square grid of one-byte cells.
//!
//! Each cell carries an INSIDE bit (building interior) and two door bits
//! that open a gap in the wall on the cell's positive X or positive Z face.
//! The outer ring is never INSIDE; it is the world boundary.

use crate::{CELL_SIZE, GRID_SIZE};

pub const INSIDE: u8 = 0x01;
pub const DOOR_X: u8 = 0x02;
pub const DOOR_Z: u8 = 0x04;

pub const MAP_BYTES: usize = GRID_SIZE * GRID_SIZE;
pub const CHUNK_SIZE: usize = 256;
pub const CHUNK_COUNT: usize = MAP_BYTES / CHUNK_SIZE;

/// Cell coordinate containing a world coordinate.
#[inline]
pub fn cell_of(v: f32) -> i32 {
    (v / CELL_SIZE).floor() as i32
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapGrid {
    cells: Vec<u8>,
}

impl Default for MapGrid {
    fn default() -> Self {
        Self::new()
    }
}

impl MapGrid {
    /// An empty map: open ground everywhere.
    pub fn new() -> Self {
        Self {
            cells: vec![0; MAP_BYTES],
        }
    }

    #[inline]
    pub fn in_bounds(ix: i32, iz: i32) -> bool {
        ix >= 0 && iz >= 0 && (ix as usize) < GRID_SIZE && (iz as usize) < GRID_SIZE
    }

    #[inline]
    fn is_border(ix: i32, iz: i32) -> bool {
        ix == 0 || iz == 0 || ix == GRID_SIZE as i32 - 1 || iz == GRID_SIZE as i32 - 1
    }

    /// Flags of a cell; anything outside the grid reads as open ground.
    #[inline]
    pub fn get(&self, ix: i32, iz: i32) -> u8 {
        if Self::in_bounds(ix, iz) {
            self.cells[iz as usize * GRID_SIZE + ix as usize]
        } else {
            0
        }
    }

    /// Sets a cell's flags. INSIDE is stripped from border cells.
    pub fn set(&mut self, ix: i32, iz: i32, flags: u8) {
        if !Self::in_bounds(ix, iz) {
            return;
        }
        let flags = if Self::is_border(ix, iz) {
            flags & !INSIDE
        } else {
            flags
        };
        self.cells[iz as usize * GRID_SIZE + ix as usize] = flags;
    }

    pub fn insert_flags(&mut self, ix: i32, iz: i32, flags: u8) {
        let current = self.get(ix, iz);
        self.set(ix, iz, current | flags);
    }

    #[inline]
    pub fn is_inside(&self, ix: i32, iz: i32) -> bool {
        self.get(ix, iz) & INSIDE != 0
    }

    #[inline]
    pub fn has_door_x(&self, ix: i32, iz: i32) -> bool {
        self.get(ix, iz) & DOOR_X != 0
    }

    #[inline]
    pub fn has_door_z(&self, ix: i32, iz: i32) -> bool {
        self.get(ix, iz) & DOOR_Z != 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.cells
    }

    /// One 256-byte slice of the map as sent in a WORLD reply.
    pub fn chunk(&self, part: usize) -> Option<&[u8]> {
        if part >= CHUNK_COUNT {
            return None;
        }
        let start = part * CHUNK_SIZE;
        Some(&self.cells[start..start + CHUNK_SIZE])
    }

    /// Writes a downloaded chunk. Returns false if the part index or the
    /// length is wrong, leaving the map untouched.
    pub fn load_chunk(&mut self, part: usize, data: &[u8]) -> bool {
        if part >= CHUNK_COUNT || data.len() != CHUNK_SIZE {
            return false;
        }
        let start = part * CHUNK_SIZE;
        for (offset, &flags) in data.iter().enumerate() {
            let i = start + offset;
            self.set((i % GRID_SIZE) as i32, (i / GRID_SIZE) as i32, flags);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_map_is_open() {
        let map = MapGrid::new();
        assert_eq!(map.as_bytes().len(), MAP_BYTES);
        assert!(map.as_bytes().iter().all(|&c| c == 0));
    }

    #[test]
    fn test_border_never_inside() {
        let mut map = MapGrid::new();
        map.set(0, 5, INSIDE | DOOR_X);
        map.set(31, 31, INSIDE);
        map.set(5, 5, INSIDE);

        assert!(!map.is_inside(0, 5));
        assert!(map.has_door_x(0, 5));
        assert!(!map.is_inside(31, 31));
        assert!(map.is_inside(5, 5));
    }

    #[test]
    fn test_out_of_range_reads_open() {
        let map = MapGrid::new();
        assert_eq!(map.get(-1, 0), 0);
        assert_eq!(map.get(0, 32), 0);
    }

    #[test]
    fn test_cell_of() {
        assert_eq!(cell_of(0.0), 0);
        assert_eq!(cell_of(15.99), 0);
        assert_eq!(cell_of(16.0), 1);
        assert_eq!(cell_of(-0.5), -1);
    }

    #[test]
    fn test_chunk_transfer() {
        let mut source = MapGrid::new();
        source.set(3, 9, INSIDE | DOOR_Z);
        source.set(20, 28, INSIDE);

        let mut copy = MapGrid::new();
        for part in 0..CHUNK_COUNT {
            let chunk = source.chunk(part).unwrap().to_vec();
            assert!(copy.load_chunk(part, &chunk));
        }

        assert_eq!(copy, source);
        assert!(source.chunk(CHUNK_COUNT).is_none());
        assert!(!copy.load_chunk(4, &[0; CHUNK_SIZE]));
        assert!(!copy.load_chunk(0, &[0; 10]));
    }
}
