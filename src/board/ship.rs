use super::Coord;
use crate::ShipId;
use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    H,
    V,
}

/// One ship of the fleet: an id, its cells in bow-to-stern order, and a
/// parallel hit vector. `sunk` is derived, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ship {
    pub id: ShipId,
    pub masts: u8,
    pub orientation: Orientation,
    pub cells: Vec<Coord>,
    pub hits: Vec<bool>,
}

impl Ship {
    /// Lays out a ship from its bow cell along the orientation axis.
    pub fn new(id: ShipId, masts: u8, orientation: Orientation, bow: Coord) -> Self {
        let cells = (0..masts as i8)
            .map(|i| match orientation {
                Orientation::H => Coord::new(bow.row, bow.col + i),
                Orientation::V => Coord::new(bow.row + i, bow.col),
            })
            .collect::<Vec<_>>();
        let hits = vec![false; masts as usize];
        Self {
            id,
            masts,
            orientation,
            cells,
            hits,
        }
    }

    pub fn is_sunk(&self) -> bool {
        !self.hits.is_empty() && self.hits.iter().all(|&h| h)
    }

    pub fn occupies(&self, coord: Coord) -> bool {
        self.cells.contains(&coord)
    }

    /// Marks the cell as hit. Returns true when this hit sank the ship.
    pub fn take_hit(&mut self, coord: Coord) -> bool {
        if let Some(i) = self.cells.iter().position(|&c| c == coord) {
            self.hits[i] = true;
        }
        self.is_sunk()
    }

    /// Cells plus their full 8-neighborhood, the exclusion zone other
    /// ships may not enter.
    pub fn halo(&self) -> Vec<Coord> {
        let mut zone = self.cells.clone();
        for cell in &self.cells {
            for n in cell.neighbors8() {
                if !zone.contains(&n) {
                    zone.push(n);
                }
            }
        }
        zone
    }

    /// Structural sanity of a client-supplied ship: mast count in range,
    /// cells contiguous along the orientation axis, hit vector aligned.
    pub fn well_formed(&self) -> bool {
        if !(1..=4).contains(&self.masts) {
            return false;
        }
        if self.cells.len() != self.masts as usize || self.hits.len() != self.cells.len() {
            return false;
        }
        let bow = self.cells[0];
        self.cells.iter().enumerate().all(|(i, &c)| match self.orientation {
            Orientation::H => c.row == bow.row && c.col == bow.col + i as i8,
            Orientation::V => c.col == bow.col && c.row == bow.row + i as i8,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_follows_orientation() {
        let ship = Ship::new(1, 3, Orientation::H, Coord::new(4, 2));
        assert!(ship.cells == vec![Coord::new(4, 2), Coord::new(4, 3), Coord::new(4, 4)]);
        let ship = Ship::new(2, 2, Orientation::V, Coord::new(7, 7));
        assert!(ship.cells == vec![Coord::new(7, 7), Coord::new(8, 7)]);
    }

    #[test]
    fn sunk_requires_every_cell_hit() {
        let mut ship = Ship::new(1, 2, Orientation::H, Coord::new(5, 5));
        assert!(!ship.take_hit(Coord::new(5, 5)));
        assert!(!ship.is_sunk());
        assert!(ship.take_hit(Coord::new(5, 6)));
        assert!(ship.is_sunk());
    }

    #[test]
    fn halo_surrounds_the_hull() {
        let ship = Ship::new(1, 1, Orientation::H, Coord::new(5, 5));
        let halo = ship.halo();
        assert!(halo.len() == 9);
        assert!(halo.contains(&Coord::new(4, 4)));
        assert!(halo.contains(&Coord::new(6, 6)));
    }

    #[test]
    fn malformed_ships_are_rejected() {
        let mut ship = Ship::new(1, 3, Orientation::H, Coord::new(0, 0));
        assert!(ship.well_formed());
        ship.cells[2] = Coord::new(5, 5);
        assert!(!ship.well_formed());
        let mut gap = Ship::new(2, 2, Orientation::V, Coord::new(0, 0));
        gap.hits.push(false);
        assert!(!gap.well_formed());
    }
}
