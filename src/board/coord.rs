use crate::Arbitrary;
use crate::BOARD_SIZE;
use serde::Deserialize;
use serde::Serialize;

/// A cell position on the grid. Rows and columns are 0-indexed;
/// signed components keep neighbor arithmetic total, with validity
/// decided by [`Coord::in_bounds`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coord {
    pub row: i8,
    pub col: i8,
}

impl Coord {
    pub fn new(row: i8, col: i8) -> Self {
        Self { row, col }
    }

    pub fn in_bounds(&self, width: i8, height: i8) -> bool {
        self.row >= 0 && self.row < height && self.col >= 0 && self.col < width
    }

    pub fn on_board(&self) -> bool {
        self.in_bounds(BOARD_SIZE, BOARD_SIZE)
    }

    /// Orthogonal neighbors, unfiltered.
    pub fn neighbors4(&self) -> [Coord; 4] {
        [
            Coord::new(self.row - 1, self.col),
            Coord::new(self.row + 1, self.col),
            Coord::new(self.row, self.col - 1),
            Coord::new(self.row, self.col + 1),
        ]
    }

    /// The full 8-neighborhood, unfiltered. Diagonal contact counts as
    /// touching for placement purposes.
    pub fn neighbors8(&self) -> Vec<Coord> {
        (-1..=1)
            .flat_map(|dr| (-1..=1).map(move |dc| (dr, dc)))
            .filter(|&(dr, dc)| dr != 0 || dc != 0)
            .map(|(dr, dc)| Coord::new(self.row + dr, self.col + dc))
            .collect()
    }

    /// Checkerboard predicate used by the hunt phase.
    pub fn parity(&self, seed: u8) -> bool {
        (self.row + self.col + seed as i8) % 2 == 0
    }
}

impl Arbitrary for Coord {
    fn random() -> Self {
        use rand::Rng;
        let ref mut rng = rand::rng();
        Coord::new(
            rng.random_range(0..BOARD_SIZE),
            rng.random_range(0..BOARD_SIZE),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds() {
        assert!(Coord::new(0, 0).on_board());
        assert!(Coord::new(9, 9).on_board());
        assert!(!Coord::new(-1, 0).on_board());
        assert!(!Coord::new(0, 10).on_board());
    }

    #[test]
    fn neighborhood_sizes() {
        assert!(Coord::new(5, 5).neighbors8().len() == 8);
        let corner = Coord::new(0, 0);
        let on_board = corner.neighbors8().iter().filter(|c| c.on_board()).count();
        assert!(on_board == 3);
    }

    #[test]
    fn parity_flips_with_seed() {
        let c = Coord::new(2, 3);
        assert!(c.parity(1));
        assert!(!c.parity(0));
    }

    #[test]
    fn arbitrary_is_on_board() {
        for _ in 0..100 {
            assert!(Coord::random().on_board());
        }
    }
}
