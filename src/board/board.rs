use super::Coord;
use super::Orientation;
use super::Ship;
use crate::Arbitrary;
use crate::BOARD_SIZE;
use crate::ShipId;
use std::collections::BTreeSet;

/// Outcome of firing at a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShotOutcome {
    Miss,
    Hit(ShipId),
    Sink(ShipId),
    Invalid,
    AlreadyShot,
}

impl ShotOutcome {
    pub fn code(&self) -> &'static str {
        match self {
            ShotOutcome::Miss => "miss",
            ShotOutcome::Hit(_) => "hit",
            ShotOutcome::Sink(_) => "sink",
            ShotOutcome::Invalid => "invalid",
            ShotOutcome::AlreadyShot => "already_shot",
        }
    }

    pub fn ship(&self) -> Option<ShipId> {
        match self {
            ShotOutcome::Hit(id) | ShotOutcome::Sink(id) => Some(*id),
            _ => None,
        }
    }

    pub fn connects(&self) -> bool {
        matches!(self, ShotOutcome::Hit(_) | ShotOutcome::Sink(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementError {
    Malformed,
    OutOfBounds,
    Overlap,
    Touching,
    WrongFleet,
    InconsistentShots,
}

/// The authoritative grid for one player: placed ships plus the record of
/// every cell fired upon. Hits is always a subset of shots.
#[derive(Debug, Clone, Default)]
pub struct Board {
    pub width: i8,
    pub height: i8,
    pub ships: Vec<Ship>,
    pub shots: BTreeSet<Coord>,
    pub hits: BTreeSet<Coord>,
}

impl Board {
    pub fn new(width: i8, height: i8) -> Self {
        Self {
            width,
            height,
            ships: Vec::new(),
            shots: BTreeSet::new(),
            hits: BTreeSet::new(),
        }
    }

    pub fn standard() -> Self {
        Self::new(BOARD_SIZE, BOARD_SIZE)
    }

    pub fn ship(&self, id: ShipId) -> Option<&Ship> {
        self.ships.iter().find(|s| s.id == id)
    }

    pub fn ship_at(&self, coord: Coord) -> Option<&Ship> {
        self.ships.iter().find(|s| s.occupies(coord))
    }

    /// Adds a ship, enforcing the placement rules: inside the grid, no
    /// shared cells, no 8-adjacent contact with another ship.
    pub fn place_ship(&mut self, ship: Ship) -> Result<(), PlacementError> {
        if !ship.well_formed() {
            return Err(PlacementError::Malformed);
        }
        if ship.cells.iter().any(|c| !c.in_bounds(self.width, self.height)) {
            return Err(PlacementError::OutOfBounds);
        }
        if ship
            .cells
            .iter()
            .any(|&c| self.ships.iter().any(|s| s.occupies(c)))
        {
            return Err(PlacementError::Overlap);
        }
        if self
            .ships
            .iter()
            .flat_map(|s| s.halo())
            .any(|zone| ship.cells.contains(&zone))
        {
            return Err(PlacementError::Touching);
        }
        self.ships.push(ship);
        Ok(())
    }

    /// Resolves a shot. Mutation is confined to `shots`, `hits`, and the
    /// struck ship's hit vector.
    pub fn fire_shot(&mut self, coord: Coord) -> ShotOutcome {
        if !coord.in_bounds(self.width, self.height) {
            return ShotOutcome::Invalid;
        }
        if self.shots.contains(&coord) {
            return ShotOutcome::AlreadyShot;
        }
        self.shots.insert(coord);
        match self.ships.iter_mut().find(|s| s.occupies(coord)) {
            None => ShotOutcome::Miss,
            Some(ship) => {
                self.hits.insert(coord);
                match ship.take_hit(coord) {
                    true => ShotOutcome::Sink(ship.id),
                    false => ShotOutcome::Hit(ship.id),
                }
            }
        }
    }

    pub fn is_fleet_sunk(&self) -> bool {
        !self.ships.is_empty() && self.ships.iter().all(|s| s.is_sunk())
    }

    pub fn sunk_cells(&self) -> BTreeSet<Coord> {
        self.ships
            .iter()
            .filter(|s| s.is_sunk())
            .flat_map(|s| s.cells.iter().copied())
            .collect()
    }

    /// Records the neighborhood of a sunk ship as fired upon, sparing the
    /// opponent redundant guesses. Returns the newly marked cells.
    pub fn mark_around_sunk(&mut self, id: ShipId) -> Vec<Coord> {
        let zone = match self.ship(id) {
            Some(ship) if ship.is_sunk() => ship.halo(),
            _ => return Vec::new(),
        };
        zone.into_iter()
            .filter(|c| c.in_bounds(self.width, self.height))
            .filter(|c| self.shots.insert(*c))
            .collect()
    }

    /// Rebuilds a board from serialized parts, re-validating placement
    /// rules and shot consistency. The round-trip with serialization is
    /// the identity on valid boards.
    pub fn restore(
        width: i8,
        height: i8,
        ships: Vec<Ship>,
        shots: Vec<Coord>,
        hits: Vec<Coord>,
    ) -> Result<Self, PlacementError> {
        let mut board = Board::new(width, height);
        for mut ship in ships {
            ship.hits = vec![false; ship.cells.len()];
            board.place_ship(ship)?;
        }
        let shots: BTreeSet<Coord> = shots.into_iter().collect();
        let hits: BTreeSet<Coord> = hits.into_iter().collect();
        if !hits.is_subset(&shots) {
            return Err(PlacementError::InconsistentShots);
        }
        if shots.iter().any(|c| !c.in_bounds(width, height)) {
            return Err(PlacementError::InconsistentShots);
        }
        for &shot in &shots {
            let struck = board.ships.iter().any(|s| s.occupies(shot));
            if struck != hits.contains(&shot) {
                return Err(PlacementError::InconsistentShots);
            }
        }
        for &hit in &hits {
            if let Some(ship) = board.ships.iter_mut().find(|s| s.occupies(hit)) {
                ship.take_hit(hit);
            }
        }
        board.shots = shots;
        board.hits = hits;
        Ok(board)
    }
}

impl Arbitrary for Board {
    fn random() -> Self {
        super::random_fleet()
    }
}
