use super::Board;
use super::Coord;
use super::Orientation;
use super::PlacementError;
use super::Ship;
use crate::BOARD_SIZE;
use crate::FLEET_SHIPS;
use crate::PLACE_ATTEMPTS_PER_SHIP;
use rand::Rng;

/// The standard fleet as (mast count, ships of that size) pairs:
/// one battleship, two cruisers, three destroyers, four submarines.
pub const FLEET: [(u8, u8); 4] = [(4, 1), (3, 2), (2, 3), (1, 4)];

/// Verifies a board carries exactly the standard fleet.
pub fn validate_fleet(board: &Board) -> Result<(), PlacementError> {
    if board.ships.len() != FLEET_SHIPS {
        return Err(PlacementError::WrongFleet);
    }
    for (masts, expected) in FLEET {
        let count = board.ships.iter().filter(|s| s.masts == masts).count();
        if count != expected as usize {
            return Err(PlacementError::WrongFleet);
        }
    }
    Ok(())
}

/// Places the standard fleet on an empty board. Each ship gets a bounded
/// number of random attempts; exhausting them restarts from an empty
/// board, so the call always returns a valid fleet.
pub fn random_fleet() -> Board {
    let ref mut rng = rand::rng();
    loop {
        match try_fleet(rng) {
            Some(board) => return board,
            None => continue,
        }
    }
}

fn try_fleet(rng: &mut impl Rng) -> Option<Board> {
    let mut board = Board::standard();
    let mut id = 0;
    for (masts, count) in FLEET {
        for _ in 0..count {
            id += 1;
            let ship = (0..PLACE_ATTEMPTS_PER_SHIP)
                .map(|_| random_ship(rng, id, masts))
                .find(|ship| board.clone().place_ship(ship.clone()).is_ok())?;
            board.place_ship(ship).ok()?;
        }
    }
    Some(board)
}

fn random_ship(rng: &mut impl Rng, id: u8, masts: u8) -> Ship {
    let orientation = match rng.random_range(0..2) {
        0 => Orientation::H,
        _ => Orientation::V,
    };
    let span = masts as i8 - 1;
    let (row, col) = match orientation {
        Orientation::H => (
            rng.random_range(0..BOARD_SIZE),
            rng.random_range(0..BOARD_SIZE - span),
        ),
        Orientation::V => (
            rng.random_range(0..BOARD_SIZE - span),
            rng.random_range(0..BOARD_SIZE),
        ),
    };
    Ship::new(id, masts, orientation, Coord::new(row, col))
}
