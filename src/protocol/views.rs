use crate::PlayerId;
use crate::board::Board;
use crate::board::Coord;
use crate::board::PlacementError;
use crate::board::Ship;
use serde::Deserialize;
use serde::Serialize;

/// Full serialization of a board, sent only to its owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardState {
    pub width: i8,
    pub height: i8,
    pub ships: Vec<Ship>,
    pub shots: Vec<Coord>,
    pub hits: Vec<Coord>,
    #[serde(default)]
    pub sunk_cells: Vec<Coord>,
}

impl From<&Board> for BoardState {
    fn from(board: &Board) -> Self {
        Self {
            width: board.width,
            height: board.height,
            ships: board.ships.clone(),
            shots: board.shots.iter().copied().collect(),
            hits: board.hits.iter().copied().collect(),
            sunk_cells: board.sunk_cells().into_iter().collect(),
        }
    }
}

impl TryFrom<BoardState> for Board {
    type Error = PlacementError;

    fn try_from(state: BoardState) -> Result<Self, Self::Error> {
        Board::restore(
            state.width,
            state.height,
            state.ships,
            state.shots,
            state.hits,
        )
    }
}

/// The opponent's board as a player is allowed to see it: fired cells and
/// sunk wrecks only. Cells of a ship still afloat never appear here.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpponentView {
    pub width: i8,
    pub height: i8,
    pub shots: Vec<Coord>,
    pub hits: Vec<Coord>,
    pub sunk_cells: Vec<Coord>,
}

impl From<&Board> for OpponentView {
    fn from(board: &Board) -> Self {
        Self {
            width: board.width,
            height: board.height,
            shots: board.shots.iter().copied().collect(),
            hits: board.hits.iter().copied().collect(),
            sunk_cells: board.sunk_cells().into_iter().collect(),
        }
    }
}

/// Shot counters from the perspective of the receiving player.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Counters {
    pub you: u32,
    pub opponent: u32,
}

/// The receiving player's own slot in a snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnSlotView {
    pub id: PlayerId,
    pub nickname: String,
    pub ready: bool,
    pub board: BoardState,
}

/// The opposing slot, board masked.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpponentSlotView {
    pub id: PlayerId,
    pub nickname: String,
    pub ready: bool,
    pub connected: bool,
    pub board: OpponentView,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Arbitrary;
    use crate::board::ShotOutcome;

    #[test]
    fn board_round_trip_is_identity() {
        let mut board = Board::random();
        board.fire_shot(Coord::new(0, 0));
        let target = board.ships[0].cells[0];
        board.fire_shot(target);
        let state = BoardState::from(&board);
        let back = Board::try_from(state.clone()).expect("valid board restores");
        assert!(BoardState::from(&back).shots == state.shots);
        assert!(BoardState::from(&back).hits == state.hits);
        assert!(back.hits == board.hits);
        assert!(back.ships.len() == board.ships.len());
        for (a, b) in back.ships.iter().zip(board.ships.iter()) {
            assert!(a.cells == b.cells);
            assert!(a.hits == b.hits);
        }
    }

    #[test]
    fn fire_then_serialize_commutes() {
        let board = Board::random();
        let coord = board.ships[3].cells[0];
        let mut fired = board.clone();
        let outcome = fired.fire_shot(coord);
        assert!(outcome.connects());
        let restored = Board::try_from(BoardState::from(&board)).expect("restores");
        let mut refired = restored;
        assert!(refired.fire_shot(coord) == outcome);
        assert!(BoardState::from(&refired).hits == BoardState::from(&fired).hits);
    }

    #[test]
    fn masked_view_hides_afloat_ships() {
        let mut board = Board::random();
        let sunk_target = board.ships[9].id;
        for coord in board.ship(sunk_target).expect("exists").cells.clone() {
            let outcome = board.fire_shot(coord);
            assert!(outcome != ShotOutcome::Miss);
        }
        let view = OpponentView::from(&board);
        let sunk = board.sunk_cells();
        for ship in board.ships.iter().filter(|s| !s.is_sunk()) {
            for cell in &ship.cells {
                assert!(!view.sunk_cells.contains(cell));
            }
        }
        for cell in &view.sunk_cells {
            assert!(sunk.contains(cell));
        }
    }

    #[test]
    fn placement_payload_accepts_empty_shots() {
        let board = Board::random();
        let mut state = BoardState::from(&board);
        state.shots.clear();
        state.hits.clear();
        state.sunk_cells.clear();
        let restored = Board::try_from(state).expect("placement restores");
        assert!(restored.shots.is_empty());
        assert!(restored.ships.iter().all(|s| !s.is_sunk()));
    }
}
