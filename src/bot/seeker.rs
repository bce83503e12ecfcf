use crate::HUNT_SAMPLE_ATTEMPTS;
use crate::board::Board;
use crate::board::Coord;
use crate::board::Orientation;
use crate::board::ShotOutcome;
use rand::Rng;
use rand::seq::IndexedRandom;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Idle,
    Target,
    Track,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum End {
    Forward,
    Backward,
}

/// Shot selector for the bot opponent. Hunts on a checkerboard until it
/// connects, collects neighbor candidates around isolated hits, and once
/// two hits line up, walks the line until the ship goes down.
///
/// The seeker never mutates a board; the room engine fires the shot and
/// feeds the outcome back through [`Seeker::register`].
#[derive(Debug)]
pub struct Seeker {
    mode: Mode,
    candidates: VecDeque<Coord>,
    pursuit: Vec<Coord>,
    line: Option<Orientation>,
    blocked_forward: bool,
    blocked_backward: bool,
    tried: Option<End>,
    parity: u8,
}

impl Default for Seeker {
    fn default() -> Self {
        Self::new()
    }
}

impl Seeker {
    pub fn new() -> Self {
        let ref mut rng = rand::rng();
        Self {
            mode: Mode::Idle,
            candidates: VecDeque::new(),
            pursuit: Vec::new(),
            line: None,
            blocked_forward: false,
            blocked_backward: false,
            tried: None,
            parity: rng.random_range(0..2),
        }
    }

    /// Picks the next cell to fire at, or None once the board offers no
    /// unfired cell.
    pub fn next_shot(&mut self, board: &Board) -> Option<Coord> {
        match self.mode {
            Mode::Track => self.track(board).or_else(|| {
                self.demote();
                self.target(board).or_else(|| self.hunt(board))
            }),
            Mode::Target => self.target(board).or_else(|| self.hunt(board)),
            Mode::Idle => self.hunt(board),
        }
    }

    /// Feeds back the outcome of the shot just fired (the board already
    /// reflects it). Misses block line endpoints, hits grow the pursuit,
    /// sinks reset the chase.
    pub fn register(&mut self, board: &Board, coord: Coord, outcome: ShotOutcome) {
        let tried = self.tried.take();
        match outcome {
            ShotOutcome::Miss => {
                if self.mode == Mode::Track {
                    match tried {
                        Some(End::Forward) => self.blocked_forward = true,
                        Some(End::Backward) => self.blocked_backward = true,
                        None => {}
                    }
                    if self.blocked_forward && self.blocked_backward {
                        self.demote();
                    }
                }
            }
            ShotOutcome::Hit(_) => {
                self.pursuit.push(coord);
                for neighbor in coord.neighbors4() {
                    if neighbor.in_bounds(board.width, board.height)
                        && !board.shots.contains(&neighbor)
                        && !self.candidates.contains(&neighbor)
                    {
                        self.candidates.push_back(neighbor);
                    }
                }
                self.infer_line();
                self.mode = match self.line {
                    Some(_) => Mode::Track,
                    None => Mode::Target,
                };
            }
            ShotOutcome::Sink(_) => {
                let parity = self.parity;
                *self = Self::new();
                self.parity = parity;
            }
            ShotOutcome::Invalid | ShotOutcome::AlreadyShot => {}
        }
    }

    fn infer_line(&mut self) {
        if self.pursuit.len() < 2 {
            return;
        }
        let first = self.pursuit[0];
        if self.pursuit.iter().all(|c| c.row == first.row) {
            self.line = Some(Orientation::H);
        } else if self.pursuit.iter().all(|c| c.col == first.col) {
            self.line = Some(Orientation::V);
        }
    }

    fn demote(&mut self) {
        self.mode = Mode::Target;
        self.line = None;
        self.blocked_forward = false;
        self.blocked_backward = false;
    }

    /// Extends the pursued line past one of its ends, chosen at random
    /// among the ends still open.
    fn track(&mut self, board: &Board) -> Option<Coord> {
        let line = self.line?;
        let forward = self.endpoint(line, End::Forward);
        let backward = self.endpoint(line, End::Backward);
        let open = |c: Coord, blocked: bool| {
            !blocked && c.in_bounds(board.width, board.height) && !board.shots.contains(&c)
        };
        let mut ends = Vec::new();
        if open(forward, self.blocked_forward) {
            ends.push((End::Forward, forward));
        }
        if open(backward, self.blocked_backward) {
            ends.push((End::Backward, backward));
        }
        let ref mut rng = rand::rng();
        ends.choose(rng).map(|&(end, coord)| {
            self.tried = Some(end);
            coord
        })
    }

    fn endpoint(&self, line: Orientation, end: End) -> Coord {
        let along = |c: &Coord| match line {
            Orientation::H => c.col,
            Orientation::V => c.row,
        };
        let anchor = match end {
            End::Forward => self.pursuit.iter().max_by_key(|c| along(c)),
            End::Backward => self.pursuit.iter().min_by_key(|c| along(c)),
        };
        let anchor = anchor.copied().unwrap_or(Coord::new(0, 0));
        let step = match end {
            End::Forward => 1,
            End::Backward => -1,
        };
        match line {
            Orientation::H => Coord::new(anchor.row, anchor.col + step),
            Orientation::V => Coord::new(anchor.row + step, anchor.col),
        }
    }

    /// Pops candidate neighbors of earlier hits, skipping fired cells.
    fn target(&mut self, board: &Board) -> Option<Coord> {
        while let Some(candidate) = self.candidates.pop_front() {
            if !board.shots.contains(&candidate) {
                return Some(candidate);
            }
        }
        self.mode = Mode::Idle;
        None
    }

    /// Random checkerboard sampling with a bounded attempt budget, then a
    /// deterministic parity scan, then any unfired cell at all.
    fn hunt(&self, board: &Board) -> Option<Coord> {
        let ref mut rng = rand::rng();
        for _ in 0..HUNT_SAMPLE_ATTEMPTS {
            let coord = Coord::new(
                rng.random_range(0..board.height),
                rng.random_range(0..board.width),
            );
            if coord.parity(self.parity) && !board.shots.contains(&coord) {
                return Some(coord);
            }
        }
        self.scan(board, true).or_else(|| self.scan(board, false))
    }

    fn scan(&self, board: &Board, parity_only: bool) -> Option<Coord> {
        (0..board.height)
            .flat_map(|row| (0..board.width).map(move |col| Coord::new(row, col)))
            .filter(|c| !parity_only || c.parity(self.parity))
            .find(|c| !board.shots.contains(c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Arbitrary;
    use crate::board::Ship;

    #[test]
    fn hunt_respects_parity() {
        let board = Board::standard();
        let mut seeker = Seeker::new();
        for _ in 0..50 {
            let shot = seeker.next_shot(&board).expect("fresh board has cells");
            assert!(shot.parity(seeker.parity));
            assert!(shot.on_board());
        }
    }

    #[test]
    fn first_hit_moves_to_neighbors() {
        let mut board = Board::standard();
        board
            .place_ship(Ship::new(1, 3, Orientation::H, Coord::new(5, 4)))
            .expect("fits");
        let mut seeker = Seeker::new();
        let hit = Coord::new(5, 5);
        let outcome = board.fire_shot(hit);
        seeker.register(&board, hit, outcome);
        let next = seeker.next_shot(&board).expect("candidates queued");
        assert!(hit.neighbors4().contains(&next));
    }

    #[test]
    fn two_hits_line_up_and_extend() {
        let mut board = Board::standard();
        board
            .place_ship(Ship::new(1, 4, Orientation::H, Coord::new(5, 3)))
            .expect("fits");
        let mut seeker = Seeker::new();
        for col in [4, 5] {
            let coord = Coord::new(5, col);
            let outcome = board.fire_shot(coord);
            seeker.register(&board, coord, outcome);
        }
        for _ in 0..10 {
            let shot = seeker.next_shot(&board).expect("line has open ends");
            assert!(shot == Coord::new(5, 3) || shot == Coord::new(5, 6));
        }
    }

    #[test]
    fn blocked_end_forces_the_other() {
        let mut board = Board::standard();
        board
            .place_ship(Ship::new(1, 3, Orientation::V, Coord::new(2, 5)))
            .expect("fits");
        let mut seeker = Seeker::new();
        for row in [2, 3] {
            let coord = Coord::new(row, 5);
            let outcome = board.fire_shot(coord);
            seeker.register(&board, coord, outcome);
        }
        // miss above the ship blocks the backward end
        let miss = Coord::new(1, 5);
        loop {
            let shot = seeker.next_shot(&board).expect("open ends remain");
            let outcome = board.fire_shot(shot);
            seeker.register(&board, shot, outcome);
            if shot == miss {
                break;
            }
            if board.ship(1).expect("placed").is_sunk() {
                return;
            }
        }
        let shot = seeker.next_shot(&board).expect("forward end open");
        assert!(shot == Coord::new(4, 5));
    }

    #[test]
    fn sink_resets_to_hunt() {
        let mut board = Board::standard();
        board
            .place_ship(Ship::new(1, 1, Orientation::H, Coord::new(0, 0)))
            .expect("fits");
        let mut seeker = Seeker::new();
        let coord = Coord::new(0, 0);
        let outcome = board.fire_shot(coord);
        seeker.register(&board, coord, outcome);
        assert!(seeker.mode == Mode::Idle);
        assert!(seeker.candidates.is_empty());
        assert!(seeker.pursuit.is_empty());
    }

    #[test]
    fn seeker_always_sinks_a_random_fleet() {
        for _ in 0..10 {
            let mut board = Board::random();
            let mut seeker = Seeker::new();
            let mut shots = 0;
            while !board.is_fleet_sunk() {
                let coord = seeker.next_shot(&board).expect("fleet still afloat");
                let outcome = board.fire_shot(coord);
                assert!(outcome != ShotOutcome::AlreadyShot);
                assert!(outcome != ShotOutcome::Invalid);
                seeker.register(&board, coord, outcome);
                shots += 1;
                assert!(shots <= 100);
            }
        }
    }

    #[test]
    fn exhausted_board_returns_none() {
        let mut board = Board::standard();
        for row in 0..10 {
            for col in 0..10 {
                board.shots.insert(Coord::new(row, col));
            }
        }
        let mut seeker = Seeker::new();
        assert!(seeker.next_shot(&board).is_none());
    }
}
