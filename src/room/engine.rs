use super::EndReason;
use super::Phase;
use super::Room;
use crate::BOARD_SIZE;
use crate::Millis;
use crate::PlayerId;
use crate::board::Board;
use crate::board::Coord;
use crate::board::ShotOutcome;
use crate::board::validate_fleet;
use crate::protocol::BoardState;
use crate::protocol::Counters;
use crate::protocol::ErrorCode;
use crate::protocol::GameOver;
use crate::protocol::GameSnapshot;
use crate::protocol::OpponentSlotView;
use crate::protocol::OpponentView;
use crate::protocol::Outbox;
use crate::protocol::OwnSlotView;
use crate::protocol::ShotResult;
use crate::protocol::TurnUpdate;
use rand::Rng;

/// A refused operation: the stable code plus, for grace refusals, how
/// long the pause still runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection {
    pub code: ErrorCode,
    pub remaining_ms: Option<Millis>,
}

impl From<ErrorCode> for Rejection {
    fn from(code: ErrorCode) -> Self {
        Self {
            code,
            remaining_ms: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceOutcome {
    /// Fleet accepted, waiting on the other side.
    Waiting,
    /// Both fleets in, the game moved to playing.
    Started,
}

/// What a resolved shot did to the room.
#[derive(Debug, Clone)]
pub struct ShotRecord {
    pub outcome: ShotOutcome,
    pub marked: Vec<Coord>,
    pub over: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectOutcome {
    Ignored,
    Grace { deadline: Millis },
    Over,
}

/// Validates and installs a fleet. Both-ready flips the room to playing
/// with a uniformly random first turn.
pub fn place_ships(
    room: &mut Room,
    player: PlayerId,
    state: BoardState,
) -> Result<PlaceOutcome, Rejection> {
    if room.phase != Phase::Setup {
        return Err(ErrorCode::NotInSetup.into());
    }
    let index = room
        .index_of(player)
        .ok_or(Rejection::from(ErrorCode::General))?;
    if room.slots[index].ready {
        return Err(ErrorCode::AlreadyReady.into());
    }
    if state.width != BOARD_SIZE || state.height != BOARD_SIZE {
        return Err(ErrorCode::InvalidShipPlacement.into());
    }
    let board = Board::try_from(state).map_err(|_| ErrorCode::InvalidShipPlacement)?;
    validate_fleet(&board).map_err(|_| ErrorCode::InvalidShipPlacement)?;
    room.slots[index].board = board;
    room.slots[index].ready = true;
    room.last_activity = crate::now();
    if room.slots.iter().all(|s| s.ready) {
        room.phase = Phase::Playing;
        let ref mut rng = rand::rng();
        room.turn = room.slots[rng.random_range(0..2)].player;
        Ok(PlaceOutcome::Started)
    } else {
        Ok(PlaceOutcome::Waiting)
    }
}

/// Resolves a shot against the opponent board. A miss hands the turn
/// over; hits and sinks keep it; sinking the last ship ends the game.
pub fn shoot(room: &mut Room, player: PlayerId, coord: Coord) -> Result<ShotRecord, Rejection> {
    if room.phase != Phase::Playing {
        return Err(ErrorCode::NotInPlaying.into());
    }
    if room.turn != player {
        return Err(ErrorCode::NotYourTurn.into());
    }
    let index = room
        .index_of(player)
        .ok_or(Rejection::from(ErrorCode::General))?;
    let opponent = room.opponent_of(index);
    if let Some(grace_until) = room.slots[opponent].grace_until {
        return Err(Rejection {
            code: ErrorCode::ReconnectGrace,
            remaining_ms: Some(grace_until.saturating_sub(crate::now())),
        });
    }
    let outcome = room.slots[opponent].board.fire_shot(coord);
    match outcome {
        ShotOutcome::Invalid => return Err(ErrorCode::InvalidCoord.into()),
        ShotOutcome::AlreadyShot => return Err(ErrorCode::AlreadyShot.into()),
        _ => {}
    }
    room.slots[index].shots_fired += 1;
    room.last_activity = crate::now();
    room.last_mover = Some(player);
    let marked = match outcome {
        ShotOutcome::Sink(id) => room.slots[opponent].board.mark_around_sunk(id),
        _ => Vec::new(),
    };
    let over = room.slots[opponent].board.is_fleet_sunk();
    match (over, outcome) {
        (true, _) => finish(room, EndReason::FleetSunk, Some(player)),
        (false, ShotOutcome::Miss) => room.turn = room.slots[opponent].player,
        (false, _) => {}
    }
    Ok(ShotRecord {
        outcome,
        marked,
        over,
    })
}

/// Manual cancel: strictly stronger than a disconnect, ends the room at
/// once with no winner.
pub fn cancel(room: &mut Room, player: PlayerId) -> Result<(), Rejection> {
    if room.phase == Phase::Over {
        return Err(ErrorCode::General.into());
    }
    if room.index_of(player).is_none() {
        return Err(ErrorCode::General.into());
    }
    finish(room, EndReason::ManualCancel, None);
    Ok(())
}

/// Drops the slot's socket and opens the grace window. A PvP room with
/// both sides gone ends immediately.
pub fn disconnect(room: &mut Room, player: PlayerId, grace_ms: Millis) -> DisconnectOutcome {
    if room.phase == Phase::Over {
        return DisconnectOutcome::Ignored;
    }
    let Some(index) = room.index_of(player) else {
        return DisconnectOutcome::Ignored;
    };
    room.slots[index].outbox = None;
    let opponent = room.opponent_of(index);
    if !room.vs_bot && !room.slots[opponent].connected() {
        finish(room, EndReason::Disconnect, None);
        return DisconnectOutcome::Over;
    }
    let deadline = crate::now() + grace_ms;
    room.slots[index].grace_until = Some(deadline);
    DisconnectOutcome::Grace { deadline }
}

/// Rebinds a returning socket inside the grace window.
pub fn resume(
    room: &mut Room,
    player: PlayerId,
    token: &str,
    outbox: Outbox,
) -> Result<(), Rejection> {
    if room.phase == Phase::Over {
        return Err(ErrorCode::General.into());
    }
    let index = room
        .index_of(player)
        .ok_or(Rejection::from(ErrorCode::General))?;
    if room.slots[index].token.as_deref() != Some(token) {
        return Err(ErrorCode::ReconnectTokenExpired.into());
    }
    if room.slots[index].connected() {
        return Err(ErrorCode::ReconnectTokenInUse.into());
    }
    room.slots[index].outbox = Some(outbox);
    room.slots[index].grace_until = None;
    room.last_activity = crate::now();
    Ok(())
}

/// Forfeits players whose grace window lapsed. Returns true when the
/// room transitioned to over.
pub fn expire_grace(room: &mut Room, now: Millis) -> bool {
    if room.phase == Phase::Over {
        return false;
    }
    let lapsed: Vec<usize> = room
        .slots
        .iter()
        .enumerate()
        .filter(|(_, s)| s.grace_until.is_some_and(|at| at <= now) && !s.connected())
        .map(|(i, _)| i)
        .collect();
    match lapsed.as_slice() {
        [] => false,
        [index] => {
            let winner = room.slots[room.opponent_of(*index)].player;
            finish(room, EndReason::Disconnect, Some(winner));
            true
        }
        _ => {
            finish(room, EndReason::Disconnect, None);
            true
        }
    }
}

/// Forfeits the laggard after the inactivity window; the last player who
/// made a valid move takes the win. The clock pauses during grace.
pub fn expire_inactivity(room: &mut Room, now: Millis, inactivity_ms: Millis) -> bool {
    if room.phase != Phase::Playing || room.grace().is_some() {
        return false;
    }
    if now.saturating_sub(room.last_activity) < inactivity_ms {
        return false;
    }
    finish(room, EndReason::InactivityTimeout, room.last_mover);
    true
}

pub fn finish(room: &mut Room, reason: EndReason, winner: Option<PlayerId>) {
    room.phase = Phase::Over;
    room.reason = Some(reason);
    room.winner = winner;
    for slot in room.slots.iter_mut() {
        slot.grace_until = None;
    }
}

fn counters_for(room: &Room, viewer: usize) -> Counters {
    Counters {
        you: room.slots[viewer].shots_fired,
        opponent: room.slots[room.opponent_of(viewer)].shots_fired,
    }
}

/// Full per-recipient snapshot; the other side's board goes out masked.
pub fn snapshot_for(room: &Room, viewer: usize) -> GameSnapshot {
    let you = &room.slots[viewer];
    let other = &room.slots[room.opponent_of(viewer)];
    GameSnapshot {
        room_id: room.id,
        phase: room.phase,
        turn: (room.phase == Phase::Playing).then_some(room.turn),
        your_turn: room.phase == Phase::Playing && room.turn == you.player,
        vs_bot: room.vs_bot,
        you: OwnSlotView {
            id: you.player,
            nickname: you.nickname.clone(),
            ready: you.ready,
            board: BoardState::from(&you.board),
        },
        opponent: OpponentSlotView {
            id: other.player,
            nickname: other.nickname.clone(),
            ready: other.ready,
            connected: other.connected() || other.is_bot(),
            board: OpponentView::from(&other.board),
        },
        counters: counters_for(room, viewer),
        winner: room.winner,
    }
}

pub fn turn_event_for(room: &Room, viewer: usize) -> TurnUpdate {
    TurnUpdate {
        room_id: room.id,
        turn: room.turn,
        your_turn: room.turn == room.slots[viewer].player,
        phase: room.phase,
        counters: counters_for(room, viewer),
        game_over: (room.phase == Phase::Over).then_some(true),
        winner: room.winner,
    }
}

pub fn shot_event(room: &Room, shooter: PlayerId, coord: Coord, outcome: ShotOutcome) -> ShotResult {
    ShotResult {
        room_id: room.id,
        shooter,
        coord,
        outcome: outcome.code(),
        ship_id: outcome.ship(),
        game_over: (room.phase == Phase::Over).then_some(true),
    }
}

pub fn over_event_for(room: &Room, viewer: usize) -> GameOver {
    GameOver {
        room_id: room.id,
        winner: room.winner,
        phase: Phase::Over,
        counters: counters_for(room, viewer),
        total_shots: room.total_shots(),
        reason: room.reason.unwrap_or(EndReason::General).as_str(),
        message: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Arbitrary;
    use crate::queue::QueueEntry;
    use crate::room::BOT_ID;

    fn entry(player: PlayerId) -> QueueEntry {
        QueueEntry {
            player,
            nickname: format!("p{}", player),
            joined_at: crate::now(),
            token: format!("token-{}", player),
        }
    }

    fn pvp_room() -> Room {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let a = entry(1);
        let b = entry(2);
        let mut room = Room::pvp(7, (&a, Some(tx.clone())), (&b, Some(tx)));
        room.last_activity = crate::now();
        room
    }

    fn fleet() -> BoardState {
        BoardState::from(&Board::random())
    }

    fn playing_room() -> Room {
        let mut room = pvp_room();
        place_ships(&mut room, 1, fleet()).expect("p1 places");
        place_ships(&mut room, 2, fleet()).expect("p2 places");
        room
    }

    /// A cell of an afloat opponent ship, to force a hit.
    fn target_cell(room: &Room, shooter: PlayerId) -> Coord {
        let index = room.index_of(shooter).expect("shooter seated");
        let board = &room.slots[room.opponent_of(index)].board;
        board
            .ships
            .iter()
            .find(|s| !s.is_sunk())
            .map(|s| {
                *s.cells
                    .iter()
                    .find(|c| !board.hits.contains(c))
                    .expect("afloat ship has an unhit cell")
            })
            .expect("fleet afloat")
    }

    fn water_cell(room: &Room, shooter: PlayerId) -> Coord {
        let index = room.index_of(shooter).expect("shooter seated");
        let board = &room.slots[room.opponent_of(index)].board;
        (0..10)
            .flat_map(|r| (0..10).map(move |c| Coord::new(r, c)))
            .find(|c| board.ship_at(*c).is_none() && !board.shots.contains(c))
            .expect("some water left")
    }

    #[test]
    fn setup_flows_into_playing_with_one_turn_holder() {
        let mut room = pvp_room();
        assert!(place_ships(&mut room, 1, fleet()) == Ok(PlaceOutcome::Waiting));
        assert!(room.phase == Phase::Setup);
        assert!(place_ships(&mut room, 2, fleet()) == Ok(PlaceOutcome::Started));
        assert!(room.phase == Phase::Playing);
        assert!(room.turn == 1 || room.turn == 2);
    }

    #[test]
    fn placement_guards() {
        let mut room = pvp_room();
        let mut short = fleet();
        short.ships.pop();
        let rejected = place_ships(&mut room, 1, short).expect_err("fleet short one ship");
        assert!(rejected.code == ErrorCode::InvalidShipPlacement);
        let mut wrong = fleet();
        wrong.width = 8;
        let rejected = place_ships(&mut room, 1, wrong).expect_err("wrong dimensions");
        assert!(rejected.code == ErrorCode::InvalidShipPlacement);
        place_ships(&mut room, 1, fleet()).expect("valid fleet");
        let rejected = place_ships(&mut room, 1, fleet()).expect_err("second placement");
        assert!(rejected.code == ErrorCode::AlreadyReady);
        place_ships(&mut room, 2, fleet()).expect("valid fleet");
        let rejected = place_ships(&mut room, 2, fleet()).expect_err("game started");
        assert!(rejected.code == ErrorCode::NotInSetup);
    }

    #[test]
    fn shots_only_in_playing_and_on_turn() {
        let mut room = pvp_room();
        let rejected = shoot(&mut room, 1, Coord::new(0, 0)).expect_err("still setup");
        assert!(rejected.code == ErrorCode::NotInPlaying);
        let mut room = playing_room();
        let waiting = if room.turn == 1 { 2 } else { 1 };
        let rejected = shoot(&mut room, waiting, Coord::new(0, 0)).expect_err("not their turn");
        assert!(rejected.code == ErrorCode::NotYourTurn);
    }

    #[test]
    fn miss_flips_hit_keeps_the_turn() {
        let mut room = playing_room();
        let shooter = room.turn;
        let cell = target_cell(&room, shooter);
        let record = shoot(&mut room, shooter, cell).expect("hit");
        assert!(record.outcome.connects());
        assert!(room.turn == shooter);
        let cell = water_cell(&room, shooter);
        let record = shoot(&mut room, shooter, cell).expect("miss");
        assert!(record.outcome == ShotOutcome::Miss);
        assert!(room.turn != shooter);
        let counters = counters_for(&room, room.index_of(shooter).expect("seated"));
        assert!(counters.you == 2);
    }

    #[test]
    fn invalid_and_repeat_shots_change_nothing() {
        let mut room = playing_room();
        let shooter = room.turn;
        let rejected = shoot(&mut room, shooter, Coord::new(12, 0)).expect_err("off board");
        assert!(rejected.code == ErrorCode::InvalidCoord);
        let cell = water_cell(&room, shooter);
        shoot(&mut room, shooter, cell).expect("miss");
        let mut room2 = playing_room();
        let shooter2 = room2.turn;
        let cell2 = target_cell(&room2, shooter2);
        shoot(&mut room2, shooter2, cell2).expect("hit");
        let shots_before = room2.total_shots();
        let rejected = shoot(&mut room2, shooter2, cell2).expect_err("same cell twice");
        assert!(rejected.code == ErrorCode::AlreadyShot);
        assert!(room2.total_shots() == shots_before);
    }

    #[test]
    fn sinking_the_fleet_wins() {
        let mut room = playing_room();
        let shooter = room.turn;
        let index = room.index_of(shooter).expect("seated");
        let opponent = room.opponent_of(index);
        loop {
            let cell = {
                let board = &room.slots[opponent].board;
                match board
                    .ships
                    .iter()
                    .filter(|s| !s.is_sunk())
                    .flat_map(|s| s.cells.iter())
                    .find(|c| !board.hits.contains(c))
                {
                    Some(c) => *c,
                    None => break,
                }
            };
            let record = shoot(&mut room, shooter, cell).expect("turn never flips on hits");
            assert!(record.outcome.connects());
            if record.over {
                break;
            }
        }
        assert!(room.phase == Phase::Over);
        assert!(room.winner == Some(shooter));
        assert!(room.reason == Some(EndReason::FleetSunk));
        assert!(room.slots[opponent].board.is_fleet_sunk());
    }

    #[test]
    fn sink_marks_block_redundant_guesses() {
        let mut room = playing_room();
        let shooter = room.turn;
        let index = room.index_of(shooter).expect("seated");
        let opponent = room.opponent_of(index);
        let ship = room.slots[opponent]
            .board
            .ships
            .iter()
            .find(|s| s.masts == 2)
            .expect("standard fleet has destroyers")
            .clone();
        for cell in ship.cells.iter() {
            let record = shoot(&mut room, shooter, *cell).expect("hits");
            if record.outcome == ShotOutcome::Sink(ship.id) {
                assert!(!record.marked.is_empty());
                for marked in record.marked {
                    let rejected =
                        shoot(&mut room, shooter, marked).expect_err("halo already shot");
                    assert!(rejected.code == ErrorCode::AlreadyShot);
                }
            }
        }
    }

    #[test]
    fn cancel_ends_with_no_winner() {
        let mut room = playing_room();
        cancel(&mut room, 2).expect("cancel in playing");
        assert!(room.phase == Phase::Over);
        assert!(room.winner.is_none());
        assert!(room.reason == Some(EndReason::ManualCancel));
        assert!(cancel(&mut room, 1).is_err());
    }

    #[test]
    fn grace_pauses_shots_and_expiry_forfeits() {
        let mut room = playing_room();
        let shooter = room.turn;
        let other = if shooter == 1 { 2 } else { 1 };
        let outcome = disconnect(&mut room, other, 30_000);
        assert!(matches!(outcome, DisconnectOutcome::Grace { .. }));
        let rejected = shoot(&mut room, shooter, Coord::new(0, 0)).expect_err("grace running");
        assert!(rejected.code == ErrorCode::ReconnectGrace);
        assert!(rejected.remaining_ms.is_some_and(|ms| ms <= 30_000));
        // scenario: the player never returns
        assert!(!expire_grace(&mut room, crate::now()));
        assert!(expire_grace(&mut room, crate::now() + 31_000));
        assert!(room.phase == Phase::Over);
        assert!(room.winner == Some(shooter));
        assert!(room.reason == Some(EndReason::Disconnect));
    }

    #[test]
    fn resume_restores_turn_state() {
        let mut room = playing_room();
        let turn_before = room.turn;
        let other = if turn_before == 1 { 2 } else { 1 };
        disconnect(&mut room, other, 30_000);
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let rejected = resume(&mut room, other, "stale-token", tx.clone()).expect_err("bad token");
        assert!(rejected.code == ErrorCode::ReconnectTokenExpired);
        resume(&mut room, other, &format!("token-{}", other), tx.clone()).expect("token matches");
        assert!(room.grace().is_none());
        assert!(room.turn == turn_before);
        let rejected =
            resume(&mut room, other, &format!("token-{}", other), tx).expect_err("already bound");
        assert!(rejected.code == ErrorCode::ReconnectTokenInUse);
    }

    #[test]
    fn double_disconnect_destroys_pvp() {
        let mut room = playing_room();
        disconnect(&mut room, 1, 30_000);
        let outcome = disconnect(&mut room, 2, 30_000);
        assert!(outcome == DisconnectOutcome::Over);
        assert!(room.winner.is_none());
        assert!(room.reason == Some(EndReason::Disconnect));
    }

    #[test]
    fn inactivity_forfeits_the_laggard() {
        let mut room = playing_room();
        let shooter = room.turn;
        let cell = water_cell(&room, shooter);
        shoot(&mut room, shooter, cell).expect("miss");
        let now = room.last_activity;
        assert!(!expire_inactivity(&mut room, now + 119_000, 120_000));
        assert!(expire_inactivity(&mut room, now + 120_000, 120_000));
        assert!(room.winner == Some(shooter));
        assert!(room.reason == Some(EndReason::InactivityTimeout));
    }

    #[test]
    fn inactivity_clock_pauses_during_grace() {
        let mut room = playing_room();
        let other = if room.turn == 1 { 2 } else { 1 };
        disconnect(&mut room, other, 30_000);
        let now = room.last_activity;
        assert!(!expire_inactivity(&mut room, now + 500_000, 120_000));
    }

    #[test]
    fn snapshots_never_leak_afloat_ships() {
        let mut room = playing_room();
        let shooter = room.turn;
        for _ in 0..3 {
            let cell = target_cell(&room, shooter);
            shoot(&mut room, shooter, cell).expect("hit");
        }
        for viewer in 0..2 {
            let snapshot = snapshot_for(&room, viewer);
            let other = &room.slots[room.opponent_of(viewer)];
            for ship in other.board.ships.iter().filter(|s| !s.is_sunk()) {
                for cell in &ship.cells {
                    assert!(!snapshot.opponent.board.sunk_cells.contains(cell));
                }
            }
            assert!(snapshot.you.id == room.slots[viewer].player);
        }
    }

    #[test]
    fn exactly_one_player_holds_the_turn() {
        let mut room = playing_room();
        for _ in 0..20 {
            if room.phase != Phase::Playing {
                break;
            }
            let shooter = room.turn;
            let holders = [1, 2]
                .iter()
                .filter(|&&p| turn_event_for(&room, room.index_of(p).expect("seated")).your_turn)
                .count();
            assert!(holders == 1);
            let cell = water_cell(&room, shooter);
            shoot(&mut room, shooter, cell).expect("miss");
        }
    }

    #[test]
    fn solo_room_starts_when_the_human_places() {
        let mut room = Room::solo(9, &entry(5), None);
        assert!(room.slots[1].ready);
        assert!(room.slots[1].player == BOT_ID);
        assert!(place_ships(&mut room, 5, fleet()) == Ok(PlaceOutcome::Started));
        assert!(room.phase == Phase::Playing);
    }
}
