use rand::{rngs::StdRng, SeedableRng};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::domain::{Play, Role, Session};
use crate::models::{ClientAction, ServerEvent};
use crate::shared::{COMMAND_BUFFER, LOBBY_CAPACITY};

/// Queue feeding one connection's socket writer. Bounded by
/// `OUTBOUND_BUFFER`; a seat that lets it fill up closes the lobby.
pub type Outbound = mpsc::Sender<ServerEvent>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinTicket {
    pub connection: Uuid,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinRejected {
    Full,
}

#[derive(Debug)]
pub enum LobbyCommand {
    Join {
        outbound: Outbound,
        reply: oneshot::Sender<Result<JoinTicket, JoinRejected>>,
    },
    Action {
        connection: Uuid,
        action: ClientAction,
    },
    Disconnect {
        connection: Uuid,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LobbyPhase {
    Empty,
    Waiting,
    Full,
}

#[derive(Debug)]
struct Seat {
    connection: Uuid,
    role: Role,
    outbound: Outbound,
}

/// Owns the two seats and the session they share.
///
/// Every command is handled to completion before the next one is read, so
/// plays and slaps from the two sockets never interleave.
#[derive(Debug)]
pub struct Lobby {
    seats: Vec<Seat>,
    session: Option<Session>,
    rng: StdRng,
    /// Set when a seat's outbound queue overflowed during the current command.
    lagging: bool,
}

impl Default for Lobby {
    fn default() -> Self {
        Self::new()
    }
}

impl Lobby {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn with_rng(rng: StdRng) -> Self {
        Self {
            seats: Vec::with_capacity(LOBBY_CAPACITY),
            session: None,
            rng,
            lagging: false,
        }
    }

    /// Spawns the lobby actor and returns its command queue.
    pub fn start() -> mpsc::Sender<LobbyCommand> {
        let (tx_cmd, rx_cmd) = mpsc::channel::<LobbyCommand>(COMMAND_BUFFER);
        let lobby = Lobby::new();
        tokio::spawn(lobby.run(rx_cmd));
        tx_cmd
    }

    async fn run(mut self, mut rx: mpsc::Receiver<LobbyCommand>) {
        while let Some(cmd) = rx.recv().await {
            self.handle(cmd);
        }
        tracing::info!("lobby actor exiting (command channel closed)");
    }

    pub fn handle(&mut self, cmd: LobbyCommand) {
        match cmd {
            LobbyCommand::Join { outbound, reply } => {
                let res = self.join(outbound);
                let _ = reply.send(res);
            }
            LobbyCommand::Action { connection, action } => {
                self.apply(connection, action);
            }
            LobbyCommand::Disconnect { connection } => {
                self.leave(connection);
            }
        }

        if self.lagging {
            tracing::warn!("outbound queue full, closing lobby");
            self.close();
        }
    }

    pub fn phase(&self) -> LobbyPhase {
        match self.seats.len() {
            0 => LobbyPhase::Empty,
            n if n < LOBBY_CAPACITY => LobbyPhase::Waiting,
            _ => LobbyPhase::Full,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    fn join(&mut self, outbound: Outbound) -> Result<JoinTicket, JoinRejected> {
        if self.seats.len() >= LOBBY_CAPACITY {
            tracing::info!("lobby full, rejecting connection");
            return Err(JoinRejected::Full);
        }

        let role = if self.seats.is_empty() { Role::First } else { Role::Second };
        let connection = Uuid::new_v4();
        self.seats.push(Seat { connection, role, outbound });
        tracing::info!(%connection, ?role, "player joined lobby");

        if self.seats.len() == LOBBY_CAPACITY {
            self.session = Some(Session::new(&mut self.rng));
            tracing::info!("lobby full, dealing new session");
            self.broadcast_status();
        }

        Ok(JoinTicket { connection, role })
    }

    fn apply(&mut self, connection: Uuid, action: ClientAction) {
        let Some(role) = self.role_of(connection) else {
            tracing::debug!(%connection, ?action, "action from connection outside lobby");
            return;
        };
        let Some(session) = self.session.as_mut() else {
            tracing::debug!(?role, ?action, "no session yet, ignoring action");
            return;
        };

        let battle_before = session.battle();
        let mut events = Vec::new();

        match action {
            ClientAction::Restart => {
                session.reset(&mut self.rng);
                tracing::info!(?role, "session restarted");
                if battle_before.is_some() {
                    events.push(ServerEvent::BattleEnd);
                }
            }
            ClientAction::Pile => {
                if session.turn() != role {
                    tracing::debug!(?role, "out of turn play dropped");
                } else {
                    let play = session.play_card(role);
                    if let Play::PileAwarded(winner) = play {
                        tracing::info!(?winner, "battle won");
                    }
                    events.extend(battle_event(play));
                }
            }
            ClientAction::Slap => {
                let result = session.slap(role);
                tracing::info!(?role, ?result, "slap");
                events.push(ServerEvent::SlapResult { result });
                if battle_before.is_some() && session.battle().is_none() {
                    events.push(ServerEvent::BattleEnd);
                }
            }
        }

        for event in &events {
            self.broadcast(event);
        }
        self.broadcast_status();
    }

    fn leave(&mut self, connection: Uuid) {
        if self.role_of(connection).is_none() {
            return;
        }
        tracing::info!(%connection, "player left, closing lobby");
        self.close();
    }

    fn close(&mut self) {
        // dropping the outbound senders ends every writer, which closes the sockets
        self.seats.clear();
        self.session = None;
        self.lagging = false;
    }

    fn role_of(&self, connection: Uuid) -> Option<Role> {
        self.seats
            .iter()
            .find(|seat| seat.connection == connection)
            .map(|seat| seat.role)
    }

    fn broadcast(&mut self, event: &ServerEvent) {
        for seat in &self.seats {
            self.lagging |= !deliver(seat, event.clone());
        }
    }

    fn broadcast_status(&mut self) {
        let Some(session) = &self.session else {
            return;
        };
        for seat in &self.seats {
            let status = session.status_for(seat.role);
            self.lagging |= !deliver(seat, ServerEvent::State(status));
        }
    }
}

fn battle_event(play: Play) -> Option<ServerEvent> {
    match play {
        Play::BattleStarted(battle) => Some(ServerEvent::BattleStart {
            face_card: battle.face,
            cards_to_play: battle.remaining,
        }),
        Play::BattleContinued(battle) => Some(ServerEvent::BattleContinue {
            cards_remaining: battle.remaining,
        }),
        Play::PileAwarded(_) => Some(ServerEvent::BattleEnd),
        Play::Placed | Play::Ignored => None,
    }
}

/// Queues `event` for `seat`. Returns false only when the queue is full; a
/// closed queue means the connection is already leaving.
fn deliver(seat: &Seat, event: ServerEvent) -> bool {
    match seat.outbound.try_send(event) {
        Ok(()) | Err(TrySendError::Closed(_)) => true,
        Err(TrySendError::Full(_)) => {
            tracing::warn!(
                connection = %seat.connection,
                role = ?seat.role,
                "outbound queue full"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc::error::TryRecvError;
    use tokio::sync::mpsc::Receiver;

    use super::*;
    use crate::domain::{GameStatus, Perspective, Rank, SlapOutcome};
    use crate::shared::{DECK_SIZE, HAND_SIZE, OUTBOUND_BUFFER};

    fn lobby() -> Lobby {
        Lobby::with_rng(StdRng::seed_from_u64(42))
    }

    type Joined = (Result<JoinTicket, JoinRejected>, Receiver<ServerEvent>);

    fn join(lobby: &mut Lobby) -> Joined {
        join_with_buffer(lobby, OUTBOUND_BUFFER)
    }

    fn join_with_buffer(lobby: &mut Lobby, buffer: usize) -> Joined {
        let (outbound, rx) = mpsc::channel(buffer);
        let (reply, mut reply_rx) = oneshot::channel();
        lobby.handle(LobbyCommand::Join { outbound, reply });
        (reply_rx.try_recv().unwrap(), rx)
    }

    fn act(lobby: &mut Lobby, ticket: JoinTicket, action: ClientAction) {
        lobby.handle(LobbyCommand::Action {
            connection: ticket.connection,
            action,
        });
    }

    fn drain(rx: &mut Receiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn last_status(rx: &mut Receiver<ServerEvent>) -> GameStatus {
        drain(rx)
            .into_iter()
            .rev()
            .find_map(|event| match event {
                ServerEvent::State(status) => Some(status),
                _ => None,
            })
            .expect("a state event")
    }

    struct Table {
        lobby: Lobby,
        first: JoinTicket,
        second: JoinTicket,
        first_rx: Receiver<ServerEvent>,
        second_rx: Receiver<ServerEvent>,
    }

    fn full_table() -> Table {
        let mut lobby = lobby();
        let (first, first_rx) = join(&mut lobby);
        let (second, second_rx) = join(&mut lobby);
        Table {
            lobby,
            first: first.unwrap(),
            second: second.unwrap(),
            first_rx,
            second_rx,
        }
    }

    #[test]
    fn roles_follow_arrival_order() {
        let mut lobby = lobby();
        assert_eq!(lobby.phase(), LobbyPhase::Empty);

        let (first, mut first_rx) = join(&mut lobby);
        assert_eq!(first.unwrap().role, Role::First);
        assert_eq!(lobby.phase(), LobbyPhase::Waiting);
        assert!(drain(&mut first_rx).is_empty());
        assert!(lobby.session().is_none());

        let (second, mut second_rx) = join(&mut lobby);
        assert_eq!(second.unwrap().role, Role::Second);
        assert_eq!(lobby.phase(), LobbyPhase::Full);

        let first_status = last_status(&mut first_rx);
        let second_status = last_status(&mut second_rx);
        assert_eq!(first_status.turn, Perspective::Own);
        assert_eq!(second_status.turn, Perspective::Opponent);
        assert_eq!((first_status.self_hand, first_status.op_hand), (HAND_SIZE, HAND_SIZE));
        assert!(first_status.pile.is_empty());
    }

    #[test]
    fn third_connection_is_rejected_without_touching_game() {
        let mut table = full_table();
        act(&mut table.lobby, table.first, ClientAction::Pile);
        drain(&mut table.first_rx);
        drain(&mut table.second_rx);

        let (third, mut third_rx) = join(&mut table.lobby);

        assert_eq!(third, Err(JoinRejected::Full));
        assert!(drain(&mut third_rx).is_empty());
        assert!(drain(&mut table.first_rx).is_empty());
        let session = table.lobby.session().unwrap();
        assert_eq!(session.pile().len(), 1);
        assert_eq!(session.hand_size(Role::First), HAND_SIZE - 1);
        assert_eq!(session.total_cards(), DECK_SIZE);
    }

    #[test]
    fn out_of_turn_play_is_dropped_but_status_sent() {
        let mut table = full_table();
        drain(&mut table.first_rx);
        drain(&mut table.second_rx);

        act(&mut table.lobby, table.second, ClientAction::Pile);

        let first = last_status(&mut table.first_rx);
        let second = last_status(&mut table.second_rx);
        assert!(first.pile.is_empty());
        assert_eq!(first.turn, Perspective::Own);
        assert_eq!(second.self_hand, HAND_SIZE);
    }

    #[test]
    fn play_in_turn_updates_both_views() {
        let mut table = full_table();
        drain(&mut table.first_rx);
        drain(&mut table.second_rx);

        act(&mut table.lobby, table.first, ClientAction::Pile);

        let first = last_status(&mut table.first_rx);
        let second = last_status(&mut table.second_rx);
        assert_eq!(first.pile.len(), 1);
        assert_eq!(first.pile, second.pile);
        assert_eq!(first.self_hand, HAND_SIZE - 1);
        assert_eq!(second.op_hand, HAND_SIZE - 1);
        // jack/queen/king/ace also hand the turn over, so second is up either way
        assert_eq!(second.turn, Perspective::Own);
    }

    #[test]
    fn slap_sends_shared_result_then_status() {
        let mut table = full_table();
        table.lobby.session = Some(Session::from_parts(
            &["2_of_hearts"],
            &["5_of_clubs"],
            &["9_of_hearts", "9_of_spades"],
            Role::First,
        ));
        drain(&mut table.first_rx);
        drain(&mut table.second_rx);

        act(&mut table.lobby, table.second, ClientAction::Slap);

        let expected = ServerEvent::SlapResult { result: SlapOutcome::Correct };
        let first = drain(&mut table.first_rx);
        let second = drain(&mut table.second_rx);
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
        assert_eq!(first[0], expected);
        assert_eq!(second[0], expected);

        let ServerEvent::State(status) = &second[1] else {
            panic!("expected state after slap result");
        };
        assert_eq!(status.self_hand, 3);
        assert!(status.pile.is_empty());
    }

    #[test]
    fn battle_progress_is_announced() {
        let mut table = full_table();
        table.lobby.session = Some(Session::from_parts(
            &["queen_of_hearts", "5_of_clubs"],
            &["2_of_hearts", "3_of_clubs", "4_of_spades", "6_of_diamonds"],
            &[],
            Role::First,
        ));
        drain(&mut table.first_rx);
        drain(&mut table.second_rx);

        act(&mut table.lobby, table.first, ClientAction::Pile);
        let events = drain(&mut table.second_rx);
        assert_eq!(
            events[0],
            ServerEvent::BattleStart {
                face_card: Rank::Queen,
                cards_to_play: 2,
            }
        );
        assert!(matches!(events[1], ServerEvent::State(_)));
        assert_eq!(drain(&mut table.first_rx)[0], events[0]);

        act(&mut table.lobby, table.second, ClientAction::Pile);
        assert_eq!(
            drain(&mut table.first_rx)[0],
            ServerEvent::BattleContinue { cards_remaining: 1 }
        );
        act(&mut table.lobby, table.second, ClientAction::Pile);
        assert_eq!(
            drain(&mut table.first_rx)[0],
            ServerEvent::BattleContinue { cards_remaining: 0 }
        );

        act(&mut table.lobby, table.second, ClientAction::Pile);
        let events = drain(&mut table.first_rx);
        assert_eq!(events[0], ServerEvent::BattleEnd);
        let ServerEvent::State(status) = &events[1] else {
            panic!("expected state after battle end");
        };
        assert_eq!(status.self_hand, 5);
        assert_eq!(status.battle, None);

        let announced: Vec<_> = drain(&mut table.second_rx)
            .into_iter()
            .filter(|event| !matches!(event, ServerEvent::State(_)))
            .collect();
        assert_eq!(
            announced,
            [
                ServerEvent::BattleContinue { cards_remaining: 1 },
                ServerEvent::BattleContinue { cards_remaining: 0 },
                ServerEvent::BattleEnd,
            ]
        );
    }

    #[test]
    fn ordinary_play_sends_only_state() {
        let mut table = full_table();
        table.lobby.session = Some(Session::from_parts(
            &["5_of_clubs"],
            &["6_of_clubs"],
            &[],
            Role::First,
        ));
        drain(&mut table.first_rx);
        drain(&mut table.second_rx);

        act(&mut table.lobby, table.first, ClientAction::Pile);

        let events = drain(&mut table.first_rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ServerEvent::State(_)));
    }

    #[test]
    fn good_slap_during_battle_ends_it() {
        let mut table = full_table();
        table.lobby.session = Some(Session::from_parts(
            &["king_of_hearts"],
            &["3_of_clubs", "3_of_spades"],
            &[],
            Role::First,
        ));
        act(&mut table.lobby, table.first, ClientAction::Pile);
        act(&mut table.lobby, table.second, ClientAction::Pile);
        act(&mut table.lobby, table.second, ClientAction::Pile);
        drain(&mut table.first_rx);
        drain(&mut table.second_rx);

        act(&mut table.lobby, table.first, ClientAction::Slap);

        let events = drain(&mut table.second_rx);
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], ServerEvent::SlapResult { result: SlapOutcome::Correct });
        assert_eq!(events[1], ServerEvent::BattleEnd);
        assert!(matches!(events[2], ServerEvent::State(_)));
    }

    #[test]
    fn stalled_reader_closes_lobby() {
        let mut lobby = lobby();
        let (first, mut first_rx) = join(&mut lobby);
        // the initial deal fills this seat's one-slot queue
        let (_second, mut second_rx) = join_with_buffer(&mut lobby, 1);
        let first = first.unwrap();
        drain(&mut first_rx);

        act(&mut lobby, first, ClientAction::Pile);

        assert_eq!(lobby.phase(), LobbyPhase::Empty);
        assert!(lobby.session().is_none());
        drain(&mut first_rx);
        assert_eq!(first_rx.try_recv(), Err(TryRecvError::Disconnected));
        assert_eq!(drain(&mut second_rx).len(), 1);
        assert_eq!(second_rx.try_recv(), Err(TryRecvError::Disconnected));
    }

    #[test]
    fn bad_slap_on_empty_pile_costs_a_card() {
        let mut table = full_table();
        drain(&mut table.first_rx);
        drain(&mut table.second_rx);

        act(&mut table.lobby, table.second, ClientAction::Slap);

        let events = drain(&mut table.first_rx);
        assert_eq!(events[0], ServerEvent::SlapResult { result: SlapOutcome::Incorrect });
        let status = last_status(&mut table.second_rx);
        assert_eq!(status.self_hand, HAND_SIZE - 1);
        assert_eq!(status.pile.len(), 1);
    }

    #[test]
    fn restart_deals_fresh_session() {
        let mut table = full_table();
        act(&mut table.lobby, table.first, ClientAction::Pile);
        act(&mut table.lobby, table.second, ClientAction::Slap);
        drain(&mut table.first_rx);
        drain(&mut table.second_rx);

        act(&mut table.lobby, table.second, ClientAction::Restart);

        let first = last_status(&mut table.first_rx);
        let second = last_status(&mut table.second_rx);
        assert_eq!((first.self_hand, first.op_hand), (HAND_SIZE, HAND_SIZE));
        assert!(second.pile.is_empty());
        assert_eq!(first.turn, Perspective::Own);
        assert_eq!(second.battle, None);
    }

    #[test]
    fn actions_while_waiting_are_ignored() {
        let mut lobby = lobby();
        let (first, mut first_rx) = join(&mut lobby);
        let first = first.unwrap();

        act(&mut lobby, first, ClientAction::Pile);
        act(&mut lobby, first, ClientAction::Restart);

        assert!(drain(&mut first_rx).is_empty());
        assert!(lobby.session().is_none());
    }

    #[test]
    fn disconnect_tears_down_lobby() {
        let mut table = full_table();
        drain(&mut table.second_rx);

        table.lobby.handle(LobbyCommand::Disconnect {
            connection: table.first.connection,
        });

        assert_eq!(table.lobby.phase(), LobbyPhase::Empty);
        assert!(table.lobby.session().is_none());
        assert_eq!(table.second_rx.try_recv(), Err(TryRecvError::Disconnected));

        // stale ids from the old lobby have no effect on the next one
        let (next, mut next_rx) = join(&mut table.lobby);
        assert_eq!(next.unwrap().role, Role::First);
        act(&mut table.lobby, table.second, ClientAction::Pile);
        table.lobby.handle(LobbyCommand::Disconnect {
            connection: table.second.connection,
        });
        assert!(drain(&mut next_rx).is_empty());
        assert_eq!(table.lobby.phase(), LobbyPhase::Waiting);
    }

    #[test]
    fn waiting_player_can_leave() {
        let mut lobby = lobby();
        let (first, _rx) = join(&mut lobby);

        lobby.handle(LobbyCommand::Disconnect {
            connection: first.unwrap().connection,
        });

        assert_eq!(lobby.phase(), LobbyPhase::Empty);
    }
}
