//! The dispatcher maps decoded [GameEvent]s onto idempotent record mutations.

use crate::{
    events::GameEvent,
    resolution::apply_chain_settlement,
    store::RecordRepository,
    types::{canonical, participant, Notification, NotificationKind},
};

/// Applies `event` to the record it refers to.
///
/// Every mutation is idempotent: replaying an event leaves an already-consistent record
/// unchanged, and timestamps are only set the first time.
///
/// ### Takes
/// - `records`: The repository, already behind the gate.
/// - `event`: The decoded event.
/// - `at`: The observation timestamp used for first-time timestamps.
///
/// ### Returns
/// - `Some(Notification)`: The event was applied (or re-applied) to a record.
/// - `None`: The event kind is not tracked.
pub fn dispatch(records: &mut dyn RecordRepository, event: &GameEvent, at: u64) -> Option<Notification> {
    let game_id = event.game_id()?;

    let kind = match event {
        GameEvent::Created {
            player1,
            stake_token,
            stake_amount,
            ..
        } => {
            let record = records.get_or_create(game_id);
            record.player1 = Some(canonical(player1));
            record.stake_token = Some(canonical(stake_token));
            record.stake_amount = stake_amount.to_string();
            record.created_at.get_or_insert(at);
            NotificationKind::GameCreated
        }
        GameEvent::Joined { player2, .. } => {
            let record = records.get_or_create(game_id);
            record.player2 = Some(canonical(player2));
            record.player2_joined_at.get_or_insert(at);
            NotificationKind::PlayerJoined
        }
        GameEvent::Cancelled { .. } => {
            let record = records.get_or_create(game_id);
            record.cancelled = true;
            record.cancelled_at.get_or_insert(at);
            NotificationKind::GameCancelled
        }
        GameEvent::Settled { winner, .. } => {
            let record = records.get_or_create(game_id);
            apply_chain_settlement(record, participant(winner), at);
            NotificationKind::GameSettled
        }
        GameEvent::Unknown { topic } => {
            tracing::debug!(target: "dispatcher", "Ignoring untracked event {:?}", topic);
            return None;
        }
    };

    tracing::debug!(target: "dispatcher", "Applied {:?} to game {}", kind, game_id);
    Some(Notification {
        kind,
        game_id,
        args: event.args(),
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{store::MemoryRecordStore, types::GameState};
    use ethers::types::{Address, U256};

    fn created(id: u64) -> GameEvent {
        GameEvent::Created {
            game_id: id,
            player1: Address::from_low_u64_be(0xaa),
            stake_token: Address::from_low_u64_be(0x70),
            stake_amount: U256::from_dec_str("1000000000000000000").unwrap(),
        }
    }

    fn joined(id: u64) -> GameEvent {
        GameEvent::Joined {
            game_id: id,
            player2: Address::from_low_u64_be(0xbb),
        }
    }

    #[test]
    fn replaying_events_is_idempotent() {
        let events = [
            created(4),
            joined(4),
            GameEvent::Settled {
                game_id: 4,
                winner: Address::from_low_u64_be(0xbb),
            },
        ];

        let mut once = MemoryRecordStore::default();
        for event in &events {
            dispatch(&mut once, event, 100);
        }

        let mut twice = MemoryRecordStore::default();
        for event in events.iter().chain(events.iter()) {
            dispatch(&mut twice, event, 200);
        }
        // Replays at a later time keep the first-seen timestamps.
        for event in &events {
            dispatch(&mut twice, event, 300);
        }

        let mut first = once.get(4).unwrap().clone();
        let second = twice.get(4).unwrap();
        assert_eq!(twice.list_all().len(), 1);
        assert_eq!(first.created_at, Some(100));
        assert_eq!(second.created_at, Some(200));
        first.created_at = second.created_at;
        first.player2_joined_at = second.player2_joined_at;
        first.settled_at = second.settled_at;
        assert_eq!(&first, second);
        assert_eq!(second.state(), GameState::Settled);
        assert_eq!(
            second.winner.as_deref(),
            Some("0x00000000000000000000000000000000000000bb")
        );
        assert!(second.is_consistent());
    }

    #[test]
    fn join_before_create_still_converges() {
        let mut store = MemoryRecordStore::default();
        dispatch(&mut store, &joined(1), 10);
        dispatch(&mut store, &created(1), 11);

        let record = store.get(1).unwrap();
        assert!(record.player1.is_some() && record.player2.is_some());
        assert_eq!(record.stake_amount, "1000000000000000000");
        assert_eq!(record.state(), GameState::AwaitingReveals);
    }

    #[test]
    fn cancel_and_unknown_events() {
        let mut store = MemoryRecordStore::default();
        dispatch(&mut store, &created(2), 10);
        let notification = dispatch(&mut store, &GameEvent::Cancelled { game_id: 2 }, 12).unwrap();
        assert_eq!(notification.kind, NotificationKind::GameCancelled);
        assert_eq!(store.get(2).unwrap().state(), GameState::Cancelled);
        assert_eq!(store.get(2).unwrap().cancelled_at, Some(12));

        assert!(dispatch(&mut store, &GameEvent::Unknown { topic: None }, 13).is_none());
        assert_eq!(store.list_all().len(), 1);
    }
}
