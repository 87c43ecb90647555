//! The events module decodes raw ledger logs into named, typed events, once, at the ledger
//! boundary.

use crate::bindings::{GameCancelledFilter, GameCreatedFilter, GameSettledFilter, PlayerJoinedFilter};
use anyhow::{anyhow, Result};
use ethers::{
    abi::{self, ParamType},
    contract::EthEvent,
    types::{Address, Log, H256, U256},
};
use serde_json::json;

/// The signature of the ERC-721 `Transfer` event.
pub const TRANSFER_SIGNATURE: &str = "Transfer(address,address,uint256)";

/// A decoded game contract event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    Created {
        game_id: u64,
        player1: Address,
        stake_token: Address,
        stake_amount: U256,
    },
    Joined {
        game_id: u64,
        player2: Address,
    },
    Cancelled {
        game_id: u64,
    },
    Settled {
        game_id: u64,
        winner: Address,
    },
    /// A log the mirror does not track. Dispatch ignores it.
    Unknown { topic: Option<H256> },
}

impl GameEvent {
    /// Decodes a raw game contract [Log].
    ///
    /// ### Returns
    /// - `Ok(GameEvent)`: The decoded event, [GameEvent::Unknown] for untracked signatures.
    /// - `Err(anyhow::Error)`: A tracked signature with malformed topics or data.
    pub fn decode(log: &Log) -> Result<Self> {
        let Some(signature) = log.topics.first().copied() else {
            return Ok(GameEvent::Unknown { topic: None });
        };

        let event = if signature == GameCreatedFilter::signature() {
            let data = abi::decode(&[ParamType::Address, ParamType::Uint(256)], &log.data)?;
            let mut data = data.into_iter();
            GameEvent::Created {
                game_id: topic_u64(log, 1)?,
                player1: topic_address(log, 2)?,
                stake_token: data
                    .next()
                    .and_then(|t| t.into_address())
                    .ok_or(anyhow!("`stakeToken` missing from `GameCreated` data"))?,
                stake_amount: data
                    .next()
                    .and_then(|t| t.into_uint())
                    .ok_or(anyhow!("`stakeAmount` missing from `GameCreated` data"))?,
            }
        } else if signature == PlayerJoinedFilter::signature() {
            GameEvent::Joined {
                game_id: topic_u64(log, 1)?,
                player2: topic_address(log, 2)?,
            }
        } else if signature == GameCancelledFilter::signature() {
            GameEvent::Cancelled {
                game_id: topic_u64(log, 1)?,
            }
        } else if signature == GameSettledFilter::signature() {
            let winner = abi::decode(&[ParamType::Address], &log.data)?
                .pop()
                .and_then(|t| t.into_address())
                .ok_or(anyhow!("`winner` missing from `GameSettled` data"))?;
            GameEvent::Settled {
                game_id: topic_u64(log, 1)?,
                winner,
            }
        } else {
            GameEvent::Unknown {
                topic: Some(signature),
            }
        };

        Ok(event)
    }

    /// The game the event refers to, if it is a tracked event.
    pub fn game_id(&self) -> Option<u64> {
        match self {
            GameEvent::Created { game_id, .. }
            | GameEvent::Joined { game_id, .. }
            | GameEvent::Cancelled { game_id }
            | GameEvent::Settled { game_id, .. } => Some(*game_id),
            GameEvent::Unknown { .. } => None,
        }
    }

    /// The event arguments as published to notification listeners.
    pub fn args(&self) -> serde_json::Value {
        match self {
            GameEvent::Created {
                player1,
                stake_token,
                stake_amount,
                ..
            } => json!({
                "player1": crate::types::canonical(player1),
                "stakeToken": crate::types::canonical(stake_token),
                "stakeAmount": stake_amount.to_string(),
            }),
            GameEvent::Joined { player2, .. } => {
                json!({ "player2": crate::types::canonical(player2) })
            }
            GameEvent::Settled { winner, .. } => {
                json!({ "winner": crate::types::participant(winner) })
            }
            GameEvent::Cancelled { .. } | GameEvent::Unknown { .. } => json!({}),
        }
    }
}

/// A decoded asset ledger `Transfer` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferEvent {
    pub collection: Address,
    pub from: Address,
    pub to: Address,
    pub token_id: U256,
}

impl TransferEvent {
    /// Decodes a raw ERC-721 `Transfer` [Log].
    pub fn decode(log: &Log) -> Result<Self> {
        Ok(Self {
            collection: log.address,
            from: topic_address(log, 1)?,
            to: topic_address(log, 2)?,
            token_id: U256::from_big_endian(
                log.topics
                    .get(3)
                    .ok_or(anyhow!("`tokenId` topic not present in `Transfer` event"))?
                    .as_bytes(),
            ),
        })
    }

    /// The non-zero wallets touched by the transfer. Mints and burns only touch one side.
    pub fn wallets(&self) -> impl Iterator<Item = Address> {
        [self.from, self.to].into_iter().filter(|a| !a.is_zero())
    }
}

fn topic(log: &Log, index: usize) -> Result<H256> {
    log.topics
        .get(index)
        .copied()
        .ok_or(anyhow!("Topic {} not present in log", index))
}

fn topic_u64(log: &Log, index: usize) -> Result<u64> {
    let value = U256::from_big_endian(topic(log, index)?.as_bytes());
    if value > U256::from(u64::MAX) {
        return Err(anyhow!("Topic {} does not fit a game id: {}", index, value));
    }
    Ok(value.as_u64())
}

fn topic_address(log: &Log, index: usize) -> Result<Address> {
    // Indexed addresses are left-padded to 32 bytes.
    Ok(Address::from_slice(&topic(log, index)?[12..]))
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use ethers::{abi::Token, types::Bytes, utils::keccak256};

    pub(crate) fn word(value: u64) -> H256 {
        H256::from_low_u64_be(value)
    }

    pub(crate) fn address_word(address: Address) -> H256 {
        H256::from(address)
    }

    #[test]
    fn decodes_game_created() {
        let player1 = Address::from_low_u64_be(0xaa);
        let token = Address::from_low_u64_be(0xbb);
        let log = Log {
            topics: vec![GameCreatedFilter::signature(), word(7), address_word(player1)],
            data: Bytes::from(abi::encode(&[
                Token::Address(token),
                Token::Uint(U256::exp10(20)),
            ])),
            ..Default::default()
        };

        let event = GameEvent::decode(&log).unwrap();
        assert_eq!(
            event,
            GameEvent::Created {
                game_id: 7,
                player1,
                stake_token: token,
                stake_amount: U256::exp10(20),
            }
        );
        assert_eq!(event.args()["stakeAmount"], "100000000000000000000");
    }

    #[test]
    fn decodes_settled_and_unknown() {
        let log = Log {
            topics: vec![GameSettledFilter::signature(), word(2)],
            data: Bytes::from(abi::encode(&[Token::Address(Address::zero())])),
            ..Default::default()
        };
        let event = GameEvent::decode(&log).unwrap();
        assert_eq!(
            event,
            GameEvent::Settled {
                game_id: 2,
                winner: Address::zero()
            }
        );
        assert_eq!(event.args()["winner"], serde_json::Value::Null);

        let other = H256::from(keccak256("Paused(address)"));
        let log = Log {
            topics: vec![other],
            ..Default::default()
        };
        assert_eq!(
            GameEvent::decode(&log).unwrap(),
            GameEvent::Unknown { topic: Some(other) }
        );
    }

    #[test]
    fn malformed_tracked_event_is_an_error() {
        let log = Log {
            topics: vec![PlayerJoinedFilter::signature(), word(2)],
            ..Default::default()
        };
        assert!(GameEvent::decode(&log).is_err());
    }

    #[test]
    fn transfer_skips_zero_address() {
        let to = Address::from_low_u64_be(0xcc);
        let log = Log {
            address: Address::from_low_u64_be(0x11),
            topics: vec![
                H256::from(keccak256(TRANSFER_SIGNATURE)),
                address_word(Address::zero()),
                address_word(to),
                word(42),
            ],
            ..Default::default()
        };
        let transfer = TransferEvent::decode(&log).unwrap();
        assert_eq!(transfer.token_id, U256::from(42));
        assert_eq!(transfer.wallets().collect::<Vec<_>>(), vec![to]);
    }
}
