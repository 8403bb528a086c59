//! Round ledger: participant list, pot counter, round number and status.
//!
//! Only the `Lottery` entry points touch these keys. The pot is kept as an
//! explicit counter next to the list, so `balance()` equals the sum of every
//! amount passed to `append` since the last `clear`.

use soroban_sdk::{Address, Env, Vec};

use crate::{DataKey, Error, RoundStatus, PERSISTENT_BUMP_LEDGERS};

/// Seed an empty round 0 so later reads never see missing keys.
pub fn init(env: &Env) {
    write_players(env, &Vec::new(env));
    write_pot(env, 0);
    env.storage().instance().set(&DataKey::Round, &0u64);
    set_status(env, RoundStatus::Open);
}

/// Record one entry. The caller has already checked admission and moved `amount`.
pub fn append(env: &Env, account: &Address, amount: i128) -> Result<(), Error> {
    let pot = balance(env).checked_add(amount).ok_or(Error::Overflow)?;

    let mut players = snapshot(env);
    players.push_back(account.clone());

    write_players(env, &players);
    write_pot(env, pot);
    Ok(())
}

/// Empty the list and zero the pot. Only called during settlement.
pub fn clear(env: &Env) {
    write_players(env, &Vec::new(env));
    write_pot(env, 0);
}

pub fn snapshot(env: &Env) -> Vec<Address> {
    env.storage()
        .persistent()
        .get(&DataKey::Players)
        .unwrap_or_else(|| Vec::new(env))
}

pub fn balance(env: &Env) -> i128 {
    env.storage()
        .persistent()
        .get(&DataKey::Pot)
        .unwrap_or(0)
}

pub fn round(env: &Env) -> u64 {
    env.storage().instance().get(&DataKey::Round).unwrap_or(0)
}

/// Move to the next round and return its number.
pub fn advance_round(env: &Env) -> Result<u64, Error> {
    let next = round(env).checked_add(1).ok_or(Error::Overflow)?;
    env.storage().instance().set(&DataKey::Round, &next);
    Ok(next)
}

pub fn status(env: &Env) -> RoundStatus {
    env.storage()
        .instance()
        .get(&DataKey::Status)
        .unwrap_or(RoundStatus::Open)
}

pub fn set_status(env: &Env, status: RoundStatus) {
    env.storage().instance().set(&DataKey::Status, &status);
}

fn write_players(env: &Env, players: &Vec<Address>) {
    env.storage().persistent().set(&DataKey::Players, players);
    env.storage()
        .persistent()
        .extend_ttl(&DataKey::Players, PERSISTENT_BUMP_LEDGERS, PERSISTENT_BUMP_LEDGERS);
}

fn write_pot(env: &Env, pot: i128) {
    env.storage().persistent().set(&DataKey::Pot, &pot);
    env.storage()
        .persistent()
        .extend_ttl(&DataKey::Pot, PERSISTENT_BUMP_LEDGERS, PERSISTENT_BUMP_LEDGERS);
}
