//! Jackpot Lottery Contract
//!
//! A pooled-stake lottery. Players enter by transferring at least
//! `min_entry` tokens; the operator closes the round, and once the draw
//! beacon has revealed its seed the operator settles it: the whole pot goes
//! to one entrant and a fresh round opens.
//!
//! ## Round Flow
//! 1. `enter`: token transfer in, player appended, pot credited.
//! 2. `close_round`: entries freeze and a random index in `[0, players)` is
//!    requested from the beacon under the round number. The beacon binds a
//!    seed commitment the oracle published beforehand.
//! 3. The oracle reveals the seed on the beacon (off-chain step).
//! 4. `pick_winner`: reads the index, pays the pot, clears the list and
//!    advances the round in one invocation.
//!
//! ## Atomicity
//! Every entry point validates before it writes. Settlement writes the reset
//! state first and transfers last; a failed transfer returns
//! `TransferFailed`, and a returned error discards every write made by the
//! invocation, so the round is left exactly as it was.
//!
//! ## Storage Strategy
//! - `instance()`: Operator, Token, Beacon, MinEntry, Round, Status.
//! - `persistent()`: Players, Pot and one Winner record per settled round,
//!   TTL bumped on every write.
//!
//! ## Invariant
//! `pot == token.balance(contract_address)` between settlements, assuming
//! every inflow goes through `enter`.
#![no_std]
#![allow(unexpected_cfgs)]

use soroban_sdk::{
    contract, contracterror, contractevent, contractimpl, contracttype, token::TokenClient, Address,
    Env, Vec,
};

use jackpot_draw_beacon::{DrawBeaconClient, Error as BeaconError};

mod ledger;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Persistent storage TTL in ledgers (~30 days at 5 s/ledger).
pub const PERSISTENT_BUMP_LEDGERS: u32 = 518_400;

// ---------------------------------------------------------------------------
// Error Types
// ---------------------------------------------------------------------------

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum Error {
    AlreadyInitialized    = 1,
    NotInitialized        = 2,
    Unauthorized          = 3,
    InvalidAmount         = 4,
    /// Entry below `min_entry`.
    InsufficientEntry     = 5,
    EmptyPool             = 6,
    /// Entries are frozen while a draw is in progress.
    RoundClosed           = 7,
    /// `pick_winner` before `close_round`.
    RoundNotClosed        = 8,
    /// The beacon refused the draw request: no seed committed yet, a
    /// duplicate request id, or the beacon call itself failed. A revoked
    /// lottery is reported separately as `BeaconUnauthorized`.
    RandomnessUnavailable = 9,
    /// The beacon has not revealed a usable index for this round.
    RandomnessPending     = 10,
    /// The payout to the drawn entrant failed. The round stays in `Drawing`
    /// until a retry succeeds; a recipient the token will never credit keeps
    /// it there.
    TransferFailed        = 11,
    RoundNotFound         = 12,
    Overflow              = 13,
    /// This lottery is not whitelisted on the beacon.
    BeaconUnauthorized    = 14,
}

// ---------------------------------------------------------------------------
// Storage Types
// ---------------------------------------------------------------------------

#[contracttype]
pub enum DataKey {
    // --- instance() ---
    Operator,
    Token,
    Beacon,
    MinEntry,
    Round,
    Status,
    // --- persistent() ---
    Players,
    Pot,
    /// Settlement record keyed by round number.
    Winner(u64),
}

#[contracttype]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RoundStatus {
    /// Accepting entries.
    Open,
    /// Entries frozen, waiting on the beacon reveal.
    Drawing,
}

/// Snapshot of the current round returned by `get_round`.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RoundInfo {
    pub round: u64,
    pub status: RoundStatus,
    pub pot: i128,
    pub participants: u32,
    pub min_entry: i128,
}

/// Outcome of a settled round.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WinnerRecord {
    pub winner: Address,
    /// Position of the winning entry in the round's participant list.
    pub index: u32,
    pub payout: i128,
    pub participants: u32,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[contractevent]
pub struct Entered {
    #[topic]
    pub round: u64,
    #[topic]
    pub player: Address,
    pub amount: i128,
}

#[contractevent]
pub struct EntriesClosed {
    #[topic]
    pub round: u64,
    pub participants: u32,
    pub pot: i128,
}

#[contractevent]
pub struct WinnerPicked {
    #[topic]
    pub round: u64,
    #[topic]
    pub winner: Address,
    pub amount: i128,
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

#[contract]
pub struct Lottery;

#[contractimpl]
impl Lottery {
    // -----------------------------------------------------------------------
    // init
    // -----------------------------------------------------------------------

    /// Initialize the lottery. May only be called once.
    ///
    /// `operator` is the deployer and the only address allowed to close and
    /// settle rounds; it never changes. `token` is the SEP-41 contract every
    /// entry and payout moves through. `beacon` must whitelist this contract
    /// before the first `close_round`.
    pub fn init(
        env: Env,
        operator: Address,
        token: Address,
        beacon: Address,
        min_entry: i128,
    ) -> Result<(), Error> {
        if env.storage().instance().has(&DataKey::Operator) {
            return Err(Error::AlreadyInitialized);
        }
        if min_entry <= 0 {
            return Err(Error::InvalidAmount);
        }

        operator.require_auth();

        env.storage().instance().set(&DataKey::Operator, &operator);
        env.storage().instance().set(&DataKey::Token, &token);
        env.storage().instance().set(&DataKey::Beacon, &beacon);
        env.storage().instance().set(&DataKey::MinEntry, &min_entry);

        ledger::init(&env);

        Ok(())
    }

    // -----------------------------------------------------------------------
    // enter
    // -----------------------------------------------------------------------

    /// Enter the current round with `amount` tokens.
    ///
    /// The same player may enter any number of times; each call is one more
    /// slot in the draw.
    pub fn enter(env: Env, player: Address, amount: i128) -> Result<(), Error> {
        require_initialized(&env)?;
        player.require_auth();

        if amount < get_min_entry(&env) {
            return Err(Error::InsufficientEntry);
        }
        if ledger::status(&env) != RoundStatus::Open {
            return Err(Error::RoundClosed);
        }

        let token = get_token(&env);
        TokenClient::new(&env, &token).transfer(&player, env.current_contract_address(), &amount);

        ledger::append(&env, &player, amount)?;

        Entered { round: ledger::round(&env), player, amount }.publish(&env);

        Ok(())
    }

    // -----------------------------------------------------------------------
    // close_round
    // -----------------------------------------------------------------------

    /// Freeze entries and request the draw from the beacon. Operator only.
    ///
    /// The oracle must have committed a seed on the beacon beforehand,
    /// otherwise the request is refused with `RandomnessUnavailable`.
    /// `BeaconUnauthorized` means the beacon admin has not whitelisted (or
    /// has revoked) this contract.
    pub fn close_round(env: Env, operator: Address) -> Result<(), Error> {
        require_operator(&env, &operator)?;

        let players = ledger::snapshot(&env);
        if players.is_empty() {
            return Err(Error::EmptyPool);
        }
        if ledger::status(&env) != RoundStatus::Open {
            return Err(Error::RoundClosed);
        }

        let round = ledger::round(&env);
        let beacon = get_beacon(&env);
        let requested = DrawBeaconClient::new(&env, &beacon).try_request_random(
            &env.current_contract_address(),
            &round,
            &u64::from(players.len()),
        );
        match requested {
            Ok(Ok(())) => {}
            Err(Ok(BeaconError::UnauthorizedCaller)) => return Err(Error::BeaconUnauthorized),
            _ => return Err(Error::RandomnessUnavailable),
        }

        ledger::set_status(&env, RoundStatus::Drawing);

        EntriesClosed {
            round,
            participants: players.len(),
            pot: ledger::balance(&env),
        }
        .publish(&env);

        Ok(())
    }

    // -----------------------------------------------------------------------
    // pick_winner
    // -----------------------------------------------------------------------

    /// Settle the closed round: pay the entire pot to the drawn entrant and
    /// open the next round. Operator only. Returns the winner.
    pub fn pick_winner(env: Env, operator: Address) -> Result<Address, Error> {
        require_operator(&env, &operator)?;

        let players = ledger::snapshot(&env);
        if players.is_empty() {
            return Err(Error::EmptyPool);
        }
        if ledger::status(&env) != RoundStatus::Drawing {
            return Err(Error::RoundNotClosed);
        }

        let round = ledger::round(&env);
        let index = drawn_index(&env, round, &players)?;
        let winner = players.get(index).ok_or(Error::RandomnessPending)?;
        let pot = ledger::balance(&env);

        let record = WinnerRecord {
            winner: winner.clone(),
            index,
            payout: pot,
            participants: players.len(),
        };
        let record_key = DataKey::Winner(round);
        env.storage().persistent().set(&record_key, &record);
        env.storage()
            .persistent()
            .extend_ttl(&record_key, PERSISTENT_BUMP_LEDGERS, PERSISTENT_BUMP_LEDGERS);

        ledger::clear(&env);
        ledger::advance_round(&env)?;
        ledger::set_status(&env, RoundStatus::Open);

        // Reset state is written before the external call; an error return
        // from here discards it together with the failed transfer.
        let token = get_token(&env);
        let paid = TokenClient::new(&env, &token).try_transfer(
            &env.current_contract_address(),
            &winner,
            &pot,
        );
        match paid {
            Ok(Ok(())) => {}
            _ => return Err(Error::TransferFailed),
        }

        WinnerPicked { round, winner: winner.clone(), amount: pot }.publish(&env);

        Ok(winner)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Current participants in entry order, duplicates included.
    pub fn get_players(env: Env) -> Vec<Address> {
        ledger::snapshot(&env)
    }

    /// Tokens held for the current round.
    pub fn get_pot(env: Env) -> i128 {
        ledger::balance(&env)
    }

    pub fn get_operator(env: Env) -> Result<Address, Error> {
        env.storage()
            .instance()
            .get(&DataKey::Operator)
            .ok_or(Error::NotInitialized)
    }

    pub fn get_round(env: Env) -> Result<RoundInfo, Error> {
        require_initialized(&env)?;
        Ok(RoundInfo {
            round: ledger::round(&env),
            status: ledger::status(&env),
            pot: ledger::balance(&env),
            participants: ledger::snapshot(&env).len(),
            min_entry: get_min_entry(&env),
        })
    }

    /// Settlement record of a past round.
    pub fn get_winner(env: Env, round: u64) -> Result<WinnerRecord, Error> {
        env.storage()
            .persistent()
            .get(&DataKey::Winner(round))
            .ok_or(Error::RoundNotFound)
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn require_initialized(env: &Env) -> Result<(), Error> {
    if !env.storage().instance().has(&DataKey::Operator) {
        return Err(Error::NotInitialized);
    }
    Ok(())
}

/// Verify that `caller` is the stored operator and has signed the invocation.
fn require_operator(env: &Env, caller: &Address) -> Result<(), Error> {
    let operator: Address = env
        .storage()
        .instance()
        .get(&DataKey::Operator)
        .ok_or(Error::NotInitialized)?;
    caller.require_auth();
    if caller != &operator {
        return Err(Error::Unauthorized);
    }
    Ok(())
}

/// Index revealed by the beacon for `round`.
///
/// The request was made against the frozen list, so its bound must match the
/// list length; anything else is treated as not yet usable.
fn drawn_index(env: &Env, round: u64, players: &Vec<Address>) -> Result<u32, Error> {
    let beacon = get_beacon(env);
    let entry = match DrawBeaconClient::new(env, &beacon)
        .try_get_result(&env.current_contract_address(), &round)
    {
        Ok(Ok(entry)) => entry,
        _ => return Err(Error::RandomnessPending),
    };

    if entry.max != u64::from(players.len()) || entry.result >= entry.max {
        return Err(Error::RandomnessPending);
    }
    u32::try_from(entry.result).map_err(|_| Error::RandomnessPending)
}

fn get_token(env: &Env) -> Address {
    env.storage()
        .instance()
        .get(&DataKey::Token)
        .expect("Lottery: token not set")
}

fn get_beacon(env: &Env) -> Address {
    env.storage()
        .instance()
        .get(&DataKey::Beacon)
        .expect("Lottery: beacon not set")
}

fn get_min_entry(env: &Env) -> i128 {
    env.storage()
        .instance()
        .get(&DataKey::MinEntry)
        .expect("Lottery: min entry not set")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
