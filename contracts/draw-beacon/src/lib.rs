//! Jackpot Draw Beacon Contract
//!
//! Commit-reveal randomness for lottery draws. The beacon never derives
//! entropy from ledger state; every result comes from a seed the oracle
//! committed to before the request it serves existed.
//!
//! 1. The oracle calls `commit_seed` with `sha256(server_seed)`.
//! 2. A whitelisted consumer calls `request_random(caller, request_id, max)`.
//!    The pending commitment is bound to that request and consumed, so each
//!    request is served by a seed chosen before the request was made.
//! 3. The oracle calls `fulfill_random` with the preimage. The beacon checks
//!    it against the bound commitment and stores:
//!
//!      `sha256(server_seed || request_id_be_bytes)[0..8] % max`
//!
//! ## Verification
//! The commitment, seed and result are all stored on-chain. Anyone can check
//! `sha256(server_seed) == commitment` and re-derive the result.
//!
//! ## Storage Strategy
//! - `instance()`: Admin, Oracle, the next unbound commitment.
//! - `persistent()`: AuthorizedCaller, PendingRequest and FulfilledRequest
//!   entries. Requests are keyed by `(caller, request_id)` so several
//!   consumers can share one beacon without colliding ids.
#![no_std]
#![allow(unexpected_cfgs)]

use soroban_sdk::{
    contract, contracterror, contractevent, contractimpl, contracttype, Address, Bytes, BytesN,
    Env,
};

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
    AlreadyInitialized = 1,
    NotInitialized     = 2,
    NotAuthorized      = 3,
    /// `max == 0`; there is no index to pick.
    InvalidBound       = 4,
    DuplicateRequestId = 5,
    RequestNotFound    = 6,
    AlreadyFulfilled   = 7,
    /// The `caller` passed to `request_random` is not whitelisted.
    UnauthorizedCaller = 8,
    /// No seed commitment is waiting to be bound to a request.
    NoCommitment       = 9,
    /// `sha256(server_seed)` does not match the commitment bound to the request.
    SeedMismatch       = 10,
}

// ---------------------------------------------------------------------------
// Storage Types
// ---------------------------------------------------------------------------

#[contracttype]
pub enum DataKey {
    // --- instance() ---
    Admin,
    Oracle,
    /// Commitment published by the oracle, not yet bound to any request.
    NextCommitment,
    // --- persistent() ---
    AuthorizedCaller(Address),
    PendingRequest(Address, u64),
    FulfilledRequest(Address, u64),
}

/// A request waiting for the oracle to reveal its seed.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PendingEntry {
    pub max: u64,
    pub commitment: BytesN<32>,
}

/// A revealed request. Everything needed to re-derive `result` is kept.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FulfilledEntry {
    pub max: u64,
    pub commitment: BytesN<32>,
    pub server_seed: BytesN<32>,
    /// Always in `[0, max)`.
    pub result: u64,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[contractevent]
pub struct SeedCommitted {
    #[topic]
    pub oracle: Address,
    pub commitment: BytesN<32>,
}

#[contractevent]
pub struct RandomRequested {
    #[topic]
    pub caller: Address,
    #[topic]
    pub request_id: u64,
    pub max: u64,
    pub commitment: BytesN<32>,
}

#[contractevent]
pub struct RandomFulfilled {
    #[topic]
    pub caller: Address,
    #[topic]
    pub request_id: u64,
    pub result: u64,
    pub server_seed: BytesN<32>,
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

#[contract]
pub struct DrawBeacon;

#[contractimpl]
impl DrawBeacon {
    /// Initialize the beacon. May only be called once.
    ///
    /// `oracle` is the only address that may commit and reveal seeds.
    pub fn init(env: Env, admin: Address, oracle: Address) -> Result<(), Error> {
        if env.storage().instance().has(&DataKey::Admin) {
            return Err(Error::AlreadyInitialized);
        }

        admin.require_auth();

        env.storage().instance().set(&DataKey::Admin, &admin);
        env.storage().instance().set(&DataKey::Oracle, &oracle);

        Ok(())
    }

    /// Whitelist a consumer contract. Admin only.
    pub fn authorize(env: Env, admin: Address, caller: Address) -> Result<(), Error> {
        require_initialized(&env)?;
        require_admin(&env, &admin)?;

        let key = DataKey::AuthorizedCaller(caller);
        env.storage().persistent().set(&key, &());
        env.storage()
            .persistent()
            .extend_ttl(&key, PERSISTENT_BUMP_LEDGERS, PERSISTENT_BUMP_LEDGERS);

        Ok(())
    }

    /// Remove a consumer from the whitelist. Admin only.
    pub fn revoke(env: Env, admin: Address, caller: Address) -> Result<(), Error> {
        require_initialized(&env)?;
        require_admin(&env, &admin)?;

        env.storage()
            .persistent()
            .remove(&DataKey::AuthorizedCaller(caller));

        Ok(())
    }

    // -----------------------------------------------------------------------
    // commit_seed
    // -----------------------------------------------------------------------

    /// Publish `sha256(server_seed)` for the next request. Oracle only.
    ///
    /// An unbound commitment may be replaced; once a request binds it, the
    /// oracle can only fulfill that request with the matching preimage.
    pub fn commit_seed(env: Env, oracle: Address, commitment: BytesN<32>) -> Result<(), Error> {
        require_initialized(&env)?;
        require_oracle(&env, &oracle)?;

        env.storage()
            .instance()
            .set(&DataKey::NextCommitment, &commitment);

        SeedCommitted { oracle, commitment }.publish(&env);

        Ok(())
    }

    // -----------------------------------------------------------------------
    // request_random
    // -----------------------------------------------------------------------

    /// Request a random index in `[0, max)`. Whitelisted callers only.
    ///
    /// Binds and consumes the pending commitment. `request_id` must be unused
    /// for this caller, pending or fulfilled.
    pub fn request_random(
        env: Env,
        caller: Address,
        request_id: u64,
        max: u64,
    ) -> Result<(), Error> {
        require_initialized(&env)?;

        if max == 0 {
            return Err(Error::InvalidBound);
        }

        caller.require_auth();

        if !env
            .storage()
            .persistent()
            .has(&DataKey::AuthorizedCaller(caller.clone()))
        {
            return Err(Error::UnauthorizedCaller);
        }

        if env
            .storage()
            .persistent()
            .has(&DataKey::PendingRequest(caller.clone(), request_id))
            || env
                .storage()
                .persistent()
                .has(&DataKey::FulfilledRequest(caller.clone(), request_id))
        {
            return Err(Error::DuplicateRequestId);
        }

        let commitment: BytesN<32> = env
            .storage()
            .instance()
            .get(&DataKey::NextCommitment)
            .ok_or(Error::NoCommitment)?;
        env.storage().instance().remove(&DataKey::NextCommitment);

        let key = DataKey::PendingRequest(caller.clone(), request_id);
        let entry = PendingEntry { max, commitment: commitment.clone() };
        env.storage().persistent().set(&key, &entry);
        env.storage()
            .persistent()
            .extend_ttl(&key, PERSISTENT_BUMP_LEDGERS, PERSISTENT_BUMP_LEDGERS);

        RandomRequested { caller, request_id, max, commitment }.publish(&env);

        Ok(())
    }

    // -----------------------------------------------------------------------
    // fulfill_random
    // -----------------------------------------------------------------------

    /// Reveal the seed for a pending request. Oracle only.
    pub fn fulfill_random(
        env: Env,
        oracle: Address,
        caller: Address,
        request_id: u64,
        server_seed: BytesN<32>,
    ) -> Result<(), Error> {
        require_initialized(&env)?;
        require_oracle(&env, &oracle)?;

        if env
            .storage()
            .persistent()
            .has(&DataKey::FulfilledRequest(caller.clone(), request_id))
        {
            return Err(Error::AlreadyFulfilled);
        }

        let pending_key = DataKey::PendingRequest(caller.clone(), request_id);
        let pending: PendingEntry = env
            .storage()
            .persistent()
            .get(&pending_key)
            .ok_or(Error::RequestNotFound)?;

        if commitment_of(&env, &server_seed) != pending.commitment {
            return Err(Error::SeedMismatch);
        }

        let result = derive_result(&env, &server_seed, request_id, pending.max);

        env.storage().persistent().remove(&pending_key);

        let fulfilled = FulfilledEntry {
            max: pending.max,
            commitment: pending.commitment,
            server_seed: server_seed.clone(),
            result,
        };
        let fulfilled_key = DataKey::FulfilledRequest(caller.clone(), request_id);
        env.storage().persistent().set(&fulfilled_key, &fulfilled);
        env.storage()
            .persistent()
            .extend_ttl(&fulfilled_key, PERSISTENT_BUMP_LEDGERS, PERSISTENT_BUMP_LEDGERS);

        RandomFulfilled { caller, request_id, result, server_seed }.publish(&env);

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Fulfilled entry for `(caller, request_id)`. `RequestNotFound` while pending.
    pub fn get_result(env: Env, caller: Address, request_id: u64) -> Result<FulfilledEntry, Error> {
        require_initialized(&env)?;

        env.storage()
            .persistent()
            .get(&DataKey::FulfilledRequest(caller, request_id))
            .ok_or(Error::RequestNotFound)
    }

    /// Commitment bound to a request, pending or fulfilled.
    pub fn get_commitment(env: Env, caller: Address, request_id: u64) -> Result<BytesN<32>, Error> {
        require_initialized(&env)?;

        if let Some(pending) = env
            .storage()
            .persistent()
            .get::<_, PendingEntry>(&DataKey::PendingRequest(caller.clone(), request_id))
        {
            return Ok(pending.commitment);
        }

        env.storage()
            .persistent()
            .get::<_, FulfilledEntry>(&DataKey::FulfilledRequest(caller, request_id))
            .map(|entry| entry.commitment)
            .ok_or(Error::RequestNotFound)
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn require_initialized(env: &Env) -> Result<(), Error> {
    if !env.storage().instance().has(&DataKey::Admin) {
        return Err(Error::NotInitialized);
    }
    Ok(())
}

fn require_admin(env: &Env, caller: &Address) -> Result<(), Error> {
    let admin: Address = env
        .storage()
        .instance()
        .get(&DataKey::Admin)
        .ok_or(Error::NotInitialized)?;
    caller.require_auth();
    if caller != &admin {
        return Err(Error::NotAuthorized);
    }
    Ok(())
}

fn require_oracle(env: &Env, caller: &Address) -> Result<(), Error> {
    let oracle: Address = env
        .storage()
        .instance()
        .get(&DataKey::Oracle)
        .ok_or(Error::NotInitialized)?;
    caller.require_auth();
    if caller != &oracle {
        return Err(Error::NotAuthorized);
    }
    Ok(())
}

/// `sha256(server_seed)`, the value the oracle publishes ahead of a request.
pub fn commitment_of(env: &Env, server_seed: &BytesN<32>) -> BytesN<32> {
    env.crypto()
        .sha256(&Bytes::from_slice(env, &server_seed.to_array()))
        .into()
}

/// Reduce `sha256(server_seed || request_id_be)` to an index in `[0, max)`.
///
/// The first 8 digest bytes are read as a big-endian u64. The modulo bias is
/// at most `max / 2^64`, negligible for any realistic pool size.
pub fn derive_result(env: &Env, server_seed: &BytesN<32>, request_id: u64, max: u64) -> u64 {
    let mut preimage = [0u8; 40];
    preimage[..32].copy_from_slice(&server_seed.to_array());
    preimage[32..].copy_from_slice(&request_id.to_be_bytes());

    let digest: BytesN<32> = env.crypto().sha256(&Bytes::from_slice(env, &preimage)).into();
    let arr = digest.to_array();
    let raw = u64::from_be_bytes([arr[0], arr[1], arr[2], arr[3], arr[4], arr[5], arr[6], arr[7]]);
    raw % max
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
