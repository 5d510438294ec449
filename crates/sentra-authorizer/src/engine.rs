use std::sync::Arc;

use tracing::{info, warn};

use sentra_core::error::SentraError;
use sentra_core::spend::{AuthorizationRecord, EoaRecord, SpendRecord};
use sentra_core::types::{
    bitmap_allows, types_bitmap, Address, RecipientHash, Timestamp, MAX_TRANSFER_TYPE, U256,
};
use sentra_store::LedgerDb;

/// The Spend Authorizer.
///
/// Strictly sequential per instance: every successful `authorize_spend`
/// commits before the next begins, so concurrent callers observe
/// serializable outcomes on `(rolling_spend, nonce)`. The nonce counter is
/// loaded once at construction and advanced only on success; failed
/// attempts leave no gap.
pub struct SpendAuthorizer {
    db: Arc<LedgerDb>,
    /// The parent account this authorization module is attached to.
    avatar: Address,
    owner: Address,
    window: i64,
    max_records: usize,
    next_nonce: u64,
    paused: bool,
}

impl SpendAuthorizer {
    pub fn new(
        db: Arc<LedgerDb>,
        avatar: Address,
        owner: Address,
        window: i64,
        max_records: usize,
    ) -> Result<Self, SentraError> {
        let next_nonce = db.next_auth_nonce()?;
        let paused = matches!(db.get_meta("authorizer_paused")?.as_deref(), Some([1]));
        Ok(Self { db, avatar, owner, window, max_records, next_nonce, paused })
    }

    fn ensure_owner(&self, caller: &Address) -> Result<(), SentraError> {
        if *caller != self.owner {
            return Err(SentraError::NotOwner);
        }
        Ok(())
    }

    // ── Registry lifecycle ───────────────────────────────────────────────────

    /// Register a new EOA under this avatar. Owner only.
    pub fn register_eoa(
        &mut self,
        caller: &Address,
        eoa: Address,
        daily_limit: U256,
        allowed_types: &[u8],
    ) -> Result<(), SentraError> {
        self.ensure_owner(caller)?;
        if eoa.is_zero() {
            return Err(SentraError::InvalidAddress);
        }
        if eoa == self.avatar || eoa == self.owner {
            return Err(SentraError::CannotRegisterCoreAddress);
        }
        if let Some(existing) = self.db.get_eoa(&eoa)? {
            if existing.registered {
                return Err(SentraError::EoaAlreadyRegistered(eoa.to_hex()));
            }
        }
        if daily_limit.is_zero() {
            return Err(SentraError::InvalidDailyLimit);
        }
        for t in allowed_types {
            if *t > MAX_TRANSFER_TYPE {
                return Err(SentraError::InvalidTransferType(*t));
            }
        }
        let bitmap = types_bitmap(allowed_types);

        // A re-registration inherits the old (stale) record history; the
        // pruning rule stays correct either way.
        let rec = match self.db.get_eoa(&eoa)? {
            Some(mut prior) => {
                prior.registered = true;
                prior.daily_limit = daily_limit;
                prior.allowed_types = bitmap;
                prior
            }
            None => EoaRecord::new(eoa, daily_limit, bitmap),
        };
        self.db.put_eoa(&rec)?;

        let mut list = self.db.get_eoa_list()?;
        if !list.contains(&eoa) {
            list.push(eoa);
            self.db.put_eoa_list(&list)?;
        }
        info!(eoa = %eoa, limit = %daily_limit, bitmap, "EOA registered");
        Ok(())
    }

    /// Revoke an EOA: clears limit and policy fields, removes it from the
    /// enumeration list via swap-and-pop. Idempotent for already-revoked
    /// EOAs.
    pub fn revoke_eoa(&mut self, caller: &Address, eoa: Address) -> Result<(), SentraError> {
        self.ensure_owner(caller)?;
        let mut rec = self
            .db
            .get_eoa(&eoa)?
            .ok_or_else(|| SentraError::EoaNotRegistered(eoa.to_hex()))?;
        if rec.registered {
            rec.revoke();
            self.db.put_eoa(&rec)?;
        }
        let mut list = self.db.get_eoa_list()?;
        if let Some(pos) = list.iter().position(|a| *a == eoa) {
            let last = list.len() - 1;
            list.swap(pos, last);
            list.pop();
            self.db.put_eoa_list(&list)?;
        }
        info!(eoa = %eoa, "EOA revoked");
        Ok(())
    }

    /// Replace a live EOA's daily limit. Owner only.
    pub fn update_limit(
        &mut self,
        caller: &Address,
        eoa: Address,
        new_limit: U256,
    ) -> Result<(), SentraError> {
        self.ensure_owner(caller)?;
        if new_limit.is_zero() {
            return Err(SentraError::InvalidDailyLimit);
        }
        let mut rec = self.live_eoa(&eoa)?;
        rec.daily_limit = new_limit;
        self.db.put_eoa(&rec)?;
        info!(eoa = %eoa, limit = %new_limit, "daily limit updated");
        Ok(())
    }

    /// Replace a live EOA's allowed transfer types. Owner only.
    pub fn update_allowed_types(
        &mut self,
        caller: &Address,
        eoa: Address,
        allowed_types: &[u8],
    ) -> Result<(), SentraError> {
        self.ensure_owner(caller)?;
        for t in allowed_types {
            if *t > MAX_TRANSFER_TYPE {
                return Err(SentraError::InvalidTransferType(*t));
            }
        }
        let mut rec = self.live_eoa(&eoa)?;
        rec.allowed_types = types_bitmap(allowed_types);
        self.db.put_eoa(&rec)?;
        info!(eoa = %eoa, bitmap = rec.allowed_types, "allowed types updated");
        Ok(())
    }

    // ── Emergency stop ───────────────────────────────────────────────────────

    pub fn pause(&mut self, caller: &Address) -> Result<(), SentraError> {
        self.ensure_owner(caller)?;
        self.paused = true;
        self.db.put_meta("authorizer_paused", &[1])?;
        warn!("authorizer paused");
        Ok(())
    }

    pub fn unpause(&mut self, caller: &Address) -> Result<(), SentraError> {
        self.ensure_owner(caller)?;
        self.paused = false;
        self.db.put_meta("authorizer_paused", &[0])?;
        info!("authorizer unpaused");
        Ok(())
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    // ── Authorization ────────────────────────────────────────────────────────

    /// Validate and commit a spending intent for `eoa` (the caller
    /// identity). All failures are synchronous and leave no observable
    /// state change; success appends the spend record, advances the nonce,
    /// and persists the emitted [`AuthorizationRecord`].
    pub fn authorize_spend(
        &mut self,
        eoa: &Address,
        amount: U256,
        recipient_hash: RecipientHash,
        transfer_type: u8,
        now: Timestamp,
    ) -> Result<AuthorizationRecord, SentraError> {
        if self.paused {
            return Err(SentraError::Paused);
        }
        if amount.is_zero() {
            return Err(SentraError::ZeroAmount);
        }
        let mut rec = self.live_eoa(eoa)?;
        if !bitmap_allows(rec.allowed_types, transfer_type) {
            return Err(SentraError::TransferTypeNotAllowed(transfer_type));
        }

        let current = rec.rolling_spend(now, self.window);
        let remaining = rec.daily_limit.saturating_sub(current);
        if amount > remaining {
            return Err(SentraError::DailyLimitExceeded { requested: amount, remaining });
        }

        rec.prune_expired(now, self.window);
        if rec.live_count() >= self.max_records {
            return Err(SentraError::TooManySpendRecords { max: self.max_records });
        }

        // The limit check above bounds the amount; records pack amounts in
        // 128 bits, so a limit beyond 2^128 is rejected rather than
        // truncated.
        if amount.bits() > 128 {
            return Err(SentraError::DailyLimitExceeded { requested: amount, remaining });
        }
        rec.records.push(SpendRecord { amount: amount.low_u128(), timestamp: now });

        let nonce = self.next_nonce;
        let auth = AuthorizationRecord {
            avatar: self.avatar,
            eoa: *eoa,
            amount,
            recipient_hash,
            transfer_type,
            nonce,
        };

        // Commit: record list, authorization, then the advanced counter.
        self.db.put_eoa(&rec)?;
        self.db.put_authorization(&auth)?;
        self.db.set_next_auth_nonce(nonce + 1)?;
        self.next_nonce = nonce + 1;

        info!(
            eoa = %eoa,
            amount = %amount,
            transfer_type,
            nonce,
            "spend authorized"
        );
        Ok(auth)
    }

    // ── Read surface ─────────────────────────────────────────────────────────

    pub fn rolling_spend(&self, eoa: &Address, now: Timestamp) -> Result<U256, SentraError> {
        Ok(self
            .db
            .get_eoa(eoa)?
            .map(|r| r.rolling_spend(now, self.window))
            .unwrap_or_default())
    }

    pub fn remaining_limit(&self, eoa: &Address, now: Timestamp) -> Result<U256, SentraError> {
        match self.db.get_eoa(eoa)? {
            Some(r) if r.registered => {
                Ok(r.daily_limit.saturating_sub(r.rolling_spend(now, self.window)))
            }
            _ => Ok(U256::zero()),
        }
    }

    pub fn daily_limit(&self, eoa: &Address) -> Result<U256, SentraError> {
        Ok(self
            .db
            .get_eoa(eoa)?
            .filter(|r| r.registered)
            .map(|r| r.daily_limit)
            .unwrap_or_default())
    }

    pub fn is_registered(&self, eoa: &Address) -> Result<bool, SentraError> {
        Ok(self.db.get_eoa(eoa)?.map(|r| r.registered).unwrap_or(false))
    }

    pub fn list_eoas(&self) -> Result<Vec<Address>, SentraError> {
        self.db.get_eoa_list()
    }

    fn live_eoa(&self, eoa: &Address) -> Result<EoaRecord, SentraError> {
        match self.db.get_eoa(eoa)? {
            Some(r) if r.registered => Ok(r),
            _ => Err(SentraError::EoaNotRegistered(eoa.to_hex())),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use sentra_core::types::TransferType;

    const NOW: i64 = 2_000_000;
    const WINDOW: i64 = 86_400;

    fn usd(n: u64) -> U256 {
        U256::from(n) * U256::from(10u64).pow(U256::from(18u32))
    }

    fn addr(b: u8) -> Address {
        Address::from_bytes([b; 20])
    }

    fn rh(b: u8) -> RecipientHash {
        RecipientHash::from_bytes([b; 32])
    }

    fn authorizer(name: &str) -> SpendAuthorizer {
        let dir = std::env::temp_dir().join(format!("sentra_auth_test_{}", name));
        let _ = std::fs::remove_dir_all(&dir);
        let db = Arc::new(LedgerDb::open(&dir).expect("open temp db"));
        SpendAuthorizer::new(db, addr(0xaa), addr(0xbb), WINDOW, 200).unwrap()
    }

    fn register(auth: &mut SpendAuthorizer, eoa: Address, limit: U256, types: &[TransferType]) {
        let raw: Vec<u8> = types.iter().map(|t| t.as_u8()).collect();
        auth.register_eoa(&addr(0xbb), eoa, limit, &raw).unwrap();
    }

    // ── Registration ─────────────────────────────────────────────────────────

    #[test]
    fn register_rejects_null_and_core_addresses() {
        let mut auth = authorizer("reg_null");
        let owner = addr(0xbb);
        assert!(matches!(
            auth.register_eoa(&owner, Address::ZERO, usd(1), &[0]).unwrap_err(),
            SentraError::InvalidAddress
        ));
        assert!(matches!(
            auth.register_eoa(&owner, addr(0xaa), usd(1), &[0]).unwrap_err(),
            SentraError::CannotRegisterCoreAddress
        ));
    }

    #[test]
    fn register_rejects_zero_limit_and_bad_type() {
        let mut auth = authorizer("reg_bad");
        let owner = addr(0xbb);
        assert!(matches!(
            auth.register_eoa(&owner, addr(1), U256::zero(), &[0]).unwrap_err(),
            SentraError::InvalidDailyLimit
        ));
        assert!(matches!(
            auth.register_eoa(&owner, addr(1), usd(1), &[8]).unwrap_err(),
            SentraError::InvalidTransferType(8)
        ));
    }

    #[test]
    fn register_twice_rejected_non_owner_rejected() {
        let mut auth = authorizer("reg_dup");
        register(&mut auth, addr(1), usd(100), &[TransferType::Payment]);
        assert!(matches!(
            auth.register_eoa(&addr(0xbb), addr(1), usd(100), &[0]).unwrap_err(),
            SentraError::EoaAlreadyRegistered(_)
        ));
        assert!(matches!(
            auth.register_eoa(&addr(0x01), addr(2), usd(100), &[0]).unwrap_err(),
            SentraError::NotOwner
        ));
    }

    #[test]
    fn revoke_then_reregister_uses_latest_parameters() {
        let mut auth = authorizer("rereg");
        let owner = addr(0xbb);
        register(&mut auth, addr(1), usd(100), &[TransferType::Payment]);
        auth.revoke_eoa(&owner, addr(1)).unwrap();
        assert!(!auth.is_registered(&addr(1)).unwrap());
        assert!(auth.list_eoas().unwrap().is_empty());
        // Idempotent revoke.
        auth.revoke_eoa(&owner, addr(1)).unwrap();

        auth.register_eoa(&owner, addr(1), usd(250), &[TransferType::Transfer.as_u8()]).unwrap();
        assert!(auth.is_registered(&addr(1)).unwrap());
        assert_eq!(auth.daily_limit(&addr(1)).unwrap(), usd(250));
        assert_eq!(auth.list_eoas().unwrap(), vec![addr(1)]);
    }

    #[test]
    fn revoke_uses_swap_and_pop() {
        let mut auth = authorizer("swap_pop");
        let owner = addr(0xbb);
        for b in 1..=3u8 {
            register(&mut auth, addr(b), usd(10), &[TransferType::Payment]);
        }
        auth.revoke_eoa(&owner, addr(1)).unwrap();
        assert_eq!(auth.list_eoas().unwrap(), vec![addr(3), addr(2)]);
    }

    // ── authorize_spend: S1 simple spend cycle ───────────────────────────────

    #[test]
    fn simple_spend_cycle() {
        let mut auth = authorizer("s1");
        let eoa = addr(1);
        register(&mut auth, eoa, usd(500), &[TransferType::Payment]);

        let a0 = auth.authorize_spend(&eoa, usd(85), rh(1), 0, NOW).unwrap();
        assert_eq!(a0.nonce, 0);
        assert_eq!(auth.remaining_limit(&eoa, NOW).unwrap(), usd(415));

        let a1 = auth.authorize_spend(&eoa, usd(400), rh(2), 0, NOW).unwrap();
        assert_eq!(a1.nonce, 1);
        assert_eq!(auth.remaining_limit(&eoa, NOW).unwrap(), usd(15));

        match auth.authorize_spend(&eoa, usd(20), rh(3), 0, NOW).unwrap_err() {
            SentraError::DailyLimitExceeded { requested, remaining } => {
                assert_eq!(requested, usd(20));
                assert_eq!(remaining, usd(15));
            }
            other => panic!("unexpected error: {other}"),
        }

        // 24h + 1s later the window is clear again.
        let later = NOW + WINDOW + 1;
        assert_eq!(auth.rolling_spend(&eoa, later).unwrap(), U256::zero());
        assert_eq!(auth.remaining_limit(&eoa, later).unwrap(), usd(500));
    }

    // ── S2: type enforcement ─────────────────────────────────────────────────

    #[test]
    fn transfer_type_not_allowed() {
        let mut auth = authorizer("s2");
        let eoa = addr(1);
        register(&mut auth, eoa, usd(500), &[TransferType::Payment]);
        assert!(matches!(
            auth.authorize_spend(&eoa, U256::from(10u64), rh(1), TransferType::Transfer.as_u8(), NOW)
                .unwrap_err(),
            SentraError::TransferTypeNotAllowed(1)
        ));
    }

    // ── Boundaries ───────────────────────────────────────────────────────────

    #[test]
    fn exact_limit_allowed_one_more_rejected() {
        let mut auth = authorizer("exact");
        let eoa = addr(1);
        register(&mut auth, eoa, usd(500), &[TransferType::Payment]);
        auth.authorize_spend(&eoa, usd(500), rh(1), 0, NOW).unwrap();
        assert!(matches!(
            auth.authorize_spend(&eoa, U256::from(1u64), rh(2), 0, NOW).unwrap_err(),
            SentraError::DailyLimitExceeded { .. }
        ));
    }

    #[test]
    fn window_boundary_sees_only_second_spend() {
        let mut auth = authorizer("boundary");
        let eoa = addr(1);
        register(&mut auth, eoa, usd(500), &[TransferType::Payment]);
        auth.authorize_spend(&eoa, usd(10), rh(1), 0, NOW).unwrap();
        auth.authorize_spend(&eoa, usd(20), rh(2), 0, NOW + WINDOW - 1).unwrap();

        let at = NOW + WINDOW + 1;
        auth.authorize_spend(&eoa, usd(30), rh(3), 0, at).unwrap();
        // First spend fell out; second and third remain.
        assert_eq!(auth.rolling_spend(&eoa, at).unwrap(), usd(50));
    }

    #[test]
    fn zero_amount_and_unregistered_rejected() {
        let mut auth = authorizer("zero");
        let eoa = addr(1);
        assert!(matches!(
            auth.authorize_spend(&eoa, U256::zero(), rh(1), 0, NOW).unwrap_err(),
            SentraError::ZeroAmount
        ));
        assert!(matches!(
            auth.authorize_spend(&eoa, usd(1), rh(1), 0, NOW).unwrap_err(),
            SentraError::EoaNotRegistered(_)
        ));
    }

    // ── Nonces ───────────────────────────────────────────────────────────────

    #[test]
    fn nonces_are_gap_free_across_failures() {
        let mut auth = authorizer("nonce");
        let eoa = addr(1);
        register(&mut auth, eoa, usd(100), &[TransferType::Payment]);

        let a = auth.authorize_spend(&eoa, usd(60), rh(1), 0, NOW).unwrap();
        assert_eq!(a.nonce, 0);
        // Failure must not consume a nonce.
        let _ = auth.authorize_spend(&eoa, usd(60), rh(2), 0, NOW).unwrap_err();
        let b = auth.authorize_spend(&eoa, usd(40), rh(3), 0, NOW).unwrap();
        assert_eq!(b.nonce, 1);
    }

    // ── Record cap ───────────────────────────────────────────────────────────

    #[test]
    fn record_cap_enforced_then_cleared_by_window() {
        let dir = std::env::temp_dir().join("sentra_auth_test_cap");
        let _ = std::fs::remove_dir_all(&dir);
        let db = Arc::new(LedgerDb::open(&dir).unwrap());
        let mut auth = SpendAuthorizer::new(db, addr(0xaa), addr(0xbb), WINDOW, 3).unwrap();
        let eoa = addr(1);
        register(&mut auth, eoa, usd(1_000_000), &[TransferType::Payment]);

        for i in 0..3 {
            auth.authorize_spend(&eoa, usd(1), rh(i), 0, NOW + i as i64).unwrap();
        }
        assert!(matches!(
            auth.authorize_spend(&eoa, usd(1), rh(9), 0, NOW + 10).unwrap_err(),
            SentraError::TooManySpendRecords { max: 3 }
        ));

        // Once the early records expire, capacity returns.
        auth.authorize_spend(&eoa, usd(1), rh(10), 0, NOW + WINDOW + 5).unwrap();
    }

    // ── Pause ────────────────────────────────────────────────────────────────

    #[test]
    fn paused_rejects_authorize_until_unpaused() {
        let mut auth = authorizer("pause");
        let eoa = addr(1);
        register(&mut auth, eoa, usd(100), &[TransferType::Payment]);
        auth.pause(&addr(0xbb)).unwrap();
        assert!(matches!(
            auth.authorize_spend(&eoa, usd(1), rh(1), 0, NOW).unwrap_err(),
            SentraError::Paused
        ));
        auth.unpause(&addr(0xbb)).unwrap();
        auth.authorize_spend(&eoa, usd(1), rh(1), 0, NOW).unwrap();
    }
}
