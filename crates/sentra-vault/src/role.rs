//! Role model and admission checks for treasury movements.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use sentra_core::error::SentraError;
use sentra_core::types::{Address, U256};

// ── Role ─────────────────────────────────────────────────────────────────────

/// Treasury roles with monotonically increasing USD limits:
/// `operator_limit ≤ manager_limit ≤ ∞` (directors are unlimited).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    None,
    Operator,
    Manager,
    Director,
}

// ── VaultPolicy ──────────────────────────────────────────────────────────────

/// The vault-side policy the core mirrors to pre-validate movements:
/// per-role limits, target whitelist, and per-token reserve floors.
#[derive(Clone, Debug, Default)]
pub struct VaultPolicy {
    pub roles: HashMap<Address, Role>,
    pub operator_limit_usd: U256,
    pub manager_limit_usd: U256,
    pub whitelist: HashSet<Address>,
    /// Minimum balance that must remain after any transfer, per token.
    pub reserves: HashMap<Address, U256>,
}

impl VaultPolicy {
    pub fn role_of(&self, who: &Address) -> Role {
        self.roles.get(who).copied().unwrap_or(Role::None)
    }

    /// Admission check for a proposed treasury movement. Mirrors the
    /// vault's own rejection order: role limit, whitelist, then reserve.
    pub fn check_transfer(
        &self,
        caller: &Address,
        target: &Address,
        token: &Address,
        usd_amount: U256,
        balance_before: U256,
        amount: U256,
    ) -> Result<(), SentraError> {
        let within_role = match self.role_of(caller) {
            Role::None => false,
            Role::Operator => usd_amount <= self.operator_limit_usd,
            Role::Manager => usd_amount <= self.manager_limit_usd,
            Role::Director => true,
        };
        if !within_role {
            return Err(SentraError::AmountExceedsRoleLimit);
        }
        if !self.whitelist.contains(target) {
            return Err(SentraError::TargetNotWhitelisted(target.to_hex()));
        }
        if let Some(reserve) = self.reserves.get(token) {
            let after = balance_before.saturating_sub(amount);
            if after < *reserve {
                return Err(SentraError::ReserveViolation { token: token.to_hex() });
            }
        }
        Ok(())
    }
}

// ── TreasuryVault ────────────────────────────────────────────────────────────

/// The external vault surface the core calls into. Implemented elsewhere;
/// the in-memory policy above exists so callers can fail fast before
/// submitting.
#[allow(async_fn_in_trait)]
pub trait TreasuryVault: Send + Sync {
    async fn role_of(&self, who: Address) -> Result<Role, SentraError>;
    async fn is_whitelisted(&self, target: Address) -> Result<bool, SentraError>;
    async fn reserve_requirement(&self, token: Address) -> Result<U256, SentraError>;
    async fn token_balance(&self, token: Address) -> Result<U256, SentraError>;
}
