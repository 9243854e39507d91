//! # Loyalty Ledger
//!
//! Bits balances and tiers for signed-in users.
//!
//! ```text
//! Identity::Guest        ──► no account, balance 0, earns nothing
//! Identity::User("u-1")  ──► stored account, or an empty one (version 0)
//!                             tier = policy.tier_for(lifetime_earned)
//! ```
//! The arithmetic lives in [`LoyaltyPolicy`]; this service only adds the
//! account lookup. Balances change only through settlement.

use std::sync::Arc;

use bits_core::{Identity, LoyaltyAccount, LoyaltyPolicy, Money, Tier};
use bits_db::LoyaltyStore;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct LoyaltyLedger {
    state: Arc<AppState>,
}

impl LoyaltyLedger {
    pub fn new(state: Arc<AppState>) -> Self {
        LoyaltyLedger { state }
    }

    pub fn policy(&self) -> &LoyaltyPolicy {
        self.state.policy()
    }

    /// The account for `identity`. `None` for guests.
    pub async fn account(&self, identity: &Identity) -> ApiResult<Option<LoyaltyAccount>> {
        load_account(&self.state, identity).await
    }

    /// Current tier for `identity`. `None` for guests.
    pub async fn tier(&self, identity: &Identity) -> ApiResult<Option<Tier>> {
        let policy = self.policy();
        Ok(self.account(identity).await?.map(|a| a.tier(policy)))
    }

    pub fn calculate_tier(&self, lifetime_earned: i64) -> Tier {
        self.policy().tier_for(lifetime_earned)
    }

    pub fn calculate_points_earned(&self, qualifying_amount: Money, tier: Tier) -> i64 {
        self.policy().points_earned(qualifying_amount, tier)
    }

    pub fn calculate_max_redemption(&self, balance: i64, payable: Money) -> i64 {
        self.policy().max_redemption(balance, payable)
    }

    pub fn validate_redemption(&self, balance: i64, payable: Money, requested: i64) -> bool {
        self.policy().validate_redemption(balance, payable, requested)
    }

    /// Most Bits `identity` may apply against `payable` right now.
    ///
    /// Read under the identity lock so it never observes a settlement
    /// halfway through.
    pub async fn max_redemption_for(&self, identity: &Identity, payable: Money) -> ApiResult<i64> {
        let _guard = self.state.locks().acquire(&identity.key()).await;
        let balance = self
            .account(identity)
            .await?
            .map(|a| a.balance)
            .unwrap_or(0);
        Ok(self.calculate_max_redemption(balance, payable))
    }
}

/// Account lookup shared with settlement.
pub(crate) async fn load_account(
    state: &AppState,
    identity: &Identity,
) -> ApiResult<Option<LoyaltyAccount>> {
    let Some(user_id) = identity.user_id() else {
        return Ok(None);
    };

    let stored = state
        .retry("get_account", || state.store().get_account(user_id))
        .await?;
    Ok(Some(
        stored.unwrap_or_else(|| LoyaltyAccount::empty(user_id)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorefrontConfig;
    use bits_db::MemoryStore;

    async fn ledger_with(balance: i64, lifetime: i64) -> LoyaltyLedger {
        let store = Arc::new(MemoryStore::new());
        let mut account = LoyaltyAccount::empty("u-1");
        account.balance = balance;
        account.lifetime_earned = lifetime;
        store.save_account(&account).await.unwrap();
        LoyaltyLedger::new(Arc::new(AppState::new(store, StorefrontConfig::default())))
    }

    #[tokio::test]
    async fn test_guest_has_no_account() {
        let ledger = ledger_with(0, 0).await;
        assert!(ledger.account(&Identity::Guest).await.unwrap().is_none());
        assert!(ledger.tier(&Identity::Guest).await.unwrap().is_none());
        assert_eq!(
            ledger
                .max_redemption_for(&Identity::Guest, Money::from_units(95_000))
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_unknown_user_starts_empty() {
        let ledger = ledger_with(0, 0).await;
        let account = ledger
            .account(&Identity::User("u-new".to_string()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(account.balance, 0);
        assert_eq!(account.version, 0);
    }

    #[tokio::test]
    async fn test_max_redemption_caps_at_half_the_payable() {
        let ledger = ledger_with(200_000, 0).await;
        let user = Identity::User("u-1".to_string());
        assert_eq!(
            ledger
                .max_redemption_for(&user, Money::from_units(95_000))
                .await
                .unwrap(),
            47_500
        );
    }

    #[tokio::test]
    async fn test_tier_follows_lifetime_earned() {
        let user = Identity::User("u-1".to_string());
        assert_eq!(ledger_with(0, 5_000).await.tier(&user).await.unwrap(), Some(Tier::Base));
        assert_eq!(ledger_with(0, 5_001).await.tier(&user).await.unwrap(), Some(Tier::Mid));
        assert_eq!(ledger_with(0, 15_001).await.tier(&user).await.unwrap(), Some(Tier::Top));
    }

    #[tokio::test]
    async fn test_pure_calculations_delegate_to_policy() {
        let ledger = ledger_with(0, 0).await;
        assert_eq!(ledger.calculate_points_earned(Money::from_units(95_000), Tier::Base), 950);
        assert_eq!(ledger.calculate_points_earned(Money::from_units(10_000), Tier::Mid), 120);
        assert_eq!(ledger.calculate_tier(15_000), Tier::Mid);
        assert!(ledger.validate_redemption(1_000, Money::from_units(10_000), 1_000));
        assert!(!ledger.validate_redemption(1_000, Money::from_units(1_000), 501));
    }
}
