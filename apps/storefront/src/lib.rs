//! # Bits Storefront Library
//!
//! Cart, coupon, loyalty and settlement services for the Bits storefront.
//! Page and component views call these and render what they return.
//!
//! ## Module Organization
//! ```text
//! bits_storefront/
//! ├── lib.rs          ◄─── You are here (Storefront setup)
//! ├── config.rs       ◄─── storefront.toml + BITS_* env
//! ├── error.rs        ◄─── API error type for the views
//! ├── retry.rs        ◄─── Backoff for transient store failures
//! ├── state/
//! │   ├── mod.rs      ◄─── AppState shared by every service
//! │   ├── locks.rs    ◄─── Per-identity locks
//! │   └── cart.rs     ◄─── Cart cache
//! └── services/
//!     ├── cart.rs     ◄─── CartLedger
//!     ├── coupon.rs   ◄─── CouponResolver
//!     ├── loyalty.rs  ◄─── LoyaltyLedger
//!     └── settlement.rs ◄─ OrderSettlement
//! ```
//!
//! ## Startup Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. init_tracing()          RUST_LOG or "info,bits=debug,sqlx=warn"     │
//! │  2. StorefrontConfig::load  defaults → storefront.toml → BITS_* env     │
//! │  3. Storefront::open        SQLite pool + migrations                    │
//! │  4. storefront.cart_session() per browser session                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod retry;
pub mod services;
pub mod state;

use std::sync::Arc;

use bits_db::{Database, Store};
use tracing::info;
use tracing_subscriber::EnvFilter;

pub use config::{ConfigError, StorefrontConfig};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use services::{CartLedger, CouponResolver, LoyaltyLedger, OrderSettlement};
pub use state::AppState;

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` wins over the default filter. Calling it twice is harmless.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,bits=debug,sqlx=warn"));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// The services over one store.
#[derive(Debug, Clone)]
pub struct Storefront {
    state: Arc<AppState>,
    pub coupons: CouponResolver,
    pub loyalty: LoyaltyLedger,
    pub settlement: OrderSettlement,
}

impl Storefront {
    /// Opens the configured SQLite database and builds the services on it.
    pub async fn open(config: StorefrontConfig) -> ApiResult<Self> {
        let db_config = config.db_config();
        info!(path = ?config.database.path, "Opening storefront database");
        let db = Database::new(db_config).await?;
        Ok(Self::with_store(Arc::new(db), config))
    }

    /// Builds the services over any store.
    pub fn with_store(store: Arc<dyn Store>, config: StorefrontConfig) -> Self {
        let state = Arc::new(AppState::new(store, config));
        Storefront {
            coupons: CouponResolver::new(state.clone()),
            loyalty: LoyaltyLedger::new(state.clone()),
            settlement: OrderSettlement::new(state.clone()),
            state,
        }
    }

    /// A new cart ledger, starting on the guest cart.
    ///
    /// One per browser session; sessions share locks and the cart cache.
    pub fn cart_session(&self) -> CartLedger {
        CartLedger::new(self.state.clone())
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }
}
