//! Domain Layer - Market Data Model
//!
//! Pure types and rules with no I/O: ticker records and their update
//! semantics, plan tiers, trading sessions, macro indicators,
//! watchlists, and reconnect backoff.

pub mod backoff;
pub mod capability;
pub mod clock;
pub mod economy;
pub mod session;
pub mod ticker;
pub mod watchlist;

pub use capability::{CapabilityTier, PlanCapability};
pub use clock::{Clock, ManualClock, SystemClock};
pub use session::{FeedPhase, SessionState, TradingCalendar};
pub use ticker::{AssetClass, Bar, StreamTick, TickerRecord};
pub use watchlist::Watchlist;
