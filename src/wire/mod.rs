pub mod codec;
pub mod header;
pub mod messages;
pub mod rate_limit;

pub use codec::{Codec, Message, WireStats, WireStatsSnapshot};
pub use header::{Exchange, Header, MsgType, MAX_MESSAGE, MIN_HEADER};
pub use messages::{broker_id, OrderStatus, OrderUpdate, Quote, QuoteLevel, Side, Trade};
pub use rate_limit::{ConnectionRateLimiter, TokenBucket};
