mod equity;
mod frequency;
mod market_data;
mod order;
mod order_status;
mod order_type;
mod position;
mod side;
mod trade;

pub use equity::EquityPoint;
pub use frequency::BarFrequency;
pub use market_data::{DataKind, MarketData};
pub use order::{OrderId, OrderInfo};
pub use order_status::OrderStatus;
pub use order_type::OrderType;
pub use position::{PositionInfo, PositionSide};
pub use side::Side;
pub use trade::{ClosedTrade, TradeId, TradeInfo};
