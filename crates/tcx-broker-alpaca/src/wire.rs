//! Alpaca JSON wire shapes and their conversions into `tcx_core` types.
//! Alpaca reports nearly every price as a decimal string, not a JSON
//! number, so every numeric field here is parsed through
//! [`tcx_core::prices::price_to_micros`] rather than deserialized as `f64`
//! directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tcx_core::broker::{BrokerError, BrokerPosition};
use tcx_core::prices::price_to_micros;
use tcx_core::{BracketLeg, Order, OrderStatus, OrderType, Side, SubmitOrderRequest, TimeInForce};

fn parse(raw: &str) -> Result<i64, BrokerError> {
    let value: f64 = raw
        .parse()
        .map_err(|_| BrokerError::Protocol(format!("unparseable alpaca decimal: {raw}")))?;
    price_to_micros(value).map_err(|e| BrokerError::Protocol(e.to_string()))
}

fn parse_opt(raw: &Option<String>) -> Result<Option<i64>, BrokerError> {
    raw.as_deref().map(parse).transpose()
}

#[derive(Deserialize)]
pub struct AlpacaClock {
    pub timestamp: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct AlpacaAccount {
    pub equity: String,
    pub buying_power: String,
    pub cash: String,
    pub pattern_day_trader: bool,
}

#[derive(Deserialize)]
pub struct AlpacaPosition {
    pub symbol: String,
    pub qty: String,
    pub side: String,
    pub avg_entry_price: String,
    pub current_price: String,
    pub unrealized_pl: String,
}

impl TryFrom<AlpacaPosition> for BrokerPosition {
    type Error = BrokerError;

    fn try_from(p: AlpacaPosition) -> Result<Self, Self::Error> {
        let magnitude: i64 = p
            .qty
            .parse()
            .map_err(|_| BrokerError::Protocol(format!("unparseable alpaca qty: {}", p.qty)))?;
        let qty = if p.side == "short" { -magnitude } else { magnitude };
        Ok(BrokerPosition {
            symbol: p.symbol,
            qty,
            avg_entry_price_micros: parse(&p.avg_entry_price)?,
            current_price_micros: parse(&p.current_price)?,
            unrealized_pl_micros: parse(&p.unrealized_pl)?,
        })
    }
}

#[derive(Deserialize)]
pub struct AlpacaOrder {
    pub id: String,
    pub client_order_id: String,
    pub symbol: String,
    pub status: String,
    pub side: String,
    pub qty: String,
    pub filled_qty: String,
    pub filled_avg_price: Option<String>,
    pub filled_at: Option<DateTime<Utc>>,
    #[serde(rename = "type")]
    pub order_type: String,
    pub stop_price: Option<String>,
    pub limit_price: Option<String>,
    #[serde(default)]
    pub legs: Option<Vec<AlpacaOrder>>,
}

fn map_status(raw: &str) -> OrderStatus {
    match raw {
        "new" | "pending_new" | "accepted_for_bidding" | "calculated" => OrderStatus::Accepted,
        "held" | "pending_cancel" | "pending_replace" | "suspended" => OrderStatus::Held,
        "partially_filled" => OrderStatus::PartiallyFilled,
        "filled" | "done_for_day" => OrderStatus::Filled,
        "canceled" | "replaced" => OrderStatus::Canceled,
        "rejected" => OrderStatus::Rejected,
        "expired" => OrderStatus::Expired,
        _ => OrderStatus::Pending,
    }
}

fn map_order_type(raw: &str) -> OrderType {
    match raw {
        "limit" => OrderType::Limit,
        "stop" | "stop_limit" => OrderType::Stop,
        "trailing_stop" => OrderType::TrailingStop,
        _ => OrderType::Market,
    }
}

impl TryFrom<AlpacaOrder> for Order {
    type Error = BrokerError;

    fn try_from(o: AlpacaOrder) -> Result<Self, Self::Error> {
        let qty: i64 = o
            .qty
            .parse()
            .map_err(|_| BrokerError::Protocol(format!("unparseable alpaca order qty: {}", o.qty)))?;
        let filled_qty: i64 = o.filled_qty.parse().map_err(|_| {
            BrokerError::Protocol(format!("unparseable alpaca filled_qty: {}", o.filled_qty))
        })?;
        let is_buy = o.side == "buy";
        let side = if is_buy { Side::Long } else { Side::Short };
        let legs = o
            .legs
            .unwrap_or_default()
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<Order>, BrokerError>>()?;
        Ok(Order {
            order_id: o.id,
            client_order_id: o.client_order_id,
            symbol: o.symbol,
            status: map_status(&o.status),
            side,
            is_buy,
            qty,
            filled_qty,
            filled_avg_price_micros: parse_opt(&o.filled_avg_price)?,
            filled_at: o.filled_at,
            order_type: map_order_type(&o.order_type),
            stop_price_micros: parse_opt(&o.stop_price)?,
            limit_price_micros: parse_opt(&o.limit_price)?,
            legs,
        })
    }
}

#[derive(Deserialize)]
pub struct AlpacaBar {
    pub t: DateTime<Utc>,
    pub o: f64,
    pub h: f64,
    pub l: f64,
    pub c: f64,
    pub v: i64,
}

#[derive(Deserialize)]
pub struct AlpacaBarsResponse {
    #[serde(default)]
    pub bars: Vec<AlpacaBar>,
}

#[derive(Deserialize)]
pub struct AlpacaLatestTradeResponse {
    pub trade: AlpacaTrade,
}

#[derive(Deserialize)]
pub struct AlpacaTrade {
    #[serde(rename = "p")]
    pub price: f64,
}

fn order_type_str(order_type: OrderType) -> &'static str {
    match order_type {
        OrderType::Market => "market",
        OrderType::Limit => "limit",
        OrderType::Stop => "stop",
        OrderType::TrailingStop => "trailing_stop",
    }
}

fn tif_str(tif: TimeInForce) -> &'static str {
    match tif {
        TimeInForce::Day => "day",
        TimeInForce::Gtc => "gtc",
    }
}

#[derive(Serialize)]
struct TakeProfitLeg {
    limit_price: String,
}

#[derive(Serialize)]
struct StopLossLeg {
    stop_price: String,
}

/// Request body for `POST /v2/orders`. A bracket entry carries at most one
/// take-profit leg and one stop-loss leg (Alpaca's `order_class: bracket`
/// contract); anything beyond that is rejected upstream in C5's sizing
/// stage before it ever reaches this adapter.
#[derive(Serialize)]
pub struct SubmitOrderBody {
    symbol: String,
    qty: String,
    side: &'static str,
    #[serde(rename = "type")]
    order_type: &'static str,
    time_in_force: &'static str,
    client_order_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    order_class: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    take_profit: Option<TakeProfitLeg>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_loss: Option<StopLossLeg>,
}

impl From<SubmitOrderRequest> for SubmitOrderBody {
    fn from(req: SubmitOrderRequest) -> Self {
        let (take_profit, stop_loss) = split_bracket_legs(&req.bracket_legs);
        let order_class = if take_profit.is_some() || stop_loss.is_some() {
            Some("bracket")
        } else {
            None
        };
        Self {
            symbol: req.symbol,
            qty: req.qty.to_string(),
            side: if req.is_buy { "buy" } else { "sell" },
            order_type: order_type_str(req.order_type),
            time_in_force: tif_str(req.tif),
            client_order_id: req.client_order_id,
            limit_price: req.limit_price_micros.map(micros_to_decimal_string),
            stop_price: req.stop_price_micros.map(micros_to_decimal_string),
            order_class,
            take_profit,
            stop_loss,
        }
    }
}

fn split_bracket_legs(legs: &[BracketLeg]) -> (Option<TakeProfitLeg>, Option<StopLossLeg>) {
    let mut take_profit = None;
    let mut stop_loss = None;
    for leg in legs {
        match leg.order_type {
            OrderType::Limit => {
                if let Some(price) = leg.limit_price_micros {
                    take_profit = Some(TakeProfitLeg { limit_price: micros_to_decimal_string(price) });
                }
            }
            OrderType::Stop | OrderType::TrailingStop => {
                if let Some(price) = leg.stop_price_micros {
                    stop_loss = Some(StopLossLeg { stop_price: micros_to_decimal_string(price) });
                }
            }
            OrderType::Market => {}
        }
    }
    (take_profit, stop_loss)
}

fn micros_to_decimal_string(micros: i64) -> String {
    format!("{:.2}", tcx_core::prices::micros_to_price(micros))
}
