//! Deterministic in-memory broker adapter (§6 [ADDED] "Broker trait").
//!
//! Fills market orders immediately at the last price set via [`PaperBrokerAdapter::set_price`]
//! ("fill at bar close, no randomness"); stop/limit orders rest as `Accepted`
//! until a test explicitly resolves them with [`PaperBrokerAdapter::resolve_order`]
//! or a market fill sweeps them via [`PaperBrokerAdapter::cross_price`]. This
//! lets C3's fill-detection tests exercise FILLED, REJECTED, CANCELED, and
//! PARTIALLY_FILLED paths without any network I/O or randomness.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use tcx_core::broker::{Account, Bar, BrokerAdapter, BrokerError, BrokerPosition};
use tcx_core::{Order, OrderStatus, OrderType, Side, SubmitOrderRequest};

#[derive(Debug)]
struct Inner {
    orders: HashMap<String, Order>,
    positions: HashMap<String, BrokerPosition>,
    prices: HashMap<String, i64>,
    clock: DateTime<Utc>,
    account: Account,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            orders: HashMap::new(),
            positions: HashMap::new(),
            prices: HashMap::new(),
            clock: Utc::now(),
            account: Account {
                equity_micros: 100_000 * tcx_core::MICROS_PER_UNIT,
                buying_power_micros: 200_000 * tcx_core::MICROS_PER_UNIT,
                cash_micros: 100_000 * tcx_core::MICROS_PER_UNIT,
                pattern_day_trader: false,
            },
        }
    }
}

/// Deterministic paper broker. `broker_order_id` is always the caller's
/// `client_order_id`, so resubmitting the same logical order (idempotent
/// retries, §8 P7) is a no-op rather than a second order.
#[derive(Default)]
pub struct PaperBrokerAdapter {
    inner: Mutex<Inner>,
}

impl PaperBrokerAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the last-trade price used to fill market orders and answer
    /// `get_latest_trade_price`/`get_latest_bars`.
    pub fn set_price(&self, symbol: &str, price_micros: i64) {
        self.inner.lock().expect("paper broker lock poisoned").prices.insert(symbol.to_string(), price_micros);
    }

    pub fn set_account(&self, account: Account) {
        self.inner.lock().expect("paper broker lock poisoned").account = account;
    }

    pub fn advance_clock(&self, at: DateTime<Utc>) {
        self.inner.lock().expect("paper broker lock poisoned").clock = at;
    }

    /// Seeds a broker-visible position directly, for C4's startup-sync
    /// tests (§4.4.4) that simulate a daemon restart with open positions.
    pub fn seed_position(&self, symbol: &str, qty: i64, avg_entry_price_micros: i64) {
        let mut inner = self.inner.lock().expect("paper broker lock poisoned");
        let current_price = *inner.prices.get(symbol).unwrap_or(&avg_entry_price_micros);
        inner.positions.insert(
            symbol.to_string(),
            BrokerPosition {
                symbol: symbol.to_string(),
                qty,
                avg_entry_price_micros,
                current_price_micros: current_price,
                unrealized_pl_micros: (current_price - avg_entry_price_micros) * qty,
            },
        );
    }

    /// Test hook: force a resting order directly to a terminal or partial
    /// outcome, bypassing the normal market-fill path. Used to exercise
    /// C3's REJECTED/CANCELED/PARTIALLY_FILLED branches deterministically.
    pub fn resolve_order(&self, order_id: &str, status: OrderStatus, filled_qty: i64, fill_price_micros: Option<i64>) {
        let mut inner = self.inner.lock().expect("paper broker lock poisoned");
        let now = inner.clock;
        if let Some(order) = inner.orders.get_mut(order_id) {
            order.status = status;
            order.filled_qty = filled_qty;
            order.filled_avg_price_micros = fill_price_micros;
            if status.is_terminal() {
                order.filled_at = Some(now);
            }
        }
    }

    /// Sweeps every resting stop/limit order for `symbol` whose trigger
    /// price has been crossed by `price_micros`, filling it and applying
    /// the fill to the simulated position. This is the deterministic
    /// substitute for a live exchange matching engine.
    pub fn cross_price(&self, symbol: &str, price_micros: i64) {
        let mut inner = self.inner.lock().expect("paper broker lock poisoned");
        inner.prices.insert(symbol.to_string(), price_micros);
        let now = inner.clock;

        let to_fill: Vec<String> = inner
            .orders
            .values()
            .filter(|o| o.symbol == symbol && o.status.is_active())
            .filter(|o| match o.order_type {
                OrderType::Stop => match o.stop_price_micros {
                    Some(trigger) => {
                        if o.is_buy {
                            price_micros >= trigger
                        } else {
                            price_micros <= trigger
                        }
                    }
                    None => false,
                },
                OrderType::Limit => match o.limit_price_micros {
                    Some(limit) => {
                        if o.is_buy {
                            price_micros <= limit
                        } else {
                            price_micros >= limit
                        }
                    }
                    None => false,
                },
                _ => false,
            })
            .map(|o| o.order_id.clone())
            .collect();

        for order_id in to_fill {
            let (symbol, qty, is_buy) = {
                let o = inner.orders.get(&order_id).expect("just matched above");
                (o.symbol.clone(), o.qty, o.is_buy)
            };
            apply_fill_to_position(&mut inner.positions, &symbol, qty, is_buy, price_micros);
            if let Some(o) = inner.orders.get_mut(&order_id) {
                o.status = OrderStatus::Filled;
                o.filled_qty = qty;
                o.filled_avg_price_micros = Some(price_micros);
                o.filled_at = Some(now);
            }
        }
    }
}

fn apply_fill_to_position(
    positions: &mut HashMap<String, BrokerPosition>,
    symbol: &str,
    qty: i64,
    is_buy: bool,
    price_micros: i64,
) {
    let delta = if is_buy { qty } else { -qty };
    let entry = positions.entry(symbol.to_string()).or_insert(BrokerPosition {
        symbol: symbol.to_string(),
        qty: 0,
        avg_entry_price_micros: price_micros,
        current_price_micros: price_micros,
        unrealized_pl_micros: 0,
    });

    let new_qty = entry.qty + delta;
    if entry.qty == 0 || entry.qty.signum() == delta.signum() {
        // Adding to (or opening) a position: blend the average entry price.
        let total_cost = entry.avg_entry_price_micros * entry.qty.abs() + price_micros * qty;
        let total_qty = entry.qty.abs() + qty;
        if total_qty != 0 {
            entry.avg_entry_price_micros = total_cost / total_qty;
        }
    }
    entry.qty = new_qty;
    entry.current_price_micros = price_micros;
    entry.unrealized_pl_micros = (price_micros - entry.avg_entry_price_micros) * entry.qty;

    if entry.qty == 0 {
        positions.remove(symbol);
    }
}

fn leg_order(parent: &Order, leg: &tcx_core::BracketLeg, idx: usize, now: DateTime<Utc>) -> Order {
    let closes_long = parent.side == Side::Long;
    Order {
        order_id: format!("{}:leg:{idx}", parent.order_id),
        client_order_id: format!("{}:leg:{idx}", parent.client_order_id),
        symbol: parent.symbol.clone(),
        status: OrderStatus::Accepted,
        side: parent.side,
        is_buy: !closes_long,
        qty: parent.qty,
        filled_qty: 0,
        filled_avg_price_micros: None,
        filled_at: Some(now),
        order_type: leg.order_type,
        stop_price_micros: leg.stop_price_micros,
        limit_price_micros: leg.limit_price_micros,
        legs: Vec::new(),
    }
}

#[async_trait]
impl BrokerAdapter for PaperBrokerAdapter {
    async fn get_clock(&self) -> Result<DateTime<Utc>, BrokerError> {
        Ok(self.inner.lock().expect("paper broker lock poisoned").clock)
    }

    async fn get_account(&self) -> Result<Account, BrokerError> {
        Ok(self.inner.lock().expect("paper broker lock poisoned").account.clone())
    }

    async fn list_positions(&self) -> Result<Vec<BrokerPosition>, BrokerError> {
        let inner = self.inner.lock().expect("paper broker lock poisoned");
        let mut out: Vec<BrokerPosition> = inner.positions.values().cloned().collect();
        out.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(out)
    }

    async fn get_position(&self, symbol: &str) -> Result<Option<BrokerPosition>, BrokerError> {
        Ok(self.inner.lock().expect("paper broker lock poisoned").positions.get(symbol).cloned())
    }

    async fn list_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>, BrokerError> {
        let inner = self.inner.lock().expect("paper broker lock poisoned");
        let mut out: Vec<Order> = inner
            .orders
            .values()
            .filter(|o| symbol.is_none_or(|s| o.symbol == s))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.order_id.cmp(&b.order_id));
        Ok(out)
    }

    async fn get_order(&self, order_id: &str) -> Result<Order, BrokerError> {
        self.inner
            .lock()
            .expect("paper broker lock poisoned")
            .orders
            .get(order_id)
            .cloned()
            .ok_or_else(|| BrokerError::NotFound(order_id.to_string()))
    }

    async fn submit_order(&self, request: SubmitOrderRequest) -> Result<Order, BrokerError> {
        let mut inner = self.inner.lock().expect("paper broker lock poisoned");
        let now = inner.clock;

        if let Some(existing) = inner.orders.get(&request.client_order_id) {
            tracing::debug!(client_order_id = %request.client_order_id, "idempotent resubmit, returning existing order");
            return Ok(existing.clone());
        }

        let mut order = Order {
            order_id: request.client_order_id.clone(),
            client_order_id: request.client_order_id.clone(),
            symbol: request.symbol.clone(),
            status: OrderStatus::Accepted,
            side: request.side,
            is_buy: request.is_buy,
            qty: request.qty,
            filled_qty: 0,
            filled_avg_price_micros: None,
            filled_at: None,
            order_type: request.order_type,
            stop_price_micros: request.stop_price_micros,
            limit_price_micros: request.limit_price_micros,
            legs: Vec::new(),
        };

        if request.order_type == OrderType::Market {
            let Some(&price) = inner.prices.get(&request.symbol) else {
                return Err(BrokerError::Rejected(format!("no known price for {}", request.symbol)));
            };
            apply_fill_to_position(&mut inner.positions, &request.symbol, request.qty, request.is_buy, price);
            order.status = OrderStatus::Filled;
            order.filled_qty = request.qty;
            order.filled_avg_price_micros = Some(price);
            order.filled_at = Some(now);

            order.legs = request
                .bracket_legs
                .iter()
                .enumerate()
                .map(|(idx, leg)| leg_order(&order, leg, idx, now))
                .collect();
            for leg in &order.legs {
                inner.orders.insert(leg.order_id.clone(), leg.clone());
            }
        }

        inner.orders.insert(order.order_id.clone(), order.clone());
        Ok(order)
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), BrokerError> {
        let mut inner = self.inner.lock().expect("paper broker lock poisoned");
        let order = inner.orders.get_mut(order_id).ok_or_else(|| BrokerError::NotFound(order_id.to_string()))?;
        if order.status.is_terminal() {
            return Err(BrokerError::AlreadyTerminal);
        }
        order.status = OrderStatus::Canceled;
        Ok(())
    }

    async fn get_latest_bars(&self, symbol: &str, limit: u32) -> Result<Vec<Bar>, BrokerError> {
        let inner = self.inner.lock().expect("paper broker lock poisoned");
        let Some(&price) = inner.prices.get(symbol) else {
            return Ok(Vec::new());
        };
        let now = inner.clock;
        Ok((0..limit.max(1))
            .map(|_| Bar {
                timestamp: now,
                open_micros: price,
                high_micros: price,
                low_micros: price,
                close_micros: price,
                volume: 0,
            })
            .collect())
    }

    async fn get_latest_trade_price(&self, symbol: &str) -> Result<i64, BrokerError> {
        self.inner
            .lock()
            .expect("paper broker lock poisoned")
            .prices
            .get(symbol)
            .copied()
            .ok_or_else(|| BrokerError::NotFound(symbol.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tcx_core::TimeInForce;

    fn market_request(symbol: &str, qty: i64, is_buy: bool) -> SubmitOrderRequest {
        SubmitOrderRequest {
            client_order_id: format!("test-{symbol}-{qty}-{is_buy}"),
            symbol: symbol.to_string(),
            qty,
            side: if is_buy { Side::Long } else { Side::Short },
            is_buy,
            order_type: OrderType::Market,
            tif: TimeInForce::Day,
            limit_price_micros: None,
            stop_price_micros: None,
            bracket_legs: Vec::new(),
        }
    }

    #[tokio::test]
    async fn market_order_fills_immediately_at_set_price() {
        let broker = PaperBrokerAdapter::new();
        broker.set_price("AAPL", 100_000_000);

        let order = broker.submit_order(market_request("AAPL", 10, true)).await.unwrap();
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.filled_avg_price_micros, Some(100_000_000));

        let position = broker.get_position("AAPL").await.unwrap().unwrap();
        assert_eq!(position.qty, 10);
    }

    #[tokio::test]
    async fn market_order_without_known_price_is_rejected() {
        let broker = PaperBrokerAdapter::new();
        let result = broker.submit_order(market_request("MSFT", 5, true)).await;
        assert!(matches!(result, Err(BrokerError::Rejected(_))));
    }

    #[tokio::test]
    async fn resubmitting_same_client_order_id_is_idempotent() {
        let broker = PaperBrokerAdapter::new();
        broker.set_price("AAPL", 100_000_000);
        let a = broker.submit_order(market_request("AAPL", 10, true)).await.unwrap();
        let b = broker.submit_order(market_request("AAPL", 10, true)).await.unwrap();
        assert_eq!(a.order_id, b.order_id);
        let position = broker.get_position("AAPL").await.unwrap().unwrap();
        assert_eq!(position.qty, 10, "second submit must not double the fill");
    }

    #[tokio::test]
    async fn cancel_of_terminal_order_errors() {
        let broker = PaperBrokerAdapter::new();
        broker.set_price("AAPL", 100_000_000);
        let order = broker.submit_order(market_request("AAPL", 10, true)).await.unwrap();
        let result = broker.cancel_order(&order.order_id).await;
        assert!(matches!(result, Err(BrokerError::AlreadyTerminal)));
    }

    #[tokio::test]
    async fn resting_stop_fills_when_price_is_crossed() {
        let broker = PaperBrokerAdapter::new();
        broker.set_price("AAPL", 100_000_000);
        broker.submit_order(market_request("AAPL", 10, true)).await.unwrap();

        let stop_request = SubmitOrderRequest {
            client_order_id: "stop-1".to_string(),
            symbol: "AAPL".to_string(),
            qty: 10,
            side: Side::Long,
            is_buy: false,
            order_type: OrderType::Stop,
            tif: TimeInForce::Gtc,
            limit_price_micros: None,
            stop_price_micros: Some(98_000_000),
            bracket_legs: Vec::new(),
        };
        let stop = broker.submit_order(stop_request).await.unwrap();
        assert_eq!(stop.status, OrderStatus::Accepted);

        broker.cross_price("AAPL", 97_000_000);
        let filled = broker.get_order(&stop.order_id).await.unwrap();
        assert_eq!(filled.status, OrderStatus::Filled);

        let position = broker.get_position("AAPL").await.unwrap();
        assert!(position.is_none(), "stop fill should have flattened the position");
    }
}
