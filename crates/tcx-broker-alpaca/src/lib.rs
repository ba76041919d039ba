//! Live `BrokerAdapter` over Alpaca's documented trading REST API.
//!
//! Alpaca's SDKs are synchronous; this adapter keeps `reqwest::blocking`
//! rather than introduce a second async HTTP stack, and pairs every
//! blocking call with `tokio::task::block_in_place` so it can be awaited
//! from inside the multi-thread runtime without starving other tasks
//! (§5 "Blocking broker calls").
//!
//! Every method maps Alpaca's wire shapes into `tcx_core::broker` types at
//! the boundary; no Alpaca-specific type is ever returned to a caller.

mod wire;

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use tcx_core::broker::{Account, Bar, BrokerAdapter, BrokerError, BrokerPosition};
use tcx_core::prices::price_to_micros;
use tcx_core::{Order, SubmitOrderRequest};

use wire::{
    AlpacaAccount, AlpacaBar, AlpacaBarsResponse, AlpacaClock, AlpacaLatestTradeResponse,
    AlpacaOrder, AlpacaPosition, SubmitOrderBody,
};

const LIVE_BASE_URL: &str = "https://api.alpaca.markets";
const PAPER_BASE_URL: &str = "https://paper-api.alpaca.markets";
const DATA_BASE_URL: &str = "https://data.alpaca.markets";

/// Trading-REST adapter for a single Alpaca account. `base_url` selects
/// live vs. paper trading; market data always goes through
/// `data.alpaca.markets` regardless (Alpaca does not mirror bars/trades
/// under the paper host).
pub struct AlpacaBrokerAdapter {
    client: Client,
    base_url: String,
    data_base_url: String,
    api_key_id: String,
    api_secret_key: String,
}

impl AlpacaBrokerAdapter {
    pub fn new(base_url: impl Into<String>, api_key_id: impl Into<String>, api_secret_key: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest blocking client builder");
        Self {
            client,
            base_url: base_url.into(),
            data_base_url: DATA_BASE_URL.to_string(),
            api_key_id: api_key_id.into(),
            api_secret_key: api_secret_key.into(),
        }
    }

    pub fn live(api_key_id: impl Into<String>, api_secret_key: impl Into<String>) -> Self {
        Self::new(LIVE_BASE_URL, api_key_id, api_secret_key)
    }

    pub fn paper(api_key_id: impl Into<String>, api_secret_key: impl Into<String>) -> Self {
        Self::new(PAPER_BASE_URL, api_key_id, api_secret_key)
    }

    /// Reads `ALPACA_API_KEY_ID` / `ALPACA_API_SECRET_KEY` and
    /// `ALPACA_BASE_URL` (defaulting to the paper host if unset, so a
    /// missing env var fails safe toward not risking live capital).
    pub fn from_env() -> anyhow::Result<Self> {
        let api_key_id = env::var("ALPACA_API_KEY_ID")
            .map_err(|_| anyhow::anyhow!("ALPACA_API_KEY_ID is not set"))?;
        let api_secret_key = env::var("ALPACA_API_SECRET_KEY")
            .map_err(|_| anyhow::anyhow!("ALPACA_API_SECRET_KEY is not set"))?;
        let base_url = env::var("ALPACA_BASE_URL").unwrap_or_else(|_| PAPER_BASE_URL.to_string());
        Ok(Self::new(base_url, api_key_id, api_secret_key))
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("APCA-API-KEY-ID", &self.api_key_id)
            .header("APCA-API-SECRET-KEY", &self.api_secret_key)
    }

    /// Runs one blocking HTTP round trip on a thread the runtime is
    /// permitted to block, per `block_in_place`'s contract (multi-thread
    /// runtime only).
    fn blocking_call<F>(&self, f: F) -> Result<Response, BrokerError>
    where
        F: FnOnce(&Client) -> reqwest::Result<Response> + Send,
    {
        let client = self.client.clone();
        tokio::task::block_in_place(move || f(&client)).map_err(map_transport_error)
    }

    fn check_status(response: Response) -> Result<Response, BrokerError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let retry_after_ms = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(|secs| secs * 1000);
        let body = response.text().unwrap_or_default();
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BrokerError::Unauthorized,
            StatusCode::NOT_FOUND => BrokerError::NotFound(body),
            StatusCode::TOO_MANY_REQUESTS => BrokerError::RateLimited { retry_after_ms },
            StatusCode::UNPROCESSABLE_ENTITY | StatusCode::CONFLICT => BrokerError::Rejected(body),
            s if s.is_server_error() => BrokerError::Connection(format!("alpaca {s}: {body}")),
            s => BrokerError::Protocol(format!("unexpected alpaca status {s}: {body}")),
        })
    }

    fn get(&self, url: &str) -> Result<Response, BrokerError> {
        let url = url.to_string();
        let response = self.blocking_call(|client| self.authed(client.get(&url)).send())?;
        Self::check_status(response)
    }

    fn json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, BrokerError> {
        response
            .json::<T>()
            .map_err(|e| BrokerError::Protocol(format!("failed to decode alpaca response: {e}")))
    }
}

fn map_transport_error(err: reqwest::Error) -> BrokerError {
    if err.is_timeout() {
        BrokerError::Timeout(10_000)
    } else {
        BrokerError::Connection(err.to_string())
    }
}

fn parse_price(raw: &str) -> Result<i64, BrokerError> {
    let parsed: f64 = raw
        .parse()
        .map_err(|_| BrokerError::Protocol(format!("unparseable alpaca price: {raw}")))?;
    price_to_micros(parsed).map_err(|e| BrokerError::Protocol(e.to_string()))
}

#[async_trait]
impl BrokerAdapter for AlpacaBrokerAdapter {
    async fn get_clock(&self) -> Result<DateTime<Utc>, BrokerError> {
        let response = self.get(&format!("{}/v2/clock", self.base_url))?;
        let clock: AlpacaClock = Self::json(response)?;
        Ok(clock.timestamp)
    }

    async fn get_account(&self) -> Result<Account, BrokerError> {
        let response = self.get(&format!("{}/v2/account", self.base_url))?;
        let account: AlpacaAccount = Self::json(response)?;
        Ok(Account {
            equity_micros: parse_price(&account.equity)?,
            buying_power_micros: parse_price(&account.buying_power)?,
            cash_micros: parse_price(&account.cash)?,
            pattern_day_trader: account.pattern_day_trader,
        })
    }

    async fn list_positions(&self) -> Result<Vec<BrokerPosition>, BrokerError> {
        let response = self.get(&format!("{}/v2/positions", self.base_url))?;
        let positions: Vec<AlpacaPosition> = Self::json(response)?;
        positions.into_iter().map(TryInto::try_into).collect()
    }

    async fn get_position(&self, symbol: &str) -> Result<Option<BrokerPosition>, BrokerError> {
        let url = format!("{}/v2/positions/{symbol}", self.base_url);
        match self.get(&url) {
            Ok(response) => Self::json::<AlpacaPosition>(response)?.try_into().map(Some),
            Err(BrokerError::NotFound(_)) => Ok(None),
            Err(other) => Err(other),
        }
    }

    async fn list_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>, BrokerError> {
        let mut url = format!("{}/v2/orders?status=all&nested=true", self.base_url);
        if let Some(symbol) = symbol {
            url.push_str(&format!("&symbols={symbol}"));
        }
        let response = self.get(&url)?;
        let orders: Vec<AlpacaOrder> = Self::json(response)?;
        orders.into_iter().map(TryInto::try_into).collect()
    }

    async fn get_order(&self, order_id: &str) -> Result<Order, BrokerError> {
        let response = self.get(&format!("{}/v2/orders/{order_id}?nested=true", self.base_url))?;
        Self::json::<AlpacaOrder>(response)?.try_into()
    }

    async fn submit_order(&self, request: SubmitOrderRequest) -> Result<Order, BrokerError> {
        let body = SubmitOrderBody::from(request);
        let url = format!("{}/v2/orders", self.base_url);
        let response = self.blocking_call(|client| self.authed(client.post(&url)).json(&body).send())?;
        let response = Self::check_status(response)?;
        Self::json::<AlpacaOrder>(response)?.try_into()
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), BrokerError> {
        let url = format!("{}/v2/orders/{order_id}", self.base_url);
        let response = self.blocking_call(|client| self.authed(client.delete(&url)).send())?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(BrokerError::AlreadyTerminal);
        }
        Self::check_status(response).map(|_| ())
    }

    async fn get_latest_bars(&self, symbol: &str, limit: u32) -> Result<Vec<Bar>, BrokerError> {
        let url = format!(
            "{}/v2/stocks/{symbol}/bars?timeframe=1Min&limit={limit}&sort=desc",
            self.data_base_url
        );
        let response = self.get(&url)?;
        let decoded: AlpacaBarsResponse = Self::json(response)?;
        decoded.bars.into_iter().map(TryInto::try_into).collect()
    }

    async fn get_latest_trade_price(&self, symbol: &str) -> Result<i64, BrokerError> {
        let url = format!("{}/v2/stocks/{symbol}/trades/latest", self.data_base_url);
        let response = self.get(&url)?;
        let decoded: AlpacaLatestTradeResponse = Self::json(response)?;
        price_to_micros(decoded.trade.price).map_err(|e| BrokerError::Protocol(e.to_string()))
    }
}

impl TryFrom<AlpacaBar> for Bar {
    type Error = BrokerError;

    fn try_from(bar: AlpacaBar) -> Result<Self, Self::Error> {
        Ok(Bar {
            timestamp: bar.t,
            open_micros: price_to_micros(bar.o).map_err(|e| BrokerError::Protocol(e.to_string()))?,
            high_micros: price_to_micros(bar.h).map_err(|e| BrokerError::Protocol(e.to_string()))?,
            low_micros: price_to_micros(bar.l).map_err(|e| BrokerError::Protocol(e.to_string()))?,
            close_micros: price_to_micros(bar.c).map_err(|e| BrokerError::Protocol(e.to_string()))?,
            volume: bar.v,
        })
    }
}
