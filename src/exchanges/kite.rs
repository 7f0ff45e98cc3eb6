//! Kite Connect gateway - NSE equities over the Kite REST API

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use tracing::debug;

use crate::core::{Error, Gateway, OrderId, Result, Side, Symbol, config::KiteConfig};

/// Kite Connect adapter
pub struct KiteGateway {
    name: String,
    base_url: String,
    exchange: String,
    product: String,
    client: reqwest::Client,
}

impl KiteGateway {
    pub fn new(cfg: &KiteConfig, api_key: &str, access_token: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("X-Kite-Version", HeaderValue::from_static("3"));
        let auth = HeaderValue::from_str(&format!("token {}:{}", api_key, access_token))
            .map_err(|e| Error::Config(format!("Invalid Kite credentials: {}", e)))?;
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            name: "kite".to_string(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            exchange: cfg.exchange.clone(),
            product: cfg.product.clone(),
            client,
        })
    }

    /// `EXCHANGE:SYMBOL`, the key Kite uses for quotes.
    fn instrument(&self, symbol: &Symbol) -> String {
        format!("{}:{}", self.exchange, symbol)
    }
}

#[async_trait]
impl Gateway for KiteGateway {
    async fn available_balance(&self) -> Result<Decimal> {
        let url = format!("{}/user/margins/equity", self.base_url);
        let body = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Gateway(e.to_string()))?
            .text()
            .await
            .map_err(|e| Error::Gateway(e.to_string()))?;

        parse_margins(&body)
    }

    async fn last_price(&self, symbol: &Symbol) -> Result<Decimal> {
        let instrument = self.instrument(symbol);
        let url = format!("{}/quote/ltp", self.base_url);
        let body = self
            .client
            .get(&url)
            .query(&[("i", instrument.as_str())])
            .send()
            .await
            .map_err(|e| Error::Gateway(e.to_string()))?
            .text()
            .await
            .map_err(|e| Error::Gateway(e.to_string()))?;

        parse_ltp(&body, &instrument)
    }

    async fn place_order(&self, symbol: &Symbol, quantity: u64, side: Side) -> Result<OrderId> {
        let url = format!("{}/orders/regular", self.base_url);
        let quantity = quantity.to_string();
        let form = [
            ("tradingsymbol", symbol.as_str()),
            ("exchange", self.exchange.as_str()),
            ("transaction_type", side.as_str()),
            ("order_type", "MARKET"),
            ("quantity", quantity.as_str()),
            ("product", self.product.as_str()),
            ("validity", "DAY"),
        ];
        debug!(%symbol, %side, qty = %quantity, "POST /orders/regular");

        let body = self
            .client
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(|e| Error::Order(e.to_string()))?
            .text()
            .await
            .map_err(|e| Error::Order(e.to_string()))?;

        parse_order(&body)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// `{"status": "success", "data": ...}` or `{"status": "error", "message": ...}`
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: String,
    data: Option<T>,
    message: Option<String>,
    error_type: Option<String>,
}

fn unwrap_envelope<T: DeserializeOwned>(body: &str, err: fn(String) -> Error) -> Result<T> {
    let env: Envelope<T> = serde_json::from_str(body)
        .map_err(|e| err(format!("unexpected response ({}): {}", e, truncate(body))))?;

    if env.status != "success" {
        return Err(err(format!(
            "{}: {}",
            env.error_type.as_deref().unwrap_or("Error"),
            env.message.as_deref().unwrap_or("no message")
        )));
    }
    env.data
        .ok_or_else(|| err("success response without data".to_string()))
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(200) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[derive(Debug, Deserialize)]
struct Margins {
    net: Decimal,
}

#[derive(Debug, Deserialize)]
struct Ltp {
    last_price: Decimal,
}

#[derive(Debug, Deserialize)]
struct PlacedOrder {
    order_id: String,
}

pub(crate) fn parse_margins(body: &str) -> Result<Decimal> {
    unwrap_envelope::<Margins>(body, Error::Gateway).map(|m| m.net)
}

pub(crate) fn parse_ltp(body: &str, instrument: &str) -> Result<Decimal> {
    let mut quotes = unwrap_envelope::<HashMap<String, Ltp>>(body, Error::Gateway)?;
    quotes
        .remove(instrument)
        .map(|q| q.last_price)
        .ok_or_else(|| Error::Gateway(format!("no quote returned for {}", instrument)))
}

pub(crate) fn parse_order(body: &str) -> Result<OrderId> {
    unwrap_envelope::<PlacedOrder>(body, Error::Order).map(|o| OrderId::new(o.order_id))
}
