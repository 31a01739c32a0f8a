//! Parser module for upstream feed frames
//!
//! Classifies frames by their declared `type` and turns trade and
//! executed-transaction records into [`FeeEvent`]s. Upstream field names are
//! not stable, so every value is read through an alias list in priority order
//! and coerced to a safe default when it is missing or not a finite number.

use std::str::FromStr;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::fees::FeeEvent;

pub const TYPE_MARKET_STATS: &str = "update/market_stats";
pub const TYPE_TRADE: &str = "update/trade";
pub const TYPE_EXECUTED_TRANSACTION: &str = "update/executed_transaction";
pub const TYPE_TRANSACTION: &str = "update/transaction";

const MARKET_ID_FIELDS: &[&str] = &["market_id", "marketId"];
const MAKER_FEE_FIELDS: &[&str] = &["maker_fee", "makerFee"];
const TAKER_FEE_FIELDS: &[&str] = &["taker_fee", "takerFee"];
const TX_HASH_FIELDS: &[&str] = &["tx_hash", "hash"];
const EVENT_INFO_FIELDS: &[&str] = &["event_info", "info"];

/// Sentinel market id for records that do not name a market
pub const UNKNOWN_MARKET: i64 = -1;

/// A frame from the upstream feed, classified by its `type` field
#[derive(Debug, Clone)]
pub enum FeedFrame {
    /// Market stats update; the whole frame is kept for market discovery
    MarketStats(Value),
    Trades(Vec<Value>),
    ExecutedTransactions(Vec<Value>),
    /// Plain transaction updates are only counted
    Transactions(usize),
    Other,
}

/// Parsed `{type, ...payload}` envelope
#[derive(Debug, Clone)]
pub struct Envelope {
    pub kind: String,
    pub frame: FeedFrame,
}

impl Envelope {
    /// Parse a raw text frame. Anything that is not a JSON object with a
    /// string `type` yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(raw).ok()?;
        let kind = value.get("type")?.as_str()?.to_string();

        let frame = match kind.as_str() {
            TYPE_MARKET_STATS => FeedFrame::MarketStats(value),
            TYPE_TRADE => FeedFrame::Trades(take_array(value, "trades")),
            TYPE_EXECUTED_TRANSACTION => FeedFrame::ExecutedTransactions(take_array(value, "txs")),
            TYPE_TRANSACTION => FeedFrame::Transactions(
                value
                    .get("txs")
                    .and_then(Value::as_array)
                    .map_or(0, Vec::len),
            ),
            _ => FeedFrame::Other,
        };

        Some(Self { kind, frame })
    }
}

fn take_array(mut value: Value, key: &str) -> Vec<Value> {
    match value.get_mut(key).map(Value::take) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

/// Raw maker/taker fees before scaling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawFees {
    pub maker: Decimal,
    pub taker: Decimal,
}

impl RawFees {
    fn read(obj: &Value) -> Self {
        Self {
            maker: raw_amount(field(obj, MAKER_FEE_FIELDS)),
            taker: raw_amount(field(obj, TAKER_FEE_FIELDS)),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.maker.is_zero() && self.taker.is_zero()
    }

    /// Scaled `(maker, taker, total)`, or `None` when the raw amounts or
    /// their quotients fall outside the decimal range
    fn scale(&self, divisor: Decimal) -> Option<(Decimal, Decimal, Decimal)> {
        let total = self.maker.checked_add(self.taker)?.checked_div(divisor)?;
        Some((
            self.maker.checked_div(divisor)?,
            self.taker.checked_div(divisor)?,
            total,
        ))
    }
}

/// A record whose fees vanish after scaling carries no fee
fn has_fee(event: &FeeEvent) -> bool {
    !(event.maker_fee.is_zero() && event.taker_fee.is_zero())
}

/// Build a fee event from a trade record, or `None` when it carries no fee
/// or its amounts cannot be represented
pub fn fee_event_from_trade(trade: &Value, divisor: Decimal, now_ms: i64) -> Option<FeeEvent> {
    let fees = RawFees::read(trade);
    if fees.is_zero() {
        return None;
    }
    map_trade(trade, fees, divisor, now_ms).filter(has_fee)
}

/// Trade mapping without the zero-fee filter, used to rebuild the
/// zero-inclusive view from raw samples
pub fn trade_to_fee_event(trade: &Value, divisor: Decimal, now_ms: i64) -> Option<FeeEvent> {
    map_trade(trade, RawFees::read(trade), divisor, now_ms)
}

fn map_trade(trade: &Value, fees: RawFees, divisor: Decimal, now_ms: i64) -> Option<FeeEvent> {
    let (maker_fee, taker_fee, total) = fees.scale(divisor)?;

    let timestamp = integer(trade.get("timestamp"))
        .filter(|secs| *secs > 0)
        .and_then(|secs| secs.checked_mul(1000))
        .unwrap_or(now_ms);

    Some(FeeEvent {
        timestamp,
        maker_fee,
        taker_fee,
        total,
        market_id: market_id(trade).unwrap_or(UNKNOWN_MARKET),
        tx_hash: text(field(trade, TX_HASH_FIELDS)).unwrap_or_default(),
        trade_id: text(trade.get("trade_id")),
    })
}

/// Build a fee event from an executed-transaction record whose fee payload
/// is embedded as a JSON string
pub fn fee_event_from_executed_tx(tx: &Value, divisor: Decimal, now_ms: i64) -> Option<FeeEvent> {
    let info = embedded_event_info(tx);
    let fees = RawFees::read(&info);
    if fees.is_zero() {
        return None;
    }

    let (maker_fee, taker_fee, total) = fees.scale(divisor)?;
    let timestamp = integer(tx.get("executed_at"))
        .filter(|ms| *ms > 0)
        .unwrap_or(now_ms);

    Some(FeeEvent {
        timestamp,
        maker_fee,
        taker_fee,
        total,
        market_id: market_id(&info).unwrap_or(UNKNOWN_MARKET),
        tx_hash: text(field(tx, &["hash", "tx_hash"])).unwrap_or_default(),
        trade_id: None,
    })
    .filter(has_fee)
}

/// First alias holding a parseable JSON object wins; empty object otherwise
fn embedded_event_info(tx: &Value) -> Value {
    EVENT_INFO_FIELDS
        .iter()
        .filter_map(|name| tx.get(*name))
        .find_map(|raw| match raw {
            Value::String(s) => match serde_json::from_str::<Value>(s) {
                Ok(parsed @ Value::Object(_)) => Some(parsed),
                _ => None,
            },
            Value::Object(_) => Some(raw.clone()),
            _ => None,
        })
        .unwrap_or_else(|| Value::Object(Map::new()))
}

/// Market ids announced by a market stats frame.
///
/// Accepts a single `market_stats` object, a `market_stats` map keyed by
/// market, or an id at the top level of the frame.
pub fn discovered_market_ids(frame: &Value) -> Vec<i64> {
    match frame.get("market_stats") {
        Some(stats @ Value::Object(map)) => {
            if let Some(id) = market_id(stats) {
                return vec![id];
            }
            map.iter()
                .filter_map(|(key, entry)| {
                    market_id(entry).or_else(|| key.parse::<i64>().ok().filter(|id| *id >= 0))
                })
                .collect()
        }
        Some(Value::Array(entries)) => entries.iter().filter_map(market_id).collect(),
        _ => market_id(frame).into_iter().collect(),
    }
}

/// Non-negative integral market id under any known alias
pub fn market_id(obj: &Value) -> Option<i64> {
    integer(field(obj, MARKET_ID_FIELDS)).filter(|id| *id >= 0)
}

/// First present, non-null field among `names`
fn field<'a>(obj: &'a Value, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| obj.get(*name))
        .find(|v| !v.is_null())
}

/// Raw fee amount; missing, unparsable or non-finite input is zero
fn raw_amount(value: Option<&Value>) -> Decimal {
    let parsed = match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Decimal::from)
            .or_else(|| n.as_u64().map(Decimal::from))
            .or_else(|| n.as_f64().and_then(Decimal::from_f64)),
        Some(Value::String(s)) => {
            let s = s.trim();
            Decimal::from_str(s).ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .and_then(Decimal::from_f64)
            })
        }
        _ => None,
    };
    parsed.unwrap_or(Decimal::ZERO)
}

/// Integral value from a number or numeric string
fn integer(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                    .map(|f| f as i64)
            })
        }
        _ => None,
    }
}

fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
