use serde::Deserialize;

use crate::error::FeedError;
use crate::tick::Tick;

const TRADE_EVENT: &str = "trade";

/// Subset of the exchange trade payload we rely on. Price and quantity
/// arrive as decimal strings.
#[derive(Debug, Deserialize)]
struct TradePayload {
    #[serde(rename = "e")]
    event_type: String,
    #[serde(rename = "T", default)]
    trade_time_ms: Option<u64>,
    #[serde(rename = "p", default)]
    price: Option<String>,
    #[serde(rename = "q", default)]
    quantity: Option<String>,
}

/// Decode one text frame from `symbol`'s stream.
///
/// `Ok(None)` for well-formed non-trade events, `Err(FeedError::Malformed)`
/// for anything that cannot become a tick.
pub fn parse_trade(symbol: &str, frame: &str) -> Result<Option<Tick>, FeedError> {
    let malformed = |reason: String| FeedError::Malformed {
        symbol: symbol.to_string(),
        reason,
    };

    let payload: TradePayload =
        serde_json::from_str(frame).map_err(|err| malformed(err.to_string()))?;
    if payload.event_type != TRADE_EVENT {
        return Ok(None);
    }

    let timestamp_ms = payload
        .trade_time_ms
        .ok_or_else(|| malformed("missing trade time".into()))?;
    let price = decimal_field(payload.price.as_deref(), "price").map_err(&malformed)?;
    let quantity = decimal_field(payload.quantity.as_deref(), "quantity").map_err(&malformed)?;
    if price <= 0.0 {
        return Err(malformed(format!("non-positive price {price}")));
    }
    if quantity < 0.0 {
        return Err(malformed(format!("negative quantity {quantity}")));
    }

    Ok(Some(Tick::new(
        symbol.to_ascii_uppercase(),
        timestamp_ms,
        price,
        quantity,
    )))
}

fn decimal_field(raw: Option<&str>, name: &str) -> Result<f64, String> {
    let raw = raw.ok_or_else(|| format!("missing {name}"))?;
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("unparseable {name} `{raw}`"))?;
    if !value.is_finite() {
        return Err(format!("non-finite {name}"));
    }
    Ok(value)
}
