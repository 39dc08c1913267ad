use futures_util::StreamExt;
use serde_json::json;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};

use super::TradeFrames;
use crate::constants::BINANCE_STREAM_URL;
use crate::error::FeedError;
use crate::logging;

pub fn stream_url(symbol: &str) -> String {
    format!("{BINANCE_STREAM_URL}/{}@trade", symbol.to_ascii_lowercase())
}

/// Open the futures trade stream for one symbol. Control frames are handled
/// by the socket and never surface; the stream ends on close.
pub async fn trade_stream(symbol: &str) -> Result<TradeFrames, FeedError> {
    let url = stream_url(symbol);
    let (socket, _) = connect_async(url.as_str())
        .await
        .map_err(|err| FeedError::Connect {
            url: url.clone(),
            reason: err.to_string(),
        })?;
    logging::info("feed.connect", "Trade stream connected", json!({ "url": url }));

    let symbol = symbol.to_ascii_uppercase();
    let frames = socket
        .take_while(|message| futures_util::future::ready(!matches!(message, Ok(Message::Close(_)))))
        .filter_map(move |message| {
            let symbol = symbol.clone();
            async move {
                match message {
                    Ok(Message::Text(text)) => Some(Ok(text)),
                    Ok(Message::Binary(data)) => Some(String::from_utf8(data).map_err(|err| {
                        FeedError::Malformed {
                            symbol,
                            reason: err.to_string(),
                        }
                    })),
                    Ok(_) => None,
                    Err(err) => Some(Err(FeedError::Stream {
                        symbol,
                        reason: err.to_string(),
                    })),
                }
            }
        });

    Ok(Box::pin(frames))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_url_uses_lowercase_symbol() {
        assert_eq!(
            stream_url("BTCUSDT"),
            "wss://fstream.binance.com/ws/btcusdt@trade"
        );
    }
}
