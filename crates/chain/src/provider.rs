//! Alloy/WebSocket backed [`ChainEndpoint`].
//!
//! HTTP JSON-RPC goes through alloy providers. Push subscriptions use a raw
//! WebSocket so the acknowledgment and every pushed frame are visible to the
//! caller.

use alloy::primitives::Address;
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::{Filter, Log};
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use reqwest::Url;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::contracts::{health_factor_from_wad, IMulticall3, IPool, MULTICALL3};
use crate::endpoint::{ChainEndpoint, LogFilter, RawMessageStream};
use crate::error::{ChainError, Result};
use crate::subscription::{self, DEFAULT_LOG_SUBSCRIPTION};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Endpoint pair (HTTP + WebSocket) for one chain.
#[derive(Debug, Clone)]
pub struct RpcEndpoint {
    /// HTTP URL for calls and historical queries
    http_url: Url,
    /// WebSocket URL for push subscriptions
    ws_url: Url,
    /// Multicall3 address used to batch health factor queries
    multicall: Address,
    /// First `eth_subscribe` parameter for log subscriptions
    log_subscription: String,
}

impl RpcEndpoint {
    /// Create an endpoint from its HTTP and WebSocket URLs.
    pub fn new(http_url: &str, ws_url: &str) -> Result<Self> {
        let parse = |url: &str| -> Result<Url> {
            Url::parse(url).map_err(|e| ChainError::InvalidUrl {
                url: url.to_string(),
                reason: e.to_string(),
            })
        };

        Ok(Self {
            http_url: parse(http_url)?,
            ws_url: parse(ws_url)?,
            multicall: MULTICALL3,
            log_subscription: DEFAULT_LOG_SUBSCRIPTION.to_string(),
        })
    }

    /// Override the Multicall3 address.
    pub fn with_multicall(mut self, multicall: Address) -> Self {
        self.multicall = multicall;
        self
    }

    /// Override the log subscription kind sent in `eth_subscribe`.
    pub fn with_log_subscription(mut self, kind: impl Into<String>) -> Self {
        self.log_subscription = kind.into();
        self
    }

    /// Read the next text frame, answering pings on the way.
    async fn next_text(ws: &mut WsStream) -> Result<String> {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text),
                Some(Ok(Message::Binary(bytes))) => {
                    return Ok(String::from_utf8_lossy(&bytes).into_owned())
                }
                Some(Ok(Message::Ping(payload))) => ws.send(Message::Pong(payload)).await?,
                Some(Ok(Message::Close(frame))) => {
                    debug!(frame = ?frame, "WebSocket close frame received");
                    return Err(ChainError::ConnectionClosed);
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
                None => return Err(ChainError::ConnectionClosed),
            }
        }
    }
}

#[async_trait]
impl ChainEndpoint for RpcEndpoint {
    async fn block_number(&self) -> Result<u64> {
        let provider = ProviderBuilder::new().on_http(self.http_url.clone());
        provider
            .get_block_number()
            .await
            .map_err(|e| ChainError::Transport(e.to_string()))
    }

    async fn health_factors(&self, pool: Address, users: &[Address]) -> Result<Vec<f64>> {
        if users.is_empty() {
            return Ok(Vec::new());
        }

        let provider = ProviderBuilder::new().on_http(self.http_url.clone());
        let multicall = IMulticall3::new(self.multicall, &provider);

        let calls: Vec<IMulticall3::Call3> = users
            .iter()
            .map(|user| IMulticall3::Call3 {
                target: pool,
                allowFailure: false,
                callData: IPool::getUserAccountDataCall { user: *user }.abi_encode().into(),
            })
            .collect();

        let results = multicall
            .aggregate3(calls)
            .call()
            .await
            .map_err(|e| ChainError::Contract(e.to_string()))?
            .returnData;

        if results.len() != users.len() {
            return Err(ChainError::LengthMismatch {
                expected: users.len(),
                got: results.len(),
            });
        }

        let health_factors = results
            .iter()
            .map(|result| {
                IPool::getUserAccountDataCall::abi_decode_returns(&result.returnData, true)
                    .map(|data| health_factor_from_wad(data.healthFactor))
                    .map_err(|e| ChainError::Contract(e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            pool = %pool,
            count = health_factors.len(),
            "Fetched health factors via multicall"
        );

        Ok(health_factors)
    }

    async fn get_logs(&self, filter: LogFilter, from_block: u64, to_block: u64) -> Result<Vec<Log>> {
        let provider = ProviderBuilder::new().on_http(self.http_url.clone());
        let rpc_filter = Filter::new()
            .address(filter.address)
            .event_signature(filter.topic)
            .from_block(from_block)
            .to_block(to_block);

        let logs = provider
            .get_logs(&rpc_filter)
            .await
            .map_err(|e| ChainError::Transport(e.to_string()))?;

        debug!(
            address = %filter.address,
            from_block,
            to_block,
            count = logs.len(),
            "Fetched historical logs"
        );

        Ok(logs)
    }

    async fn subscribe_logs(&self, filter: LogFilter) -> Result<RawMessageStream> {
        info!(
            address = %filter.address,
            ws_url = %self.ws_url,
            "Subscribing to logs"
        );

        let (mut ws, _) = connect_async(self.ws_url.as_str()).await?;

        let request = subscription::log_subscription_request(&self.log_subscription, &filter);
        ws.send(Message::Text(request.to_string())).await?;

        let ack = Self::next_text(&mut ws).await?;
        let subscription_id = subscription::parse_ack(&ack)?;
        info!(
            address = %filter.address,
            subscription = ?subscription_id,
            "Log subscription acknowledged"
        );

        // The socket lives in the stream state so it stays open while consumed.
        // After the first transport error the stream ends.
        let messages = futures::stream::unfold(Some(ws), |state| async move {
            let mut ws = state?;
            match Self::next_text(&mut ws).await {
                Ok(text) => Some((Ok(text), Some(ws))),
                Err(e) => {
                    warn!(error = %e, "Log subscription stream ended");
                    Some((Err(e), None))
                }
            }
        });

        Ok(Box::pin(messages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_parses_urls() {
        let endpoint = RpcEndpoint::new("https://eth.example.org", "wss://eth.example.org/ws").unwrap();
        assert_eq!(endpoint.http_url.host_str(), Some("eth.example.org"));
        assert_eq!(endpoint.ws_url.scheme(), "wss");
    }

    #[test]
    fn test_endpoint_rejects_bad_url() {
        let err = RpcEndpoint::new("not a url", "wss://eth.example.org/ws").unwrap_err();
        assert!(matches!(err, ChainError::InvalidUrl { .. }));
    }

    #[tokio::test]
    #[ignore] // Requires network
    async fn test_block_number() {
        let endpoint = RpcEndpoint::new("https://eth.llamarpc.com", "wss://eth.llamarpc.com").unwrap();
        assert!(endpoint.block_number().await.unwrap() > 0);
    }
}
