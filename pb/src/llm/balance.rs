//! Proxy account balance query

use async_trait::async_trait;
use tracing::debug;

use super::LlmError;
use super::transport::Transport;

/// Shown when the balance endpoint omits the field
pub const BALANCE_UNAVAILABLE: &str = "Недоступно";

/// Source of the proxy account balance
#[async_trait]
pub trait BalanceSource: Send + Sync {
    /// Balance as display text
    async fn balance(&self) -> Result<String, LlmError>;
}

/// Balance from the proxy's `GET {balance-url}` endpoint
pub struct ProxyBalance {
    transport: Transport,
    url: String,
}

impl ProxyBalance {
    pub fn new(transport: Transport, url: impl Into<String>) -> Self {
        Self {
            transport,
            url: url.into(),
        }
    }
}

/// Render the `balance` field, number or string
pub fn balance_text(doc: &serde_json::Value) -> String {
    match doc.get("balance") {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => BALANCE_UNAVAILABLE.to_string(),
    }
}

#[async_trait]
impl BalanceSource for ProxyBalance {
    async fn balance(&self) -> Result<String, LlmError> {
        debug!(url = %self.url, "ProxyBalance::balance: called");
        let doc = self.transport.get_json(&self.url).await?;
        Ok(balance_text(&doc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_balance_text() {
        assert_eq!(balance_text(&json!({"balance": 152.5})), "152.5");
        assert_eq!(balance_text(&json!({"balance": "10 RUB"})), "10 RUB");
        assert_eq!(balance_text(&json!({"error": "nope"})), BALANCE_UNAVAILABLE);
        assert_eq!(balance_text(&json!({"balance": null})), BALANCE_UNAVAILABLE);
    }
}
