//! Account resolution proxy
//!
//! Maps an L1 address to an exchange account index. The lookup is tried as
//! a GET first and repeated as a form POST when the GET fails or finds
//! nothing.

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{IndexerError, Result};

const LOOKUP_PATH: &str = "/api/v1/accountsByL1Address";

#[derive(Debug, Clone)]
pub struct AccountResolver {
    client: reqwest::Client,
    base_url: String,
}

impl AccountResolver {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Resolve `address` to its account index
    pub async fn resolve(&self, address: &str) -> Result<i64> {
        validate_address(address)?;
        let url = format!("{}{}", self.base_url, LOOKUP_PATH);

        match self.lookup_get(&url, address).await {
            Ok(Some(index)) => return Ok(index),
            Ok(None) => debug!(address, "GET lookup returned no account, retrying as POST"),
            Err(e) => warn!(address, error = %e, "GET lookup failed, retrying as POST"),
        }

        self.lookup_post(&url, address)
            .await?
            .ok_or_else(|| IndexerError::AccountNotFound(address.to_string()))
    }

    async fn lookup_get(&self, url: &str, address: &str) -> Result<Option<i64>> {
        let response = self
            .client
            .get(url)
            .query(&[("l1_address", address)])
            .send()
            .await?;
        parse_response(response).await
    }

    async fn lookup_post(&self, url: &str, address: &str) -> Result<Option<i64>> {
        let response = self
            .client
            .post(url)
            .form(&[("l1_address", address)])
            .send()
            .await?;
        parse_response(response).await
    }
}

async fn parse_response(response: reqwest::Response) -> Result<Option<i64>> {
    let status = response.status();
    if !status.is_success() {
        return Err(IndexerError::RestApiError(format!("lookup returned {}", status)));
    }
    let body: Value = response.json().await?;
    Ok(account_index(&body))
}

/// Account index from the first known response shape that carries one
pub fn account_index(body: &Value) -> Option<i64> {
    let nested = ["sub_accounts", "accounts"].iter().find_map(|key| {
        body.get(*key)?
            .as_array()?
            .first()?
            .get("index")
            .and_then(as_index)
    });

    nested.or_else(|| {
        ["account_index", "index"]
            .iter()
            .find_map(|key| body.get(*key).and_then(as_index))
    })
}

fn as_index(value: &Value) -> Option<i64> {
    let index = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    index.filter(|index| *index >= 0)
}

/// `0x` followed by 40 hex digits
pub fn validate_address(address: &str) -> Result<()> {
    let valid = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .is_some_and(|hex| hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()));

    if valid {
        Ok(())
    } else {
        Err(IndexerError::InvalidAddress(address.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_account_index_shapes() {
        assert_eq!(
            account_index(&json!({"sub_accounts": [{"index": 281}, {"index": 5}]})),
            Some(281)
        );
        assert_eq!(account_index(&json!({"accounts": [{"index": "77"}]})), Some(77));
        assert_eq!(account_index(&json!({"account_index": 3})), Some(3));
        assert_eq!(account_index(&json!({"sub_accounts": [], "index": 9})), Some(9));
        assert_eq!(account_index(&json!({"code": 21100, "message": "not found"})), None);
    }

    #[test]
    fn test_validate_address() {
        assert!(validate_address("0x8ba1f109551bD432803012645Ac136ddd64DBA72").is_ok());
        assert!(validate_address("8ba1f109551bD432803012645Ac136ddd64DBA72").is_err());
        assert!(validate_address("0x1234").is_err());
        assert!(validate_address("0xZZa1f109551bD432803012645Ac136ddd64DBA72").is_err());
    }
}
