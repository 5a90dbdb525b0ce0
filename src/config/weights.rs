use std::collections::HashSet;
use serde::{Deserialize, Serialize};
use crate::error::{Error, Result};

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct FiatMember {
    pub code: String,
    pub name: String,
    pub weight: f64,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct CryptoMember {
    pub symbol: String,
    /// Identifier used by the upstream price provider (e.g. "bitcoin").
    pub id: String,
    pub name: String,
    pub weight: f64,
}

/// Basket membership and weights. GDP-weighted fiat, market-cap-weighted crypto.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct WeightTable {
    pub fiat: Vec<FiatMember>,
    pub crypto: Vec<CryptoMember>,
}

impl WeightTable {
    pub fn validate(&self) -> Result<()> {
        if self.fiat.is_empty() {
            return Err(Error::invalid_config("weights.fiat", "basket is empty"));
        }
        if self.crypto.is_empty() {
            return Err(Error::invalid_config("weights.crypto", "basket is empty"));
        }

        let mut seen = HashSet::new();
        for member in &self.fiat {
            let valid_code = member.code.len() == 3
                && member.code.chars().all(|c| c.is_ascii_uppercase());
            if !valid_code {
                return Err(Error::invalid_config(
                    "weights.fiat",
                    format!("'{}' is not a 3-letter currency code", member.code),
                ));
            }
            if !seen.insert(member.code.as_str()) {
                return Err(Error::invalid_config(
                    "weights.fiat",
                    format!("duplicate currency code '{}'", member.code),
                ));
            }
            check_weight("weights.fiat", &member.code, member.weight)?;
        }

        let mut seen = HashSet::new();
        let mut seen_ids = HashSet::new();
        for member in &self.crypto {
            if member.symbol.is_empty() {
                return Err(Error::invalid_config("weights.crypto", "empty symbol"));
            }
            if !seen.insert(member.symbol.as_str()) {
                return Err(Error::invalid_config(
                    "weights.crypto",
                    format!("duplicate symbol '{}'", member.symbol),
                ));
            }
            if !seen_ids.insert(member.id.as_str()) {
                return Err(Error::invalid_config(
                    "weights.crypto",
                    format!("duplicate provider id '{}'", member.id),
                ));
            }
            check_weight("weights.crypto", &member.symbol, member.weight)?;
        }

        check_sum("weights.fiat", self.fiat.iter().map(|m| m.weight).sum())?;
        check_sum("weights.crypto", self.crypto.iter().map(|m| m.weight).sum())?;

        Ok(())
    }

    pub fn fiat_weight(&self, code: &str) -> Option<f64> {
        self.fiat.iter().find(|m| m.code == code).map(|m| m.weight)
    }

    pub fn crypto_weight(&self, symbol: &str) -> Option<f64> {
        self.crypto.iter().find(|m| m.symbol == symbol).map(|m| m.weight)
    }

    pub fn crypto_by_id(&self, id: &str) -> Option<&CryptoMember> {
        self.crypto.iter().find(|m| m.id == id)
    }
}

fn check_weight(field: &str, member: &str, weight: f64) -> Result<()> {
    if !weight.is_finite() || !(0.0..=1.0).contains(&weight) {
        return Err(Error::invalid_config(
            field,
            format!("weight {} for '{}' is outside [0, 1]", weight, member),
        ));
    }
    Ok(())
}

fn check_sum(field: &str, sum: f64) -> Result<()> {
    if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(Error::invalid_config(field, format!("weights sum to {}, expected 1", sum)));
    }
    Ok(())
}

fn fiat(code: &str, name: &str, weight: f64) -> FiatMember {
    FiatMember { code: code.to_string(), name: name.to_string(), weight }
}

fn crypto(symbol: &str, id: &str, name: &str, weight: f64) -> CryptoMember {
    CryptoMember {
        symbol: symbol.to_string(),
        id: id.to_string(),
        name: name.to_string(),
        weight,
    }
}

impl Default for WeightTable {
    fn default() -> Self {
        WeightTable {
            fiat: vec![
                fiat("USD", "US Dollar", 0.30),
                fiat("EUR", "Euro", 0.17),
                fiat("CNY", "Chinese Yuan", 0.15),
                fiat("JPY", "Japanese Yen", 0.06),
                fiat("GBP", "British Pound", 0.05),
                fiat("INR", "Indian Rupee", 0.05),
                fiat("CAD", "Canadian Dollar", 0.03),
                fiat("AUD", "Australian Dollar", 0.025),
                fiat("KRW", "South Korean Won", 0.025),
                fiat("BRL", "Brazilian Real", 0.025),
                fiat("CHF", "Swiss Franc", 0.02),
                fiat("RUB", "Russian Ruble", 0.02),
                fiat("SEK", "Swedish Krona", 0.01),
                fiat("NOK", "Norwegian Krone", 0.01),
                fiat("DKK", "Danish Krone", 0.01),
                fiat("SGD", "Singapore Dollar", 0.01),
                fiat("HKD", "Hong Kong Dollar", 0.01),
                fiat("ZAR", "South African Rand", 0.01),
                fiat("AED", "UAE Dirham", 0.01),
                fiat("NZD", "New Zealand Dollar", 0.005),
            ],
            crypto: vec![
                crypto("BTC", "bitcoin", "Bitcoin", 0.50),
                crypto("ETH", "ethereum", "Ethereum", 0.20),
                crypto("BNB", "binancecoin", "Binance Coin", 0.07),
                crypto("SOL", "solana", "Solana", 0.06),
                crypto("XRP", "ripple", "XRP", 0.05),
                crypto("ADA", "cardano", "Cardano", 0.03),
                crypto("DOGE", "dogecoin", "Dogecoin", 0.03),
                crypto("TON", "the-open-network", "Toncoin", 0.02),
                crypto("AVAX", "avalanche-2", "Avalanche", 0.02),
                crypto("DOT", "polkadot", "Polkadot", 0.02),
            ],
        }
    }
}
