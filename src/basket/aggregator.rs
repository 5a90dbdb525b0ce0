use crate::basket::{BasketAggregate, BasketKind, BasketReport, MemberReport};
use crate::config::EngineConfig;
use crate::config::weights::WeightTable;
use crate::error::{Error, Result};
use crate::rate_source::RateSnapshot;

/// Turns a rate snapshot into the two raw basket values.
pub struct BasketAggregator {
    coverage_threshold: f64,
    renormalize: bool,
}

impl BasketAggregator {
    pub fn new(coverage_threshold: f64, renormalize: bool) -> Self {
        BasketAggregator {
            coverage_threshold,
            renormalize,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.coverage_threshold, config.renormalize)
    }

    pub fn aggregate(&self, snapshot: &RateSnapshot, weights: &WeightTable) -> Result<BasketAggregate> {
        // Step 1: Fiat basket, USD value per unit
        let fiat_members = weights.fiat.iter()
            .map(|m| MemberReport {
                code: m.code.clone(),
                name: m.name.clone(),
                provider_id: None,
                value: snapshot.fiat_rate(&m.code),
                market_cap: None,
                weight: m.weight,
                included: false,
            })
            .collect();
        let fiat = self.aggregate_basket(BasketKind::Fiat, fiat_members)?;

        // Step 2: Crypto basket, USD spot price
        let crypto_members = weights.crypto.iter()
            .map(|m| {
                let quote = snapshot.crypto_quote(&m.symbol);
                MemberReport {
                    code: m.symbol.clone(),
                    name: m.name.clone(),
                    provider_id: Some(m.id.clone()),
                    value: quote.map(|q| q.price_usd),
                    market_cap: quote.and_then(|q| q.market_cap_usd),
                    weight: m.weight,
                    included: false,
                }
            })
            .collect();
        let crypto = self.aggregate_basket(BasketKind::Crypto, crypto_members)?;

        Ok(BasketAggregate {
            wf_raw: fiat.value,
            wc_raw: crypto.value,
            fiat,
            crypto,
        })
    }

    fn aggregate_basket(&self, kind: BasketKind, mut members: Vec<MemberReport>) -> Result<BasketReport> {
        let configured_weight: f64 = members.iter().map(|m| m.weight).sum();

        let mut weighted_sum = 0.0;
        let mut included_weight = 0.0;
        for member in members.iter_mut() {
            if let Some(value) = member.value {
                weighted_sum += value * member.weight;
                included_weight += member.weight;
                member.included = true;
            }
        }

        let coverage = if configured_weight > 0.0 {
            included_weight / configured_weight
        } else {
            0.0
        };

        if included_weight <= 0.0 || coverage < self.coverage_threshold {
            return Err(Error::InsufficientCoverage {
                basket: kind,
                coverage,
                threshold: self.coverage_threshold,
            });
        }

        let value = if self.renormalize {
            weighted_sum / included_weight
        } else {
            weighted_sum
        };

        Ok(BasketReport {
            kind,
            value,
            included_weight,
            configured_weight,
            coverage,
            members,
        })
    }
}
