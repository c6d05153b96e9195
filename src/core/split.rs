//! Turns an expense total into per-member splits.
//!
//! Every successful result sums to the expense total to the last minor unit.
//! Leftover cents after flooring are handed out by the largest-remainder
//! method, ties going to the member listed first, so identical inputs always
//! produce identical splits.

use crate::constants::PERCENTAGE_TOLERANCE;
use crate::core::errors::SplitError;
use crate::core::models::{Money, Split, SplitType};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Percentages are converted to integer weights at this resolution
/// (1/10 000 of a percent) before allocation.
const PERCENT_SCALE: f64 = 10_000.0;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SplitRequest {
    Equal { members: Vec<String> },
    Exact { amounts: Vec<(String, Money)> },
    Percentage { percentages: Vec<(String, f64)> },
    Shares { shares: Vec<(String, u32)> },
}

impl SplitRequest {
    pub fn split_type(&self) -> SplitType {
        match self {
            SplitRequest::Equal { .. } => SplitType::Equal,
            SplitRequest::Exact { .. } => SplitType::Exact,
            SplitRequest::Percentage { .. } => SplitType::Percentage,
            SplitRequest::Shares { .. } => SplitType::Shares,
        }
    }

    pub fn member_ids(&self) -> Vec<&str> {
        match self {
            SplitRequest::Equal { members } => members.iter().map(String::as_str).collect(),
            SplitRequest::Exact { amounts } => amounts.iter().map(|(m, _)| m.as_str()).collect(),
            SplitRequest::Percentage { percentages } => percentages.iter().map(|(m, _)| m.as_str()).collect(),
            SplitRequest::Shares { shares } => shares.iter().map(|(m, _)| m.as_str()).collect(),
        }
    }
}

pub struct SplitCalculator;

impl SplitCalculator {
    pub fn calculate(total: Money, request: &SplitRequest) -> Result<Vec<Split>, SplitError> {
        debug!("Calculating {:?} split of {}", request.split_type(), total);
        match request {
            SplitRequest::Equal { members } => Self::equal(total, members),
            SplitRequest::Exact { amounts } => Self::exact(total, amounts),
            SplitRequest::Percentage { percentages } => Self::percentage(total, percentages),
            SplitRequest::Shares { shares } => Self::shares(total, shares),
        }
    }

    pub fn equal(total: Money, members: &[String]) -> Result<Vec<Split>, SplitError> {
        validate_total(total)?;
        validate_members(members.iter().map(String::as_str))?;

        let weights = vec![1u128; members.len()];
        let amounts = allocate(total, &weights);
        Ok(members
            .iter()
            .zip(amounts)
            .map(|(member_id, amount)| Split {
                member_id: member_id.clone(),
                amount,
                percentage: None,
                shares: None,
            })
            .collect())
    }

    /// Validates caller-supplied amounts. Nothing is adjusted: any difference
    /// from the total, even a single cent, is rejected, so stored splits
    /// always add up to the expense amount.
    pub fn exact(total: Money, amounts: &[(String, Money)]) -> Result<Vec<Split>, SplitError> {
        validate_total(total)?;
        validate_members(amounts.iter().map(|(m, _)| m.as_str()))?;

        if let Some((member_id, _)) = amounts.iter().find(|(_, amount)| amount.is_negative()) {
            return Err(SplitError::NegativeAmount(member_id.clone()));
        }

        let actual: Money = amounts.iter().map(|(_, amount)| *amount).sum();
        if actual != total {
            return Err(SplitError::ExactSumMismatch {
                expected: total,
                actual,
                delta: actual - total,
            });
        }

        Ok(amounts
            .iter()
            .map(|(member_id, amount)| Split {
                member_id: member_id.clone(),
                amount: *amount,
                percentage: None,
                shares: None,
            })
            .collect())
    }

    /// Percentages must sum to within 0.1 of 100. The declared percentages are
    /// used as relative weights so the result always covers the full total.
    pub fn percentage(total: Money, percentages: &[(String, f64)]) -> Result<Vec<Split>, SplitError> {
        validate_total(total)?;
        validate_members(percentages.iter().map(|(m, _)| m.as_str()))?;

        if let Some((member_id, _)) = percentages.iter().find(|(_, pct)| !pct.is_finite() || *pct < 0.0) {
            return Err(SplitError::NegativePercentage(member_id.clone()));
        }

        let sum: f64 = percentages.iter().map(|(_, pct)| pct).sum();
        if (sum - 100.0).abs() > PERCENTAGE_TOLERANCE {
            return Err(SplitError::PercentageSumOutOfRange(sum));
        }

        let weights: Vec<u128> = percentages
            .iter()
            .map(|(_, pct)| (pct * PERCENT_SCALE).round() as u128)
            .collect();
        let amounts = allocate(total, &weights);
        Ok(percentages
            .iter()
            .zip(amounts)
            .map(|((member_id, pct), amount)| Split {
                member_id: member_id.clone(),
                amount,
                percentage: Some(*pct),
                shares: None,
            })
            .collect())
    }

    pub fn shares(total: Money, shares: &[(String, u32)]) -> Result<Vec<Split>, SplitError> {
        validate_total(total)?;
        validate_members(shares.iter().map(|(m, _)| m.as_str()))?;

        if let Some((member_id, _)) = shares.iter().find(|(_, count)| *count == 0) {
            return Err(SplitError::NonPositiveShares(member_id.clone()));
        }

        let weights: Vec<u128> = shares.iter().map(|(_, count)| u128::from(*count)).collect();
        let amounts = allocate(total, &weights);
        Ok(shares
            .iter()
            .zip(amounts)
            .map(|((member_id, count), amount)| Split {
                member_id: member_id.clone(),
                amount,
                percentage: None,
                shares: Some(*count),
            })
            .collect())
    }
}

fn validate_total(total: Money) -> Result<(), SplitError> {
    if !total.is_positive() {
        return Err(SplitError::NonPositiveAmount(total));
    }
    Ok(())
}

fn validate_members<'a>(members: impl Iterator<Item = &'a str>) -> Result<(), SplitError> {
    let mut seen = HashSet::new();
    for member_id in members {
        if !seen.insert(member_id) {
            return Err(SplitError::DuplicateMember(member_id.to_string()));
        }
    }
    if seen.is_empty() {
        return Err(SplitError::NoMembers);
    }
    Ok(())
}

/// Largest-remainder allocation of `total` proportionally to `weights`.
/// Caller guarantees a positive total and at least one non-zero weight.
fn allocate(total: Money, weights: &[u128]) -> Vec<Money> {
    let total_cents = total.cents() as u128;
    let weight_sum: u128 = weights.iter().sum();
    if weight_sum == 0 {
        return vec![Money::zero(); weights.len()];
    }

    let mut floors = Vec::with_capacity(weights.len());
    let mut remainders = Vec::with_capacity(weights.len());
    for (index, weight) in weights.iter().enumerate() {
        let quota = total_cents * weight;
        floors.push(quota / weight_sum);
        remainders.push((index, quota % weight_sum));
    }

    // Stable sort keeps input order among equal remainders.
    remainders.sort_by(|a, b| b.1.cmp(&a.1));
    let leftover = total_cents - floors.iter().sum::<u128>();
    for (index, _) in remainders.iter().take(leftover as usize) {
        floors[*index] += 1;
    }

    floors.into_iter().map(|cents| Money::from_cents(cents as i64)).collect()
}
