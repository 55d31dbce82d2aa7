//! Tier-aware admission control.
//!
//! The enforcer is advisory: it inspects the usage counters the caller supplies and
//! never mutates them. Incrementing usage after a successful upload or call is the
//! caller's job.

use crate::dataset::DatasetMeta;
use crate::error::{FlowprepError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

const MIB: u64 = 1024 * 1024;

/// A caller's service class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Premium,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Premium => "premium",
        }
    }

    pub fn parse_tier(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "free" => Some(Self::Free),
            "premium" => Some(Self::Premium),
            _ => None,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Limits for one tier. `None` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierLimits {
    pub max_file_size: Option<u64>,
    pub max_rows: Option<u64>,
    pub max_datasets_per_month: Option<u64>,
    pub max_calls_per_month: Option<u64>,
}

impl TierLimits {
    pub fn free() -> Self {
        Self {
            max_file_size: Some(50 * MIB),
            max_rows: Some(50_000),
            max_datasets_per_month: Some(10),
            max_calls_per_month: Some(1_000),
        }
    }

    pub fn premium() -> Self {
        Self {
            max_file_size: Some(500 * MIB),
            max_rows: Some(1_000_000),
            max_datasets_per_month: None,
            max_calls_per_month: None,
        }
    }
}

/// The limits table for every tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierLimitsTable {
    #[serde(default = "TierLimits::free")]
    pub free: TierLimits,
    #[serde(default = "TierLimits::premium")]
    pub premium: TierLimits,
}

impl Default for TierLimitsTable {
    fn default() -> Self {
        Self {
            free: TierLimits::free(),
            premium: TierLimits::premium(),
        }
    }
}

impl TierLimitsTable {
    pub fn for_tier(&self, tier: Tier) -> &TierLimits {
        match tier {
            Tier::Free => &self.free,
            Tier::Premium => &self.premium,
        }
    }
}

/// Monthly usage counters, as read from the caller's store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UsageCounters {
    pub datasets_uploaded: u64,
    pub api_calls_made: u64,
}

/// Read-only quota inputs for one caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierPolicy {
    pub tier: Tier,
    pub usage: UsageCounters,
    pub limits: TierLimitsTable,
}

impl TierPolicy {
    pub fn new(tier: Tier, usage: UsageCounters) -> Self {
        Self {
            tier,
            usage,
            limits: TierLimitsTable::default(),
        }
    }

    #[must_use]
    pub fn with_limits(mut self, limits: TierLimitsTable) -> Self {
        self.limits = limits;
        self
    }

    /// Limits that apply to this policy's tier.
    pub fn limits(&self) -> &TierLimits {
        self.limits.for_tier(self.tier)
    }
}

/// A proposed operation.
///
/// `row_count` is only known for tabular input; when it is `None` the row check is
/// skipped. A request without `new_dataset` skips the dataset-count check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QuotaRequest {
    pub file_size: u64,
    pub row_count: Option<u64>,
    pub new_dataset: bool,
}

impl QuotaRequest {
    pub fn dataset_upload(file_size: u64, row_count: Option<u64>) -> Self {
        Self {
            file_size,
            row_count,
            new_dataset: true,
        }
    }

    /// A single API call with no dataset attached.
    pub fn api_call() -> Self {
        Self::default()
    }
}

impl From<&DatasetMeta> for QuotaRequest {
    fn from(meta: &DatasetMeta) -> Self {
        Self::dataset_upload(meta.file_size, Some(meta.row_count))
    }
}

/// Which limit a denial refers to. Checks run in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaCheck {
    FileSize,
    RowCount,
    DatasetCount,
    CallCount,
}

impl QuotaCheck {
    pub const ORDER: [Self; 4] = [
        Self::FileSize,
        Self::RowCount,
        Self::DatasetCount,
        Self::CallCount,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::FileSize => "file_size",
            Self::RowCount => "row_count",
            Self::DatasetCount => "dataset_count",
            Self::CallCount => "call_count",
        }
    }
}

/// Proof that a request passed every check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub tier: Tier,
}

/// Admit or deny `request` under `policy`.
///
/// The first failing check, in [`QuotaCheck::ORDER`], is reported.
///
/// # Errors
///
/// Returns [`FlowprepError::QuotaExceeded`] naming the failing check, the value the
/// request would reach and the tier limit.
pub fn check_quota(policy: &TierPolicy, request: &QuotaRequest) -> Result<Admission> {
    let limits = policy.limits();
    for check in QuotaCheck::ORDER {
        let (requested, limit) = match check {
            QuotaCheck::FileSize => (Some(request.file_size), limits.max_file_size),
            QuotaCheck::RowCount => (request.row_count, limits.max_rows),
            QuotaCheck::DatasetCount => (
                request
                    .new_dataset
                    .then(|| policy.usage.datasets_uploaded.saturating_add(1)),
                limits.max_datasets_per_month,
            ),
            QuotaCheck::CallCount => (
                Some(policy.usage.api_calls_made.saturating_add(1)),
                limits.max_calls_per_month,
            ),
        };
        if let (Some(requested), Some(limit)) = (requested, limit)
            && requested > limit
        {
            tracing::warn!(
                tier = %policy.tier,
                check = check.as_str(),
                requested,
                limit,
                "Quota exceeded"
            );
            return Err(FlowprepError::QuotaExceeded {
                tier: policy.tier,
                check,
                requested,
                limit,
            });
        }
    }
    tracing::debug!(tier = %policy.tier, ?request, "Quota admitted");
    Ok(Admission { tier: policy.tier })
}

/// Used / limit / remaining for one monthly counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSummary {
    pub used: u64,
    pub limit: Option<u64>,
    pub remaining: Option<u64>,
}

impl CounterSummary {
    fn new(used: u64, limit: Option<u64>) -> Self {
        Self {
            used,
            limit,
            remaining: limit.map(|l| l.saturating_sub(used)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub tier: Tier,
    pub datasets: CounterSummary,
    pub api_calls: CounterSummary,
    pub max_file_size: Option<u64>,
    pub max_rows: Option<u64>,
}

pub fn usage_summary(policy: &TierPolicy) -> UsageSummary {
    let limits = policy.limits();
    UsageSummary {
        tier: policy.tier,
        datasets: CounterSummary::new(
            policy.usage.datasets_uploaded,
            limits.max_datasets_per_month,
        ),
        api_calls: CounterSummary::new(
            policy.usage.api_calls_made,
            limits.max_calls_per_month,
        ),
        max_file_size: limits.max_file_size,
        max_rows: limits.max_rows,
    }
}
