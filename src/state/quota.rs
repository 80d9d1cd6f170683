/// Byte budgets per account tier, and the eviction that enforces them
///
/// `total_size` is the single measure of history usage: the eviction loop
/// and the usage report both go through it, so they can never disagree.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::data::{AccountTier, ProcessingRecord};

pub const MIB: u64 = 1024 * 1024;

/// Maximum total history footprint for each account tier
///
/// One field per tier: a tier without a budget does not compile.
/// No ordering between tiers is assumed or enforced.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct QuotaPolicy {
    pub none: u64,
    pub vip: u64,
    pub ssvip: u64,
    pub ultra_infinity: u64,
    pub lifetime: u64,
    pub moderator: u64,
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self {
            none: 2 * MIB,
            vip: 10 * MIB,
            ssvip: 30 * MIB,
            ultra_infinity: 100 * MIB,
            lifetime: 500 * MIB,
            moderator: 500 * MIB,
        }
    }
}

impl QuotaPolicy {
    /// Same budget for every tier
    pub fn uniform(bytes: u64) -> Self {
        assert!(bytes > 0, "budget must be positive");
        Self {
            none: bytes,
            vip: bytes,
            ssvip: bytes,
            ultra_infinity: bytes,
            lifetime: bytes,
            moderator: bytes,
        }
    }

    pub fn budget_for(&self, tier: AccountTier) -> u64 {
        match tier {
            AccountTier::None => self.none,
            AccountTier::Vip => self.vip,
            AccountTier::Ssvip => self.ssvip,
            AccountTier::UltraInfinity => self.ultra_infinity,
            AccountTier::Lifetime => self.lifetime,
            AccountTier::Moderator => self.moderator,
        }
    }

    /// Override the budget of one tier
    pub fn with_budget(mut self, tier: AccountTier, bytes: u64) -> Self {
        assert!(bytes > 0, "budget for {tier} must be positive");
        let slot = match tier {
            AccountTier::None => &mut self.none,
            AccountTier::Vip => &mut self.vip,
            AccountTier::Ssvip => &mut self.ssvip,
            AccountTier::UltraInfinity => &mut self.ultra_infinity,
            AccountTier::Lifetime => &mut self.lifetime,
            AccountTier::Moderator => &mut self.moderator,
        };
        *slot = bytes;
        self
    }
}

/// Sum of `size_bytes` over all records, saturating on absurd stored sizes
pub fn total_size(records: &[ProcessingRecord]) -> u64 {
    records
        .iter()
        .map(ProcessingRecord::size_bytes)
        .fold(0, u64::saturating_add)
}

/// Drop records from the tail (oldest) until the total fits `budget`
///
/// Never evicts the last remaining record: a single record larger than the
/// whole budget is kept. Returns the evicted records, newest first.
pub fn evict_oldest(records: &mut Vec<ProcessingRecord>, budget: u64) -> Vec<ProcessingRecord> {
    let mut total = total_size(records);
    let mut keep = records.len();

    while total > budget && keep > 1 {
        keep -= 1;
        total = total.saturating_sub(records[keep].size_bytes());
    }

    let evicted = records.split_off(keep);
    if !evicted.is_empty() {
        debug!(
            evicted = evicted.len(),
            freed = total_size(&evicted),
            remaining = total,
            budget,
            "evicted oldest history records"
        );
    }
    evicted
}

/// How full the history is, as shown next to the history list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageUsage {
    pub used: u64,
    pub budget: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageLevel {
    Healthy,
    Warning,
    Critical,
}

impl StorageUsage {
    pub fn new(records: &[ProcessingRecord], budget: u64) -> Self {
        Self {
            used: total_size(records),
            budget,
        }
    }

    /// Percentage of the budget in use, capped at 100
    pub fn percent(&self) -> f64 {
        if self.budget == 0 {
            return 100.0;
        }
        (self.used as f64 / self.budget as f64 * 100.0).min(100.0)
    }

    pub fn level(&self) -> UsageLevel {
        let percent = self.percent();
        if percent > 90.0 {
            UsageLevel::Critical
        } else if percent > 70.0 {
            UsageLevel::Warning
        } else {
            UsageLevel::Healthy
        }
    }

    pub fn is_over_budget(&self) -> bool {
        self.used > self.budget
    }
}

impl std::fmt::Display for StorageUsage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:.2} MB / {:.2} MB ({:.0}%)",
            self.used as f64 / MIB as f64,
            self.budget as f64 / MIB as f64,
            self.percent()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::data::fixtures::record_of_size;

    /// Newest first, as the store keeps them
    fn newest_first(sizes: &[u64]) -> Vec<ProcessingRecord> {
        sizes.iter().rev().map(|&s| record_of_size(s)).collect()
    }

    #[test]
    fn test_default_table() {
        let policy = QuotaPolicy::default();
        assert_eq!(policy.budget_for(AccountTier::None), 2 * MIB);
        assert_eq!(policy.budget_for(AccountTier::Vip), 10 * MIB);
        assert_eq!(policy.budget_for(AccountTier::Ssvip), 30 * MIB);
        assert_eq!(policy.budget_for(AccountTier::UltraInfinity), 100 * MIB);
        assert_eq!(policy.budget_for(AccountTier::Lifetime), 500 * MIB);
        assert_eq!(policy.budget_for(AccountTier::Moderator), 500 * MIB);
    }

    #[test]
    fn test_every_tier_has_positive_budget() {
        let policy = QuotaPolicy::default();
        for tier in AccountTier::ALL {
            assert!(policy.budget_for(tier) > 0, "{tier} has no budget");
        }
    }

    #[test]
    fn test_with_budget_breaks_monotonicity() {
        let policy = QuotaPolicy::default().with_budget(AccountTier::Moderator, 1024);
        assert_eq!(policy.budget_for(AccountTier::Moderator), 1024);
        assert!(policy.budget_for(AccountTier::Moderator) < policy.budget_for(AccountTier::None));
    }

    #[test]
    #[should_panic]
    fn test_zero_budget_is_rejected() {
        let _ = QuotaPolicy::default().with_budget(AccountTier::Vip, 0);
    }

    #[test]
    #[should_panic]
    fn test_uniform_zero_budget_is_rejected() {
        let _ = QuotaPolicy::uniform(0);
    }

    #[test]
    fn test_total_size_saturates() {
        let blob = format!(
            r#"[{{"id":"a","timestamp":2,"originalImage":{{"previewUrl":"","base64":"","mimeType":""}},"resultImage":"","prompt":"","resolution":"480p","sizeBytes":{max}}},
               {{"id":"b","timestamp":1,"originalImage":{{"previewUrl":"","base64":"","mimeType":""}},"resultImage":"","prompt":"","resolution":"480p","sizeBytes":{max}}}]"#,
            max = u64::MAX
        );
        let mut records: Vec<ProcessingRecord> = serde_json::from_str(&blob).unwrap();
        assert_eq!(total_size(&records), u64::MAX);

        let evicted = evict_oldest(&mut records, MIB);
        assert_eq!(evicted.len(), 1);
        assert_eq!(records[0].id(), "a");
    }

    #[test]
    fn test_evicts_oldest_first() {
        // inserted oldest-first: 4M, 4M, 4M
        let mut records = newest_first(&[4_000_000, 4_000_000, 4_000_000]);
        let newest_ids: Vec<String> = records[..2].iter().map(|r| r.id().to_string()).collect();

        let evicted = evict_oldest(&mut records, 10_000_000);

        assert_eq!(evicted.len(), 1);
        assert_eq!(total_size(&records), 8_000_000);
        let kept: Vec<String> = records.iter().map(|r| r.id().to_string()).collect();
        assert_eq!(kept, newest_ids);
    }

    #[test]
    fn test_single_oversized_record_is_kept() {
        let mut records = newest_first(&[5_000_000]);
        let evicted = evict_oldest(&mut records, 2_000_000);

        assert!(evicted.is_empty());
        assert_eq!(records.len(), 1);
        assert_eq!(total_size(&records), 5_000_000);
    }

    #[test]
    fn test_no_eviction_under_budget() {
        let mut records = newest_first(&[1_000, 2_000, 3_000]);
        assert!(evict_oldest(&mut records, 6_000).is_empty());
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn test_empty_collection() {
        let mut records = Vec::new();
        assert!(evict_oldest(&mut records, 0).is_empty());
        assert_eq!(total_size(&records), 0);
    }

    #[test]
    fn test_usage_levels() {
        let usage = |used| StorageUsage { used, budget: 100 };
        assert_eq!(usage(50).level(), UsageLevel::Healthy);
        assert_eq!(usage(71).level(), UsageLevel::Warning);
        assert_eq!(usage(95).level(), UsageLevel::Critical);
        assert_eq!(usage(250).percent(), 100.0);
        assert!(usage(250).is_over_budget());
    }

    #[test]
    fn test_usage_display() {
        let usage = StorageUsage {
            used: MIB,
            budget: 2 * MIB,
        };
        assert_eq!(usage.to_string(), "1.00 MB / 2.00 MB (50%)");
    }
}
