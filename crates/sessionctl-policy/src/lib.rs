//! Tier policy and deterministic cost calculator.
//!
//! Both are pure functions: no I/O, no shared state, safe to call from any
//! task without synchronization.

use sessionctl_types::TierLimits;

/// Base cost of any session in cents, charged regardless of duration.
pub const BASE_COST_CENTS: i64 = 1;
/// Cents per CPU-second.
pub const CPU_RATE_CENTS_PER_CPU_SEC: i64 = 2;
/// Cents per GB-second of resident memory.
pub const MEM_RATE_CENTS_PER_GB_SEC: i64 = 1;

/// Tier → quota limits. Unknown tiers fall back to `free`.
pub fn limits(tier: &str) -> TierLimits {
    match tier {
        "enterprise" => TierLimits {
            sessions_per_day: -1,
            concurrent_sessions: -1,
            max_duration_sec: 3600,
            memory_mb: 16384,
        },
        "pro" => TierLimits {
            sessions_per_day: 500,
            concurrent_sessions: 25,
            max_duration_sec: 1800,
            memory_mb: 4096,
        },
        "free" => TierLimits {
            sessions_per_day: 10,
            concurrent_sessions: 5,
            max_duration_sec: 300,
            memory_mb: 512,
        },
        "anonymous" => TierLimits {
            sessions_per_day: 3,
            concurrent_sessions: 1,
            max_duration_sec: 60,
            memory_mb: 256,
        },
        _ => limits("free"),
    }
}

/// `true` if `n` represents "unlimited" (negative means unlimited).
pub fn is_unlimited(n: i64) -> bool {
    n < 0
}

/// Deterministic cost in cents.
///
/// `cost = base + floor(cpuSeconds * cpuRate) + floor(memoryGBSeconds * memRate)`,
/// with `cpuSeconds = cpuMillis / 1000` and
/// `memoryGBSeconds = (memoryMB * durationMs / 1000) / 1024`. All intermediate
/// division truncates toward zero, computed in integer arithmetic so the
/// result never depends on floating-point rounding. Zero inputs yield the
/// base cost only.
pub fn cost(duration_ms: u64, cpu_millis: u64, memory_mb: u32) -> i64 {
    let cpu_term = (cpu_millis as i128 * CPU_RATE_CENTS_PER_CPU_SEC as i128) / 1000;

    let mem_numerator = memory_mb as i128 * duration_ms as i128 * MEM_RATE_CENTS_PER_GB_SEC as i128;
    let mem_term = mem_numerator / (1000 * 1024);

    BASE_COST_CENTS + cpu_term as i64 + mem_term as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn unknown_tier_falls_back_to_free() {
        assert_eq!(limits("bogus"), limits("free"));
    }

    #[rstest]
    #[case::free("free", 10, 5)]
    #[case::anonymous("anonymous", 3, 1)]
    #[case::pro("pro", 500, 25)]
    fn known_tier_limits_match_expected_values(
        #[case] tier: &str,
        #[case] sessions_per_day: i64,
        #[case] concurrent_sessions: i64,
    ) {
        let l = limits(tier);
        assert_eq!(l.sessions_per_day, sessions_per_day);
        assert_eq!(l.concurrent_sessions, concurrent_sessions);
    }

    #[test]
    fn enterprise_is_unlimited_on_counts() {
        let l = limits("enterprise");
        assert!(is_unlimited(l.sessions_per_day));
        assert!(is_unlimited(l.concurrent_sessions));
    }

    #[test]
    fn zero_inputs_yield_base_cost_only() {
        assert_eq!(cost(0, 0, 0), BASE_COST_CENTS);
    }

    #[test]
    fn cost_is_deterministic_and_matches_formula() {
        // duration=10s, cpu=5s worth of millis, 256MB memory
        let duration_ms = 10_000;
        let cpu_millis = 5_000;
        let memory_mb = 256;

        let cpu_term = (5_000i128 * CPU_RATE_CENTS_PER_CPU_SEC as i128) / 1000;
        let mem_term = (256i128 * 10_000 * MEM_RATE_CENTS_PER_GB_SEC as i128) / (1000 * 1024);
        let expected = BASE_COST_CENTS + cpu_term as i64 + mem_term as i64;

        assert_eq!(cost(duration_ms, cpu_millis, memory_mb), expected);
    }

    #[test]
    fn reconciliation_cost_is_at_least_base_cost() {
        // durationMs computed elsewhere, placeholder metrics
        // cpuMillisUsed = durationMs, memoryPeakMB = 256.
        let duration_ms: u64 = 42_000;
        let c = cost(duration_ms, duration_ms, 256);
        assert!(c >= BASE_COST_CENTS);
    }
}
