use rust_decimal::prelude::*;

/// Current UTC timestamp in milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Generate a Snowflake-style i64 for use as resource ID.
///
/// Layout (53 bits, fits in JavaScript's Number.MAX_SAFE_INTEGER):
///   - 41 bits: milliseconds since 2024-01-01 UTC (~69 years)
///   - 12 bits: random (4096 values per ms, collision-free at storefront scale)
pub fn snowflake_id() -> i64 {
    use rand::Rng;
    // Custom epoch: 2024-01-01 00:00:00 UTC
    const EPOCH_MS: i64 = 1_704_067_200_000;
    let now = now_millis();
    let ts = (now - EPOCH_MS) & 0x1FF_FFFF_FFFF; // 41 bits
    let rand_bits: i64 = rand::thread_rng().gen_range(0..0x1000); // 12 bits
    (ts << 12) | rand_bits
}

/// Round a monetary amount to 2 decimal places, half-up.
///
/// All price math runs through `Decimal` internally; `f64` only appears at
/// the serialization edge.
pub fn round_money(value: f64) -> f64 {
    Decimal::from_f64(value)
        .unwrap_or(Decimal::ZERO)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snowflake_ids_are_positive_and_distinct() {
        let a = snowflake_id();
        let b = snowflake_id();
        assert!(a > 0);
        assert!(b > 0);
        // Same millisecond collisions are possible but vanishingly rare with
        // 12 random bits; a flaky failure here would indicate a layout bug.
        assert_ne!(a, b);
    }

    #[test]
    fn round_money_is_half_up() {
        assert_eq!(round_money(10.005), 10.01);
        assert_eq!(round_money(10.004), 10.0);
        assert_eq!(round_money(2090.0), 2090.0);
    }
}
