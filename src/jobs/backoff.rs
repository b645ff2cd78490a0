use rand::Rng;
use std::time::Duration;

/// Exponential backoff with jitter for retried jobs.
pub fn calculate_backoff_delay(attempt: i32, base_delay_secs: u32) -> Duration {
    let attempt = attempt.max(0) as u32;

    // Cap the exponent to prevent overflow (~8.5 hours with a 30s base)
    let capped_attempt = attempt.min(10);

    let base_delay = base_delay_secs.saturating_mul(2_u32.saturating_pow(capped_attempt));

    // ±30% jitter so retries don't herd
    let jitter_factor = rand::thread_rng().gen_range(0.7..1.3);
    let delay_with_jitter = (base_delay as f64 * jitter_factor).round() as u64;

    Duration::from_secs(delay_with_jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_progression() {
        let base_delay = 30;

        let delay0 = calculate_backoff_delay(0, base_delay);
        let delay1 = calculate_backoff_delay(1, base_delay);
        let delay2 = calculate_backoff_delay(2, base_delay);

        assert!(delay0.as_secs() >= 21 && delay0.as_secs() <= 39); // 30s ±30%
        assert!(delay1.as_secs() >= 42 && delay1.as_secs() <= 78); // 60s ±30%
        assert!(delay2.as_secs() >= 84 && delay2.as_secs() <= 156); // 120s ±30%
    }

    #[test]
    fn backoff_is_capped() {
        let delay_high = calculate_backoff_delay(20, 30);
        let delay_capped = calculate_backoff_delay(10, 30);

        // 30 * 2^10 = 30720s, jittered 0.7-1.3
        assert!(delay_high.as_secs() >= 21000 && delay_high.as_secs() <= 40000);
        assert!(delay_capped.as_secs() >= 21000 && delay_capped.as_secs() <= 40000);
    }

    #[test]
    fn negative_attempt_is_treated_as_zero() {
        let delay = calculate_backoff_delay(-5, 30);
        assert!(delay.as_secs() >= 21 && delay.as_secs() <= 39);
    }
}
