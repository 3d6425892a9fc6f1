use rand::Rng;
use std::time::Duration;

const MAX_BACKOFF_EXPONENT: u32 = 5;

/// Delay before retry number `attempt` (0-based): `base * 2^attempt`, with the
/// exponent capped, plus up to 10% random jitter.
pub fn retry_backoff(base: Duration, attempt: u32) -> Duration {
    let delay = base * 2u32.pow(attempt.min(MAX_BACKOFF_EXPONENT));
    let jitter_ceiling = (delay.as_millis() as u64 / 10).max(1);
    let jitter = rand::thread_rng().gen_range(0..=jitter_ceiling);
    delay + Duration::from_millis(jitter)
}

/// First `max_chars` characters of `text`, with an ellipsis if anything was cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_is_capped() {
        let base = Duration::from_millis(100);
        for attempt in 0..8 {
            let delay = retry_backoff(base, attempt);
            let floor = base * 2u32.pow(attempt.min(MAX_BACKOFF_EXPONENT));
            assert!(delay >= floor);
            assert!(delay <= floor + floor / 10 + Duration::from_millis(1));
        }
        assert!(retry_backoff(base, 20) <= Duration::from_millis(3200 + 321));
    }

    #[test]
    fn preview_cuts_on_characters() {
        assert_eq!(preview("short", 200), "short");
        assert_eq!(preview("héllo wörld", 5), "héllo...");
    }
}
