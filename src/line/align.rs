//! Rotational latency.
//!
//! A delay line can only deliver the word currently at its head. Reaching
//! any other word means pulsing until it comes round; these functions say
//! how long that takes.

/// Whole words that must pass the head before `target` arrives, starting
/// with `current` at the head.
///
/// Both positions are reduced modulo `words`, so the result is always less
/// than one revolution.
#[inline]
pub fn wait_words(current: usize, target: usize, words: usize) -> usize {
    debug_assert!(words > 0);
    let current = current % words;
    let target = target % words;
    (target + words - current) % words
}

/// Pulses to issue before `target` is at the head.
#[inline]
pub fn wait_pulses(current: usize, target: usize, words: usize, word_size: usize) -> usize {
    wait_words(current, target, words) * word_size
}

/// Clock position after waiting for `target` and transferring it.
#[inline]
pub fn clock_after_transfer(target: usize, words: usize) -> usize {
    (target + 1) % words
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_already_aligned() {
        assert_eq!(wait_words(5, 5, 16), 0);
        assert_eq!(wait_pulses(5, 5, 16, 40), 0);
    }

    #[test]
    fn test_wraps_around() {
        assert_eq!(wait_words(14, 2, 16), 4);
        assert_eq!(wait_words(2, 14, 16), 12);
        assert_eq!(wait_pulses(15, 0, 16, 40), 40);
    }

    #[test]
    fn test_clock_after_transfer() {
        assert_eq!(clock_after_transfer(3, 16), 4);
        assert_eq!(clock_after_transfer(15, 16), 0);
    }

    #[test]
    fn test_average_wait_is_half_a_revolution() {
        let words = 32;
        let total: usize = (0..words).map(|t| wait_words(0, t, words)).sum();
        // Mean of 0..words is (words - 1) / 2.
        assert_eq!(total * 2, words * (words - 1));
    }

    proptest! {
        #[test]
        fn prop_wait_lands_on_target(words in 1usize..64, c in 0usize..64, t in 0usize..64) {
            let c = c % words;
            let t = t % words;
            let wait = wait_words(c, t, words);
            prop_assert!(wait < words);
            prop_assert_eq!((c + wait) % words, t);
        }
    }
}
