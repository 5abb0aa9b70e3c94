//! Motivational quote of the day.

use rand::Rng;

pub const QUOTES: [&str; 5] = [
    "The only bad workout is the one that didn't happen.",
    "Discipline is the bridge between goals and accomplishment.",
    "Your body can stand almost anything. It’s your mind that you have to convince.",
    "Success isn't always about greatness. It's about consistency. Consistent hard work gains success. Greatness will come.",
    "The pain you feel today will be the strength you feel tomorrow.",
];

/// Pick one quote uniformly at random.
pub fn daily_quote() -> &'static str {
    QUOTES[rand::rng().random_range(0..QUOTES.len())]
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn always_from_the_list() {
        let mut seen = HashSet::new();
        for _ in 0..100 {
            let q = daily_quote();
            assert!(QUOTES.contains(&q));
            seen.insert(q);
        }
        // 100 uniform draws from 5 missing one is ~1e-9 likely.
        assert!(seen.len() >= 2);
    }
}
