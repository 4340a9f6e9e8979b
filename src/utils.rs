use rand::RngCore;
use rand_chacha::ChaCha8Rng;
use statrs::statistics::Statistics;

/// info! that keeps ANSI colors only when the terminal display is colorful
#[macro_export]
macro_rules! cinfo {
    ($colorful:expr, $($arg:tt)*) => {
        if $colorful {
            log::info!($($arg)*);
        } else {
            log::info!("{}", $crate::utils::strip_ansi(&format!($($arg)*)));
        }
    };
}

/// Removes ANSI escape sequences (`ESC [ ... letter`) from a string
pub fn strip_ansi(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' && chars.peek() == Some(&'[') {
            chars.next();
            while let Some(&next) = chars.peek() {
                chars.next();
                if next.is_ascii_alphabetic() { break }
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Mean and (sample) standard deviation; the std is 0 for fewer than two values
pub fn mean_and_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let mean = values.mean();
    let std = if values.len() < 2 { 0.0 } else { values.std_dev() };
    (mean, std)
}

/// 1-based ranks, ties receive the average of the ranks they span
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(std::cmp::Ordering::Equal));

    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let start = i;
        while i + 1 < order.len() && values[order[i]] == values[order[i + 1]] {
            i += 1;
        }
        let rank = (start + i + 2) as f64 / 2.0;
        for &idx in &order[start..=i] {
            ranks[idx] = rank;
        }
        i += 1;
    }
    ranks
}

/// Draws `n` seeds from a master generator, one per independent worker
pub fn derive_seeds(rng: &mut ChaCha8Rng, n: usize) -> Vec<u64> {
    (0..n).map(|_| rng.next_u64()).collect()
}

/// Sorted distinct values of a slice
pub fn distinct_sorted(values: &[i64]) -> Vec<i64> {
    let mut distinct = values.to_vec();
    distinct.sort_unstable();
    distinct.dedup();
    distinct
}
