//! Seed normalisation.

/// Most seeds kept after normalisation.
pub const MAX_SEEDS: usize = 8;
/// Most whitespace tokens kept from one seed; long descriptions are cut.
pub const MAX_SEED_TOKENS: usize = 8;

/// Trims and lowercases each seed, keeps its first [`MAX_SEED_TOKENS`]
/// tokens, drops empties and duplicates (first occurrence wins) and returns
/// at most [`MAX_SEEDS`] seeds.
pub fn normalize_seeds<S: AsRef<str>>(seeds: &[S]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for seed in seeds {
        let lowered = seed.as_ref().trim().to_lowercase();
        let tokens: Vec<&str> = lowered.split_whitespace().collect();
        let seed = if tokens.len() > MAX_SEED_TOKENS {
            tokens[..MAX_SEED_TOKENS].join(" ")
        } else {
            lowered.clone()
        };
        if seed.is_empty() || out.contains(&seed) {
            continue;
        }
        out.push(seed);
        if out.len() == MAX_SEEDS {
            break;
        }
    }
    out
}
