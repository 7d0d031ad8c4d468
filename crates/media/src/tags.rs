//! Turning free-text frame captions into visual tags.

/// Most tags taken from one caption.
pub const MAX_TAGS_PER_CAPTION: usize = 10;
/// Most tags kept across all captions of a job.
pub const MAX_AGGREGATE_TAGS: usize = 15;

const STOP_WORDS: &[&str] = &[
    "the", "and", "with", "this", "that", "for", "from", "into", "your", "have", "has", "are",
    "you", "bir", "ile", "ve", "için", "bu",
];

const TRIM_CHARS: &[char] = &['.', ',', '!', '?', ';', ':', '(', ')', '[', ']', '"', '\''];

/// Extracts tags from one caption: lowercase alphabetic words of at least
/// three characters that are not stop words, deduplicated in order of first
/// appearance.
pub fn tags_from_caption(caption: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for raw in caption.split_whitespace() {
        let word = raw.trim_matches(TRIM_CHARS).to_lowercase();
        if word.chars().count() < 3
            || !word.chars().all(char::is_alphabetic)
            || STOP_WORDS.contains(&word.as_str())
            || tags.contains(&word)
        {
            continue;
        }
        tags.push(word);
        if tags.len() == MAX_TAGS_PER_CAPTION {
            break;
        }
    }
    tags
}

/// Merges per-caption tag lists, keeping first occurrences.
pub fn aggregate_tags<'a>(lists: impl IntoIterator<Item = &'a [String]>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for tag in lists.into_iter().flatten() {
        if out.len() == MAX_AGGREGATE_TAGS {
            break;
        }
        if !out.contains(tag) {
            out.push(tag.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_short_numeric_and_stop_words() {
        let tags = tags_from_caption("A red car, racing on the track with 3 cars! Car");
        assert_eq!(tags, vec!["red", "car", "racing", "track", "cars"]);
    }

    #[test]
    fn turkish_stop_words_are_dropped() {
        let tags = tags_from_caption("bir araba ile yarış için");
        assert_eq!(tags, vec!["araba", "yarış"]);
    }

    #[test]
    fn at_most_ten_per_caption() {
        let caption = "alpha bravo charlie delta echo foxtrot golf hotel india juliet kilo lima";
        assert_eq!(tags_from_caption(caption).len(), MAX_TAGS_PER_CAPTION);
    }

    #[test]
    fn aggregate_dedupes_and_caps() {
        let a: Vec<String> = (0..10).map(|i| format!("a{i}")).collect();
        let b: Vec<String> = ["a1".to_string()]
            .into_iter()
            .chain((0..10).map(|i| format!("b{i}")))
            .collect();
        let tags = aggregate_tags([a.as_slice(), b.as_slice()]);
        assert_eq!(tags.len(), MAX_AGGREGATE_TAGS);
        assert_eq!(tags.iter().filter(|t| *t == "a1").count(), 1);
        assert_eq!(tags[10], "b0");
    }
}
