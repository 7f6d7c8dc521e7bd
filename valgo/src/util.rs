//! Shared utility functions

// ============================================================================
// Typo suggestions for unknown names
// ============================================================================

/// Levenshtein edit distance, two rows of working space
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr: Vec<usize> = vec![0; b.len() + 1];

    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Closest candidate within `threshold` edits
pub fn find_similar_name<'a, I>(name: &str, candidates: I, threshold: usize) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    candidates
        .into_iter()
        .map(|c| (levenshtein_distance(name, c), c))
        .filter(|(d, _)| *d <= threshold)
        .min_by_key(|(d, _)| *d)
        .map(|(_, c)| c)
}

/// Threshold that scales with the length of the unknown name
pub fn suggestion_threshold(name: &str) -> usize {
    (name.chars().count() / 3).clamp(1, 3)
}

/// "did you mean" suffix for a diagnostic, empty without a suggestion
pub fn format_suggestion_hint(suggestion: Option<&str>) -> String {
    match suggestion {
        Some(name) => format!("; did you mean `{name}`?"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("name", "name"), 0);
    }

    #[test]
    fn test_find_similar_name() {
        let fields = ["name", "age", "email"];
        assert_eq!(find_similar_name("nmae", fields, 2), Some("name"));
        assert_eq!(find_similar_name("zzzzzz", fields, 2), None);
    }

    #[test]
    fn test_hint_format() {
        assert_eq!(format_suggestion_hint(Some("age")), "; did you mean `age`?");
        assert_eq!(format_suggestion_hint(None), "");
    }
}
