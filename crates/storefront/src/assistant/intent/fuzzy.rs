//! Edit-distance matching for single words.

/// Levenshtein distance over Unicode scalar values.
#[must_use]
pub fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        if let Some(first) = curr.first_mut() {
            *first = i + 1;
        }
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            let deletion = prev.get(j + 1).map_or(usize::MAX, |d| d + 1);
            let insertion = curr.get(j).map_or(usize::MAX, |d| d + 1);
            let substitution = prev.get(j).map_or(usize::MAX, |d| d + cost);
            if let Some(cell) = curr.get_mut(j + 1) {
                *cell = deletion.min(insertion).min(substitution);
            }
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev.last().copied().unwrap_or(0)
}

/// Largest edit distance accepted for an alias of this length: none below
/// four characters, one up to six, two from seven.
#[must_use]
pub const fn tolerance(alias_len: usize) -> usize {
    match alias_len {
        0..=3 => 0,
        4..=6 => 1,
        _ => 2,
    }
}

/// Whether `token` is a near miss for the single-word `alias`.
///
/// Both must start with the same letter; exact matches are handled by the
/// caller and don't count here.
#[must_use]
pub fn is_near_miss(token: &str, alias: &str) -> bool {
    let max = tolerance(alias.chars().count());
    if max == 0 || token == alias || token.chars().next() != alias.chars().next() {
        return false;
    }
    let (tl, al) = (token.chars().count(), alias.chars().count());
    if tl.abs_diff(al) > max {
        return false;
    }
    levenshtein(token, alias) <= max
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("", ""), 0);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("jeans", "jeanz"), 1);
        assert_eq!(levenshtein("skirt", "shirt"), 1);
        assert_eq!(levenshtein("café", "cafe"), 1);
    }

    #[test]
    fn test_tolerance_by_length() {
        assert_eq!(tolerance(3), 0);
        assert_eq!(tolerance(4), 1);
        assert_eq!(tolerance(6), 1);
        assert_eq!(tolerance(7), 2);
    }

    #[test]
    fn test_near_miss() {
        assert!(is_near_miss("sweter", "sweater"));
        assert!(is_near_miss("trousrs", "trousers"));
        assert!(is_near_miss("blazr", "blazer"));
        assert!(!is_near_miss("rde", "red"));
        assert!(!is_near_miss("jacke", "jeans"));
        assert!(!is_near_miss("kreen", "green"));
        assert!(!is_near_miss("dress", "dress"));
    }
}
