//! Spelling suggestions for misspelled names in diagnostics.

/// Upper bound on the number of edits a suggestion may be away from the input
const MAX_SUGGESTION_DISTANCE: usize = 5;

/// Case-insensitive Levenshtein distance between two strings
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

/// Pick the candidate closest to `input`, if any is close enough to be a plausible typo
///
/// Longer inputs tolerate more edits. Ties go to the first candidate in iteration order.
pub fn suggest<'a>(input: &str, candidates: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    let max_distance = input.chars().count().div_ceil(2).clamp(1, MAX_SUGGESTION_DISTANCE);

    let mut best: Option<(&'a str, usize)> = None;
    for candidate in candidates {
        if candidate == input {
            continue;
        }
        let distance = edit_distance(input, candidate);
        if distance > max_distance {
            continue;
        }
        match best {
            Some((_, best_distance)) if best_distance <= distance => {}
            _ => best = Some((candidate, distance)),
        }
    }

    best.map(|(candidate, _)| candidate)
}

/// Format a suggestion suffix for an error message, or an empty string when there is none
pub fn did_you_mean<'a>(input: &str, candidates: impl IntoIterator<Item = &'a str>) -> String {
    match suggest(input, candidates) {
        Some(candidate) => format!(" (did you mean '{}'?)", candidate),
        None => String::new(),
    }
}
