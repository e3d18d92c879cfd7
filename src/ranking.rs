//! Candidate selection shared by the recognition trials and the vocabulary
//! correction.

/// Return the candidate with the greatest key.
///
/// Keys are compared with `PartialOrd`; a candidate replaces the current
/// best only when its key is strictly greater, so ties keep the candidate
/// that came first. Keys that are not comparable (NaN) never win.
pub fn select_best<T, K, I, F>(candidates: I, mut key: F) -> Option<T>
where
    I: IntoIterator<Item = T>,
    F: FnMut(&T) -> K,
    K: PartialOrd,
{
    let mut best: Option<(T, K)> = None;
    for candidate in candidates {
        let candidate_key = key(&candidate);
        let replace = match &best {
            None => candidate_key.partial_cmp(&candidate_key).is_some(),
            Some((_, best_key)) => candidate_key > *best_key,
        };
        if replace {
            best = Some((candidate, candidate_key));
        }
    }
    best.map(|(candidate, _)| candidate)
}
