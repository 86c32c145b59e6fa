//! Write-time duplicate detection.
//!
//! Two checks run before a record is inserted: an exact (case-sensitive) URL
//! match, then a case-insensitive title similarity scan against every stored
//! title. The scan is O(n) in store size, which is fine at thousands of rows.
//!
//! Similarity is the Ratcliff/Obershelp ratio `2*M / T`, where `M` counts
//! characters in matching blocks and `T` is the combined length. Reordered
//! headlines keep their long shared runs, so they still score high.

/// Outcome of running a candidate through the gate.
#[derive(Debug, Clone, PartialEq)]
pub enum DedupVerdict {
    /// Safe to insert.
    Accept,
    /// A record with the same URL already exists.
    DuplicateUrl,
    /// A stored title is too similar.
    NearDuplicate { matched: String, score: f64 },
}

impl DedupVerdict {
    pub fn is_accept(&self) -> bool {
        matches!(self, Self::Accept)
    }
}

/// Similarity ratio in `[0, 1]` between two titles, ignoring case.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    ratio(&a, &b)
}

/// First stored title whose similarity to `title` meets `threshold`.
pub fn find_near_duplicate<'a, I>(title: &str, existing: I, threshold: f64) -> Option<(&'a str, f64)>
where
    I: IntoIterator<Item = &'a str>,
{
    let candidate: Vec<char> = title.to_lowercase().chars().collect();
    existing.into_iter().find_map(|stored| {
        let other: Vec<char> = stored.to_lowercase().chars().collect();
        let score = ratio(&candidate, &other);
        (score >= threshold).then_some((stored, score))
    })
}

fn ratio(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matched_chars(a, b) as f64 / total as f64
}

/// Characters covered by matching blocks: take the longest common run,
/// then recurse on the pieces either side of it.
fn matched_chars(a: &[char], b: &[char]) -> usize {
    let mut pending = vec![(0, a.len(), 0, b.len())];
    let mut matched = 0;
    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let (i, j, size) = longest_match(&a[alo..ahi], &b[blo..bhi]);
        if size == 0 {
            continue;
        }
        matched += size;
        let (i, j) = (alo + i, blo + j);
        if alo < i && blo < j {
            pending.push((alo, i, blo, j));
        }
        if i + size < ahi && j + size < bhi {
            pending.push((i + size, ahi, j + size, bhi));
        }
    }
    matched
}

/// Longest common run as `(start_a, start_b, len)`. Ties go to the earliest
/// position in `a`, then in `b`.
fn longest_match(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb { prev[j] + 1 } else { 0 };
            let k = curr[j + 1];
            if k > best.2 {
                best = (i + 1 - k, j + 1 - k, k);
            }
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_titles_ignore_case() {
        assert!((title_similarity("IHSG Menguat", "ihsg menguat") - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn near_duplicate_found_above_threshold() {
        let stored = ["IHSG ditutup menguat 1% ke level 7.200", "Harga emas turun tipis"];
        let hit = find_near_duplicate(
            "IHSG Ditutup Menguat 1% ke Level 7.250",
            stored.iter().copied(),
            0.75,
        );
        let (matched, score) = hit.expect("near duplicate");
        assert_eq!(matched, stored[0]);
        assert!(score >= 0.75);
    }

    #[test]
    fn reordered_headline_is_near_duplicate() {
        let score = title_similarity(
            "IHSG ditutup menguat ke level 7.200",
            "Ditutup menguat ke level 7.200, IHSG",
        );
        // 2 * 30 shared chars / 71 total
        assert!((score - 60.0 / 71.0).abs() < 1e-9, "score = {score}");
        assert!(score >= 0.75);
    }

    #[test]
    fn ratio_counts_every_matching_block() {
        // "ab" and "d" match on both sides of the differing middle.
        assert!((title_similarity("abxd", "abyd") - 0.75).abs() < 1e-9);
        assert_eq!(title_similarity("", ""), 1.0);
        assert_eq!(title_similarity("abc", ""), 0.0);
    }

    #[test]
    fn distinct_titles_pass() {
        let stored = ["Harga emas turun tipis"];
        assert!(
            find_near_duplicate("BI tahan suku bunga di 6%", stored.iter().copied(), 0.75)
                .is_none()
        );
    }
}
