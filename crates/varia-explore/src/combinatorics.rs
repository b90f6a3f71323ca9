//! Index generation for parameter subsets and value cross-products.

/// Number of `k`-element subsets of an `n`-element set, saturating.
pub fn binomial(n: usize, k: usize) -> usize {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut acc: usize = 1;
    for i in 0..k {
        // acc * (n - i) is always divisible by (i + 1) at this point.
        acc = match acc.checked_mul(n - i) {
            Some(v) => v / (i + 1),
            None => return usize::MAX,
        };
    }
    acc
}

/// All `k`-element subsets of `0..n` in ascending lexicographic order.
pub fn subsets(n: usize, k: usize) -> Subsets {
    Subsets {
        n,
        current: if k <= n { Some((0..k).collect()) } else { None },
    }
}

#[derive(Debug, Clone)]
pub struct Subsets {
    n: usize,
    current: Option<Vec<usize>>,
}

impl Iterator for Subsets {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        let current = self.current.take()?;
        let k = current.len();

        let mut next = current.clone();
        // Rightmost position that can still be incremented.
        let mut i = k;
        while i > 0 {
            i -= 1;
            if next[i] < self.n - k + i {
                next[i] += 1;
                for j in (i + 1)..k {
                    next[j] = next[j - 1] + 1;
                }
                self.current = Some(next);
                return Some(current);
            }
        }
        Some(current)
    }
}

/// Every assignment of value indices for the given domain sizes, with the
/// last position varying fastest.
pub fn cartesian(radices: &[usize]) -> Cartesian {
    let exhausted = radices.iter().any(|&r| r == 0);
    Cartesian {
        radices: radices.to_vec(),
        current: if exhausted {
            None
        } else {
            Some(vec![0; radices.len()])
        },
    }
}

#[derive(Debug, Clone)]
pub struct Cartesian {
    radices: Vec<usize>,
    current: Option<Vec<usize>>,
}

impl Iterator for Cartesian {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        let current = self.current.take()?;

        let mut next = current.clone();
        let mut i = next.len();
        while i > 0 {
            i -= 1;
            next[i] += 1;
            if next[i] < self.radices[i] {
                self.current = Some(next);
                return Some(current);
            }
            next[i] = 0;
        }
        Some(current)
    }
}

/// Saturating product of domain sizes.
pub fn product(radices: &[usize]) -> usize {
    radices.iter().fold(1usize, |acc, &r| acc.saturating_mul(r))
}
