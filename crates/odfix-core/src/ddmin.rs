//! Classic delta debugging over an ordered list.

use async_trait::async_trait;

/// Predicate deciding whether a candidate subsequence still reproduces the
/// effect being minimized.
#[async_trait]
pub trait Validity<T: Send + Sync>: Send {
    async fn valid(&mut self, items: &[T]) -> bool;
}

/// Split `items` into contiguous chunks of `round(len / n)` elements.
fn chunks<T: Clone>(items: &[T], n: usize) -> Vec<std::ops::Range<usize>> {
    let size = ((2 * items.len() + n) / (2 * n)).max(1);
    (0..items.len())
        .step_by(size)
        .map(|start| start..(start + size).min(items.len()))
        .collect()
}

fn complement<T: Clone>(items: &[T], range: &std::ops::Range<usize>) -> Vec<T> {
    items[..range.start]
        .iter()
        .chain(items[range.end..].iter())
        .cloned()
        .collect()
}

/// Reduce `items` to a 1-minimal subsequence that `validity` accepts.
///
/// Starts at granularity `n`. For each granularity every chunk's complement
/// is tried first, then every chunk on its own; the first accepted candidate
/// becomes the new working set at granularity 2. Otherwise granularity
/// doubles (capped at the list length) until it reaches the list length.
/// `items` is assumed valid and is never tested itself.
pub async fn ddmin<T, V>(items: Vec<T>, mut n: usize, validity: &mut V) -> Vec<T>
where
    T: Clone + Send + Sync,
    V: Validity<T> + ?Sized,
{
    let mut current = items;
    n = n.max(2);
    'outer: loop {
        if current.len() < n {
            return current;
        }
        let ranges = chunks(&current, n);

        for range in &ranges {
            let candidate = complement(&current, range);
            if validity.valid(&candidate).await {
                current = candidate;
                n = 2;
                continue 'outer;
            }
        }
        for range in &ranges {
            let candidate = current[range.clone()].to_vec();
            if validity.valid(&candidate).await {
                current = candidate;
                n = 2;
                continue 'outer;
            }
        }

        if current.len() == n {
            return current;
        }
        n = (n * 2).min(current.len());
    }
}
