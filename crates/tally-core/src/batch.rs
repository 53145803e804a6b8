//! Sub-batch partitioning

/// Split `total` items into consecutive sub-batches of `batch_size`
/// each, the final one possibly shorter. Returns the sizes in order.
pub(crate) fn partition(total: usize, batch_size: usize) -> Vec<usize> {
    assert!(batch_size > 0, "batch size must be positive");

    let mut sizes = Vec::with_capacity(total.div_ceil(batch_size));
    let mut remaining = total;
    while remaining > 0 {
        let size = remaining.min(batch_size);
        sizes.push(size);
        remaining -= size;
    }
    sizes
}
