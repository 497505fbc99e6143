//! Split records into consecutive fixed-size batches.

use autoblast_protocol::{Batch, Record};
use std::num::NonZeroUsize;

/// Chunk `records` into batches of at most `batch_size`, preserving order.
///
/// `None` puts every record into a single batch. The last batch holds the
/// remainder, so R records give `ceil(R / batch_size)` batches. No records
/// means no batches.
pub fn split_into_batches(records: Vec<Record>, batch_size: Option<NonZeroUsize>) -> Vec<Batch> {
    if records.is_empty() {
        return Vec::new();
    }
    let size = batch_size.map_or(records.len(), NonZeroUsize::get);

    let mut batches = Vec::with_capacity(records.len().div_ceil(size));
    let mut current = Vec::with_capacity(size);
    for record in records {
        current.push(record);
        if current.len() == size {
            let index = batches.len();
            batches.push(Batch::new(index, std::mem::replace(&mut current, Vec::with_capacity(size))));
        }
    }
    if !current.is_empty() {
        let index = batches.len();
        batches.push(Batch::new(index, current));
    }
    batches
}
