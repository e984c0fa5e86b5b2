use crate::bulk::{Batch, WriteOperation};

/// Accumulates operations into the open batch and closes it once its
/// estimated size reaches the threshold.
///
/// The buffer is driven by a single producer through `&mut self`; callers
/// sharing one across tasks must serialize access themselves.
#[derive(Debug)]
pub struct WriteBuffer {
    open: Batch,
    threshold_bytes: usize,
}

impl WriteBuffer {
    pub fn new(threshold_bytes: usize) -> Self {
        Self {
            open: Batch::new(),
            threshold_bytes: threshold_bytes.max(1),
        }
    }

    pub fn threshold_bytes(&self) -> usize {
        self.threshold_bytes
    }

    /// Appends `op`, returning the batch it closed when the open batch
    /// reached the threshold. The threshold is a soft bound: the item that
    /// crosses it stays in the closed batch.
    pub fn add(&mut self, op: WriteOperation) -> Option<Batch> {
        self.open.push(op);

        if self.open.size_bytes() >= self.threshold_bytes {
            Some(self.take())
        } else {
            None
        }
    }

    /// Closes the open batch even below the threshold. `None` if empty.
    pub fn flush_remaining(&mut self) -> Option<Batch> {
        if self.open.is_empty() {
            None
        } else {
            Some(self.take())
        }
    }

    pub fn pending_operations(&self) -> usize {
        self.open.len()
    }

    pub fn pending_bytes(&self) -> usize {
        self.open.size_bytes()
    }

    fn take(&mut self) -> Batch {
        std::mem::take(&mut self.open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op_of_size(id: usize, target: usize) -> WriteOperation {
        let base = WriteOperation::index_raw(id.to_string(), "\"\"").estimated_size();
        let padding = "x".repeat(target.saturating_sub(base));
        WriteOperation::index_raw(id.to_string(), format!("\"{}\"", padding))
    }

    #[test]
    fn test_below_threshold_stays_open() {
        let mut buffer = WriteBuffer::new(1000);
        assert!(buffer.add(op_of_size(1, 100)).is_none());
        assert!(buffer.add(op_of_size(2, 100)).is_none());
        assert_eq!(buffer.pending_operations(), 2);
        assert_eq!(buffer.pending_bytes(), 200);
    }

    #[test]
    fn test_reaching_threshold_closes_batch() {
        let mut buffer = WriteBuffer::new(300);
        assert!(buffer.add(op_of_size(1, 100)).is_none());
        assert!(buffer.add(op_of_size(2, 100)).is_none());
        let closed = buffer.add(op_of_size(3, 100)).unwrap();
        assert_eq!(closed.len(), 3);
        assert_eq!(closed.size_bytes(), 300);
        assert_eq!(buffer.pending_operations(), 0);
    }

    #[test]
    fn test_crossing_item_stays_in_closed_batch() {
        let mut buffer = WriteBuffer::new(300);
        assert!(buffer.add(op_of_size(0, 200)).is_none());
        let closed = buffer.add(op_of_size(1, 200)).unwrap();
        assert_eq!(closed.len(), 2);
        assert_eq!(closed.size_bytes(), 400);
        assert!(buffer.add(op_of_size(2, 200)).is_none());

        let rest = buffer.flush_remaining().unwrap();
        assert_eq!(rest.size_bytes(), 200);
    }

    #[test]
    fn test_oversized_item_closes_batch_at_once() {
        let mut buffer = WriteBuffer::new(300);
        assert_eq!(buffer.add(op_of_size(1, 1000)).map(|b| b.len()), Some(1));
        assert!(buffer.flush_remaining().is_none());

        buffer.add(op_of_size(2, 100));
        let closed = buffer.add(op_of_size(3, 1000)).unwrap();
        assert_eq!(closed.len(), 2);
        assert_eq!(closed.size_bytes(), 1100);
    }

    fn batches_for(threshold: usize, item_size: usize, items: usize) -> (usize, Vec<Batch>) {
        let mut buffer = WriteBuffer::new(threshold);
        let mut batches = Vec::new();
        let mut total = 0;
        for id in 0..items {
            let op = op_of_size(id, item_size);
            total += op.estimated_size();
            batches.extend(buffer.add(op));
        }
        batches.extend(buffer.flush_remaining());
        (total, batches)
    }

    #[test]
    fn test_batch_count_and_bound() {
        let (total, batches) = batches_for(1000, 100, 95);

        assert_eq!(total, 9500);
        assert_eq!(batches.len(), (total + 1000 - 1) / 1000);
        assert!(batches.iter().all(|b| b.size_bytes() <= 1000));
        assert_eq!(batches.iter().map(Batch::len).sum::<usize>(), 95);
    }

    #[test]
    fn test_batch_count_with_uneven_item_sizes() {
        let (total, batches) = batches_for(1000, 300, 10);

        assert_eq!(total, 3000);
        assert_eq!(batches.len(), 3);
        let sizes: Vec<usize> = batches.iter().map(Batch::size_bytes).collect();
        assert_eq!(sizes, vec![1200, 1200, 600]);
    }

    #[test]
    fn test_flush_remaining_empty_is_noop() {
        let mut buffer = WriteBuffer::new(1000);
        assert!(buffer.flush_remaining().is_none());
        buffer.add(op_of_size(1, 10));
        let batch = buffer.flush_remaining().unwrap();
        assert_eq!(batch.len(), 1);
        assert!(buffer.flush_remaining().is_none());
    }
}
