//! Pending batch buffer
//!
//! Accumulates serialized COPY rows until the flush threshold is reached.
//! One buffer belongs to exactly one pipeline instance; it never crosses
//! files or processors.

/// Bounded accumulation of COPY text rows awaiting bulk load
#[derive(Debug)]
pub struct RowBuffer {
    data: String,
    rows: usize,
    threshold: usize,
}

impl RowBuffer {
    /// Create a buffer that reports full at `threshold` rows
    pub fn new(threshold: usize) -> Self {
        Self {
            data: String::new(),
            rows: 0,
            threshold,
        }
    }

    /// Append one row (without trailing newline)
    pub fn push(&mut self, row: &str) {
        self.data.push_str(row);
        self.data.push('\n');
        self.rows += 1;
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Whether the buffer has reached its flush threshold
    pub fn is_full(&self) -> bool {
        self.rows >= self.threshold
    }

    /// Buffered COPY text
    pub fn as_str(&self) -> &str {
        &self.data
    }

    /// Drain the buffer, returning its contents and resetting it
    pub fn take(&mut self) -> String {
        self.rows = 0;
        std::mem::take(&mut self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_fills_at_threshold() {
        let mut buffer = RowBuffer::new(2);
        assert!(buffer.is_empty());
        assert!(!buffer.is_full());

        buffer.push("a\t1");
        assert!(!buffer.is_full());

        buffer.push("b\t2");
        assert!(buffer.is_full());
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_take_drains_and_resets() {
        let mut buffer = RowBuffer::new(10);
        buffer.push("a\t1");
        buffer.push("b\t\\N");

        let rows = buffer.take();
        assert_eq!(rows, "a\t1\nb\t\\N\n");
        assert!(buffer.is_empty());
        assert_eq!(buffer.as_str(), "");
    }
}
