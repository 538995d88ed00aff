use std::sync::atomic::{AtomicI64, Ordering};

/// Allocator for temporary local message ids.
///
/// Produces a strictly decreasing sequence of negative ids (-1, -2, ...),
/// guaranteed never to collide with the server's positive id space. A
/// wall-clock timestamp is not a substitute: two sends in the same
/// millisecond would collide.
#[derive(Debug)]
pub struct LocalIdAllocator {
    next: AtomicI64,
}

impl LocalIdAllocator {
    pub fn new() -> Self {
        Self { next: AtomicI64::new(-1) }
    }

    pub fn allocate(&self) -> i64 {
        self.next.fetch_sub(1, Ordering::Relaxed)
    }
}

impl Default for LocalIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_negative_and_strictly_decreasing() {
        let alloc = LocalIdAllocator::new();
        let a = alloc.allocate();
        let b = alloc.allocate();
        let c = alloc.allocate();
        assert_eq!((a, b, c), (-1, -2, -3));
        assert!(a < 0 && b < a && c < b);
    }
}
