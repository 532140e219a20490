//! Free-list pool for reusable values.

/// Hands out recycled values before creating new ones.
#[derive(Debug)]
pub struct ObjectPool<T> {
    free: Vec<T>,
    created: usize,
}

impl<T> Default for ObjectPool<T> {
    fn default() -> Self {
        Self {
            free: Vec::new(),
            created: 0,
        }
    }
}

impl<T: Default> ObjectPool<T> {
    /// Empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a recycled value, or a fresh default one.
    pub fn acquire(&mut self) -> T {
        match self.free.pop() {
            Some(value) => value,
            None => {
                self.created += 1;
                T::default()
            }
        }
    }

    /// Return a value for reuse.
    pub fn release(&mut self, value: T) {
        self.free.push(value);
    }

    /// Values waiting to be reused.
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Values created because the free list was empty.
    pub fn created(&self) -> usize {
        self.created
    }
}
