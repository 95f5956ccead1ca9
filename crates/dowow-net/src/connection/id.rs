use std::sync::atomic::{AtomicU32, Ordering};

/// Which half of the 32-bit ID space this endpoint allocates from. Dialers
/// take the even half, acceptors the odd half, so IDs issued by the two
/// ends of a Connection never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    Even,
    Odd,
}

impl Parity {
    fn base(self) -> u32 {
        match self {
            Self::Even => 2,
            Self::Odd => 1,
        }
    }

    pub fn bit(self) -> u32 {
        match self {
            Self::Even => 0,
            Self::Odd => 1,
        }
    }
}

/// Issues IDs monotonically increasing by 2 within one parity half,
/// skipping 0 (reserved for liveness fillers and unsolicited traffic).
pub struct IdAllocator {
    next: AtomicU32,
}

impl IdAllocator {
    pub fn new(parity: Parity) -> Self {
        Self { next: AtomicU32::new(parity.base()) }
    }

    pub fn allocate(&self) -> u32 {
        self.next.fetch_add(2, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_half_never_yields_zero_and_steps_by_two() {
        let a = IdAllocator::new(Parity::Even);
        let ids: Vec<u32> = (0..5).map(|_| a.allocate()).collect();
        assert_eq!(ids, vec![2, 4, 6, 8, 10]);
        assert!(ids.iter().all(|id| id % 2 == 0 && *id != 0));
    }

    #[test]
    fn odd_half_steps_by_two_from_one() {
        let a = IdAllocator::new(Parity::Odd);
        let ids: Vec<u32> = (0..3).map(|_| a.allocate()).collect();
        assert_eq!(ids, vec![1, 3, 5]);
    }
}
