use anyhow::{bail, Result};
use rand::Rng;

/// Block-scoped pool of signal-target SOAs. One value is drawn uniformly
/// without replacement at the start of every 16-trial run, so a block uses
/// each value for exactly one run.
#[derive(Debug, Clone)]
pub struct SoaPool {
    remaining: Vec<u32>,
}

impl SoaPool {
    pub fn new(pool: &[u32]) -> Self {
        Self {
            remaining: pool.to_vec(),
        }
    }

    /// Refills the pool at a block boundary.
    pub fn reset(&mut self, pool: &[u32]) {
        self.remaining.clear();
        self.remaining.extend_from_slice(pool);
    }

    /// Pops one value uniformly at random. Exhaustion mid-block means the
    /// configuration was wrong and is treated as fatal.
    pub fn draw<R: Rng>(&mut self, rng: &mut R) -> Result<u32> {
        if self.remaining.is_empty() {
            bail!("SOA pool exhausted mid-block");
        }
        let idx = rng.random_range(0..self.remaining.len());
        Ok(self.remaining.remove(idx))
    }

    pub fn remaining(&self) -> &[u32] {
        &self.remaining
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const POOL: [u32; 4] = [0, 50, 200, 800];

    #[test]
    fn draws_are_unique_until_exhaustion() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut pool = SoaPool::new(&POOL);
        let mut drawn: Vec<u32> = (0..4).map(|_| pool.draw(&mut rng).unwrap()).collect();
        assert!(pool.is_exhausted());
        drawn.sort_unstable();
        assert_eq!(drawn, POOL);
    }

    #[test]
    fn one_draw_leaves_three_values() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut pool = SoaPool::new(&POOL);
        let first = pool.draw(&mut rng).unwrap();
        assert_eq!(pool.remaining().len(), 3);
        assert!(!pool.remaining().contains(&first));
    }

    #[test]
    fn exhausted_pool_is_a_fatal_error() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut pool = SoaPool::new(&[50]);
        pool.draw(&mut rng).unwrap();
        assert!(pool.draw(&mut rng).is_err());
    }

    #[test]
    fn reset_refills_at_block_boundary() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut pool = SoaPool::new(&POOL);
        for _ in 0..4 {
            pool.draw(&mut rng).unwrap();
        }
        pool.reset(&POOL);
        assert_eq!(pool.remaining(), &POOL);
    }
}
