//! Spawn point allocation
//!
//! Points are handed out at random without repeats until every point has been
//! issued once, then the cycle starts over. Independent uniform draws would
//! cluster players on the same tiles.

use crate::types::Position;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashSet;

#[derive(Debug)]
pub struct SpawnAllocator {
    points: Vec<Position>,
    issued: HashSet<usize>,
    fallback: Position,
    rng: StdRng,
}

impl SpawnAllocator {
    pub fn new(points: Vec<Position>, fallback: Position) -> Self {
        Self::with_rng(points, fallback, StdRng::from_entropy())
    }

    pub fn with_seed(points: Vec<Position>, fallback: Position, seed: u64) -> Self {
        Self::with_rng(points, fallback, StdRng::seed_from_u64(seed))
    }

    fn with_rng(points: Vec<Position>, fallback: Position, rng: StdRng) -> Self {
        Self {
            points,
            issued: HashSet::new(),
            fallback,
            rng,
        }
    }

    /// Next spawn point; the static fallback if no points were designated.
    pub fn next(&mut self) -> Position {
        if self.points.is_empty() {
            return self.fallback;
        }

        if self.issued.len() >= self.points.len() {
            self.issued.clear();
        }

        let free: Vec<usize> = (0..self.points.len())
            .filter(|i| !self.issued.contains(i))
            .collect();
        // free is non-empty: the cycle was restarted above if exhausted
        let index = *free.choose(&mut self.rng).unwrap_or(&0);
        self.issued.insert(index);
        self.points[index]
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points left before the cycle restarts.
    pub fn remaining(&self) -> usize {
        self.points.len() - self.issued.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(n: usize) -> Vec<Position> {
        (0..n).map(|i| Position::new(i as f64 + 0.5, 65.0, 0.5)).collect()
    }

    #[test]
    fn test_issues_every_point_before_repeating() {
        let points = grid(7);
        let mut alloc = SpawnAllocator::with_seed(points.clone(), Position::default(), 42);

        for _ in 0..3 {
            let mut seen = Vec::new();
            for _ in 0..points.len() {
                let p = alloc.next();
                assert!(!seen.contains(&p), "repeat before exhaustion");
                seen.push(p);
            }
            assert_eq!(alloc.remaining(), 0);
            assert!(points.iter().all(|p| seen.contains(p)));
        }
    }

    #[test]
    fn test_empty_pool_falls_back_to_static_spawn() {
        let fallback = Position::new(10.0, 80.0, -4.0);
        let mut alloc = SpawnAllocator::new(Vec::new(), fallback);
        assert!(alloc.is_empty());
        assert_eq!(alloc.next(), fallback);
        assert_eq!(alloc.next(), fallback);
    }

    #[test]
    fn test_allocators_do_not_share_cycles() {
        let mut a = SpawnAllocator::with_seed(grid(2), Position::default(), 1);
        let mut b = SpawnAllocator::with_seed(grid(2), Position::default(), 2);
        a.next();
        assert_eq!(a.remaining(), 1);
        assert_eq!(b.remaining(), 2);
        b.next();
        b.next();
        assert_eq!(a.remaining(), 1);
    }
}
