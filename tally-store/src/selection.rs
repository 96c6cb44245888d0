//! Picking a resource to vote on.
//!
//! Neither algorithm keeps an index. Both are forward scans over one read
//! transaction, so their cost grows linearly with the repository.

use rand::Rng;
use redb::ReadableTable;

use crate::codec;
use crate::error::{Result, TallyError};
use crate::repository::TallyRepository;

impl TallyRepository {
    /// Returns the key at a uniformly random position in `[0, size_hint)`.
    ///
    /// `size_hint` should be the current [`count`](Self::count). If the
    /// repository is empty, or has shrunk below the hint since it was
    /// computed, the scan can run off the end and this returns
    /// [`TallyError::EmptyOrStale`]. Treat that as "refresh the count and
    /// try again", not as a fatal error.
    pub fn random_key(&self, size_hint: u64) -> Result<Vec<u8>> {
        self.random_key_with(size_hint, &mut rand::thread_rng())
    }

    /// [`random_key`](Self::random_key) with a caller-supplied RNG.
    pub fn random_key_with<R: Rng + ?Sized>(&self, size_hint: u64, rng: &mut R) -> Result<Vec<u8>> {
        if size_hint == 0 {
            return Err(TallyError::EmptyOrStale);
        }
        let target = rng.gen_range(0..size_hint);

        self.store().with_read_transaction(|table| {
            let mut position = 0u64;
            for entry in table.iter()? {
                let (key, _) = entry?;
                if position == target {
                    return Ok(key.value().to_vec());
                }
                position += 1;
            }
            Err(TallyError::EmptyOrStale)
        })
    }

    /// Returns the key with the smallest tally.
    ///
    /// Ties go to the key that comes first in store order. Fails with
    /// [`TallyError::EmptyRepository`] when there are no entries.
    pub fn min_key(&self) -> Result<Vec<u8>> {
        self.store().with_read_transaction(|table| {
            let mut best: Option<(Vec<u8>, i64)> = None;
            for entry in table.iter()? {
                let (key, value) = entry?;
                let tally = codec::decode(value.value())?;
                // Strict comparison keeps the earliest key on ties.
                if best.as_ref().map_or(true, |(_, lowest)| tally < *lowest) {
                    best = Some((key.value().to_vec(), tally));
                }
            }
            best.map(|(key, _)| key).ok_or(TallyError::EmptyRepository)
        })
    }

    /// Every entry ordered by ascending tally, ties in store order.
    pub fn ranked(&self) -> Result<Vec<(Vec<u8>, i64)>> {
        let mut entries = self.snapshot()?.entries()?;
        entries.sort_by_key(|(_, tally)| *tally);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn scratch() -> (tempfile::TempDir, TallyRepository) {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = TallyRepository::open(dir.path().join("votes.db")).expect("open repository");
        (dir, repo)
    }

    #[test]
    fn min_key_picks_lowest_tally() {
        let (_dir, repo) = scratch();
        repo.insert("a", 5).expect("insert a");
        repo.insert("b", -3).expect("insert b");
        repo.insert("c", 0).expect("insert c");
        assert_eq!(repo.min_key().expect("min key"), b"b".to_vec());
    }

    #[test]
    fn min_key_breaks_ties_by_key_order() {
        let (_dir, repo) = scratch();
        repo.insert("zeta", -1).expect("insert");
        repo.insert("beta", -1).expect("insert");
        repo.insert("alpha", 4).expect("insert");
        assert_eq!(repo.min_key().expect("min key"), b"beta".to_vec());
    }

    #[test]
    fn min_key_on_empty_repository() {
        let (_dir, repo) = scratch();
        assert!(matches!(repo.min_key(), Err(TallyError::EmptyRepository)));
    }

    #[test]
    fn random_key_with_zero_hint() {
        let (_dir, repo) = scratch();
        assert!(matches!(repo.random_key(0), Err(TallyError::EmptyOrStale)));
    }

    #[test]
    fn random_key_with_stale_hint_runs_off_the_end() {
        let (_dir, repo) = scratch();
        repo.insert("only", 0).expect("insert");

        // Nine in ten picks land past the single entry.
        let mut rng = StdRng::seed_from_u64(7);
        let mut saw_stale = false;
        for _ in 0..50 {
            match repo.random_key_with(10, &mut rng) {
                Ok(key) => assert_eq!(key, b"only".to_vec()),
                Err(TallyError::EmptyOrStale) => saw_stale = true,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert!(saw_stale);
    }

    #[test]
    fn random_key_is_deterministic_for_a_seed() {
        let (_dir, repo) = scratch();
        for key in ["a", "b", "c", "d"] {
            repo.insert(key, 0).expect("insert");
        }

        let picks = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..8)
                .map(|_| repo.random_key_with(4, &mut rng).expect("random key"))
                .collect::<Vec<_>>()
        };
        assert_eq!(picks(42), picks(42));
    }

    #[test]
    fn ranked_sorts_ascending_and_stably() {
        let (_dir, repo) = scratch();
        repo.insert("a", 2).expect("insert");
        repo.insert("b", -1).expect("insert");
        repo.insert("c", 2).expect("insert");
        repo.insert("d", 0).expect("insert");

        let ranked = repo.ranked().expect("ranked");
        let keys: Vec<_> = ranked.into_iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec![b"b".to_vec(), b"d".to_vec(), b"a".to_vec(), b"c".to_vec()]);
    }
}
