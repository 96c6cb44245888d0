/// Which way a vote moves a tally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// The signed change this vote applies to a net tally.
    pub fn delta(self) -> i64 {
        match self {
            Direction::Up => 1,
            Direction::Down => -1,
        }
    }
}

/// One row of the results report.
///
/// `attempts` is `None` when only the net-tally ledger is deployed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteRecord {
    pub key: Vec<u8>,
    pub tally: i64,
    pub attempts: Option<i64>,
}

impl VoteRecord {
    pub fn key_lossy(&self) -> String {
        String::from_utf8_lossy(&self.key).into_owned()
    }
}
