//! Vote tally on the planner's compromise

use agora_core::VoteStance;
use serde::{Deserialize, Serialize};

/// Counts of each vote, plus degraded (no-response) votes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    pub accept: usize,
    pub conditional_accept: usize,
    pub reject: usize,
    /// Votes that degraded; excluded from the decision
    pub no_response: usize,
}

impl VoteTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one vote; `None` is a degraded vote
    pub fn record(&mut self, vote: Option<VoteStance>) {
        match vote {
            Some(VoteStance::Accept) => self.accept += 1,
            Some(VoteStance::ConditionalAccept) => self.conditional_accept += 1,
            Some(VoteStance::Reject) => self.reject += 1,
            None => self.no_response += 1,
        }
    }

    /// Non-degraded votes
    pub fn decided(&self) -> usize {
        self.accept + self.conditional_accept + self.reject
    }

    /// Share of decided votes that count toward adoption
    pub fn approval_ratio(&self) -> f64 {
        let decided = self.decided();
        if decided == 0 {
            return 0.0;
        }
        (self.accept + self.conditional_accept) as f64 / decided as f64
    }

    /// Simple majority over decided votes; `None` on a tie or no votes
    pub fn adopted(&self) -> Option<bool> {
        if self.decided() == 0 {
            return None;
        }
        let approve = self.accept + self.conditional_accept;
        match approve.cmp(&self.reject) {
            std::cmp::Ordering::Greater => Some(true),
            std::cmp::Ordering::Less => Some(false),
            std::cmp::Ordering::Equal => None,
        }
    }
}

impl FromIterator<Option<VoteStance>> for VoteTally {
    fn from_iter<I: IntoIterator<Item = Option<VoteStance>>>(iter: I) -> Self {
        let mut tally = Self::new();
        for vote in iter {
            tally.record(vote);
        }
        tally
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_majority_adopts() {
        let tally: VoteTally = vec![
            Some(VoteStance::Accept),
            Some(VoteStance::ConditionalAccept),
            Some(VoteStance::Reject),
            None,
        ]
        .into_iter()
        .collect();

        assert_eq!(tally.decided(), 3);
        assert_eq!(tally.no_response, 1);
        assert_eq!(tally.adopted(), Some(true));
        assert!((tally.approval_ratio() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_tie_and_empty_are_undecided() {
        let tie: VoteTally = vec![Some(VoteStance::Accept), Some(VoteStance::Reject)].into_iter().collect();
        assert_eq!(tie.adopted(), None);

        let degraded_only: VoteTally = vec![None, None].into_iter().collect();
        assert_eq!(degraded_only.adopted(), None);
        assert_eq!(degraded_only.approval_ratio(), 0.0);
    }
}
