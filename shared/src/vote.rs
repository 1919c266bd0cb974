use crate::VoteType;

/// What happens to a user's vote on a thread when they press a vote button.
///
/// One vote per (thread, user): pressing the same direction again retracts it,
/// pressing the other direction switches it in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteTransition {
    Cast(VoteType),
    Retract(VoteType),
    Switch { from: VoteType, to: VoteType },
}

impl VoteTransition {
    pub fn resolve(existing: Option<VoteType>, requested: VoteType) -> Self {
        match existing {
            None => VoteTransition::Cast(requested),
            Some(v) if v == requested => VoteTransition::Retract(v),
            Some(from) => VoteTransition::Switch { from, to: requested },
        }
    }

    /// Change in net score caused by this transition.
    pub fn delta(self) -> i64 {
        match self {
            VoteTransition::Cast(v) => v.weight(),
            VoteTransition::Retract(v) => -v.weight(),
            VoteTransition::Switch { from, to } => to.weight() - from.weight(),
        }
    }

    /// The user's vote once the transition is applied.
    pub fn resulting_vote(self) -> Option<VoteType> {
        match self {
            VoteTransition::Cast(v) => Some(v),
            VoteTransition::Retract(_) => None,
            VoteTransition::Switch { to, .. } => Some(to),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use VoteType::{Down, Up};

    #[test]
    fn deltas() {
        assert_eq!(VoteTransition::resolve(None, Up).delta(), 1);
        assert_eq!(VoteTransition::resolve(None, Down).delta(), -1);
        assert_eq!(VoteTransition::resolve(Some(Up), Up).delta(), -1);
        assert_eq!(VoteTransition::resolve(Some(Down), Down).delta(), 1);
        assert_eq!(VoteTransition::resolve(Some(Up), Down).delta(), -2);
        assert_eq!(VoteTransition::resolve(Some(Down), Up).delta(), 2);
    }

    #[test]
    fn same_direction_twice_cancels() {
        let first = VoteTransition::resolve(None, Up);
        let second = VoteTransition::resolve(first.resulting_vote(), Up);
        assert_eq!(second.resulting_vote(), None);
        assert_eq!(first.delta() + second.delta(), 0);
    }

    #[test]
    fn switch_is_reversible() {
        let up = VoteTransition::resolve(None, Up);
        let down = VoteTransition::resolve(up.resulting_vote(), Down);
        assert_eq!(up.delta() + down.delta(), -1);
        let back = VoteTransition::resolve(down.resulting_vote(), Up);
        assert_eq!(up.delta() + down.delta() + back.delta(), 1);
        assert_eq!(back.resulting_vote(), Some(Up));
    }
}
