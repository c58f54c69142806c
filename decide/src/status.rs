use crate::*;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a voting
///
/// A voting only ever moves forward: `NotStarted -> Started -> Stopped -> Tallied`.
#[derive(
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    IntoPrimitive,
    TryFromPrimitive,
)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum VotingStatus {
    NotStarted = 0,
    Started = 1,
    Stopped = 2,
    Tallied = 3,
}

impl Default for VotingStatus {
    fn default() -> Self {
        VotingStatus::NotStarted
    }
}

impl VotingStatus {
    /// Lookup the state reached by applying `action`, or the reason it is not allowed.
    ///
    /// This is the whole lifecycle table. It does not perform the transition: callers
    /// compare-and-set the status in the store.
    pub fn transition(self, action: Action) -> Result<VotingStatus, TransitionError> {
        use Action::*;
        use VotingStatus::*;

        match (self, action) {
            (NotStarted, Start) => Ok(Started),
            (NotStarted, Stop) | (NotStarted, Tally) => Err(TransitionError::NotStarted),

            (Started, Start) => Err(TransitionError::AlreadyStarted),
            (Started, Stop) => Ok(Stopped),
            (Started, Tally) => Err(TransitionError::NotStopped),

            (Stopped, Start) => Err(TransitionError::AlreadyStarted),
            (Stopped, Stop) => Err(TransitionError::AlreadyStopped),
            (Stopped, Tally) => Ok(Tallied),

            (Tallied, Start) => Err(TransitionError::AlreadyStarted),
            (Tallied, Stop) => Err(TransitionError::AlreadyStopped),
            (Tallied, Tally) => Err(TransitionError::AlreadyTallied),
        }
    }

    /// Ballots are only accepted while started
    pub fn accepts_ballots(self) -> bool {
        self == VotingStatus::Started
    }

    pub fn name(self) -> &'static str {
        match self {
            VotingStatus::NotStarted => "not_started",
            VotingStatus::Started => "started",
            VotingStatus::Stopped => "stopped",
            VotingStatus::Tallied => "tallied",
        }
    }
}

impl fmt::Display for VotingStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// An administrator action on the voting lifecycle
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Start,
    Stop,
    Tally,
}

impl Action {
    /// Human readable outcome of a successful action
    pub fn outcome(self) -> &'static str {
        match self {
            Action::Start => "Voting started",
            Action::Stop => "Voting stopped",
            Action::Tally => "Voting tallied",
        }
    }
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Action::Start),
            "stop" => Ok(Action::Stop),
            "tally" => Ok(Action::Tally),
            other => Err(Error::InvalidAction(other.to_owned())),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Action::Start => "start",
            Action::Stop => "stop",
            Action::Tally => "tally",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::TryFrom;

    const ALL_STATES: [VotingStatus; 4] = [
        VotingStatus::NotStarted,
        VotingStatus::Started,
        VotingStatus::Stopped,
        VotingStatus::Tallied,
    ];

    #[test]
    fn lifecycle_table() {
        use TransitionError as T;
        use VotingStatus::*;

        let expected: [(VotingStatus, [Result<VotingStatus, T>; 3]); 4] = [
            (NotStarted, [Ok(Started), Err(T::NotStarted), Err(T::NotStarted)]),
            (Started, [Err(T::AlreadyStarted), Ok(Stopped), Err(T::NotStopped)]),
            (Stopped, [Err(T::AlreadyStarted), Err(T::AlreadyStopped), Ok(Tallied)]),
            (Tallied, [Err(T::AlreadyStarted), Err(T::AlreadyStopped), Err(T::AlreadyTallied)]),
        ];

        for (from, outcomes) in expected.iter() {
            let actions = [Action::Start, Action::Stop, Action::Tally];
            for (action, outcome) in actions.iter().zip(outcomes.iter()) {
                assert_eq!(from.transition(*action), *outcome, "{} -> {}", from, action);
            }
        }
    }

    #[test]
    fn tally_only_from_stopped() {
        for state in ALL_STATES.iter() {
            let res = state.transition(Action::Tally);
            assert_eq!(res.is_ok(), *state == VotingStatus::Stopped);
        }
    }

    #[test]
    fn transitions_never_go_backwards() {
        for state in ALL_STATES.iter() {
            for action in [Action::Start, Action::Stop, Action::Tally].iter() {
                if let Ok(next) = state.transition(*action) {
                    assert!(next > *state);
                }
            }
        }
    }

    #[test]
    fn rejection_messages() {
        assert_eq!(TransitionError::NotStarted.to_string(), "Voting is not started");
        assert_eq!(TransitionError::AlreadyStarted.to_string(), "Voting already started");
        assert_eq!(TransitionError::NotStopped.to_string(), "Voting is not stopped");
        assert_eq!(TransitionError::AlreadyStopped.to_string(), "Voting already stopped");
        assert_eq!(TransitionError::AlreadyTallied.to_string(), "Voting already tallied");
    }

    #[test]
    fn parse_action() {
        assert_eq!("start".parse::<Action>().unwrap(), Action::Start);
        assert_eq!("tally".parse::<Action>().unwrap(), Action::Tally);

        let err = "bad".parse::<Action>().unwrap_err();
        assert!(matches!(err, Error::InvalidAction(ref a) if a == "bad"));
        assert_eq!(err.to_string(), "Action not found, try with start, stop or tally");
    }

    #[test]
    fn status_repr() {
        for state in ALL_STATES.iter() {
            let raw: u8 = (*state).into();
            assert_eq!(VotingStatus::try_from(raw).unwrap(), *state);
        }
        assert!(VotingStatus::try_from(7u8).is_err());
    }
}
