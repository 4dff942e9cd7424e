//! # Navigation states and the transition table.
//!
//! ```text
//! IDLE ──► NAVIGATING ──► ANIMATING_EXIT ──► ANIMATING_ENTER ──► IDLE
//!               │                │                  │
//!               └──────► ERROR ◄─┴──────────────────┘
//!                          │
//!                          └──► IDLE
//! ```

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TransitionError;

/// Navigation/animation phase of the application.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NavState {
    /// Nothing in flight.
    #[default]
    Idle,
    /// A navigation was requested.
    Navigating,
    /// Outgoing content is animating out.
    AnimatingExit,
    /// Incoming content is animating in.
    AnimatingEnter,
    /// Something went wrong; only `Idle` is reachable.
    Error,
}

impl NavState {
    /// Every state, in declaration order.
    pub const ALL: [NavState; 5] = [
        NavState::Idle,
        NavState::Navigating,
        NavState::AnimatingExit,
        NavState::AnimatingEnter,
        NavState::Error,
    ];

    /// Legal targets from this state.
    pub fn targets(self) -> &'static [NavState] {
        match self {
            NavState::Idle => &[NavState::Navigating],
            NavState::Navigating => &[NavState::AnimatingExit, NavState::Error],
            NavState::AnimatingExit => &[NavState::AnimatingEnter, NavState::Error],
            NavState::AnimatingEnter => &[NavState::Idle, NavState::Error],
            NavState::Error => &[NavState::Idle],
        }
    }

    /// True if the table has a `self → to` edge.
    pub fn can_reach(self, to: NavState) -> bool {
        self.targets().contains(&to)
    }

    /// Stored/wire name (`"ANIMATING_EXIT"`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            NavState::Idle => "IDLE",
            NavState::Navigating => "NAVIGATING",
            NavState::AnimatingExit => "ANIMATING_EXIT",
            NavState::AnimatingEnter => "ANIMATING_ENTER",
            NavState::Error => "ERROR",
        }
    }

    /// Shortest sequence of states leading from `from` to `to`, both included.
    ///
    /// `from == to` yields `[from]`. `None` when `to` is unreachable.
    pub fn find_path(from: NavState, to: NavState) -> Option<Vec<NavState>> {
        if from == to {
            return Some(vec![from]);
        }

        let mut parent: HashMap<NavState, NavState> = HashMap::new();
        let mut queue = VecDeque::from([from]);
        while let Some(cur) = queue.pop_front() {
            for &next in cur.targets() {
                if next == from || parent.contains_key(&next) {
                    continue;
                }
                parent.insert(next, cur);
                if next == to {
                    let mut path = vec![to];
                    let mut at = to;
                    while let Some(&p) = parent.get(&at) {
                        path.push(p);
                        at = p;
                    }
                    path.reverse();
                    return Some(path);
                }
                queue.push_back(next);
            }
        }
        None
    }
}

impl fmt::Display for NavState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NavState {
    type Err = TransitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NavState::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| TransitionError::UnknownState { name: s.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for st in NavState::ALL {
            assert_eq!(st.as_str().parse::<NavState>().unwrap(), st);
            assert_eq!(serde_json::to_value(st).unwrap(), st.as_str());
        }
        assert!(matches!(
            "LOADING".parse::<NavState>(),
            Err(TransitionError::UnknownState { .. })
        ));
    }

    #[test]
    fn shortest_paths() {
        use NavState::*;
        assert_eq!(
            NavState::find_path(Idle, AnimatingEnter),
            Some(vec![Idle, Navigating, AnimatingExit, AnimatingEnter])
        );
        assert_eq!(
            NavState::find_path(Navigating, Idle),
            Some(vec![Navigating, Error, Idle])
        );
        assert_eq!(NavState::find_path(Error, Error), Some(vec![Error]));
    }

    #[test]
    fn every_state_is_reachable_from_idle() {
        for st in NavState::ALL {
            assert!(NavState::find_path(NavState::Idle, st).is_some(), "{st}");
        }
    }
}
