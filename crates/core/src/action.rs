//! Transition actions and their textual form.
//!
//! `SHIFT`, `REDUCE`, `SWAP`, `MERGE`, `INTRODUCE`, `CLOSE` take no
//! argument; `CONFIRM(label)`, `LA(label)`, `RA(label)`, `ENTITY(type)`
//! take one; `DEPENDENT(edge,node)` takes two, split on the first comma.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TransitionError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Shift,
    Reduce,
    Confirm(String),
    Swap,
    LeftArc(String),
    RightArc(String),
    Entity(String),
    Merge,
    Dependent { edge: String, node: String },
    Introduce,
    Close,
}

/// Action name without arguments; keys the statistics tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    Shift,
    Reduce,
    Confirm,
    Swap,
    #[serde(rename = "LA")]
    LeftArc,
    #[serde(rename = "RA")]
    RightArc,
    Entity,
    Merge,
    Dependent,
    Introduce,
    Close,
}

impl ActionKind {
    pub fn name(self) -> &'static str {
        match self {
            ActionKind::Shift => "SHIFT",
            ActionKind::Reduce => "REDUCE",
            ActionKind::Confirm => "CONFIRM",
            ActionKind::Swap => "SWAP",
            ActionKind::LeftArc => "LA",
            ActionKind::RightArc => "RA",
            ActionKind::Entity => "ENTITY",
            ActionKind::Merge => "MERGE",
            ActionKind::Dependent => "DEPENDENT",
            ActionKind::Introduce => "INTRODUCE",
            ActionKind::Close => "CLOSE",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Shift => ActionKind::Shift,
            Action::Reduce => ActionKind::Reduce,
            Action::Confirm(_) => ActionKind::Confirm,
            Action::Swap => ActionKind::Swap,
            Action::LeftArc(_) => ActionKind::LeftArc,
            Action::RightArc(_) => ActionKind::RightArc,
            Action::Entity(_) => ActionKind::Entity,
            Action::Merge => ActionKind::Merge,
            Action::Dependent { .. } => ActionKind::Dependent,
            Action::Introduce => ActionKind::Introduce,
            Action::Close => ActionKind::Close,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.kind().name();
        match self {
            Action::Confirm(arg)
            | Action::LeftArc(arg)
            | Action::RightArc(arg)
            | Action::Entity(arg) => write!(f, "{}({})", name, arg),
            Action::Dependent { edge, node } => write!(f, "{}({},{})", name, edge, node),
            _ => f.write_str(name),
        }
    }
}

impl FromStr for Action {
    type Err = TransitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let bad = || TransitionError::BadAction(s.to_owned());
        let (name, arg) = match s.find('(') {
            Some(open) if s.ends_with(')') => (&s[..open], Some(&s[open + 1..s.len() - 1])),
            Some(_) => return Err(bad()),
            None => (s, None),
        };
        let action = match (name, arg) {
            ("SHIFT", None) => Action::Shift,
            ("REDUCE", None) => Action::Reduce,
            ("SWAP", None) => Action::Swap,
            ("MERGE", None) => Action::Merge,
            ("INTRODUCE", None) => Action::Introduce,
            ("CLOSE", None) => Action::Close,
            ("CONFIRM", Some(a)) => Action::Confirm(a.to_owned()),
            ("LA", Some(a)) => Action::LeftArc(a.to_owned()),
            ("RA", Some(a)) => Action::RightArc(a.to_owned()),
            ("ENTITY", Some(a)) => Action::Entity(a.to_owned()),
            ("DEPENDENT", Some(a)) => {
                let (edge, node) = a.split_once(',').ok_or_else(bad)?;
                Action::Dependent {
                    edge: edge.to_owned(),
                    node: node.to_owned(),
                }
            }
            _ => return Err(bad()),
        };
        Ok(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_with_commas_and_parens_survive_text_form() {
        let actions = [
            Action::Entity("city,name".into()),
            Action::Confirm("(x)".into()),
            Action::Dependent {
                edge: ":polarity".into(),
                node: "-".into(),
            },
        ];
        for action in actions {
            let text = action.to_string();
            assert_eq!(text.parse::<Action>().unwrap(), action, "{}", text);
        }
    }

    #[test]
    fn unknown_or_malformed_actions_are_rejected() {
        assert!("JUMP".parse::<Action>().is_err());
        assert!("LA".parse::<Action>().is_err());
        assert!("SHIFT(x)".parse::<Action>().is_err());
        assert!("DEPENDENT(:mode)".parse::<Action>().is_err());
        assert!("LA(:ARG0".parse::<Action>().is_err());
    }

    #[test]
    fn kind_names_match_text_form() {
        assert_eq!(Action::LeftArc(":ARG0".into()).to_string(), "LA(:ARG0)");
        assert_eq!(Action::Shift.kind().to_string(), "SHIFT");
    }
}
