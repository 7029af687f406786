//! Transition system over a token sequence.
//!
//! Items are 1-based token positions, `-1` for the `<ROOT>` token, and
//! ids above the token count for nodes created by ENTITY and DEPENDENT.
//! The predicted graph uses the same ids, so an item and its node are
//! the same number. `stack`, `buffer` and `latent` keep their top at the
//! end of the vector.
//!
//! The action methods are the only code that moves items between the
//! three collections or edits the predicted graph.

use std::collections::{BTreeMap, BTreeSet};

use log::trace;

use crate::action::Action;
use crate::entity_rules::{self, EntityRuleTally};
use crate::error::TransitionError;
use crate::graph::{Amr, Edge, NodeId, ENTITY_EDGE, ROOT_EDGE, ROOT_ID, ROOT_TOKEN, UNALIGNED_TOKEN};

#[derive(Debug, Clone)]
pub struct StateMachine {
    pub stack: Vec<NodeId>,
    pub buffer: Vec<NodeId>,
    pub latent: Vec<NodeId>,
    /// Predicted graph.
    pub amr: Amr,
    pub actions: Vec<Action>,
    /// merged item -> absorbed token positions, in surface order
    pub merged_tokens: BTreeMap<NodeId, Vec<NodeId>>,
    pub entities: BTreeSet<NodeId>,
    pub is_confirmed: BTreeSet<NodeId>,
    /// item -> items it has been swapped below
    pub swapped_words: BTreeMap<NodeId, BTreeSet<NodeId>>,
    new_id: NodeId,
}

impl StateMachine {
    /// Build the initial configuration. `<ROOT>` is appended when the
    /// token list does not already end with it.
    pub fn new(tokens: &[String]) -> Self {
        let mut tokens = tokens.to_vec();
        if tokens.last().map(String::as_str) != Some(ROOT_TOKEN) {
            tokens.push(ROOT_TOKEN.to_owned());
        }
        let root_pos = tokens.len();

        let mut amr = Amr::new(tokens.clone());
        let mut buffer = vec![ROOT_ID];
        let mut latent = Vec::new();
        for (i, tok) in tokens.iter().enumerate().take(root_pos - 1) {
            let pos = i as NodeId + 1;
            amr.nodes.insert(pos, tok.clone());
            if tok == UNALIGNED_TOKEN {
                latent.push(pos);
            } else {
                buffer.push(pos);
            }
        }
        amr.nodes.insert(ROOT_ID, ROOT_TOKEN.to_owned());
        buffer[1..].reverse();
        latent.reverse();

        let mut is_confirmed = BTreeSet::new();
        is_confirmed.insert(ROOT_ID);
        let new_id = amr.next_free_id();

        StateMachine {
            stack: Vec::new(),
            buffer,
            latent,
            amr,
            actions: Vec::new(),
            merged_tokens: BTreeMap::new(),
            entities: BTreeSet::new(),
            is_confirmed,
            swapped_words: BTreeMap::new(),
            new_id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.stack.is_empty() && self.buffer.is_empty()
    }

    pub fn stack0(&self) -> Option<NodeId> {
        self.stack.last().copied()
    }

    pub fn stack1(&self) -> Option<NodeId> {
        self.stack.len().checked_sub(2).map(|i| self.stack[i])
    }

    pub fn buffer0(&self) -> Option<NodeId> {
        self.buffer.last().copied()
    }

    pub fn last_action(&self) -> Option<&Action> {
        self.actions.last()
    }

    pub fn label(&self, item: NodeId) -> &str {
        self.amr.label(item).unwrap_or("")
    }

    /// True once `a` and `b` have been swapped past each other, in
    /// either order.
    pub fn were_swapped(&self, a: NodeId, b: NodeId) -> bool {
        let below = |x: NodeId, y: NodeId| {
            self.swapped_words
                .get(&x)
                .is_some_and(|passed| passed.contains(&y))
        };
        below(a, b) || below(b, a)
    }

    /// Token positions covered by an item.
    pub fn token_positions(&self, item: NodeId) -> Vec<NodeId> {
        match self.merged_tokens.get(&item) {
            Some(positions) => positions.clone(),
            None if item == ROOT_ID || self.is_token(item) => vec![item],
            None => Vec::new(),
        }
    }

    /// Surface tokens of an item, comma joined.
    pub fn surface(&self, item: NodeId) -> String {
        self.token_positions(item)
            .iter()
            .map(|p| self.token_text(*p).replace(',', "-COMMA-"))
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn token_text(&self, pos: NodeId) -> &str {
        if pos == ROOT_ID {
            return ROOT_TOKEN;
        }
        usize::try_from(pos - 1)
            .ok()
            .and_then(|i| self.amr.tokens.get(i))
            .map_or("", String::as_str)
    }

    fn is_token(&self, item: NodeId) -> bool {
        item >= 1 && item < self.amr.tokens.len() as NodeId
    }

    pub(crate) fn fresh_id(&mut self) -> NodeId {
        let id = self.new_id;
        self.new_id += 1;
        id
    }

    fn require_stack(&self, action: &'static str, needed: usize) -> Result<(), TransitionError> {
        if self.stack.len() < needed {
            return Err(TransitionError::StackTooShort {
                action,
                needed,
                found: self.stack.len(),
            });
        }
        Ok(())
    }

    fn log(&mut self, action: Action) {
        trace!("{} stack={:?} buffer={:?}", action, self.stack, self.buffer);
        self.actions.push(action);
    }

    // ── Actions ──────────────────────────────────────────────────────

    pub fn shift(&mut self) -> Result<(), TransitionError> {
        let item = self.buffer.pop().ok_or(TransitionError::EmptyBuffer("SHIFT"))?;
        self.stack.push(item);
        self.log(Action::Shift);
        Ok(())
    }

    /// Pop the stack top. A token that never received an edge leaves the
    /// predicted graph with it.
    pub fn reduce(&mut self) -> Result<(), TransitionError> {
        let Some(item) = self.stack.pop() else {
            return Err(TransitionError::StackTooShort {
                action: "REDUCE",
                needed: 1,
                found: 0,
            });
        };
        if item != ROOT_ID && !self.entities.contains(&item) && !self.amr.has_incident_edge(item) {
            self.amr.nodes.remove(&item);
        }
        self.log(Action::Reduce);
        Ok(())
    }

    pub fn confirm(&mut self, label: &str) -> Result<(), TransitionError> {
        self.require_stack("CONFIRM", 1)?;
        let item = self.stack[self.stack.len() - 1];
        self.amr.nodes.insert(item, label.to_owned());
        self.is_confirmed.insert(item);
        self.log(Action::Confirm(label.to_owned()));
        Ok(())
    }

    /// Move stack1 back onto the buffer.
    pub fn swap(&mut self) -> Result<(), TransitionError> {
        self.require_stack("SWAP", 2)?;
        let top = self.stack.len() - 1;
        let stack0 = self.stack.remove(top);
        let stack1 = self.stack.remove(top - 1);
        self.buffer.push(stack1);
        self.stack.push(stack0);
        self.swapped_words.entry(stack1).or_default().insert(stack0);
        self.log(Action::Swap);
        Ok(())
    }

    /// stack0 becomes the head of stack1.
    pub fn left_arc(&mut self, label: &str) -> Result<(), TransitionError> {
        self.require_stack("LA", 2)?;
        let (s0, s1) = (self.stack[self.stack.len() - 1], self.stack[self.stack.len() - 2]);
        self.amr.edges.push(Edge::new(s0, label, s1));
        self.log(Action::LeftArc(label.to_owned()));
        Ok(())
    }

    /// stack1 becomes the head of stack0.
    pub fn right_arc(&mut self, label: &str) -> Result<(), TransitionError> {
        self.require_stack("RA", 2)?;
        let (s0, s1) = (self.stack[self.stack.len() - 1], self.stack[self.stack.len() - 2]);
        self.amr.edges.push(Edge::new(s1, label, s0));
        self.log(Action::RightArc(label.to_owned()));
        Ok(())
    }

    /// Fold stack1 into stack0. The merged item keeps stack0's id.
    pub fn merge(&mut self) -> Result<(), TransitionError> {
        self.require_stack("MERGE", 2)?;
        let top = self.stack.len() - 1;
        let lead = self.stack.remove(top);
        let sec = self.stack.remove(top - 1);
        self.stack.push(lead);

        let mut positions = self
            .merged_tokens
            .remove(&sec)
            .unwrap_or_else(|| self.token_positions(sec));
        positions.extend(self.token_positions(lead));
        self.merged_tokens.insert(lead, positions);

        if self.entities.remove(&sec) {
            let children: Vec<NodeId> = self.entity_children(sec);
            for child in &children {
                self.amr.nodes.remove(child);
            }
            self.amr
                .edges
                .retain(|e| !(e.source == sec && e.label == ENTITY_EDGE));
        }
        for edge in &mut self.amr.edges {
            if edge.source == sec {
                edge.source = lead;
            }
            if edge.target == sec {
                edge.target = lead;
            }
        }
        self.amr.nodes.remove(&sec);

        let surface = self.surface(lead);
        let holder = if self.entities.contains(&lead) {
            self.entity_children(lead).first().copied().unwrap_or(lead)
        } else {
            lead
        };
        self.amr.nodes.insert(holder, surface);
        self.log(Action::Merge);
        Ok(())
    }

    /// Turn stack0 into an entity head; its surface string moves to a
    /// child linked by an `entity` edge until CLOSE expands it.
    pub fn entity(&mut self, entity_type: &str) -> Result<(), TransitionError> {
        self.require_stack("ENTITY", 1)?;
        let item = self.stack[self.stack.len() - 1];
        let surface = self.surface(item);
        let child = self.fresh_id();
        self.amr.nodes.insert(item, entity_type.to_owned());
        self.amr.nodes.insert(child, surface);
        self.amr.edges.push(Edge::new(item, ENTITY_EDGE, child));
        self.entities.insert(item);
        self.is_confirmed.insert(item);
        self.log(Action::Entity(entity_type.to_owned()));
        Ok(())
    }

    /// Attach a new node under stack0 without shifting anything.
    pub fn dependent(&mut self, edge: &str, node: &str) -> Result<(), TransitionError> {
        self.require_stack("DEPENDENT", 1)?;
        let item = self.stack[self.stack.len() - 1];
        let child = self.fresh_id();
        self.amr.nodes.insert(child, node.to_owned());
        self.amr.edges.push(Edge::new(item, edge, child));
        let positions = self.token_positions(item);
        if !positions.is_empty() {
            self.amr.alignments.insert(child, positions);
        }
        self.is_confirmed.insert(child);
        self.log(Action::Dependent {
            edge: edge.to_owned(),
            node: node.to_owned(),
        });
        Ok(())
    }

    /// Move the latent item at `position` to the top of `latent`.
    pub fn promote_latent(&mut self, position: usize) -> Result<(), TransitionError> {
        if position >= self.latent.len() {
            return Err(TransitionError::NoLatent(position));
        }
        let item = self.latent.remove(position);
        self.latent.push(item);
        Ok(())
    }

    /// Place the latent item at `position` directly under the stack top.
    pub fn introduce(&mut self, position: usize) -> Result<(), TransitionError> {
        self.promote_latent(position)?;
        let item = self.latent.pop().ok_or(TransitionError::NoLatent(position))?;
        match self.stack.len() {
            0 => self.stack.push(item),
            n => self.stack.insert(n - 1, item),
        }
        self.log(Action::Introduce);
        Ok(())
    }

    /// Forced exit when no transition applies.
    pub fn abandon(&mut self) {
        self.stack.clear();
        self.buffer.clear();
    }

    /// Apply a parsed action, as read back from a trace.
    pub fn apply(&mut self, action: &Action) -> Result<(), TransitionError> {
        match action {
            Action::Shift => self.shift(),
            Action::Reduce => self.reduce(),
            Action::Confirm(label) => self.confirm(label),
            Action::Swap => self.swap(),
            Action::LeftArc(label) => self.left_arc(label),
            Action::RightArc(label) => self.right_arc(label),
            Action::Entity(entity_type) => self.entity(entity_type),
            Action::Merge => self.merge(),
            Action::Dependent { edge, node } => self.dependent(edge, node),
            Action::Introduce => {
                let top = self
                    .latent
                    .len()
                    .checked_sub(1)
                    .ok_or(TransitionError::NoLatent(0))?;
                self.introduce(top)
            }
            Action::Close => {
                self.close(None, true);
                Ok(())
            }
        }
    }

    pub(crate) fn entity_children(&self, item: NodeId) -> Vec<NodeId> {
        self.amr
            .edges
            .iter()
            .filter(|e| e.source == item && e.label == ENTITY_EDGE)
            .map(|e| e.target)
            .collect()
    }

    /// Finish the predicted graph: expand entities, drop the sentinel,
    /// drop unused token nodes, record alignments.
    ///
    /// With a gold graph (training) each entity expansion is scored
    /// against the gold subgraph of its tokens.
    pub fn close(&mut self, gold: Option<&Amr>, use_entity_rules: bool) -> EntityRuleTally {
        let mut tally = EntityRuleTally::default();
        let entities: Vec<NodeId> = self.entities.iter().copied().collect();
        for head in entities {
            entity_rules::expand(self, head, gold, use_entity_rules, &mut tally);
        }

        let mut root = self
            .amr
            .edges
            .iter()
            .find(|e| e.source == ROOT_ID && e.label == ROOT_EDGE)
            .map(|e| e.target);
        self.amr
            .edges
            .retain(|e| e.source != ROOT_ID && e.target != ROOT_ID);
        self.amr.nodes.remove(&ROOT_ID);

        let amr = &self.amr;
        let confirmed = &self.is_confirmed;
        let keep: BTreeSet<NodeId> = amr
            .nodes
            .keys()
            .copied()
            .filter(|id| confirmed.contains(id) || amr.has_incident_edge(*id) || root == Some(*id))
            .collect();
        self.amr.nodes.retain(|id, _| keep.contains(id));

        if root.is_none() {
            root = self
                .amr
                .nodes
                .keys()
                .copied()
                .find(|id| !self.amr.edges.iter().any(|e| e.target == *id));
        }
        self.amr.root = root;

        let token_nodes: Vec<NodeId> = self
            .amr
            .nodes
            .keys()
            .copied()
            .filter(|id| self.merged_tokens.contains_key(id) || self.is_token(*id))
            .collect();
        for id in token_nodes {
            let positions = self.token_positions(id);
            self.amr.alignments.insert(id, positions);
        }
        let nodes = &self.amr.nodes;
        self.amr.alignments.retain(|id, _| nodes.contains_key(id));

        self.log(Action::Close);
        tally
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine(tokens: &[&str]) -> StateMachine {
        let tokens: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();
        StateMachine::new(&tokens)
    }

    #[test]
    fn initial_configuration() {
        let m = machine(&["the", "dog", "<unaligned>", "<unaligned>"]);
        assert_eq!(m.buffer, vec![ROOT_ID, 2, 1]);
        assert_eq!(m.latent, vec![4, 3]);
        assert!(m.stack.is_empty());
        assert_eq!(m.amr.tokens.last().map(String::as_str), Some(ROOT_TOKEN));
        assert_eq!(m.label(1), "the");
        assert_eq!(m.label(ROOT_ID), ROOT_TOKEN);
        assert!(m.is_confirmed.contains(&ROOT_ID));
    }

    #[test]
    fn existing_root_token_is_not_duplicated() {
        let m = machine(&["dog", "<ROOT>"]);
        assert_eq!(m.amr.tokens.len(), 2);
        assert_eq!(m.buffer, vec![ROOT_ID, 1]);
    }

    #[test]
    fn arcs_and_reduce() {
        let mut m = machine(&["dog", "runs"]);
        m.shift().unwrap();
        m.shift().unwrap();
        m.left_arc(":ARG0").unwrap();
        assert!(m.amr.has_edge(2, ":ARG0", 1));
        m.shift().unwrap();
        m.right_arc("root").unwrap();
        assert!(m.amr.has_edge(2, "root", ROOT_ID));
        m.reduce().unwrap();
        assert_eq!(m.stack, vec![1, 2]);
        assert!(m.amr.nodes.contains_key(&ROOT_ID));
    }

    #[test]
    fn reduce_drops_unattached_tokens() {
        let mut m = machine(&["the", "dog"]);
        m.shift().unwrap();
        m.reduce().unwrap();
        assert!(!m.amr.nodes.contains_key(&1));
    }

    #[test]
    fn swap_records_pair_and_returns_item() {
        let mut m = machine(&["a", "b", "c"]);
        m.shift().unwrap();
        m.shift().unwrap();
        m.swap().unwrap();
        assert_eq!(m.stack, vec![2]);
        assert_eq!(m.buffer0(), Some(1));
        assert!(m.were_swapped(1, 2));
        assert!(m.were_swapped(2, 1));
        assert!(!m.were_swapped(1, 3));
    }

    #[test]
    fn merge_joins_surface_and_rewires_edges() {
        let mut m = machine(&["x", "New", "York"]);
        m.shift().unwrap();
        m.shift().unwrap();
        m.left_arc(":mod").unwrap();
        m.shift().unwrap();
        m.merge().unwrap();
        assert_eq!(m.stack, vec![1, 3]);
        assert_eq!(m.merged_tokens[&3], vec![2, 3]);
        assert_eq!(m.label(3), "New,York");
        assert!(!m.amr.nodes.contains_key(&2));
        assert!(m.amr.has_edge(3, ":mod", 1));
    }

    #[test]
    fn entity_keeps_surface_on_child() {
        let mut m = machine(&["Paris"]);
        m.shift().unwrap();
        m.entity("city,name").unwrap();
        let child = m.entity_children(1);
        assert_eq!(child.len(), 1);
        assert_eq!(m.label(child[0]), "Paris");
        assert_eq!(m.label(1), "city,name");
        assert!(m.entities.contains(&1));
    }

    #[test]
    fn dependent_adds_child_without_moving_items() {
        let mut m = machine(&["not"]);
        m.shift().unwrap();
        m.dependent(":polarity", "-").unwrap();
        assert_eq!(m.stack, vec![1]);
        let edge = m.amr.edges.last().unwrap();
        assert_eq!((edge.source, edge.label.as_str()), (1, ":polarity"));
        assert_eq!(m.label(edge.target), "-");
        assert!(edge.target > 2);
    }

    #[test]
    fn synthesized_ids_start_above_the_root_token() {
        let mut m = machine(&["a", "b"]);
        m.shift().unwrap();
        m.dependent(":mode", "imperative").unwrap();
        m.entity("person").unwrap();
        let ids: Vec<NodeId> = m.amr.nodes.keys().copied().filter(|id| *id > 2).collect();
        assert_eq!(ids, vec![4, 5]);
    }

    #[test]
    fn introduce_promotes_and_places_under_top() {
        let mut m = machine(&["go", "<unaligned>", "<unaligned>"]);
        m.shift().unwrap();
        assert_eq!(m.latent, vec![3, 2]);
        m.introduce(0).unwrap();
        assert_eq!(m.stack, vec![3, 1]);
        assert_eq!(m.latent, vec![2]);
        assert!(m.introduce(4).is_err());
    }

    #[test]
    fn stack_preconditions_are_errors() {
        let mut m = machine(&["a"]);
        assert_eq!(
            m.left_arc(":ARG0"),
            Err(TransitionError::StackTooShort {
                action: "LA",
                needed: 2,
                found: 0
            })
        );
        m.shift().unwrap();
        m.shift().unwrap();
        assert_eq!(m.shift(), Err(TransitionError::EmptyBuffer("SHIFT")));
    }

    #[test]
    fn close_moves_root_off_the_sentinel() {
        let mut m = machine(&["the", "dog"]);
        for action in ["SHIFT", "SHIFT", "CONFIRM(dog)", "SHIFT", "LA(root)", "REDUCE"] {
            m.apply(&action.parse().unwrap()).unwrap();
        }
        m.close(None, true);
        assert_eq!(m.amr.root, Some(2));
        assert!(!m.amr.nodes.contains_key(&ROOT_ID));
        assert!(!m.amr.nodes.contains_key(&1));
        assert!(m.amr.edges.is_empty());
        assert_eq!(m.amr.alignments[&2], vec![2]);
        assert_eq!(m.last_action(), Some(&Action::Close));
    }
}
