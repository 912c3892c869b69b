use std::collections::HashMap;
use std::sync::Arc;

use arcstr::ArcStr;

use super::limits::MULTI_LEVEL_WILDCARD;
use crate::routing::SubscriptionList;

/// Handle of a node inside a [`TopicTree`](super::TopicTree) arena.
///
/// Handles are allocated in creation order and stay valid for the life of
/// the tree that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
	/// The unnamed root every path starts from
	pub const ROOT: NodeId = NodeId(0);

	pub(crate) fn new(index: usize) -> Self {
		Self(index)
	}

	/// Position of the node in the arena
	pub fn index(self) -> usize {
		self.0
	}
}

/// One level of the topic hierarchy.
#[derive(Debug)]
pub struct TopicNode<T> {
	name: ArcStr,
	parent: Option<NodeId>,
	children: HashMap<ArcStr, NodeId>,
	pub(crate) subscriptions: SubscriptionList<T>,
	pub(crate) retained: Option<Arc<T>>,
}

impl<T> TopicNode<T> {
	pub(crate) fn root() -> Self {
		Self::new(ArcStr::new(), None)
	}

	pub(crate) fn new(name: ArcStr, parent: Option<NodeId>) -> Self {
		Self {
			name,
			parent,
			children: HashMap::new(),
			subscriptions: SubscriptionList::new(),
			retained: None,
		}
	}

	/// Segment name; empty for the root
	pub fn name(&self) -> &ArcStr {
		&self.name
	}

	/// Handle of the enclosing level; `None` for the root
	pub fn parent(&self) -> Option<NodeId> {
		self.parent
	}

	/// True for the unnamed root
	pub fn is_root(&self) -> bool {
		self.parent.is_none()
	}

	/// True for a `#` node created by a wildcard subscription
	pub fn is_wildcard(&self) -> bool {
		self.name.as_str() == MULTI_LEVEL_WILDCARD
	}

	/// Direct child named `name`
	pub fn child(&self, name: &str) -> Option<NodeId> {
		self.children.get(name).copied()
	}

	/// Child handles in creation order
	pub fn children(&self) -> Vec<NodeId> {
		let mut children: Vec<NodeId> =
			self.children.values().copied().collect();
		children.sort_unstable();
		children
	}

	/// Number of direct children
	pub fn child_count(&self) -> usize {
		self.children.len()
	}

	pub(crate) fn insert_child(&mut self, name: ArcStr, id: NodeId) {
		self.children.insert(name, id);
	}

	/// Subscriptions registered on this exact node
	pub fn subscriptions(&self) -> &SubscriptionList<T> {
		&self.subscriptions
	}

	/// Memory-tier retained value of this exact topic
	pub fn retained(&self) -> Option<&Arc<T>> {
		self.retained.as_ref()
	}
}
