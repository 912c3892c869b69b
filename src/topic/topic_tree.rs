use std::num::NonZeroUsize;

use arcstr::ArcStr;
use lru::LruCache;
use smallvec::SmallVec;
use tracing::debug;

use super::error::limits::MULTI_LEVEL_WILDCARD;
use super::error::{TopicPathError, TopicResult, validation};
use super::topic_node::{NodeId, TopicNode};

/// Nodes denoted by a path, outermost segment first
pub type ResolvedPath = SmallVec<[NodeId; 8]>;

/// `#` nodes whose subscriptions match a published topic
pub type WildcardMatches = SmallVec<[NodeId; 4]>;

/// Default capacity of the exact-path lookup cache
pub const DEFAULT_EXACT_CACHE_SIZE: usize = 100;

/// Arena-backed topic hierarchy that grows on demand.
///
/// Node 0 is the unnamed root. Nodes are never removed, so a [`NodeId`] and
/// every cached exact-path lookup stay valid for the life of the tree.
#[derive(Debug)]
pub struct TopicTree<T> {
	nodes: Vec<TopicNode<T>>,
	exact_cache: LruCache<ArcStr, NodeId>,
}

impl<T> Default for TopicTree<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T> TopicTree<T> {
	/// Creates a tree holding only the root
	pub fn new() -> Self {
		let capacity = NonZeroUsize::new(DEFAULT_EXACT_CACHE_SIZE)
			.unwrap_or(NonZeroUsize::MIN);
		Self::with_cache_capacity(capacity)
	}

	/// Creates a tree whose exact-path cache holds `capacity` entries
	pub fn with_cache_capacity(capacity: NonZeroUsize) -> Self {
		Self {
			nodes: vec![TopicNode::root()],
			exact_cache: LruCache::new(capacity),
		}
	}

	/// Handle of the root
	pub fn root(&self) -> NodeId {
		NodeId::ROOT
	}

	/// Node behind `id`, if this tree issued it
	pub fn get(&self, id: NodeId) -> Option<&TopicNode<T>> {
		self.nodes.get(id.index())
	}

	/// # Panics
	///
	/// Panics if `id` was issued by another tree.
	pub fn node(&self, id: NodeId) -> &TopicNode<T> {
		&self.nodes[id.index()]
	}

	pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut TopicNode<T> {
		&mut self.nodes[id.index()]
	}

	/// Number of topics, not counting the root
	pub fn topic_count(&self) -> usize {
		self.nodes.len() - 1
	}

	/// Direct child `name` of `parent`, without creating it
	pub fn child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
		self.get(parent).and_then(|node| node.child(name))
	}

	fn child_or_insert(&mut self, parent: NodeId, name: &str) -> NodeId {
		if let Some(id) = self.node(parent).child(name) {
			return id;
		}
		let id = NodeId::new(self.nodes.len());
		let name = ArcStr::from(name);
		self.nodes.push(TopicNode::new(name.clone(), Some(parent)));
		self.node_mut(parent).insert_child(name, id);
		debug!(topic = %self.full_path(id), "Topic created");
		id
	}

	/// Resolves `path` from the root, creating missing nodes.
	///
	/// Returns one node per segment, or `None` if the path is invalid. The
	/// path is validated as a whole first, so a failed resolution creates
	/// nothing.
	pub fn resolve(&mut self, path: &str) -> Option<ResolvedPath> {
		self.resolve_from(NodeId::ROOT, path)
	}

	/// Resolves `path` relative to `start`, creating missing nodes.
	///
	/// Nothing can be resolved below a `#` node.
	pub fn resolve_from(
		&mut self,
		start: NodeId,
		path: &str,
	) -> Option<ResolvedPath> {
		if self.get(start)?.is_wildcard() {
			return None;
		}
		let segments = validation::split_segments(path)?;
		let mut resolved = ResolvedPath::new();
		self.materialize(start, &segments, &mut resolved);
		Some(resolved)
	}

	fn materialize(
		&mut self,
		level: NodeId,
		segments: &[&str],
		resolved: &mut ResolvedPath,
	) {
		match segments {
			| [] => {}
			| [head, rest @ ..] => {
				let child = self.child_or_insert(level, head);
				resolved.push(child);
				// `#` is always the last segment
				if *head != MULTI_LEVEL_WILDCARD {
					self.materialize(child, rest, resolved);
				}
			}
		}
	}

	/// Resolves a wildcard-free path to its innermost node.
	pub fn resolve_exact(&mut self, path: &str) -> TopicResult<NodeId> {
		if validation::has_wildcard(path) {
			return Err(TopicPathError::wildcard_misuse(
				path,
				"exact resolution",
			));
		}
		if let Some(id) = self.exact_cache.get(path) {
			return Ok(*id);
		}
		let node = self
			.resolve(path)
			.and_then(|resolved| resolved.last().copied())
			.ok_or_else(|| TopicPathError::invalid_path(path))?;
		self.exact_cache.put(ArcStr::from(path), node);
		Ok(node)
	}

	/// Looks up `path` without creating anything
	pub fn find(&self, path: &str) -> Option<NodeId> {
		let segments = validation::split_segments(path)?;
		segments
			.iter()
			.try_fold(NodeId::ROOT, |level, segment| self.child(level, segment))
	}

	/// Collects the `#` children of `node` and of every ancestor.
	///
	/// A `#` child of the published node itself matches too, since `a/#`
	/// includes the parent level `a`. Each level contributes at most one
	/// node, so the result has no duplicates.
	pub fn wildcard_matches(&self, node: NodeId) -> WildcardMatches {
		let mut matches = WildcardMatches::new();
		self.collect_wildcard_ancestors(Some(node), &mut matches);
		matches
	}

	fn collect_wildcard_ancestors(
		&self,
		level: Option<NodeId>,
		matches: &mut WildcardMatches,
	) {
		let Some(id) = level else {
			return;
		};
		if let Some(hash) = self.child(id, MULTI_LEVEL_WILDCARD) {
			matches.push(hash);
		}
		let parent = self.get(id).and_then(TopicNode::parent);
		self.collect_wildcard_ancestors(parent, matches);
	}

	/// Canonical path of `node`, rebuilt from parent links
	pub fn full_path(&self, node: NodeId) -> String {
		let mut names: SmallVec<[&str; 8]> = SmallVec::new();
		let mut current = self.get(node);
		while let Some(topic) = current.filter(|topic| !topic.is_root()) {
			names.push(topic.name().as_str());
			current = topic.parent().and_then(|parent| self.get(parent));
		}
		names.reverse();
		names.join("/")
	}
}
