//! The `next`-link abstraction that lets `chain` connect any mix of
//! background and foreground stages into one linear pipeline and unify
//! their shared failure aggregator regardless of chaining order.

use std::sync::Arc;

use crate::pipeline::Pipeline;

/// A node reachable through a chain's forward links. Implemented by
/// `Stage` and `StageForeground`; never implemented outside this crate.
pub trait StageNode: Send + Sync {
    /// Submits an already-produced index to this node, as happens when an
    /// upstream stage forwards after its own task wrapper has run.
    fn push_index(&self, index: usize);

    fn pipeline(&self) -> Arc<Pipeline>;

    fn set_pipeline(&self, pipeline: Arc<Pipeline>);

    fn set_next(&self, next: Arc<dyn StageNode>);

    fn next_node(&self) -> Option<Arc<dyn StageNode>>;
}

/// Links `a.next = b`, then walks the linear list starting at `b` and
/// rewrites every node's pipeline (including already-linked downstream
/// nodes) to the instance held by `a`. Order-independent: calling
/// `chain(&b, c)` before `chain(&a, b)` still leaves `a`, `b`, and `c`
/// sharing one pipeline once both calls have run. Returns `b` to support
/// left-to-right composition: `chain(&chain(&a, b), c)` links `a → b → c`.
pub fn chain<A, B>(a: &Arc<A>, b: Arc<B>) -> Arc<B>
where
    A: StageNode + 'static,
    B: StageNode + 'static,
{
    let b_node: Arc<dyn StageNode> = b.clone();
    a.set_next(Arc::clone(&b_node));

    let target_pipeline = a.pipeline();
    let mut current = Some(b_node);
    while let Some(node) = current {
        if !Arc::ptr_eq(&node.pipeline(), &target_pipeline) {
            node.set_pipeline(Arc::clone(&target_pipeline));
        }
        current = node.next_node();
    }

    b
}
