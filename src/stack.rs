/// Below this much remaining stack a new segment is allocated
const RED_ZONE: usize = 100 * 1024;

/// Size of each new stack segment
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Run `f` with enough native stack for another level of tree recursion
/// Scripts recurse as deep as they like, so every recursive walk over the tree (parsing, resolving, evaluating)
/// goes through here rather than trusting the thread's fixed stack
#[inline]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}
