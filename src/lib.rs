//! Batched shortest-path frontier from <https://arxiv.org/pdf/2504.17033v1>.
//!
//! [`BlockList`] keeps key/value pairs in bounded-size blocks split across
//! two chains: a batch-prepended chain holding bulk re-inserts, and a chain
//! of value intervals kept in order by a red-black tree. Inserts behave as
//! decrease-key, [`BlockList::batch_prepend`] absorbs whole result sets at
//! once, and [`BlockList::pull`] hands back the cheapest keys along with a
//! watermark bounding everything left.
//!
//! The supporting pieces are exposed too: [`RbTree`] is the ordered index
//! (exact and nearest-bound lookups), and [`quicksplit`] is the
//! deterministic linear-time selector the blocks use to find medians.
//!
//! ```
//! use bmssp_frontier::{BlockList, PullResult};
//!
//! let mut frontier = BlockList::new(2, 100.0);
//! frontier.insert(1, 5.0)?;
//! frontier.insert(2, 3.0)?;
//! frontier.insert(3, 9.0)?;
//!
//! let PullResult(mut keys, watermark) = frontier.pull()?;
//! keys.sort_unstable();
//! assert_eq!(keys, vec![1, 2]);
//! assert_eq!(watermark, 9.0);
//! # Ok::<(), bmssp_frontier::Error>(())
//! ```

mod arena;
mod block_list;
mod error;
pub mod quicksplit;
mod rbtree;

pub use block_list::{BlockList, PullResult};
pub use error::{Error, Result};
pub use rbtree::{FindMode, RbTree};

/// Keys are node ids in the caller's graph.
pub type NodeId = usize;
/// Values are path costs.
pub type Cost = f64;
