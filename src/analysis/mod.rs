pub mod block;
pub mod edge;
pub mod frame;
pub mod graph;
pub mod trace;

pub use block::{Block, BlockKind, Label};
pub use edge::{Edge, EdgeKind};
pub use frame::{Entry, Frame};
pub use graph::{Assembled, Graph};
pub use trace::{trace, BlockTrace, Trace};
