mod controller;
mod refine;
mod select;
pub mod trace;
mod tree;

pub use controller::BaseEntry;
pub use controller::Controller;
pub use controller::SavedState;
pub use refine::Refiner;
pub use select::Policy;
pub use select::Selector;
pub use select::SelectorFactory;
pub use trace::Deviation;
pub use trace::Trace;
pub use trace::TraceCompare;
pub use tree::SharedTree;
pub use tree::TreeNode;
