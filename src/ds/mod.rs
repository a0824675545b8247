mod bignum;
mod coloring;
mod markset;
mod orbit;

pub use bignum::GroupSize;
pub use coloring::Coloring;
pub use markset::MarkSet;
pub use orbit::Orbit;
