mod perm;
mod schreier;

pub use perm::Perm;
pub use schreier::Schreier;
pub use schreier::Sift;
