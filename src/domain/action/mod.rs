pub mod entity;
pub mod sequence;

pub use entity::Action;
pub use sequence::ActionSequence;
