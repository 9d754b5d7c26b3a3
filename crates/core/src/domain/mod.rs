pub mod child;
pub mod item;
pub mod parent;
