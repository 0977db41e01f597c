pub mod identity;
pub mod interaction;
pub mod product;
