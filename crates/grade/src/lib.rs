#![cfg_attr(not(test), no_std)]

extern crate alloc;

mod normalize;
mod score;

pub use normalize::normalize;
pub use score::{is_correct, score};
