#![doc = include_str!("../README.md")]

mod error;
mod luhn;
mod prefix;
mod provider;
mod rand;
mod resolver;
mod synth;
mod throttle;
mod time;

pub use crate::error::*;
pub use crate::luhn::*;
pub use crate::prefix::*;
pub use crate::provider::*;
pub use crate::rand::*;
pub use crate::resolver::*;
pub use crate::synth::*;
pub use crate::throttle::*;
pub use crate::time::*;
