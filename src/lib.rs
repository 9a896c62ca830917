#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod control;
pub mod queue;
pub mod radio;

#[cfg(feature = "adapter")]
pub mod shared;
#[cfg(feature = "adapter")]
pub mod adapter;
#[cfg(feature = "gateway")]
pub mod gateway;
