#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]
#![cfg_attr(target_os = "none", allow(static_mut_refs))]

#[cfg(all(target_os = "none", not(feature = "panic-log")))]
extern crate panic_halt;

#[cfg(all(target_os = "none", feature = "panic-log"))]
mod panic;

mod bench;
mod console;
mod diagnostics;
mod hw;
mod kinematics;
mod link;
mod status;

#[cfg(target_os = "none")]
mod runtime;

#[cfg(not(target_os = "none"))]
fn main() {}
