//! Shared value types used by the input, render and backend crates.

pub mod types;

pub use types::{Rgba, Viewport};

pub fn crate_info() -> &'static str {
    "freelook-common v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("common"));
    }
}
