pub use monoactor_core::*;
