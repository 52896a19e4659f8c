//! End-to-end tests over in-memory stores and a scripted generator.
