// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types describing dilepton events and the physics
// that turns stored (pt, eta, phi, E) records into model inputs.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only structs, enums, traits and pure functions
//
// Keeping it pure means the reshaping and coordinate logic
// is unit-testable without a backend or any files on disk.

/// Typed errors for loading and reshaping events
pub mod error;

/// Per-event object blocks and the samples handed to Burn
pub mod event;

/// Coordinate systems and the (pt, eta, phi, E) conversion
pub mod kinematics;

/// Core abstractions (traits) that other layers implement
pub mod traits;
