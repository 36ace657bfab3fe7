/// Router Module Index
///
/// Splits the API into two route sets by the gate that guards them. Both sit behind
/// the soft-auth layer applied in `create_router`; only the authenticated set adds
/// the hard gate.

/// Routes open to anonymous callers. Handlers apply the visibility filter themselves.
pub mod public;

/// Routes that require a resolved `AuthUser`.
pub mod authenticated;
