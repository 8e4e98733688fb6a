/// Router Module Index
///
/// Routes are split by the gate in front of them. The gates are applied as
/// layers in `create_router`, so a handler can never be mounted without its
/// access check.

/// Routes open to anonymous clients.
pub mod public;

/// Routes behind `auth_middleware`. Open to organizations and agents; the
/// handlers scope every query by the resolved principal.
pub mod authenticated;

/// Routes behind `auth_middleware` and `organization_middleware`.
pub mod organization;
