/// Router Module Index
///
/// Routes are split by access level. The guard for each group is applied as a
/// route layer in `create_router`, so a handler cannot be mounted without it.

/// Anonymous access: health, registration, login, recovery, content listings.
pub mod public;

/// Any authenticated principal (`AuthUser`).
pub mod authenticated;

/// Admin principals only (`AdminUser`).
pub mod admin;
