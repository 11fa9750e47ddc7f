//! Build information attached to every log line and reported by the
//! health check.

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The source revision, if the build environment provided one.
pub const REVISION: Option<&str> = option_env!("BACKEND_REVISION");

/// When the binary was built, if the build environment recorded it.
pub const BUILD_TIMESTAMP: Option<&str> = option_env!("BUILD_TIMESTAMP");
