//! Proxy Configurator (C8): installs and reloads a per-deployment reverse
//! proxy config. Only engaged in production mode.

pub mod configurator;

pub use configurator::{configure, ConfigureRequest, ProxyError, ProxyPaths};
