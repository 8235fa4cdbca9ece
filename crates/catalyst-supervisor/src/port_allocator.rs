//! Port Allocator (C2): finds a free TCP port by probing a bound range.
//!
//! The result is advisory. A concurrent allocator, or the App Supervisor's
//! own process, may claim the port between this probe and the eventual
//! bind; callers must tolerate that race.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;
use tracing::debug;

#[derive(Error, Debug)]
pub enum PortAllocatorError {
    #[error("No free ports in range [{start}, {end}]")]
    NoFreePort { start: u16, end: u16 },
}

#[derive(Debug, Clone, Copy)]
pub struct PortAllocator {
    start: u16,
    end: u16,
    probe_timeout: Duration,
}

impl PortAllocator {
    pub fn new(start: u16, end: u16, probe_timeout: Duration) -> Self {
        Self {
            start,
            end,
            probe_timeout,
        }
    }

    /// Probes candidates in ascending order and returns the first free one.
    pub async fn allocate(&self) -> Result<u16, PortAllocatorError> {
        if self.start > self.end {
            return Err(PortAllocatorError::NoFreePort {
                start: self.start,
                end: self.end,
            });
        }

        for port in self.start..=self.end {
            if self.probe(port).await {
                debug!(port, "allocated port");
                return Ok(port);
            }
        }

        Err(PortAllocatorError::NoFreePort {
            start: self.start,
            end: self.end,
        })
    }

    /// A port is free only if it can be bound and listened on within the
    /// probe timeout; any bind error, permission error, or timeout marks
    /// it busy.
    async fn probe(&self, port: u16) -> bool {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port);
        match tokio::time::timeout(self.probe_timeout, TcpListener::bind(addr)).await {
            Ok(Ok(listener)) => {
                drop(listener);
                true
            }
            Ok(Err(_)) | Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allocates_first_free_port_in_range() {
        let allocator = PortAllocator::new(18000, 18010, Duration::from_millis(250));
        let port = allocator.allocate().await.unwrap();
        assert!((18000..=18010).contains(&port));
    }

    #[tokio::test]
    async fn empty_range_fails_with_no_free_port() {
        let allocator = PortAllocator::new(18100, 18099, Duration::from_millis(250));
        let result = allocator.allocate().await;
        assert!(matches!(result, Err(PortAllocatorError::NoFreePort { .. })));
    }

    #[tokio::test]
    async fn skips_a_port_already_bound_by_another_listener() {
        let held = TcpListener::bind((Ipv4Addr::LOCALHOST, 18200)).await.unwrap();
        let allocator = PortAllocator::new(18200, 18202, Duration::from_millis(250));
        let port = allocator.allocate().await.unwrap();
        assert_ne!(port, 18200);
        drop(held);
    }

    #[tokio::test]
    async fn single_port_range_with_that_port_busy_fails() {
        let held = TcpListener::bind((Ipv4Addr::LOCALHOST, 18300)).await.unwrap();
        let allocator = PortAllocator::new(18300, 18300, Duration::from_millis(250));
        let result = allocator.allocate().await;
        assert!(matches!(result, Err(PortAllocatorError::NoFreePort { .. })));
        drop(held);
    }

    #[tokio::test]
    async fn single_free_port_range_returns_it() {
        let allocator = PortAllocator::new(18400, 18400, Duration::from_millis(250));
        assert_eq!(allocator.allocate().await.unwrap(), 18400);
    }
}
