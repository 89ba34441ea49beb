use std::{collections::HashSet, net::TcpListener, ops::Range};

use threadbox_utils::LOCALHOST_IP;

use crate::{SpawnError, ThreadboxError, ThreadboxResult};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Hands out loopback ports to threads, round-robin over a fixed range.
///
/// A port is skipped while it is allocated to another thread, and when something outside
/// the registry already listens on it.
#[derive(Debug)]
pub struct PortAllocator {
    range: Range<u16>,
    allocated: HashSet<u16>,
    next: u16,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl PortAllocator {
    /// Creates an allocator over `start..end`.
    pub fn new(start: u16, end: u16) -> ThreadboxResult<Self> {
        if start >= end {
            return Err(ThreadboxError::Config(format!(
                "invalid port range: {} >= {}",
                start, end
            )));
        }

        Ok(Self {
            range: start..end,
            allocated: HashSet::new(),
            next: start,
        })
    }

    /// Allocates the next free port.
    pub fn allocate(&mut self) -> Result<u16, SpawnError> {
        let capacity = self.range.len();

        for _ in 0..capacity {
            let port = self.next;
            self.next = if port + 1 >= self.range.end {
                self.range.start
            } else {
                port + 1
            };

            if self.allocated.contains(&port) || !is_port_free(port) {
                continue;
            }

            self.allocated.insert(port);
            return Ok(port);
        }

        Err(SpawnError::PortsExhausted {
            start: self.range.start,
            end: self.range.end,
        })
    }

    /// Returns a port to the pool. Releasing an unknown port is a no-op.
    pub fn release(&mut self, port: u16) {
        self.allocated.remove(&port);
    }

    /// Number of ports currently handed out.
    pub fn allocated_count(&self) -> usize {
        self.allocated.len()
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

fn is_port_free(port: u16) -> bool {
    TcpListener::bind((LOCALHOST_IP, port)).is_ok()
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Finds a run of `len` consecutive ports nobody listens on.
    fn free_range(len: u16) -> (u16, u16) {
        for start in (41000..60000).step_by(len as usize) {
            if (start..start + len).all(is_port_free) {
                return (start, start + len);
            }
        }
        panic!("no free port range");
    }

    #[test]
    fn test_rejects_empty_range() {
        assert!(PortAllocator::new(9000, 9000).is_err());
        assert!(PortAllocator::new(9001, 9000).is_err());
    }

    #[test]
    fn test_allocates_round_robin_and_exhausts() {
        let (start, end) = free_range(3);
        let mut ports = PortAllocator::new(start, end).unwrap();

        assert_eq!(ports.allocate().unwrap(), start);
        assert_eq!(ports.allocate().unwrap(), start + 1);
        assert_eq!(ports.allocate().unwrap(), start + 2);
        assert_eq!(
            ports.allocate(),
            Err(SpawnError::PortsExhausted { start, end })
        );

        ports.release(start + 1);
        assert_eq!(ports.allocate().unwrap(), start + 1);
        assert_eq!(ports.allocated_count(), 3);
    }

    #[test]
    fn test_skips_ports_bound_elsewhere() {
        let (start, end) = free_range(2);
        let _taken = TcpListener::bind((LOCALHOST_IP, start)).unwrap();

        let mut ports = PortAllocator::new(start, end).unwrap();
        assert_eq!(ports.allocate().unwrap(), start + 1);
    }
}
