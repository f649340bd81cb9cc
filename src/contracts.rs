//! The external-collaborator boundary. The RIB, the interface table and the
//! neighbor cache all live outside this crate; it only needs to call into
//! them, never own them. Expressing that boundary as traits keeps the crate
//! buildable and testable without a real kernel or a real daemon behind it.

use std::net::Ipv4Addr;

use crate::model::{Interface, Route};

#[derive(Debug, Clone, Copy)]
pub struct Neighbor {
    pub iface_index: u32,
}

pub trait InterfaceTable {
    fn by_index(&self, index: u32) -> Option<Interface>;
    fn publish(&mut self, iface: Interface);
    fn begin_scan(&mut self);
    fn end_scan(&mut self);
}

pub trait NeighborTable {
    fn find(&self, gw: Ipv4Addr) -> Option<Neighbor>;
}

pub trait RibSink {
    fn scan_accept(&mut self, route: Route);
    fn async_accept(&mut self, route: Route, is_new: bool);
}

#[cfg(test)]
pub mod testutil {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    pub struct FakeInterfaceTable {
        pub by_index: HashMap<u32, Interface>,
        pub scanning: bool,
    }

    impl InterfaceTable for FakeInterfaceTable {
        fn by_index(&self, index: u32) -> Option<Interface> {
            self.by_index.get(&index).cloned()
        }

        fn publish(&mut self, iface: Interface) {
            self.by_index.insert(iface.index, iface);
        }

        fn begin_scan(&mut self) {
            self.scanning = true;
        }

        fn end_scan(&mut self) {
            self.scanning = false;
        }
    }

    #[derive(Default)]
    pub struct FakeNeighborTable {
        pub neighbors: HashMap<Ipv4Addr, Neighbor>,
    }

    impl NeighborTable for FakeNeighborTable {
        fn find(&self, gw: Ipv4Addr) -> Option<Neighbor> {
            self.neighbors.get(&gw).copied()
        }
    }

    #[derive(Default)]
    pub struct FakeRibSink {
        pub scanned: Vec<Route>,
        pub async_events: Vec<(Route, bool)>,
    }

    impl RibSink for FakeRibSink {
        fn scan_accept(&mut self, route: Route) {
            self.scanned.push(route);
        }

        fn async_accept(&mut self, route: Route, is_new: bool) {
            self.async_events.push((route, is_new));
        }
    }
}
