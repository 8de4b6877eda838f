// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Connection and listen-endpoint keys.

use crate::address::{Endpoint, L4Proto};

/// Which side of the connection this host was on.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Role {
    Client,
    Server,
}

/// An observed L4 connection, keyed structurally over all fields.
///
/// Immutable once constructed; the normalizer produces new `Connection`
/// values rather than mutating these in place.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Connection {
    container_id: String,
    local: Endpoint,
    remote: Endpoint,
    l4proto: L4Proto,
    role: Role,
}

impl Connection {
    pub fn new(
        container_id: impl Into<String>,
        local: Endpoint,
        remote: Endpoint,
        l4proto: L4Proto,
        role: Role,
    ) -> Self {
        Connection {
            container_id: container_id.into(),
            local,
            remote,
            l4proto,
            role,
        }
    }

    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    pub const fn local(&self) -> Endpoint {
        self.local
    }

    pub const fn remote(&self) -> Endpoint {
        self.remote
    }

    pub const fn l4proto(&self) -> L4Proto {
        self.l4proto
    }

    pub const fn role(&self) -> Role {
        self.role
    }

    /// Build a copy with the local and remote endpoints replaced; everything
    /// else (container, protocol, role) is preserved. Used by the normalizer.
    pub fn with_endpoints(&self, local: Endpoint, remote: Endpoint) -> Self {
        Connection {
            container_id: self.container_id.clone(),
            local,
            remote,
            l4proto: self.l4proto,
            role: self.role,
        }
    }
}

/// A container-owned listening endpoint.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct ContainerEndpoint {
    container_id: String,
    endpoint: Endpoint,
    l4proto: L4Proto,
}

impl ContainerEndpoint {
    pub fn new(container_id: impl Into<String>, endpoint: Endpoint, l4proto: L4Proto) -> Self {
        ContainerEndpoint {
            container_id: container_id.into(),
            endpoint,
            l4proto,
        }
    }

    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    pub const fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    pub const fn l4proto(&self) -> L4Proto {
        self.l4proto
    }

    pub fn with_endpoint(&self, endpoint: Endpoint) -> Self {
        ContainerEndpoint {
            container_id: self.container_id.clone(),
            endpoint,
            l4proto: self.l4proto,
        }
    }
}
