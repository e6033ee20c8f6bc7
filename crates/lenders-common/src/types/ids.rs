//! Asset, account and pool handles
//!
//! Assets and actors are identified by 20-byte addresses. A pool is reached
//! through its proxy address ([`PoolHandle`]), which the factory derives from
//! its own address and a creation nonce the same way contract deployments do.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

/// Opaque stable handle of an asset
pub type AssetId = Address;

/// Opaque stable handle of an actor
pub type AccountId = Address;

/// Proxy address of a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoolHandle(pub Address);

impl PoolHandle {
    /// Derive the handle of the `nonce`-th pool created by `factory`
    pub fn derive(factory: Address, nonce: u64) -> Self {
        Self(factory.create(nonce))
    }

    /// Address the pool's custody is held under
    #[inline]
    pub fn address(&self) -> Address {
        self.0
    }
}

impl std::fmt::Display for PoolHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<PoolHandle> for Address {
    fn from(handle: PoolHandle) -> Self {
        handle.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_deterministic() {
        let factory = Address::repeat_byte(0xfa);
        assert_eq!(PoolHandle::derive(factory, 0), PoolHandle::derive(factory, 0));
        assert_ne!(PoolHandle::derive(factory, 0), PoolHandle::derive(factory, 1));
        assert_ne!(PoolHandle::derive(factory, 0).address(), factory);
    }
}
