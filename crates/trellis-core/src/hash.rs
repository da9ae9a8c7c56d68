//! Deterministic hash identities for types and methods.
//!
//! Resolved registries key their extension maps directly on [`MethodHash`],
//! a 64-bit hash computed from declaring type, name and full descriptor.
//! Hashes are deterministic, so they can be computed before (or without)
//! a registry existing, and a map keyed on them needs no secondary
//! name-to-id table.
//!
//! XXHash64 with domain-separation constants keeps type hashes and method
//! hashes from colliding even when the underlying strings coincide.

use std::fmt;

use xxhash_rust::xxh64::xxh64;

/// Domain-separation constants for hash computation.
pub mod hash_constants {
    /// Mixing constant applied between hash components.
    pub const SEP: u64 = 0x6b1a3d824fd90c55;

    /// Domain marker for type hashes.
    pub const TYPE: u64 = 0x91c7a4e25d38f60b;

    /// Domain marker for method hashes.
    pub const METHOD: u64 = 0x3fd8120c7ab964e7;
}

/// A deterministic 64-bit hash identifying a declaring type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TypeHash(pub u64);

impl TypeHash {
    /// Empty/invalid hash constant.
    pub const EMPTY: TypeHash = TypeHash(0);

    /// Hash a dotted type name. The same name always produces the same hash.
    #[inline]
    pub fn from_name(name: &str) -> Self {
        TypeHash(hash_constants::TYPE ^ xxh64(name.as_bytes(), 0))
    }

    /// Check if this is the empty/invalid hash.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Get the underlying u64 value.
    #[inline]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeHash({:#018x})", self.0)
    }
}

impl fmt::Display for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// A deterministic 64-bit hash identifying one concrete method.
///
/// Incorporates the declaring type, the method name and the full descriptor
/// (including the return kind), so overloads hash apart.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct MethodHash(pub u64);

impl MethodHash {
    /// Empty/invalid hash constant.
    pub const EMPTY: MethodHash = MethodHash(0);

    /// Hash a method identity from its three name components.
    #[inline]
    pub fn from_parts(declaring: TypeHash, name: &str, descriptor: &str) -> Self {
        let mut hash = hash_constants::METHOD ^ declaring.0 ^ xxh64(name.as_bytes(), 0);
        hash = hash
            .wrapping_mul(hash_constants::SEP)
            .wrapping_add(xxh64(descriptor.as_bytes(), 0));
        MethodHash(hash)
    }

    /// Check if this is the empty/invalid hash.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Get the underlying u64 value.
    #[inline]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for MethodHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MethodHash({:#018x})", self.0)
    }
}

impl fmt::Display for MethodHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_hash_is_deterministic() {
        assert_eq!(TypeHash::from_name("demo.Vec"), TypeHash::from_name("demo.Vec"));
        assert_ne!(TypeHash::from_name("demo.Vec"), TypeHash::from_name("demo.Mat"));
    }

    #[test]
    fn method_hash_distinguishes_overloads() {
        let owner = TypeHash::from_name("demo.Math");
        let a = MethodHash::from_parts(owner, "abs", "(I)I");
        let b = MethodHash::from_parts(owner, "abs", "(J)J");
        assert_ne!(a, b);
    }

    #[test]
    fn method_hash_distinguishes_owners() {
        let a = MethodHash::from_parts(TypeHash::from_name("demo.A"), "f", "()V");
        let b = MethodHash::from_parts(TypeHash::from_name("demo.B"), "f", "()V");
        assert_ne!(a, b);
    }

    #[test]
    fn type_and_method_domains_do_not_collide() {
        let t = TypeHash::from_name("f");
        let m = MethodHash::from_parts(TypeHash::EMPTY, "f", "");
        assert_ne!(t.0, m.0);
    }
}
