//! Information digestion with the xxHash algorithm.
//!
//! All random decisions in this crate flow through [`RandomEngine`], a
//! counter-based bit generator built on XXH3 with a custom secret. Engines are
//! cheap to construct, which allows keying one engine per absolute coordinate
//! and therefore generating identical bits regardless of iteration order or
//! parallelism.

use rand::RngCore;
use rand_mt::Mt19937GenRand64;
use static_assertions::const_assert;
use xxhash_rust::xxh3::xxh3_64_with_secret;

use crate::types::Dim2;

/// Size in bytes of the secret specified by the end application.
pub const APPLICATION_SECRET_LEN: usize = 80;
/// Size in bytes of the expanded secret consumed by the hash function.
pub const SECRET_LEN: usize = APPLICATION_SECRET_LEN * 2;

pub type ApplicationSecret = [u8; APPLICATION_SECRET_LEN];
pub type Secret = [u8; SECRET_LEN];

// XXH3 rejects custom secrets shorter than 136 bytes.
const_assert!(SECRET_LEN >= 136);

/// Deterministically expand `seed` into a full secret sequence.
///
/// The secret is filled from a standard 64-bit Mersenne Twister seeded with
/// `seed`, then the application secret is XOR-mixed into the front half.
pub fn generate_secret(application_secret: &ApplicationSecret, seed: u64) -> Secret {
    let mut twister = Mt19937GenRand64::new(seed);
    let mut secret = [0; SECRET_LEN];
    for word in secret.chunks_exact_mut(8) {
        word.copy_from_slice(&twister.next_u64().to_le_bytes());
    }
    for (byte, application) in secret.iter_mut().zip(application_secret) {
        *byte ^= application;
    }
    secret
}

/// 64-bit XXH3 hash of `input` under `secret`.
pub fn hash(secret: &Secret, input: &[u8]) -> u64 {
    xxh3_64_with_secret(input, secret)
}

/// Hash a tuple of trivially-copyable values serialised contiguously.
pub fn hash_object<T: HashWrite>(secret: &Secret, object: &T) -> u64 {
    let mut buffer = HashBuffer::new();
    object.hash_write(&mut buffer);
    hash(secret, buffer.as_slice())
}

/// Fixed-capacity serialisation buffer, so hashing composite keys in hot loops
/// never allocates.
pub struct HashBuffer {
    data: [u8; Self::CAPACITY],
    len: usize,
}

impl HashBuffer {
    pub const CAPACITY: usize = 64;

    pub const fn new() -> Self {
        Self {
            data: [0; Self::CAPACITY],
            len: 0,
        }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.data[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }
}

impl Default for HashBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-size byte serialisation of a hashable value.
pub trait HashWrite {
    fn hash_write(&self, buffer: &mut HashBuffer);
}

macro_rules! impl_hash_write_le {
    ($($t:ty),*) => {
        $(impl HashWrite for $t {
            fn hash_write(&self, buffer: &mut HashBuffer) {
                buffer.push(&self.to_le_bytes());
            }
        })*
    };
}
impl_hash_write_le!(u8, u16, u32, u64);

impl HashWrite for Dim2 {
    fn hash_write(&self, buffer: &mut HashBuffer) {
        self.x.hash_write(buffer);
        self.y.hash_write(buffer);
    }
}

impl<const N: usize> HashWrite for [u8; N] {
    fn hash_write(&self, buffer: &mut HashBuffer) {
        buffer.push(self);
    }
}

impl HashWrite for () {
    fn hash_write(&self, _: &mut HashBuffer) {}
}

macro_rules! impl_hash_write_tuple {
    ($($name:ident : $idx:tt),+) => {
        impl<$($name: HashWrite),+> HashWrite for ($($name,)+) {
            fn hash_write(&self, buffer: &mut HashBuffer) {
                $(self.$idx.hash_write(buffer);)+
            }
        }
    };
}
impl_hash_write_tuple!(A: 0);
impl_hash_write_tuple!(A: 0, B: 1);
impl_hash_write_tuple!(A: 0, B: 1, C: 2);

/// Counter-based random bit generator.
///
/// The state is `(secret, counter, object)`; each draw hashes the counter
/// together with the user objects and then advances the counter. The full
/// `u64` range is produced uniformly.
pub struct RandomEngine<'a, T = ()> {
    secret: &'a Secret,
    object: T,
    counter: u32,
}

impl<'a, T: HashWrite> RandomEngine<'a, T> {
    pub fn new(secret: &'a Secret, object: T) -> Self {
        Self {
            secret,
            object,
            counter: 0,
        }
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }
}

impl<T: HashWrite> RngCore for RandomEngine<'_, T> {
    fn next_u32(&mut self) -> u32 {
        self.next_u64() as u32
    }

    fn next_u64(&mut self) -> u64 {
        let mut buffer = HashBuffer::new();
        self.counter.hash_write(&mut buffer);
        self.object.hash_write(&mut buffer);
        let value = hash(self.secret, buffer.as_slice());
        self.counter = self.counter.wrapping_add(1);
        value
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let word = self.next_u64().to_le_bytes();
            chunk.copy_from_slice(&word[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const APPLICATION_SECRET: ApplicationSecret = [0xA5; APPLICATION_SECRET_LEN];

    #[test]
    fn secret_expansion_is_deterministic() {
        let a = generate_secret(&APPLICATION_SECRET, 42);
        let b = generate_secret(&APPLICATION_SECRET, 42);
        assert_eq!(a, b);
        assert_ne!(a, generate_secret(&APPLICATION_SECRET, 43));
    }

    #[test]
    fn application_secret_mixes_front_half() {
        let zero = generate_secret(&[0; APPLICATION_SECRET_LEN], 7);
        let mixed = generate_secret(&APPLICATION_SECRET, 7);
        for i in 0..APPLICATION_SECRET_LEN {
            assert_eq!(mixed[i], zero[i] ^ 0xA5);
        }
        assert_eq!(&mixed[APPLICATION_SECRET_LEN..], &zero[APPLICATION_SECRET_LEN..]);
    }

    #[test]
    fn engine_advances_counter() {
        let secret = generate_secret(&APPLICATION_SECRET, 0);
        let mut engine = RandomEngine::new(&secret, 19u32);
        let first = engine.next_u64();
        let second = engine.next_u64();
        assert_ne!(first, second);
        assert_eq!(engine.counter(), 2);

        // A fresh engine with the same key replays the stream.
        let mut replay = RandomEngine::new(&secret, 19u32);
        assert_eq!(replay.next_u64(), first);
        assert_eq!(replay.next_u64(), second);
    }

    #[test]
    fn engine_streams_are_keyed_by_object() {
        let secret = generate_secret(&APPLICATION_SECRET, 0);
        let a = RandomEngine::new(&secret, 0u32).next_u64();
        let b = RandomEngine::new(&secret, 1u32).next_u64();
        assert_ne!(a, b);
    }

    #[test]
    fn hash_object_serialises_contiguously() {
        let secret = generate_secret(&APPLICATION_SECRET, 0);
        let mut buffer = HashBuffer::new();
        (3u32, Dim2::new(1, 2)).hash_write(&mut buffer);
        assert_eq!(buffer.as_slice().len(), 12);
        assert_eq!(
            hash_object(&secret, &(3u32, Dim2::new(1, 2))),
            hash(&secret, buffer.as_slice())
        );
    }
}
