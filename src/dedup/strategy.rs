use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Default byte length up to which fingerprint input is kept raw.
pub const DEFAULT_KEY_THRESHOLD: usize = 24;
/// Default byte length up to which a serialized value is kept raw.
pub const DEFAULT_VAL_THRESHOLD: usize = 256;

/// Whether input bytes are kept raw or reduced through a digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashMode {
    /// Digest only when the input is longer than the threshold.
    #[default]
    AutoSmart,
    AlwaysHash,
    NeverHash,
}

impl HashMode {
    /// Whether input of `len` bytes goes through the digest under this mode.
    pub fn reduces(self, len: usize, threshold: usize) -> bool {
        match self {
            HashMode::NeverHash => false,
            HashMode::AutoSmart => len > threshold,
            HashMode::AlwaysHash => true,
        }
    }
}

/// A running hash computation.
pub trait Accumulator: Send {
    fn update(&mut self, data: &[u8]);
    fn finalize(self: Box<Self>) -> Vec<u8>;
}

/// Adapts any RustCrypto [`Digest`] to an [`Accumulator`].
pub struct DigestAccumulator<D>(D);

impl<D: Digest + Send> Accumulator for DigestAccumulator<D> {
    fn update(&mut self, data: &[u8]) {
        Digest::update(&mut self.0, data);
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        let DigestAccumulator(digest) = *self;
        digest.finalize().to_vec()
    }
}

/// Produces a fresh, independent accumulator on every call.
pub type DigestFactory = Arc<dyn Fn() -> Box<dyn Accumulator> + Send + Sync>;

pub fn digest_factory<D>() -> DigestFactory
where
    D: Digest + Send + 'static,
{
    Arc::new(|| Box::new(DigestAccumulator(D::new())) as Box<dyn Accumulator>)
}

pub fn sha256_factory() -> DigestFactory {
    digest_factory::<Sha256>()
}

/// Reduces `input` according to `mode`.
///
/// Digests are returned as lowercase hex text on both the key and the value
/// path, so stored keys and values stay printable. `digest` is only invoked
/// when a reduction actually happens.
pub fn reduce(input: Vec<u8>, mode: HashMode, threshold: usize, digest: &DigestFactory) -> Vec<u8> {
    if !mode.reduces(input.len(), threshold) {
        return input;
    }

    let mut acc = digest();
    acc.update(&input);
    hex::encode(acc.finalize()).into_bytes()
}

/// Per-call policy for the fingerprint path and the stored-value path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashStrategy {
    pub key_hash_mode: HashMode,
    pub value_hash_mode: HashMode,
    pub key_threshold: usize,
    pub val_threshold: usize,
}

impl Default for HashStrategy {
    fn default() -> Self {
        Self {
            key_hash_mode: HashMode::AutoSmart,
            value_hash_mode: HashMode::AutoSmart,
            key_threshold: DEFAULT_KEY_THRESHOLD,
            val_threshold: DEFAULT_VAL_THRESHOLD,
        }
    }
}

impl HashStrategy {
    pub fn new(key_hash_mode: HashMode, value_hash_mode: HashMode) -> Self {
        Self {
            key_hash_mode,
            value_hash_mode,
            ..Self::default()
        }
    }

    pub fn with_key_threshold(mut self, threshold: usize) -> Self {
        self.key_threshold = threshold;
        self
    }

    pub fn with_val_threshold(mut self, threshold: usize) -> Self {
        self.val_threshold = threshold;
        self
    }

    pub fn reduce_key(&self, input: Vec<u8>, digest: &DigestFactory) -> Vec<u8> {
        reduce(input, self.key_hash_mode, self.key_threshold, digest)
    }

    pub fn reduce_value(&self, input: Vec<u8>, digest: &DigestFactory) -> Vec<u8> {
        reduce(input, self.value_hash_mode, self.val_threshold, digest)
    }

    /// Whether a serialized value of `len` bytes is stored as a digest.
    pub fn digests_value(&self, len: usize) -> bool {
        self.value_hash_mode.reduces(len, self.val_threshold)
    }
}
