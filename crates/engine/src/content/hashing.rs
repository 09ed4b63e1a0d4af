use sha2::{Digest, Sha256};

/// Running SHA-256 over every loaded input: mod ids in load order, then each
/// file's relative path and bytes.
pub(crate) struct ContentHasher {
    hasher: Sha256,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self {
            hasher: Sha256::new(),
        }
    }

    pub fn add_mod(&mut self, mod_id: &str) {
        self.hasher.update(b"mod");
        self.hasher.update([0u8]);
        self.hasher.update(mod_id.as_bytes());
        self.hasher.update([0u8]);
    }

    pub fn add_file(&mut self, rel_path: &str, bytes: &[u8]) {
        self.hasher.update(rel_path.as_bytes());
        self.hasher.update([0u8]);
        self.hasher.update((bytes.len() as u64).to_le_bytes());
        self.hasher.update(bytes);
    }

    pub fn finish(self) -> String {
        to_hex_lower(&self.hasher.finalize())
    }
}

fn to_hex_lower(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        use std::fmt::Write as _;
        let _ = write!(&mut output, "{byte:02x}");
    }
    output
}
