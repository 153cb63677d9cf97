//! On-disk claim storage with zstd compression.
//!
//! A world keeps all of its claims in a single `claims.dat` file: a fixed
//! header followed by the zstd-compressed bincode encoding of the persistence
//! container. The CRC32 in the header covers the compressed payload.

use crate::registry::ProtectionRegistry;
use anyhow::{Context, Result};
use claimguard_core::Compound;
use crc32fast::Hasher;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// File name of the claim store inside the store directory.
pub const STORE_FILE_NAME: &str = "claims.dat";

/// Magic number for claim files ("CLGD").
const STORE_MAGIC: u32 = 0x434C_4744;

/// Current claim file format version.
const STORE_VERSION: u16 = 1;

const HEADER_LEN: usize = 14;

#[derive(Debug, Clone, PartialEq, Eq)]
struct StoreHeader {
    magic: u32,
    version: u16,
    crc32: u32,
    payload_len: u32,
}

impl StoreHeader {
    fn new(crc32: u32, payload_len: u32) -> Self {
        Self {
            magic: STORE_MAGIC,
            version: STORE_VERSION,
            crc32,
            payload_len,
        }
    }

    fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0..4].copy_from_slice(&self.magic.to_le_bytes());
        bytes[4..6].copy_from_slice(&self.version.to_le_bytes());
        bytes[6..10].copy_from_slice(&self.crc32.to_le_bytes());
        bytes[10..14].copy_from_slice(&self.payload_len.to_le_bytes());
        bytes
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            anyhow::bail!("Claim file header too short");
        }

        let magic = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if magic != STORE_MAGIC {
            anyhow::bail!(
                "Invalid claim file magic: expected 0x{:08X}, got 0x{:08X}",
                STORE_MAGIC,
                magic
            );
        }

        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != STORE_VERSION {
            anyhow::bail!(
                "Unsupported claim file version {} (expected {})",
                version,
                STORE_VERSION
            );
        }

        Ok(Self {
            magic,
            version,
            crc32: u32::from_le_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]),
            payload_len: u32::from_le_bytes([bytes[10], bytes[11], bytes[12], bytes[13]]),
        })
    }
}

fn checksum(bytes: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(bytes);
    hasher.finalize()
}

/// Claim file manager for one world.
#[derive(Debug, Clone)]
pub struct ClaimStore {
    dir: PathBuf,
}

impl ClaimStore {
    /// Create a store rooted at `dir`, creating the directory if needed.
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).context("Failed to create claim store directory")?;
        Ok(Self { dir })
    }

    /// Path of the claim file.
    pub fn path(&self) -> PathBuf {
        self.dir.join(STORE_FILE_NAME)
    }

    /// Whether a claim file has been written yet.
    pub fn exists(&self) -> bool {
        self.path().exists()
    }

    /// Save every region of `registry`.
    pub fn save(&self, registry: &ProtectionRegistry) -> Result<()> {
        let mut container = Compound::new();
        registry.save(&mut container);
        self.write_container(&container)
    }

    /// Replace the contents of `registry` with the saved claims.
    ///
    /// A missing file leaves the registry empty. Returns the number of regions
    /// loaded.
    pub fn load(&self, registry: &ProtectionRegistry) -> Result<usize> {
        if !self.exists() {
            tracing::debug!(path = %self.path().display(), "no claim file; starting empty");
            registry.clear();
            return Ok(0);
        }
        let mut container = self.read_container()?;
        Ok(registry.load(&mut container))
    }

    /// Read and verify the raw container.
    pub fn read_container(&self) -> Result<Compound> {
        let path = self.path();
        let mut file = File::open(&path)
            .with_context(|| format!("Failed to open claim file {}", path.display()))?;

        let mut header_bytes = [0u8; HEADER_LEN];
        file.read_exact(&mut header_bytes)
            .context("Failed to read claim file header")?;
        let header = StoreHeader::from_bytes(&header_bytes)?;

        let mut compressed = vec![0u8; header.payload_len as usize];
        file.read_exact(&mut compressed)
            .context("Failed to read claim file payload")?;

        let computed_crc = checksum(&compressed);
        if computed_crc != header.crc32 {
            anyhow::bail!(
                "CRC32 mismatch: expected {:08X}, got {:08X}",
                header.crc32,
                computed_crc
            );
        }

        let decompressed =
            zstd::decode_all(&compressed[..]).context("Failed to decompress claim file")?;
        bincode::deserialize(&decompressed).context("Failed to deserialize claim file")
    }

    /// Write a raw container, replacing the claim file atomically.
    pub fn write_container(&self, container: &Compound) -> Result<()> {
        let serialized = bincode::serialize(container).context("Failed to serialize claims")?;
        let compressed =
            zstd::encode_all(&serialized[..], 3).context("Failed to compress claims")?;
        let payload_len =
            u32::try_from(compressed.len()).context("Claim payload exceeds 4 GiB")?;
        let header = StoreHeader::new(checksum(&compressed), payload_len);

        let path = self.path();
        let tmp_path = path.with_extension("dat.tmp");
        {
            let mut file = File::create(&tmp_path).context("Failed to create claim file")?;
            file.write_all(&header.to_bytes())
                .context("Failed to write header")?;
            file.write_all(&compressed)
                .context("Failed to write payload")?;
            file.sync_all().context("Failed to flush claim file")?;
        }
        fs::rename(&tmp_path, &path).context("Failed to replace claim file")?;
        tracing::debug!(path = %path.display(), bytes = compressed.len(), "wrote claim file");
        Ok(())
    }
}

/// Write a container as pretty-printed JSON.
pub fn export_json<P: AsRef<Path>>(container: &Compound, path: P) -> Result<()> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(container).context("Failed to encode claims")?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

/// Read a container previously written by [`export_json`] (or converted from
/// an older save by external tooling).
pub fn import_json<P: AsRef<Path>>(path: P) -> Result<Compound> {
    let path = path.as_ref();
    let json =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Failed to parse {}", path.display()))
}
