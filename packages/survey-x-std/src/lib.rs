use anchor_lang::prelude::*;
use derive_more::Deref;
use sha2::{Digest, Sha256};

pub mod account;
pub mod event;
pub mod instruction;

declare_id!("FoZGZMWrz5ATiCDJsyakp8bzF9gZjGBWZFGpJQrLEgtY");

pub const ARCIUM_PROGRAM_ID: Pubkey = pubkey!("BKck65TgoKRokMjQM3datB9oRwJ8rAj2jxPXvHXUvcL6");
pub const ARCIUM_FEE_POOL_ACCOUNT: Pubkey = pubkey!("7MGSS4iKNM4sVib7bDZDJhVqB6EcchPwVnTKenCY1jt3");
pub const ARCIUM_CLOCK_ACCOUNT: Pubkey = pubkey!("FHriyvoZotYiFnbUzKFjzRSb2NiaC8RPWY7jtKuKhg65");

/// Devnet cluster the MXE program was deployed against.
pub const DEFAULT_CLUSTER_OFFSET: u32 = 1_116_522_165;

#[derive(
    AnchorSerialize, AnchorDeserialize, InitSpace, Deref, Clone, Copy, Debug, PartialEq, Eq, Hash,
)]
pub struct Bytes32([u8; 32]);

impl From<[u8; 32]> for Bytes32 {
    fn from(bytes: [u8; 32]) -> Self {
        Bytes32(bytes)
    }
}

impl From<Bytes32> for [u8; 32] {
    fn from(bytes: Bytes32) -> Self {
        bytes.0
    }
}

impl AsRef<[u8]> for Bytes32 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Bytes32 {
    pub fn sha256(data: &[u8]) -> Self {
        Bytes32(Sha256::digest(data).into())
    }
}

/// Offset of a computation definition registered by the MXE program.
///
/// The executor identifies each encrypted instruction by the first four bytes of the
/// sha256 of its name, read little-endian.
pub fn comp_def_offset(name: &str) -> u32 {
    let digest = Sha256::digest(name.as_bytes());
    u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]])
}
