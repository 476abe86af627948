use anchor_lang::prelude::*;
use anchor_lang::Discriminator;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use derive_new::new;

const PROGRAM_DATA_PREFIX: &str = "Program data: ";

/// Emitted by the MXE program's callback once the executor finalizes a computation.
/// The event does not carry the computation offset; the log reader knows which
/// transaction it came from.
#[event]
#[derive(new, Debug, PartialEq, Eq)]
pub struct ResponseEvent {
    pub response: [u8; 32],
    pub nonce: [u8; 16],
}

impl ResponseEvent {
    /// Decodes a `Program data:` log line, ignoring lines carrying other events.
    pub fn from_program_log(line: &str) -> Option<Self> {
        let encoded = line.trim().strip_prefix(PROGRAM_DATA_PREFIX)?;
        let data = STANDARD.decode(encoded).ok()?;
        let payload = data.strip_prefix(Self::DISCRIMINATOR)?;

        Self::try_from_slice(payload).ok()
    }
}
