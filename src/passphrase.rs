//! Base secret acquisition
//!
//! The split and merge operations take the base secret as plain bytes;
//! this module is the CLI-facing layer that obtains those bytes from a
//! terminal, from stdin, or from a fixed value.

use crate::error::{ErrorCategory, ErrorKind, PartboxError, Result};
use std::io::{self, IsTerminal, Read, Write};
use zeroize::Zeroizing;

/// Trait for obtaining the base secret from various sources
pub trait SecretReader {
    /// Read the base secret as arbitrary bytes (not necessarily UTF-8)
    ///
    /// Returns the secret wrapped in `Zeroizing` to ensure it is securely
    /// wiped from memory when dropped.
    fn read_secret(&mut self) -> Result<Zeroizing<Vec<u8>>>;
}

/// Returns a fixed secret (command-line argument, tests)
pub struct ConstantSecretReader {
    secret: Zeroizing<Vec<u8>>,
}

impl ConstantSecretReader {
    pub fn new(secret: Vec<u8>) -> Self {
        Self {
            secret: Zeroizing::new(secret),
        }
    }
}

impl SecretReader for ConstantSecretReader {
    fn read_secret(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        Ok(Zeroizing::new((*self.secret).clone()))
    }
}

/// Reads the secret from any io::Read source, consuming it to EOF
pub struct ReaderSecretReader {
    reader: Box<dyn Read>,
}

impl ReaderSecretReader {
    pub fn new(reader: Box<dyn Read>) -> Self {
        Self { reader }
    }
}

impl SecretReader for ReaderSecretReader {
    fn read_secret(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        let mut data = Zeroizing::new(Vec::new());
        self.reader.read_to_end(&mut data).map_err(|e| {
            PartboxError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("error reading base secret: {}", e),
                e,
            )
        })?;
        Ok(data)
    }
}

/// Reads the secret from the terminal with no echo
pub struct TerminalSecretReader;

impl TerminalSecretReader {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TerminalSecretReader {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretReader for TerminalSecretReader {
    /// Read the base secret from the terminal.
    ///
    /// Note: Terminal input is limited to UTF-8 due to rpassword library
    /// constraints. For non-UTF-8 secrets, use --passphrase-stdin instead.
    fn read_secret(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        if !io::stdin().is_terminal() {
            return Err(PartboxError::with_kind(
                ErrorCategory::User,
                ErrorKind::SecretUnavailable,
                "cannot read base secret from terminal - stdin is not a terminal",
            ));
        }

        io::stderr()
            .write_all(b"Base secret (partbox): ")
            .map_err(|e| {
                PartboxError::with_kind_and_source(
                    ErrorCategory::Internal,
                    ErrorKind::Io,
                    format!("failed to write prompt: {}", e),
                    e,
                )
            })?;
        io::stderr().flush().map_err(|e| {
            PartboxError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("failed to flush prompt: {}", e),
                e,
            )
        })?;

        // Read secret *without echo*
        // Note: rpassword returns String (UTF-8 only), not zeroized
        let secret = rpassword::read_password().map_err(|e| {
            PartboxError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::SecretUnavailable,
                format!("failure reading base secret: {}", e),
                e,
            )
        })?;

        Ok(Zeroizing::new(secret.into_bytes()))
    }
}
