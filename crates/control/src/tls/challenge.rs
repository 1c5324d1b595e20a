//! HTTP-01 challenge publication.
//!
//! The control plane does not serve HTTP-01 itself. Key authorizations
//! are written as plain files into a directory the tenant-facing web
//! tier exposes at `/.well-known/acme-challenge/`; the file is removed
//! once the order concludes, successfully or not.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// URL path prefix the web tier maps onto the challenge directory.
pub const ACME_CHALLENGE_PREFIX: &str = "/.well-known/acme-challenge/";

/// Filesystem-backed HTTP-01 challenge publisher.
#[derive(Debug, Clone)]
pub struct ChallengeDir {
    root: PathBuf,
}

impl ChallengeDir {
    /// Use (and create if needed) `root` as the challenge directory.
    pub fn new(root: &Path) -> io::Result<Self> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    fn token_path(&self, token: &str) -> PathBuf {
        self.root.join(token)
    }

    /// Publish the key authorization for `token`.
    ///
    /// ACME tokens are base64url and cannot traverse out of the
    /// directory; the debug assertion documents that assumption.
    pub fn publish(&self, token: &str, key_authorization: &str) -> io::Result<()> {
        debug_assert!(!token.contains('/') && !token.contains(".."));
        fs::write(self.token_path(token), key_authorization)?;
        debug!(token = %token, "Published HTTP-01 challenge");
        Ok(())
    }

    /// Remove the challenge file for `token`. Missing files are fine:
    /// cleanup runs on failure paths where publication may not have
    /// happened.
    pub fn withdraw(&self, token: &str) {
        match fs::remove_file(self.token_path(token)) {
            Ok(()) => debug!(token = %token, "Withdrew HTTP-01 challenge"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(token = %token, error = %e, "Failed to withdraw challenge"),
        }
    }

    /// Read back a published key authorization (used by tests and the
    /// health endpoint's self-check).
    pub fn read(&self, token: &str) -> Option<String> {
        fs::read_to_string(self.token_path(token)).ok()
    }
}
