//! Assembly identities: simple name, four-part version, culture and public key token.
//!
//! The display string produced by [`AssemblyIdentity::display_name`] follows the familiar
//! `Name, Version=a.b.c.d, Culture=neutral, PublicKeyToken=0123456789abcdef` format; the
//! catalog classifies "system" modules by looking for known tokens in it.
//!
//! # Examples
//!
//! ```rust
//! use modscope::metadata::identity::{AssemblyIdentity, AssemblyVersion};
//!
//! let identity = AssemblyIdentity::new("Plugins", AssemblyVersion::new(1, 2, 3, 4));
//! assert_eq!(
//!     identity.display_name(),
//!     "Plugins, Version=1.2.3.4, Culture=neutral, PublicKeyToken=null"
//! );
//! ```

use std::{
    fmt::{self, Write},
    str::FromStr,
};

use sha1::{Digest, Sha1};

use crate::{Error, Result};

/// Four-part assembly version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AssemblyVersion {
    /// Major version
    pub major: u16,
    /// Minor version
    pub minor: u16,
    /// Build number
    pub build: u16,
    /// Revision number
    pub revision: u16,
}

impl AssemblyVersion {
    /// Creates a version from its components.
    #[must_use]
    pub const fn new(major: u16, minor: u16, build: u16, revision: u16) -> Self {
        AssemblyVersion {
            major,
            minor,
            build,
            revision,
        }
    }

    /// Parses `major[.minor[.build[.revision]]]`; missing parts are zero.
    ///
    /// # Errors
    /// Returns [`crate::Error::Error`] if a component is not a 16-bit integer or there are
    /// more than four components.
    pub fn parse(version: &str) -> Result<Self> {
        let parts: Vec<&str> = version.trim().split('.').collect();
        if parts.is_empty() || parts.len() > 4 {
            return Err(Error::Error(format!("Invalid assembly version - {}", version)));
        }

        let mut components = [0u16; 4];
        for (index, part) in parts.iter().enumerate() {
            components[index] = part
                .parse::<u16>()
                .map_err(|_| Error::Error(format!("Invalid assembly version - {}", version)))?;
        }

        Ok(AssemblyVersion::new(
            components[0],
            components[1],
            components[2],
            components[3],
        ))
    }
}

impl fmt::Display for AssemblyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

impl FromStr for AssemblyVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        AssemblyVersion::parse(s)
    }
}

/// Computes the 8-byte public key token of a full public key.
///
/// The token is the last eight bytes of the key's SHA-1 hash, in reverse order.
#[must_use]
pub fn public_key_token(public_key: &[u8]) -> [u8; 8] {
    let mut hasher = Sha1::new();
    hasher.update(public_key);
    let hash = hasher.finalize();

    let mut token = [0u8; 8];
    for (index, byte) in hash[hash.len() - 8..].iter().rev().enumerate() {
        token[index] = *byte;
    }
    token
}

/// Name, version, culture and strong-name token of an assembly or assembly reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssemblyIdentity {
    /// Simple name
    pub name: String,
    /// Four-part version
    pub version: AssemblyVersion,
    /// Culture, `None` for culture-neutral assemblies
    pub culture: Option<String>,
    /// Public key token of strong-named assemblies
    pub public_key_token: Option<[u8; 8]>,
}

impl AssemblyIdentity {
    /// Creates a culture-neutral identity without a strong name.
    #[must_use]
    pub fn new(name: impl Into<String>, version: AssemblyVersion) -> Self {
        AssemblyIdentity {
            name: name.into(),
            version,
            culture: None,
            public_key_token: None,
        }
    }

    /// The public key token as lower-case hex, `None` without a strong name.
    #[must_use]
    pub fn token_hex(&self) -> Option<String> {
        self.public_key_token.map(|token| {
            token.iter().fold(String::with_capacity(16), |mut out, byte| {
                let _ = write!(out, "{:02x}", byte);
                out
            })
        })
    }

    /// The full display string of this identity.
    #[must_use]
    pub fn display_name(&self) -> String {
        let mut result = String::with_capacity(self.name.len() + 80);
        result.push_str(&self.name);

        let _ = write!(result, ", Version={}", self.version);
        let _ = write!(
            result,
            ", Culture={}",
            self.culture.as_deref().unwrap_or("neutral")
        );
        let _ = write!(
            result,
            ", PublicKeyToken={}",
            self.token_hex().as_deref().unwrap_or("null")
        );

        result
    }

    /// `true` if the simple names match, ignoring ASCII case.
    #[must_use]
    pub fn same_name(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

impl fmt::Display for AssemblyIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}
