//! HMAC-SHA256 signatures for time-limited blob URLs.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::{Bucket, StorageError};

type HmacSha256 = Hmac<Sha256>;

/// Operation a signature grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignedAccess {
    Read,
    Write,
}

impl SignedAccess {
    fn as_str(self) -> &'static str {
        match self {
            SignedAccess::Read => "GET",
            SignedAccess::Write => "PUT",
        }
    }
}

/// Signs and verifies `(access, bucket, path, expires)` tuples.
#[derive(Clone)]
pub struct UrlSigner {
    keyed: HmacSha256,
}

impl UrlSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, StorageError> {
        let keyed = HmacSha256::new_from_slice(secret.as_ref())
            .map_err(|e| StorageError::Config(format!("invalid signing secret: {e}")))?;
        Ok(Self { keyed })
    }

    fn mac(&self, access: SignedAccess, bucket: Bucket, path: &str, expires: i64) -> HmacSha256 {
        let mut mac = self.keyed.clone();
        mac.update(access.as_str().as_bytes());
        mac.update(b"\n");
        mac.update(bucket.as_str().as_bytes());
        mac.update(b"\n");
        mac.update(path.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        mac
    }

    /// Hex signature for the tuple.
    pub fn sign(&self, access: SignedAccess, bucket: Bucket, path: &str, expires: i64) -> String {
        hex::encode(self.mac(access, bucket, path, expires).finalize().into_bytes())
    }

    /// Verify a signature and that `expires` is not in the past relative to `now`.
    pub fn verify(
        &self,
        access: SignedAccess,
        bucket: Bucket,
        path: &str,
        expires: i64,
        signature: &str,
        now: i64,
    ) -> bool {
        if expires < now {
            return false;
        }
        let Ok(provided) = hex::decode(signature) else {
            return false;
        };
        let expected = self.mac(access, bucket, path, expires).finalize().into_bytes();
        expected.as_slice().ct_eq(&provided).into()
    }
}
