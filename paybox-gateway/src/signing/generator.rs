//! HMAC-SHA512 signature generation over canonical parameter strings.

use hmac::{Hmac, Mac};
use sha2::Sha512;
use tracing::{debug, instrument};
use url::Url;
use zeroize::Zeroizing;

use super::{HMAC_FIELD, SecretStore, SignedRequest};
use crate::{
    error::{PayboxError, Result},
    params::ParameterMap,
};

type HmacSha512 = Hmac<Sha512>;

/// Computes Paybox HMAC signatures.
///
/// The secret is fetched from the [`SecretStore`] on every call, decoded from
/// hexadecimal into a zeroizing buffer, and dropped before the call returns.
///
/// # Examples
///
/// ```
/// use paybox_gateway::{
///     params::ParameterMap,
///     signing::{HmacHashGenerator, StaticSecretStore},
/// };
///
/// // hex of the ASCII string "secret"
/// let store = StaticSecretStore::new().with_secret("hmac", "736563726574");
/// let generator = HmacHashGenerator::new(store, "hmac");
///
/// let params: ParameterMap = [("PBX_SITE", "1999888")].into_iter().collect();
/// let signature = generator.get(&params)?;
///
/// assert_eq!(signature.len(), 128);
/// assert!(signature.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
/// # Ok::<(), paybox_gateway::PayboxError>(())
/// ```
#[derive(Debug, Clone)]
pub struct HmacHashGenerator<S> {
    store: S,
    key_location: String,
}

impl<S: SecretStore> HmacHashGenerator<S> {
    /// Creates a generator that loads its key from `store` under `key_location`.
    #[must_use]
    pub fn new(store: S, key_location: impl Into<String>) -> Self {
        Self { store, key_location: key_location.into() }
    }

    /// A generator borrowing this one's store and key location.
    #[must_use]
    pub fn by_ref(&self) -> HmacHashGenerator<&S> {
        HmacHashGenerator { store: &self.store, key_location: self.key_location.clone() }
    }

    /// Returns the key location handed to the secret store.
    #[must_use]
    pub fn key_location(&self) -> &str {
        &self.key_location
    }

    /// Computes the uppercase hexadecimal HMAC-SHA512 of `params`.
    ///
    /// # Errors
    ///
    /// - [`PayboxError::SecretUnavailable`] if the secret cannot be loaded
    /// - [`PayboxError::InvalidSecretEncoding`] if the secret is not hexadecimal
    #[instrument(skip(self, params), fields(fields = params.len()))]
    pub fn get(&self, params: &ParameterMap) -> Result<String> {
        let mac = self.keyed_mac(params)?;
        Ok(hex::encode_upper(mac.finalize().into_bytes()))
    }

    /// Checks `supplied` against the HMAC of `params`.
    ///
    /// The comparison is case-insensitive and constant-time. A supplied
    /// signature that is not valid hexadecimal is reported as a mismatch.
    ///
    /// # Errors
    ///
    /// Same conditions as [`HmacHashGenerator::get`]: a mismatch is `Ok(false)`,
    /// only secret loading failures are errors.
    #[instrument(skip(self, params, supplied), fields(fields = params.len()))]
    pub fn verify(&self, params: &ParameterMap, supplied: &str) -> Result<bool> {
        let Ok(expected) = hex::decode(supplied.trim()) else {
            debug!("supplied signature is not hexadecimal");
            return Ok(false);
        };

        let mac = self.keyed_mac(params)?;
        Ok(mac.verify_slice(&expected).is_ok())
    }

    /// Signs `params` and appends the signature as the final `PBX_HMAC` field.
    ///
    /// # Errors
    ///
    /// Same conditions as [`HmacHashGenerator::get`].
    pub fn sign(&self, url: Url, mut params: ParameterMap) -> Result<SignedRequest> {
        params.remove(HMAC_FIELD);
        let signature = self.get(&params)?;
        params.insert(HMAC_FIELD, signature);
        Ok(SignedRequest { url, params })
    }

    fn load_key(&self) -> Result<Zeroizing<Vec<u8>>> {
        let text = Zeroizing::new(self.store.get(&self.key_location)?);
        let hex_text = text.trim();

        if hex_text.is_empty() {
            return Err(PayboxError::InvalidSecretEncoding("secret is empty".to_owned()));
        }

        hex::decode(hex_text)
            .map(Zeroizing::new)
            .map_err(|e| PayboxError::InvalidSecretEncoding(e.to_string()))
    }

    fn keyed_mac(&self, params: &ParameterMap) -> Result<HmacSha512> {
        let key = self.load_key()?;
        let mut mac = HmacSha512::new_from_slice(&key)
            .map_err(|e| PayboxError::InvalidSecretEncoding(e.to_string()))?;
        mac.update(params.canonical_string().as_bytes());
        Ok(mac)
    }
}
