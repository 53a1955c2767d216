//! Insertion-ordered protocol parameters.
//!
//! Paybox signs the `key=value&...` concatenation of fields in the exact order they
//! were sent, so parameters are kept in a vector rather than a hash map.
//!
//! Paybox replies and callbacks may carry ISO-8859-1 text; see [`decode_text`].

use std::borrow::Cow;

use encoding_rs::WINDOWS_1252;
use percent_encoding::percent_decode_str;
use serde::{Serialize, Serializer, ser::SerializeMap};
use url::form_urlencoded;

/// Decodes text received from Paybox.
///
/// Valid UTF-8 is kept as is. Anything else is read as Windows-1252, the
/// superset of ISO-8859-1 in which Paybox writes its French messages.
///
/// # Examples
///
/// ```
/// use paybox_gateway::params::decode_text;
///
/// assert_eq!(decode_text(b"Num\xe9ro invalide"), "Numéro invalide");
/// assert_eq!(decode_text("Numéro invalide".as_bytes()), "Numéro invalide");
/// ```
#[must_use]
pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => WINDOWS_1252.decode_without_bom_handling(bytes).0,
    }
}

fn decode_component(raw: &str) -> String {
    let raw = raw.replace('+', " ");
    let bytes: Cow<'_, [u8]> = percent_decode_str(&raw).into();
    decode_text(&bytes).into_owned()
}

/// Ordered mapping from protocol field name to value.
///
/// Inserting a key that is already present replaces its value without moving it.
///
/// # Examples
///
/// ```
/// use paybox_gateway::params::ParameterMap;
///
/// let mut params = ParameterMap::new();
/// params.insert("PBX_SITE", "1999888");
/// params.insert("PBX_RANG", "32");
///
/// assert_eq!(params.canonical_string(), "PBX_SITE=1999888&PBX_RANG=32");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterMap {
    entries: Vec<(String, String)>,
}

impl ParameterMap {
    /// Creates an empty map.
    #[must_use]
    pub const fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Inserts a field, replacing the value in place if the key already exists.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Inserts a field only when a value is present.
    pub fn insert_opt(&mut self, key: impl Into<String>, value: Option<impl Into<String>>) {
        if let Some(value) = value {
            self.insert(key, value);
        }
    }

    /// Returns the value of `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Returns `true` if `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Removes `key`, returning its value. Remaining fields keep their order.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Field names in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Builds the HMAC input: `key=value` pairs joined by `&`, unencoded.
    #[must_use]
    pub fn canonical_string(&self) -> String {
        self.entries.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join("&")
    }

    /// Encodes the fields as an `application/x-www-form-urlencoded` body.
    #[must_use]
    pub fn to_form_body(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (k, v) in &self.entries {
            serializer.append_pair(k, v);
        }
        serializer.finish()
    }

    /// Decodes a form-encoded body or query string, keeping the received order.
    ///
    /// A leading `?` is ignored. Empty segments are skipped. Percent-encoded
    /// bytes are decoded with [`decode_text`], so `%E9` and `%C3%A9` both read
    /// as `é`.
    #[must_use]
    pub fn from_form_body(body: &str) -> Self {
        let body = body.trim().trim_start_matches('?');
        let mut params = Self::new();
        for pair in body.split('&').filter(|pair| !pair.is_empty()) {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            params.insert(decode_component(k), decode_component(v));
        }
        params
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ParameterMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

impl Serialize for ParameterMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_preserved() {
        let mut params = ParameterMap::new();
        params.insert("b", "2");
        params.insert("a", "1");
        params.insert("c", "3");

        let keys: Vec<_> = params.keys().collect();
        assert_eq!(keys, ["b", "a", "c"]);
    }

    #[test]
    fn test_insert_existing_key_replaces_in_place() {
        let mut params = ParameterMap::new();
        params.insert("a", "1");
        params.insert("b", "2");
        params.insert("a", "3");

        assert_eq!(params.len(), 2);
        assert_eq!(params.canonical_string(), "a=3&b=2");
    }

    #[test]
    fn test_canonical_string_is_not_url_encoded() {
        let params: ParameterMap =
            [("param1", "value"), ("param2", "value % 2")].into_iter().collect();
        assert_eq!(params.canonical_string(), "param1=value&param2=value % 2");
    }

    #[test]
    fn test_canonical_string_empty() {
        assert_eq!(ParameterMap::new().canonical_string(), "");
    }

    #[test]
    fn test_form_body_is_encoded() {
        let params: ParameterMap =
            [("PBX_RETOUR", "amount:M;ref:R"), ("PBX_PORTEUR", "a+b@example.com")]
                .into_iter()
                .collect();
        assert_eq!(
            params.to_form_body(),
            "PBX_RETOUR=amount%3AM%3Bref%3AR&PBX_PORTEUR=a%2Bb%40example.com"
        );
    }

    #[test]
    fn test_from_form_body_decodes_in_order() {
        let params = ParameterMap::from_form_body("?z=1&a=hello+world&m=%25");
        let pairs: Vec<_> = params.iter().collect();
        assert_eq!(pairs, [("z", "1"), ("a", "hello world"), ("m", "%")]);
    }

    #[test]
    fn test_from_form_body_decodes_latin1_escapes() {
        let body = "CODEREPONSE=00000&COMMENTAIRE=Demande+trait%E9e+avec+succ%E8s";
        let params = ParameterMap::from_form_body(body);
        assert_eq!(params.get("COMMENTAIRE"), Some("Demande traitée avec succès"));

        let utf8 = ParameterMap::from_form_body("COMMENTAIRE=trait%C3%A9e&flag&a%2Bb=1");
        let pairs: Vec<_> = utf8.iter().collect();
        assert_eq!(pairs, [("COMMENTAIRE", "traitée"), ("flag", ""), ("a+b", "1")]);
    }

    #[test]
    fn test_decode_text_reads_latin1_bytes() {
        let text = decode_text(b"Demande trait\xe9e avec succ\xe8s");
        assert_eq!(text, "Demande traitée avec succès");
        assert!(matches!(decode_text(b"CODEREPONSE=00000"), Cow::Borrowed("CODEREPONSE=00000")));
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut params: ParameterMap = [("a", "1"), ("b", "2"), ("c", "3")].into_iter().collect();
        assert_eq!(params.remove("b").as_deref(), Some("2"));
        assert_eq!(params.canonical_string(), "a=1&c=3");
        assert!(params.remove("missing").is_none());
    }

    #[test]
    fn test_insert_opt() {
        let mut params = ParameterMap::new();
        params.insert_opt("a", Some("1"));
        params.insert_opt("b", None::<String>);
        assert!(params.contains_key("a"));
        assert!(!params.contains_key("b"));
    }

    #[test]
    fn test_serialize_preserves_order() {
        let params: ParameterMap = [("b", "2"), ("a", "1")].into_iter().collect();
        let json = serde_json::to_string(&params).unwrap();
        assert_eq!(json, r#"{"b":"2","a":"1"}"#);
    }
}
