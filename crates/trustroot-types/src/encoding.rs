//! Binary fields of trust material
//!
//! Key bytes, certificates, log IDs and repository snapshots travel as
//! standard base64 strings, both in the stored trusted root and in
//! declarations.

/// Serde adapter for a `Vec<u8>` field carried as base64 text
///
/// ```
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Blob {
///     #[serde(with = "trustroot_types::base64_field")]
///     raw_bytes: Vec<u8>,
/// }
///
/// let blob: Blob = serde_json::from_str(r#"{"raw_bytes":"AQID"}"#).unwrap();
/// assert_eq!(blob.raw_bytes, [1, 2, 3]);
/// ```
pub mod base64_field {
    use std::fmt;

    use base64::display::Base64Display;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&Base64Display::new(bytes, &STANDARD))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_str(Base64Text)
    }

    struct Base64Text;

    impl Visitor<'_> for Base64Text {
        type Value = Vec<u8>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("base64 encoded key, certificate or archive bytes")
        }

        fn visit_str<E: de::Error>(self, text: &str) -> Result<Vec<u8>, E> {
            STANDARD
                .decode(text)
                .map_err(|e| E::custom(format!("binary field is not valid base64: {e}")))
        }
    }
}
