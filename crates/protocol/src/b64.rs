//! Base64-Kodierung (RFC 4648, Standardalphabet, kein Zeilenumbruch)
//!
//! Duenner Wrapper um das `base64`-Crate, damit Aufrufer innerhalb dieses
//! Workspaces nicht direkt von dessen Engine-API abhaengen muessen.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{ProtocolError, ProtocolResult};

/// Kodiert beliebige Bytes als Standard-Base64-String.
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Dekodiert einen Standard-Base64-String zurueck zu Bytes.
pub fn decode(s: &str) -> ProtocolResult<Vec<u8>> {
    STANDARD
        .decode(s)
        .map_err(|e| ProtocolError::ParseFailed(format!("base64: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Invariante 4 (§8): Base64-Rundtrip fuer beliebige Byte-Strings.
    #[test]
    fn rundtrip_beliebiger_bytes() {
        let samples: &[&[u8]] = &[&[], &[0], &[255, 0, 128], b"hello world", &[1; 1000]];
        for s in samples {
            let encoded = encode(s);
            let decoded = decode(&encoded).unwrap();
            assert_eq!(&decoded, s);
        }
    }

    #[test]
    fn kein_zeilenumbruch() {
        let encoded = encode(&[0u8; 200]);
        assert!(!encoded.contains('\n'));
    }

    #[test]
    fn ungueltige_eingabe_liefert_fehler() {
        assert!(decode("not base64 !!!").is_err());
    }
}
