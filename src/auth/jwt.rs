use base64::{engine::general_purpose, Engine as _};
use serde_json::Value;

/// Decode one base64url JWT segment, restoring the padding JWTs drop.
/// Standard-alphabet input is accepted too.
pub fn decode_jwt_part(part: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let b64 = part.trim().replace('-', "+").replace('_', "/");
    let padding = (4 - b64.len() % 4) % 4;
    let padded = format!("{}{}", b64, "=".repeat(padding));
    general_purpose::STANDARD.decode(padded)
}

/// `exp` claim of a three-segment token, if its payload is JSON with a numeric `exp`.
pub fn jwt_exp(token: &str) -> Option<i64> {
    let parts: Vec<&str> = token.trim().split('.').collect();
    if parts.len() != 3 {
        return None;
    }
    let payload = decode_jwt_part(parts[1]).ok()?;
    let claims: Value = serde_json::from_slice(&payload).ok()?;
    claims.get("exp").and_then(Value::as_f64).map(|exp| exp as i64)
}
