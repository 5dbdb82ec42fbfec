use base64::{engine::general_purpose, Engine as _};
use pocketcastsctl::auth::{score_candidate, select_best_token_at, TokenCandidate};

const NOW: i64 = 1_700_000_000;

fn jwt(exp: i64) -> String {
    let header = general_purpose::URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256"}"#);
    let payload = general_purpose::URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{}}}"#, exp));
    format!("{}.{}.c2lnbmF0dXJl", header, payload)
}

fn cand(key: &str, token: &str) -> TokenCandidate {
    TokenCandidate { source_key: key.into(), token: token.into() }
}

#[test]
fn access_jwt_beats_opaque() {
    let live = jwt(NOW + 3600);
    let opaque = "o".repeat(live.len());
    let a = cand("accessToken", &live);
    let b = cand("blob", &opaque);

    assert!(score_candidate(&a, "", NOW) > score_candidate(&b, "", NOW));
    assert_eq!(select_best_token_at(&[b, a], "", NOW).unwrap(), live);
}

#[test]
fn expired_scores_below_no_claims() {
    let expired = jwt(NOW - 60);
    let plain = "p".repeat(expired.len());
    let e = cand("token", &expired);
    let p = cand("token", &plain);
    assert!(score_candidate(&e, "", NOW) < score_candidate(&p, "", NOW));
}

#[test]
fn key_filter_dominates() {
    let cands = vec![
        cand("accessToken", &jwt(NOW + 86_400)),
        cand("legacySession", "Bearer abcdefghijklmnopqrstuvwxyz"),
    ];
    assert_eq!(
        select_best_token_at(&cands, " Legacy ", NOW).unwrap(),
        "abcdefghijklmnopqrstuvwxyz"
    );
}

#[test]
fn scoring_is_repeatable() {
    let cands = vec![cand("authToken", &jwt(NOW + 10)), cand("x", "y")];
    assert_eq!(
        select_best_token_at(&cands, "", NOW).unwrap(),
        select_best_token_at(&cands, "", NOW).unwrap()
    );
}
