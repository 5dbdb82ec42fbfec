pub mod jwt;
pub mod scorer;

pub use jwt::{decode_jwt_part, jwt_exp};
pub use scorer::{score_candidate, select_best_token, select_best_token_at, strip_bearer, TokenCandidate};
