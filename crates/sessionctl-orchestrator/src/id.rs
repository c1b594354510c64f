//! Session id generation.

use rand::rngs::OsRng;
use rand::RngCore;

/// `sess_` followed by 12 lowercase hex characters drawn from a
/// cryptographic RNG. A failure of the entropy source is a fatal program
/// error, not a recoverable `Result`. Callers should let the panic
/// propagate rather than catch it.
pub fn generate_session_id() -> String {
    let mut bytes = [0u8; 6];
    OsRng.try_fill_bytes(&mut bytes).expect("entropy source failure generating a session id is fatal");
    format!("sess_{}", hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sessionctl_types::Session;

    #[test]
    fn generated_ids_match_the_session_id_format() {
        for _ in 0..50 {
            let id = generate_session_id();
            assert!(Session::id_matches_format(&id), "{id} does not match sess_[0-9a-f]{{12}}");
        }
    }

    #[test]
    fn generated_ids_are_not_trivially_repeated() {
        let a = generate_session_id();
        let b = generate_session_id();
        assert_ne!(a, b);
    }
}
