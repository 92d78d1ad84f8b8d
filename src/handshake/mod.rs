// handshake/mod.rs
// Per-session SRP-6a server state machine: Unstarted -> Challenged -> Proven | Failed.
//
// The `srp` crate supplies the group arithmetic (computing B from the stored
// verifier, and the shared secret from the client's A); the actual proof
// check is a custom `SHA256(hex(A) || hex(B) || hex(S))` comparison against
// the client's M1, not the crate's own client/server proof exchange, since
// that's the scheme this protocol actually speaks on the wire.

use std::cell::RefCell;
use std::collections::HashMap;

use rand::RngCore;
use sha2::{Digest, Sha256};
use srp::groups::G_1024;
use srp::server::SrpServer;

use crate::error::HandshakeError;

/// Shared across every user. A real deployment would carry a per-user salt
/// in the `users` table instead; kept as a documented simplification.
pub const FIXED_SALT: [u8; 16] = *b"rublex-fixedsalt";

pub fn salt_hex() -> String {
    hex::encode(FIXED_SALT)
}

#[derive(Debug)]
struct PendingChallenge {
    b: Vec<u8>,
    b_pub_hex: String,
    verifier: Vec<u8>,
}

/// Holds the in-progress SRP state for every session that has issued
/// ChallengeLogin but not yet completed ChallengeProof.
#[derive(Debug, Default)]
pub struct Handshake {
    pending: RefCell<HashMap<u64, PendingChallenge>>,
}

impl Handshake {
    pub fn new() -> Self {
        Self::default()
    }

    /// SRP step 1. `verifier_hex` is the stored verifier for the user
    /// already bound to this session by `LoginSystem::login_account`.
    /// Returns the server's public ephemeral B, hex-encoded.
    pub fn challenge(&self, session_id: u64, verifier_hex: &str) -> Result<String, HandshakeError> {
        let verifier = hex::decode(verifier_hex).map_err(|_| HandshakeError::NotChallenged)?;

        let server = SrpServer::<Sha256>::new(&G_1024);
        let mut b = [0u8; 64];
        rand::thread_rng().fill_bytes(&mut b);
        let b_pub = server.compute_public_ephemeral(&b, &verifier);
        let b_pub_hex = hex::encode(&b_pub);

        self.pending.borrow_mut().insert(
            session_id,
            PendingChallenge {
                b: b.to_vec(),
                b_pub_hex: b_pub_hex.clone(),
                verifier,
            },
        );
        Ok(b_pub_hex)
    }

    /// SRP step 2. Consumes the pending challenge for `session_id` (success
    /// or failure, the challenge cannot be replayed either way).
    pub fn verify_proof(&self, session_id: u64, a_hex: &str, m1_hex: &str) -> Result<(), HandshakeError> {
        let pending = self
            .pending
            .borrow_mut()
            .remove(&session_id)
            .ok_or(HandshakeError::NotChallenged)?;

        let a_pub = hex::decode(a_hex).map_err(|_| HandshakeError::ProofMismatch)?;
        let server = SrpServer::<Sha256>::new(&G_1024);
        let verifier = server
            .process_reply(&pending.b, &pending.verifier, &a_pub)
            .map_err(|_| HandshakeError::ProofMismatch)?;

        let shared_secret_hex = hex::encode(verifier.key());

        let mut hasher = Sha256::new();
        hasher.update(a_hex.as_bytes());
        hasher.update(pending.b_pub_hex.as_bytes());
        hasher.update(shared_secret_hex.as_bytes());
        let computed = hex::encode(hasher.finalize());

        if computed.eq_ignore_ascii_case(m1_hex) {
            Ok(())
        } else {
            Err(HandshakeError::ProofMismatch)
        }
    }

    pub fn close_session(&self, session_id: u64) {
        self.pending.borrow_mut().remove(&session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;
    use srp::client::SrpClient;

    fn client_verifier(user_name: &str, password: &str) -> String {
        let private_key = srp::client::srp_private_key::<Sha256>(
            user_name.as_bytes(),
            password.as_bytes(),
            &FIXED_SALT,
        );
        let client = SrpClient::<Sha256>::new(&G_1024);
        hex::encode(client.compute_verifier(&private_key))
    }

    #[test]
    fn full_round_trip_succeeds_with_matching_password() {
        let verifier_hex = client_verifier("alice", "hunter2");
        let handshake = Handshake::new();
        let b_pub_hex = handshake.challenge(1, &verifier_hex).unwrap();

        let private_key =
            srp::client::srp_private_key::<Sha256>(b"alice", b"hunter2", &FIXED_SALT);
        let client = SrpClient::<Sha256>::new(&G_1024);
        let mut a = [0u8; 64];
        rand::thread_rng().fill_bytes(&mut a);
        let a_pub = client.compute_public_ephemeral(&a);
        let a_pub_hex = hex::encode(&a_pub);

        let b_pub = hex::decode(&b_pub_hex).unwrap();
        let client_proof = client
            .process_reply(&a, b"alice", &FIXED_SALT, &private_key, &b_pub)
            .unwrap();
        let shared_secret_hex = hex::encode(client_proof.key());

        let mut hasher = Sha256::new();
        hasher.update(a_pub_hex.as_bytes());
        hasher.update(b_pub_hex.as_bytes());
        hasher.update(shared_secret_hex.as_bytes());
        let m1_hex = hex::encode(hasher.finalize());

        assert!(handshake.verify_proof(1, &a_pub_hex, &m1_hex).is_ok());
    }

    #[test]
    fn mismatched_proof_is_rejected() {
        let verifier_hex = client_verifier("bob", "correcthorse");
        let handshake = Handshake::new();
        let b_pub_hex = handshake.challenge(2, &verifier_hex).unwrap();
        let _ = b_pub_hex;

        let err = handshake.verify_proof(2, "00", "deadbeef").unwrap_err();
        assert!(matches!(err, HandshakeError::ProofMismatch));
    }

    #[test]
    fn proof_without_challenge_is_rejected() {
        let handshake = Handshake::new();
        let err = handshake.verify_proof(9, "00", "00").unwrap_err();
        assert!(matches!(err, HandshakeError::NotChallenged));
    }
}
