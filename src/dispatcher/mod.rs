// dispatcher/mod.rs
// Maps incoming envelopes to core operations and enforces auth gating.
// Framing and socket I/O are the caller's problem; this module only ever
// sees one already-parsed `Envelope` at a time and returns the reply
// envelope to send back.

use database::{OrderSide, Persistence};
use log::trace;
use serde_json::json;

use crate::auth::LoginSystem;
use crate::error::{DispatchError, ErrorCode};
use crate::handshake::{self, Handshake};
use crate::ledger::Ledger;
use crate::matcher::Matcher;
use crate::order_book::OrderBook;
use crate::protocol::{
    ChallengeLoginRequest, ChallengeLoginResponse, ChallengeProofRequest, Envelope,
    MakeRequestRequest, RegisterRequest, WalletListResponse, MSG_CHALLENGE_LOGIN,
    MSG_CHALLENGE_PROOF, MSG_LOGOUT, MSG_MAKE_REQUEST, MSG_REGISTER, MSG_UNKNOWN, MSG_WALLET_LIST,
};

#[derive(Debug)]
pub struct Dispatcher<P: Persistence> {
    login: LoginSystem<P>,
    handshake: Handshake,
    ledger: Ledger<P>,
    order_book: OrderBook<P>,
    matcher: Matcher<P>,
}

impl<P: Persistence> Dispatcher<P> {
    pub fn new(persistence: P) -> Self {
        Self {
            login: LoginSystem::new(persistence.clone()),
            handshake: Handshake::new(),
            ledger: Ledger::new(persistence.clone()),
            order_book: OrderBook::new(persistence.clone()),
            matcher: Matcher::new(persistence),
        }
    }

    /// Drains any orders left open from a prior run. Call once at startup.
    pub fn recover(&self) {
        self.matcher.process_requests();
    }

    pub fn on_connected(&self, session_id: u64) {
        self.login.initialize_session(session_id);
    }

    pub fn on_closed(&self, session_id: u64) {
        self.login.close_session(session_id);
        self.handshake.close_session(session_id);
    }

    pub fn dispatch(&self, session_id: u64, envelope: Envelope) -> Envelope {
        trace!("session {session_id}: dispatching message type {}", envelope.message_type);
        match envelope.message_type {
            MSG_REGISTER => self.handle_register(envelope),
            MSG_CHALLENGE_LOGIN => self.handle_challenge_login(session_id, envelope),
            MSG_CHALLENGE_PROOF => self.handle_challenge_proof(session_id, envelope),
            MSG_LOGOUT => self.handle_logout(session_id),
            MSG_WALLET_LIST => self.handle_wallet_list(session_id),
            MSG_MAKE_REQUEST => self.handle_make_request(session_id, envelope),
            _ => Envelope::unknown(),
        }
    }

    fn require_auth(&self, session_id: u64) -> Result<i32, DispatchError> {
        if !self.login.auth_session(session_id) {
            return Err(DispatchError::Restricted);
        }
        self.login
            .user_id(session_id)
            .ok_or(DispatchError::Restricted)
    }

    fn handle_register(&self, envelope: Envelope) -> Envelope {
        let req: RegisterRequest = match serde_json::from_value(envelope.payload) {
            Ok(r) => r,
            Err(_) => return Envelope::unknown(),
        };

        match self.login.exists(&req.user_name) {
            Ok(true) => return Envelope::error(MSG_REGISTER, ErrorCode::AuthExists),
            Ok(false) => {}
            Err(e) => return Envelope::error(MSG_REGISTER, e.to_error_code()),
        }

        let user_id = match self.login.register_account(&req.user_name, &req.verifier) {
            Ok(id) => id,
            Err(e) => return Envelope::error(MSG_REGISTER, e.to_error_code()),
        };

        for currency in ["USD", "RUB"] {
            if let Err(e) = self.ledger.create_wallet(user_id, currency) {
                return Envelope::error(MSG_REGISTER, e.to_error_code());
            }
        }

        Envelope::success(MSG_REGISTER)
    }

    fn handle_challenge_login(&self, session_id: u64, envelope: Envelope) -> Envelope {
        let req: ChallengeLoginRequest = match serde_json::from_value(envelope.payload) {
            Ok(r) => r,
            Err(_) => return Envelope::unknown(),
        };

        if let Err(e) = self.login.login_account(&req.user_name, &req.verifier, session_id) {
            return Envelope::new(
                MSG_CHALLENGE_LOGIN,
                json!(ChallengeLoginResponse { error_code: e.to_error_code() as u16, b: None }),
            );
        }

        match self.handshake.challenge(session_id, &req.verifier) {
            Ok(b) => Envelope::new(
                MSG_CHALLENGE_LOGIN,
                json!(ChallengeLoginResponse { error_code: ErrorCode::Success as u16, b: Some(b) }),
            ),
            Err(e) => Envelope::new(
                MSG_CHALLENGE_LOGIN,
                json!(ChallengeLoginResponse { error_code: e.to_error_code() as u16, b: None }),
            ),
        }
    }

    fn handle_challenge_proof(&self, session_id: u64, envelope: Envelope) -> Envelope {
        let req: ChallengeProofRequest = match serde_json::from_value(envelope.payload) {
            Ok(r) => r,
            Err(_) => return Envelope::unknown(),
        };

        match self.handshake.verify_proof(session_id, &req.a, &req.m1) {
            Ok(()) => {
                self.login.login_session(session_id);
                Envelope::success(MSG_CHALLENGE_PROOF)
            }
            Err(e) => Envelope::error(MSG_CHALLENGE_PROOF, e.to_error_code()),
        }
    }

    fn handle_logout(&self, session_id: u64) -> Envelope {
        if !self.login.auth_session(session_id) {
            return Envelope::unknown();
        }
        self.login.logout_session(session_id);
        Envelope::success(MSG_LOGOUT)
    }

    fn handle_wallet_list(&self, session_id: u64) -> Envelope {
        let user_id = match self.require_auth(session_id) {
            Ok(id) => id,
            Err(e) => {
                return Envelope::new(
                    MSG_WALLET_LIST,
                    json!(WalletListResponse { error_code: e.to_error_code() as u16, wallets: None }),
                )
            }
        };

        match self.ledger.wallets(user_id) {
            Some(wallets) => Envelope::new(
                MSG_WALLET_LIST,
                json!(WalletListResponse { error_code: ErrorCode::Success as u16, wallets: Some(wallets) }),
            ),
            None => Envelope::new(
                MSG_WALLET_LIST,
                json!(WalletListResponse { error_code: ErrorCode::DbFailed as u16, wallets: None }),
            ),
        }
    }

    fn handle_make_request(&self, session_id: u64, envelope: Envelope) -> Envelope {
        let user_id = match self.require_auth(session_id) {
            Ok(id) => id,
            Err(e) => return Envelope::error(MSG_MAKE_REQUEST, e.to_error_code()),
        };

        let req: MakeRequestRequest = match serde_json::from_value(envelope.payload) {
            Ok(r) => r,
            Err(_) => return Envelope::unknown(),
        };

        let side = match req.request_type {
            0 => OrderSide::Buy,
            1 => OrderSide::Sell,
            _ => return Envelope::error(MSG_MAKE_REQUEST, ErrorCode::ValidationError),
        };

        if req.amount <= 0.0 || req.price <= 0.0 {
            return Envelope::error(MSG_MAKE_REQUEST, ErrorCode::ValidationError);
        }

        match self.order_book.make_request(user_id, &req.currency, req.amount, req.price, side) {
            Ok(_) => {
                self.matcher.process_requests();
                Envelope::success(MSG_MAKE_REQUEST)
            }
            Err(e) => Envelope::error(MSG_MAKE_REQUEST, e.to_error_code()),
        }
    }
}

/// Exposed so binaries can compute a registration verifier's salt without
/// reaching into `crate::handshake` directly.
pub fn registration_salt_hex() -> String {
    handshake::salt_hex()
}

#[cfg(test)]
mod tests {
    use super::*;
    use database::MockPersistence;
    use rand::RngCore;
    use sha2::{Digest, Sha256};
    use srp::client::SrpClient;
    use srp::groups::G_1024;

    fn verifier_for(user_name: &str, password: &str) -> String {
        let private_key =
            srp::client::srp_private_key::<Sha256>(user_name.as_bytes(), password.as_bytes(), &handshake::FIXED_SALT);
        let client = SrpClient::<Sha256>::new(&G_1024);
        hex::encode(client.compute_verifier(&private_key))
    }

    #[test]
    fn make_request_before_auth_is_restricted() {
        let dispatcher = Dispatcher::new(MockPersistence::new());
        dispatcher.on_connected(1);
        let reply = dispatcher.dispatch(
            1,
            Envelope::new(MSG_MAKE_REQUEST, json!({"currency": "USD/RUB", "amount": 1.0, "price": 1.0, "request_type": 0})),
        );
        let body: serde_json::Value = serde_json::to_value(&reply.payload).unwrap();
        assert_eq!(body["error_code"], ErrorCode::Restricted as u16);
    }

    #[test]
    fn register_then_duplicate_register_is_rejected() {
        let dispatcher = Dispatcher::new(MockPersistence::new());
        let verifier = verifier_for("alice", "hunter2");
        let first = dispatcher.dispatch(
            1,
            Envelope::new(MSG_REGISTER, json!({"user_name": "alice", "verifier": verifier})),
        );
        assert_eq!(first.payload["error_code"], ErrorCode::Success as u16);

        let second = dispatcher.dispatch(
            1,
            Envelope::new(MSG_REGISTER, json!({"user_name": "alice", "verifier": verifier})),
        );
        assert_eq!(second.payload["error_code"], ErrorCode::AuthExists as u16);
    }

    #[test]
    fn full_auth_flow_then_wallet_list_succeeds() {
        let dispatcher = Dispatcher::new(MockPersistence::new());
        dispatcher.on_connected(1);
        let verifier = verifier_for("alice", "hunter2");
        dispatcher.dispatch(1, Envelope::new(MSG_REGISTER, json!({"user_name": "alice", "verifier": verifier})));

        let login_reply = dispatcher.dispatch(
            1,
            Envelope::new(MSG_CHALLENGE_LOGIN, json!({"user_name": "alice", "verifier": verifier})),
        );
        assert_eq!(login_reply.payload["error_code"], ErrorCode::Success as u16);
        let b_hex = login_reply.payload["B"].as_str().unwrap().to_string();

        let private_key =
            srp::client::srp_private_key::<Sha256>(b"alice", b"hunter2", &handshake::FIXED_SALT);
        let client = SrpClient::<Sha256>::new(&G_1024);
        let mut a = [0u8; 64];
        rand::thread_rng().fill_bytes(&mut a);
        let a_pub = client.compute_public_ephemeral(&a);
        let a_pub_hex = hex::encode(&a_pub);
        let b_pub = hex::decode(&b_hex).unwrap();
        let client_proof = client
            .process_reply(&a, b"alice", &handshake::FIXED_SALT, &private_key, &b_pub)
            .unwrap();
        let shared_secret_hex = hex::encode(client_proof.key());

        let mut hasher = Sha256::new();
        hasher.update(a_pub_hex.as_bytes());
        hasher.update(b_hex.as_bytes());
        hasher.update(shared_secret_hex.as_bytes());
        let m1_hex = hex::encode(hasher.finalize());

        let proof_reply = dispatcher.dispatch(
            1,
            Envelope::new(MSG_CHALLENGE_PROOF, json!({"user_name": "alice", "A": a_pub_hex, "M1": m1_hex})),
        );
        assert_eq!(proof_reply.payload["error_code"], ErrorCode::Success as u16);

        let wallets_reply = dispatcher.dispatch(1, Envelope::new(MSG_WALLET_LIST, json!({})));
        assert_eq!(wallets_reply.payload["error_code"], ErrorCode::Success as u16);
        assert_eq!(wallets_reply.payload["wallets"].as_array().unwrap().len(), 2);
    }
}
