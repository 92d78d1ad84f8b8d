// bin/client.rs
// Interactive text menu driving the wire protocol directly: register,
// log in (performing the client side of SRP-6a), list wallets, and place
// orders. The framing and socket plumbing mirrored here is intentionally
// minimal since the server side owns the real dispatch logic.

use std::io::{self, BufRead, Write as _};

use rand::RngCore;
use serde_json::json;
use sha2::{Digest, Sha256};
use srp::client::SrpClient;
use srp::groups::G_1024;
use structopt::StructOpt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use rublex::config::ClientArgs;
use rublex::handshake::FIXED_SALT;
use rublex::protocol::{
    Envelope, MESSAGE_DELIMITER, READ_BUFFER_SIZE, MSG_CHALLENGE_LOGIN, MSG_CHALLENGE_PROOF,
    MSG_LOGOUT, MSG_MAKE_REQUEST, MSG_REGISTER, MSG_WALLET_LIST,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = ClientArgs::from_args();
    let addr = format!("{}:{}", args.connect, args.port);
    let mut socket = TcpStream::connect(&addr).await?;
    println!("connected to {addr}");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print_menu();
        let Some(Ok(choice)) = lines.next() else { break };
        match choice.trim() {
            "1" => register(&mut socket, &mut lines).await?,
            "2" => login(&mut socket, &mut lines).await?,
            "3" => wallet_list(&mut socket).await?,
            "4" => make_request(&mut socket, &mut lines).await?,
            "5" => logout(&mut socket).await?,
            "q" | "quit" => break,
            _ => println!("unrecognized choice"),
        }
    }
    Ok(())
}

fn print_menu() {
    println!("\n1) register  2) login  3) wallets  4) place order  5) logout  q) quit");
    print!("> ");
    io::stdout().flush().ok();
}

fn prompt(lines: &mut io::Lines<io::StdinLock<'_>>, label: &str) -> String {
    print!("{label}: ");
    io::stdout().flush().ok();
    lines.next().and_then(Result::ok).unwrap_or_default()
}

fn verifier_hex(user_name: &str, password: &str) -> String {
    let private_key = srp::client::srp_private_key::<Sha256>(user_name.as_bytes(), password.as_bytes(), &FIXED_SALT);
    let client = SrpClient::<Sha256>::new(&G_1024);
    hex::encode(client.compute_verifier(&private_key))
}

async fn send(socket: &mut TcpStream, envelope: &Envelope) -> anyhow::Result<Envelope> {
    let mut out = serde_json::to_vec(envelope)?;
    out.push(MESSAGE_DELIMITER);
    socket.write_all(&out).await?;

    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let mut pending = Vec::new();
    loop {
        if let Some(pos) = pending.iter().position(|&b| b == MESSAGE_DELIMITER) {
            let frame = &pending[..pos];
            return Ok(serde_json::from_slice(frame)?);
        }
        let n = socket.read(&mut buf).await?;
        if n == 0 {
            anyhow::bail!("server closed the connection");
        }
        pending.extend_from_slice(&buf[..n]);
    }
}

async fn register(socket: &mut TcpStream, lines: &mut io::Lines<io::StdinLock<'_>>) -> anyhow::Result<()> {
    let user_name = prompt(lines, "username");
    let password = prompt(lines, "password");
    let verifier = verifier_hex(&user_name, &password);
    let reply = send(socket, &Envelope::new(MSG_REGISTER, json!({"user_name": user_name, "verifier": verifier}))).await?;
    println!("register reply: {}", reply.payload);
    Ok(())
}

async fn login(socket: &mut TcpStream, lines: &mut io::Lines<io::StdinLock<'_>>) -> anyhow::Result<()> {
    let user_name = prompt(lines, "username");
    let password = prompt(lines, "password");
    let verifier = verifier_hex(&user_name, &password);

    let login_reply = send(
        socket,
        &Envelope::new(MSG_CHALLENGE_LOGIN, json!({"user_name": user_name, "verifier": verifier})),
    )
    .await?;
    let Some(b_pub_hex) = login_reply.payload.get("B").and_then(|v| v.as_str()) else {
        println!("challenge_login failed: {}", login_reply.payload);
        return Ok(());
    };

    let private_key = srp::client::srp_private_key::<Sha256>(user_name.as_bytes(), password.as_bytes(), &FIXED_SALT);
    let client = SrpClient::<Sha256>::new(&G_1024);
    let mut a = [0u8; 64];
    rand::thread_rng().fill_bytes(&mut a);
    let a_pub = client.compute_public_ephemeral(&a);
    let a_pub_hex = hex::encode(&a_pub);
    let b_pub = hex::decode(b_pub_hex)?;
    let client_proof = client.process_reply(&a, user_name.as_bytes(), &FIXED_SALT, &private_key, &b_pub)?;
    let shared_secret_hex = hex::encode(client_proof.key());

    let mut hasher = Sha256::new();
    hasher.update(a_pub_hex.as_bytes());
    hasher.update(b_pub_hex.as_bytes());
    hasher.update(shared_secret_hex.as_bytes());
    let m1_hex = hex::encode(hasher.finalize());

    let proof_reply = send(
        socket,
        &Envelope::new(MSG_CHALLENGE_PROOF, json!({"user_name": user_name, "A": a_pub_hex, "M1": m1_hex})),
    )
    .await?;
    println!("challenge_proof reply: {}", proof_reply.payload);
    Ok(())
}

async fn wallet_list(socket: &mut TcpStream) -> anyhow::Result<()> {
    let reply = send(socket, &Envelope::new(MSG_WALLET_LIST, json!({}))).await?;
    println!("wallets: {}", reply.payload);
    Ok(())
}

async fn make_request(socket: &mut TcpStream, lines: &mut io::Lines<io::StdinLock<'_>>) -> anyhow::Result<()> {
    let currency = prompt(lines, "pair (e.g. USD/RUB)");
    let amount: f32 = prompt(lines, "amount").trim().parse().unwrap_or(0.0);
    let price: f32 = prompt(lines, "price").trim().parse().unwrap_or(0.0);
    let side = prompt(lines, "side (0=buy, 1=sell)");
    let request_type: i64 = side.trim().parse().unwrap_or(-1);

    let reply = send(
        socket,
        &Envelope::new(MSG_MAKE_REQUEST, json!({"currency": currency, "amount": amount, "price": price, "request_type": request_type})),
    )
    .await?;
    println!("make_request reply: {}", reply.payload);
    Ok(())
}

async fn logout(socket: &mut TcpStream) -> anyhow::Result<()> {
    let reply = send(socket, &Envelope::new(MSG_LOGOUT, json!({}))).await?;
    println!("logout reply: {}", reply.payload);
    Ok(())
}
