// bin/server.rs
// Accept loop: one cooperative task per connection on a single-threaded
// tokio runtime, framing messages as NUL-delimited JSON envelopes and
// handing each one to the dispatcher.

use std::cell::Cell;
use std::io;
use std::rc::Rc;

use log::{error, info, warn};
use structopt::StructOpt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::LocalSet;

use rublex::config::{load_config, ServerArgs};
use rublex::dispatcher::Dispatcher;
use rublex::protocol::{Envelope, MESSAGE_DELIMITER, READ_BUFFER_SIZE};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = ServerArgs::from_args();
    let config = args.apply(load_config()?);

    std::env::set_var("RUST_LOG", &config.logging.level);
    env_logger::init();

    let persistence = database::open(&config.database.url, 4);
    let dispatcher = Rc::new(Dispatcher::new(persistence));
    dispatcher.recover();

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("listening on {addr}");

    let local = LocalSet::new();
    local
        .run_until(async move {
            let next_session_id = Rc::new(Cell::new(0u64));
            loop {
                let (socket, peer) = match listener.accept().await {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!("accept failed: {e}");
                        continue;
                    }
                };

                let session_id = next_session_id.get();
                next_session_id.set(session_id + 1);

                let dispatcher = dispatcher.clone();
                tokio::task::spawn_local(async move {
                    info!("session {session_id} connected from {peer}");
                    dispatcher.on_connected(session_id);
                    if let Err(e) = serve_connection(session_id, socket, &dispatcher).await {
                        warn!("session {session_id} closed with error: {e}");
                    }
                    dispatcher.on_closed(session_id);
                    info!("session {session_id} disconnected");
                });
            }
        })
        .await;

    Ok(())
}

async fn serve_connection<P: database::Persistence>(
    session_id: u64,
    mut socket: TcpStream,
    dispatcher: &Dispatcher<P>,
) -> io::Result<()> {
    let mut pending = Vec::new();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let n = socket.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        pending.extend_from_slice(&buf[..n]);

        while let Some(pos) = pending.iter().position(|&b| b == MESSAGE_DELIMITER) {
            let frame = pending.drain(..=pos).collect::<Vec<u8>>();
            let frame = &frame[..frame.len() - 1];

            let reply = match std::str::from_utf8(frame).ok().and_then(|s| serde_json::from_str::<Envelope>(s).ok()) {
                Some(envelope) => dispatcher.dispatch(session_id, envelope),
                None => {
                    error!("session {session_id}: malformed frame, replying Unknown");
                    Envelope::unknown()
                }
            };

            let mut out = serde_json::to_vec(&reply).expect("Envelope always serializes");
            out.push(MESSAGE_DELIMITER);
            socket.write_all(&out).await?;
        }
    }
}
