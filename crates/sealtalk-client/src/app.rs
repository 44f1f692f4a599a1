//! Client event loop: wires the session to the transport and the terminal.

use futures::stream::FuturesOrdered;
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use sealtalk_shared::ClientMessage;

use crate::config::ClientConfig;
use crate::error::SessionError;
use crate::session::{DecryptOutcome, Session};
use crate::terminal::{self, Command};
use crate::transport::{spawn_transport, TransportCommand, TransportNotification};

pub async fn run(config: ClientConfig) -> anyhow::Result<()> {
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    let name = match config.display_name.clone() {
        Some(name) => name,
        None => prompt_name(&mut input).await?,
    };

    let mut session = Session::new();
    // Published by `on_connected` once the link is up.
    session.login(&name)?;
    if let Some(identity) = session.identity() {
        println!(
            "* logged in as {} (fingerprint {})",
            identity.name(),
            identity.fingerprint()
        );
    }
    println!("{}", terminal::help());

    let (cmd_tx, mut notif_rx) = spawn_transport(config.relay_url.clone(), config.reconnect_delay);

    // Decryptions run on the blocking pool; results are applied in arrival order.
    let mut decrypts: FuturesOrdered<JoinHandle<DecryptOutcome>> = FuturesOrdered::new();
    let mut show_wire = false;

    loop {
        tokio::select! {
            line = input.next_line() => {
                let Some(line) = line? else { break };
                let Some(command) = Command::parse(&line) else { continue };
                match command {
                    Command::Quit => break,
                    Command::ToggleWire => {
                        show_wire = !show_wire;
                        println!("* wire log {}", if show_wire { "on" } else { "off" });
                        continue;
                    }
                    _ => {}
                }
                handle_command(&mut session, command, &cmd_tx).await;
            }

            notification = notif_rx.recv() => {
                let Some(notification) = notification else { break };
                match notification {
                    TransportNotification::Connected => {
                        if let Some(login) = session.on_connected() {
                            submit(&cmd_tx, &login).await;
                        }
                    }
                    TransportNotification::Frame(text) => {
                        if let Some(pending) = session.handle_frame(&text) {
                            decrypts.push_back(tokio::task::spawn_blocking(move || pending.run()));
                        }
                    }
                    TransportNotification::Disconnected { reason } => {
                        debug!(reason = ?reason, "Transport reported disconnect");
                        session.on_disconnected();
                    }
                }
            }

            Some(outcome) = decrypts.next(), if !decrypts.is_empty() => {
                match outcome {
                    Ok(outcome) => session.complete(outcome),
                    Err(e) => error!(error = %e, "Decryption task failed"),
                }
            }
        }

        flush_events(&mut session, show_wire);
    }

    let _ = cmd_tx.send(TransportCommand::Close).await;
    info!("Client shutting down");
    Ok(())
}

async fn prompt_name(input: &mut Lines<BufReader<Stdin>>) -> anyhow::Result<String> {
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"display name: ").await?;
        stdout.flush().await?;
        match input.next_line().await? {
            Some(line) if !line.trim().is_empty() => return Ok(line.trim().to_string()),
            Some(_) => continue,
            None => anyhow::bail!("stdin closed before a display name was entered"),
        }
    }
}

async fn handle_command(
    session: &mut Session,
    command: Command,
    cmd_tx: &mpsc::Sender<TransportCommand>,
) {
    match command {
        Command::ListPeers => println!("{}", terminal::format_peers(session)),
        Command::Select(query) => match terminal::resolve_peer(session.peers(), &query) {
            Some(id) => {
                if let Err(e) = session.select_peer(&id) {
                    println!("! {e}");
                }
            }
            None => println!("! no peer matches '{query}'"),
        },
        Command::Help => println!("{}", terminal::help()),
        Command::Say(text) => match session.send(&text) {
            Ok(message) => submit(cmd_tx, &message).await,
            Err(SessionError::Crypto(e)) => println!("! could not encrypt: {e}"),
            Err(e) => println!("! {e}"),
        },
        Command::ToggleWire | Command::Quit => {}
    }
}

async fn submit(cmd_tx: &mpsc::Sender<TransportCommand>, message: &ClientMessage) {
    match message.to_json() {
        Ok(json) => {
            if cmd_tx.send(TransportCommand::Send(json)).await.is_err() {
                error!("Transport task is gone");
            }
        }
        Err(e) => error!(error = %e, "Failed to serialize outgoing message"),
    }
}

fn flush_events(session: &mut Session, show_wire: bool) {
    for event in session.drain_events() {
        if let Some(line) = terminal::render(&event, session, show_wire) {
            println!("{line}");
        }
    }
}
