//! Terminal chat over the in-process providers.
//!
//! Run two copies of the feed in one process with `--peers 2` to watch
//! messages cross between sessions over the broadcast bus.

use std::collections::HashSet;
use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use parley_client::local::{LocalIdentity, MemoryStore};
use parley_client::{
    ChatClient, ClientConfig, FileIdentityCache, IdentityCache, MemoryIdentityCache, RoomFeed,
    RoomId,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

fn print_help() {
    println!("Commands:");
    println!("  /rooms         - List rooms");
    println!("  /room <id>     - Switch to a room");
    println!("  /whoami        - Show the signed-in user");
    println!("  /logout        - Sign out and exit");
    println!("  /quit          - Exit");
    println!("  <message>      - Send message to current room");
}

async fn handle_input(line: &str, client: &ChatClient) -> bool {
    let line = line.trim();
    if line.is_empty() {
        return true;
    }

    let Some(command) = line.strip_prefix('/') else {
        if let Err(e) = client.send(line).await {
            println!("Error: {} (message not sent)", e);
        }
        return true;
    };

    let mut parts = command.splitn(2, ' ');
    let cmd = parts.next().unwrap_or_default();
    let arg = parts.next().map(str::trim);

    match cmd {
        "help" => print_help(),
        "rooms" => {
            let current = client.current_room();
            for room in client.rooms() {
                let marker = if room.id == current.id { " *" } else { "" };
                println!("  {} {} - {}{}", room.id, room.name, room.description, marker);
            }
        }
        "room" => match arg {
            Some(id) => match client.select_room(&RoomId::new(id)) {
                Some(room) => println!("Switched to room: {}", room.name),
                None => println!("Unknown room: {}", id),
            },
            None => println!("Usage: /room <id>"),
        },
        "whoami" => match client.user() {
            Some(user) => println!("{} ({})", user.username, user.id),
            None => println!("Not signed in"),
        },
        "logout" => {
            if let Err(e) = client.logout().await {
                println!("Logout failed: {}", e);
                return true;
            }
            return false;
        }
        "quit" | "exit" => return false,
        _ => println!("Unknown command: /{}. Type /help for commands.", cmd),
    }

    true
}

async fn print_feed(mut feed: RoomFeed, label: String) {
    let mut printed: HashSet<String> = HashSet::new();
    let mut room = None;

    while let Some(view) = feed.next().await {
        if room.as_ref() != Some(&view.room.id) {
            println!("{}--- {} ({}) ---", label, view.room.name, view.room.description);
            room = Some(view.room.id.clone());
            printed.clear();
        }

        // Merged remote messages can land anywhere in the list
        for message in view.messages.iter() {
            if !printed.insert(message.id.clone()) {
                continue;
            }
            let time = message
                .timestamp
                .format(&time::macros::format_description!("[hour]:[minute]"))
                .unwrap_or_default();
            println!("{}[{}] {}: {}", label, time, message.username, message.text);
        }
    }
}

fn prompt_username() -> Result<String> {
    print!("Username: ");
    io::stdout().flush()?;
    let mut username = String::new();
    io::stdin().read_line(&mut username)?;
    Ok(username.trim().to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .init();

    let config = match std::env::args().nth(1).filter(|arg| !arg.starts_with("--")) {
        Some(path) => ClientConfig::from_file(&path)?,
        None => ClientConfig::default(),
    };
    let peers = std::env::args()
        .skip_while(|arg| arg != "--peers")
        .nth(1)
        .map(|n| n.parse::<usize>())
        .transpose()
        .context("--peers expects a number")?
        .unwrap_or(1)
        .max(1);

    println!("Parley CLI Chat");
    println!("===============");

    let cache: Arc<dyn IdentityCache> = match &config.identity_path {
        Some(path) => Arc::new(FileIdentityCache::new(path)),
        None => Arc::new(MemoryIdentityCache::default()),
    };
    let (bus, _) = broadcast::channel(64);

    let identity = Arc::new(LocalIdentity::new(cache));
    let client = ChatClient::new(&config, identity.clone(), Arc::new(MemoryStore::linked(&bus)))?;

    match identity.current() {
        Some(user) => println!("Welcome back, {}", user.username),
        None => {
            let username = prompt_username()?;
            let user = client.login(&username).await?;
            println!("Logged in as: {}", user.username);
        }
    }
    println!("Type /help for commands\n");

    tokio::spawn(print_feed(client.current_feed(), String::new()));

    // Extra read-only sessions sharing the bus
    let mut observers = Vec::new();
    for n in 2..=peers {
        let peer = ChatClient::new(
            &config,
            Arc::new(LocalIdentity::new(Arc::new(MemoryIdentityCache::default()))),
            Arc::new(MemoryStore::linked(&bus)),
        )?;
        peer.login(&format!("observer{}", n)).await?;
        tokio::spawn(print_feed(peer.current_feed(), format!("(peer {}) ", n)));
        observers.push(peer);
    }

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    while let Some(line) = lines.next_line().await? {
        if !handle_input(&line, &client).await {
            break;
        }
    }

    client.shutdown();
    Ok(())
}
