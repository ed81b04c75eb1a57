//! Terminal client: handshakes with the server, remembers its session id
//! in a cookie file, prints every broadcast, and forwards stdin lines
//! until `exit`.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

const COOKIE_PATH: &str = "./abacus.cookie";

/// Shared-session calculator client.
#[derive(Parser, Debug)]
#[command(name = "abacus-client", disable_help_flag = true)]
struct Args {
    /// Server host.
    #[arg(long, short = 'h', default_value = "127.0.0.1")]
    host: String,

    /// Server port (1024 or above).
    #[arg(long, short = 'p', default_value_t = 9000)]
    port: u16,

    /// Print help.
    #[arg(long, action = clap::ArgAction::Help)]
    help: Option<bool>,
}

/// Ports below 1024 need elevated privileges; refuse them before any
/// socket is opened.
fn validate_port(port: u16) -> anyhow::Result<()> {
    if port < 1024 {
        bail!("invalid port {port} (must be 1024 or above)");
    }
    Ok(())
}

/// The remembered session id, or `-1` when there is no usable cookie.
fn load_cookie(path: &Path) -> i64 {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .filter(|id| *id >= 0)
        .unwrap_or(-1)
}

fn save_cookie(path: &Path, session_id: i64) -> std::io::Result<()> {
    std::fs::write(path, session_id.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    validate_port(args.port)?;

    let cookie_path = PathBuf::from(COOKIE_PATH);
    let remembered = load_cookie(&cookie_path);

    let stream = TcpStream::connect((args.host.as_str(), args.port))
        .await
        .with_context(|| format!("failed to connect to {}:{}", args.host, args.port))?;
    println!("Connected to {}:{}.", args.host, args.port);

    let (read_half, mut write_half) = stream.into_split();
    let mut server_reader = BufReader::new(read_half);

    // Handshake: offer the remembered id, accept the server's answer as
    // authoritative.
    write_half
        .write_all(format!("{remembered}\n").as_bytes())
        .await?;
    let mut response = String::new();
    server_reader.read_line(&mut response).await?;
    let session_id: i64 = response
        .trim()
        .parse()
        .context("malformed handshake response")?;
    println!("Running session #{session_id}.");

    if let Err(e) = save_cookie(&cookie_path, session_id) {
        eprintln!("warning: could not save cookie: {e}");
    }

    // Listener: print every server message until the connection closes.
    let listener = tokio::spawn(async move {
        let mut line = String::new();
        loop {
            line.clear();
            match server_reader.read_line(&mut line).await {
                Ok(0) | Err(_) => break,
                Ok(_) => print!("{line}"),
            }
        }
    });

    // Forward stdin lines; `exit` (any case) is sent along before closing.
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = stdin.next_line().await? {
        let command = line.trim();
        if command.is_empty() {
            continue;
        }
        write_half
            .write_all(format!("{command}\n").as_bytes())
            .await?;
        if command.eq_ignore_ascii_case("exit") {
            break;
        }
    }

    drop(write_half);
    let _ = listener.await;
    println!("Closed the connection to {}:{}.", args.host, args.port);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_cookie() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("abacus-client-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join("abacus.cookie")
    }

    #[test]
    fn privileged_ports_are_rejected() {
        assert!(validate_port(80).is_err());
        assert!(validate_port(1023).is_err());
    }

    #[test]
    fn unprivileged_ports_are_accepted() {
        assert!(validate_port(1024).is_ok());
        assert!(validate_port(9000).is_ok());
    }

    #[test]
    fn missing_cookie_means_new_session() {
        assert_eq!(load_cookie(Path::new("/nonexistent/abacus.cookie")), -1);
    }

    #[test]
    fn cookie_roundtrip() {
        let path = temp_cookie();
        save_cookie(&path, 7).unwrap();
        assert_eq!(load_cookie(&path), 7);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn corrupt_cookie_means_new_session() {
        let path = temp_cookie();
        std::fs::write(&path, "not a number").unwrap();
        assert_eq!(load_cookie(&path), -1);

        std::fs::write(&path, "-5").unwrap();
        assert_eq!(load_cookie(&path), -1);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
