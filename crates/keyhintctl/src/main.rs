use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use keyhint_core::config;
use keyhint_core::ipc::{self, ClientMsg, DaemonMsg};
use keyhint_core::mapping::{KeyStroke, MappingEntry};
use keyhint_core::surface::Anchor;
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use tracing::debug;

#[derive(Parser)]
#[command(name = "keyhintctl", about = "Control the keyhintd daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show daemon status
    Status,
    /// Cancel the pending hint and hide the visible one
    Dismiss,
    /// Request a hint for a typed key sequence
    Request {
        /// Keys typed so far (e.g. "<leader>" "g")
        keys: Vec<String>,
        /// Next-key mapping, as KEY=DESCRIPTION
        #[arg(long = "map", value_parser = parse_mapping)]
        maps: Vec<(String, String)>,
        /// Next-key group leading to more mappings, as KEY=DESCRIPTION
        #[arg(long = "prefix", value_parser = parse_mapping)]
        prefixes: Vec<(String, String)>,
        /// How long ago the key sequence started
        #[arg(long, default_value_t = 0)]
        elapsed_ms: u64,
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        x: i32,
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        y: i32,
    },
    /// Set an option (e.g. timeoutlen 500)
    Set { name: String, value: String },
    /// Act as a popup surface and print hints as they are shown and hidden
    Watch,
}

fn parse_mapping(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, description)) if !key.is_empty() => {
            Ok((key.to_string(), description.to_string()))
        }
        _ => Err(format!("expected KEY=DESCRIPTION, got '{}'", raw)),
    }
}

fn build_message(command: Command) -> ClientMsg {
    match command {
        Command::Status => ClientMsg::GetStatus,
        Command::Dismiss => ClientMsg::Dismiss,
        Command::Request {
            keys,
            maps,
            prefixes,
            elapsed_ms,
            x,
            y,
        } => {
            let mappings = maps
                .into_iter()
                .map(|(k, d)| MappingEntry::new(k, d))
                .chain(prefixes.into_iter().map(|(k, d)| MappingEntry::prefix(k, d)))
                .collect();
            ClientMsg::RequestPopup {
                anchor: Anchor::new(x, y),
                typed: keys.into_iter().map(KeyStroke::new).collect(),
                mappings,
                elapsed_ms,
            }
        }
        Command::Set { name, value } => ClientMsg::SetOption { name, value },
        Command::Watch => ClientMsg::RegisterSurface,
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("keyhintctl=warn".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let watch = matches!(cli.command, Command::Watch);

    let socket_path = config::socket_path();
    let stream = UnixStream::connect(&socket_path).with_context(|| {
        format!(
            "connecting to keyhintd at {}\nIs the daemon running?",
            socket_path.display()
        )
    })?;
    debug!(path = %socket_path.display(), "connected");

    let mut writer = stream.try_clone().context("cloning stream")?;
    let reader = BufReader::new(stream);

    let line = ipc::encode(&build_message(cli.command));
    writer
        .write_all(line.as_bytes())
        .context("sending command")?;

    if watch {
        return watch_hints(reader);
    }

    // Read response
    for line in reader.lines() {
        let line = line.context("reading response")?;
        if let Some(resp) = ipc::decode_daemon(&line) {
            match resp {
                DaemonMsg::Status {
                    state,
                    sort_order,
                    delay_ms,
                    version,
                } => {
                    println!("keyhintd v{}", version);
                    println!("  state: {}", state);
                    println!("  sort:  {}", sort_order);
                    println!("  delay: {}ms", delay_ms);
                }
                DaemonMsg::Ack { ok, message } => {
                    if ok {
                        println!("{}", message);
                    } else {
                        eprintln!("error: {}", message);
                        std::process::exit(1);
                    }
                }
                _ => {}
            }
            break;
        }
    }

    Ok(())
}

/// Print every hint the daemon shows or hides until it disconnects.
fn watch_hints(reader: BufReader<UnixStream>) -> Result<()> {
    for line in reader.lines() {
        let line = line.context("reading from daemon")?;
        let Some(msg) = ipc::decode_daemon(&line) else {
            continue;
        };
        match msg {
            DaemonMsg::ShowHint {
                id,
                content,
                anchor,
                position,
                fade_ms,
                ..
            } => {
                println!(
                    "show #{} at ({}, {}) {} fade={}ms",
                    id, anchor.x, anchor.y, position, fade_ms
                );
                println!("{}", content);
            }
            DaemonMsg::HideHint { id } => println!("hide #{}", id),
            DaemonMsg::Ack { ok: false, message } => eprintln!("error: {}", message),
            other => debug!(?other, "ignoring daemon message"),
        }
    }
    debug!("daemon closed the connection");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_mapping_splits_on_first_equals() {
        assert_eq!(
            parse_mapping("g=go=to").unwrap(),
            ("g".to_string(), "go=to".to_string())
        );
        assert_eq!(parse_mapping("w=").unwrap(), ("w".to_string(), String::new()));
    }

    #[test]
    fn parse_mapping_rejects_missing_key() {
        assert!(parse_mapping("=write").is_err());
        assert!(parse_mapping("write").is_err());
    }

    #[test]
    fn request_command_builds_prefix_and_plain_entries() {
        let cli = Cli::try_parse_from([
            "keyhintctl",
            "request",
            "<leader>",
            "--map",
            "w=write",
            "--prefix",
            "b=buffers",
            "--elapsed-ms",
            "120",
            "--x",
            "-5",
        ])
        .unwrap();

        match build_message(cli.command) {
            ClientMsg::RequestPopup {
                anchor,
                typed,
                mappings,
                elapsed_ms,
            } => {
                assert_eq!(anchor, Anchor::new(-5, 0));
                assert_eq!(typed, vec![KeyStroke::new("<leader>")]);
                assert_eq!(
                    mappings,
                    vec![
                        MappingEntry::new("w", "write"),
                        MappingEntry::prefix("b", "buffers"),
                    ]
                );
                assert_eq!(elapsed_ms, 120);
            }
            other => panic!("expected RequestPopup, got {:?}", other),
        }
    }

    #[test]
    fn watch_registers_as_surface() {
        let cli = Cli::try_parse_from(["keyhintctl", "watch"]).unwrap();
        assert!(matches!(build_message(cli.command), ClientMsg::RegisterSurface));
    }
}
