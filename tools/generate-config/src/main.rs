//! Environment file generator for the relay
//!
//! Writes a `.env` with the server, client and logging settings, optionally
//! with a freshly generated access token.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64, Engine as _};
use clap::{Parser, ValueEnum};
use rand::RngCore;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Output file path
    #[arg(short, long, default_value = ".env")]
    output: PathBuf,

    /// Force overwrite if file exists
    #[arg(short, long)]
    force: bool,

    /// Access mode of the relay routes
    #[arg(short, long, value_enum, default_value = "token")]
    auth: AuthMode,

    /// ADK server the relay forwards to
    #[arg(long, default_value = "http://localhost:8000")]
    adk_base_url: String,

    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 3000)]
    port: u16,

    /// Expose the scrubbed log stream at /logs
    #[arg(long)]
    logs: bool,

    /// Print the generated token (only for testing)
    #[arg(long)]
    show_token: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum AuthMode {
    /// Require a generated bearer token
    Token,
    /// Accept every request
    Guest,
}

fn generate_token(length: usize) -> String {
    let mut bytes = vec![0u8; length];
    rand::thread_rng().fill_bytes(&mut bytes);
    BASE64.encode(&bytes)
}

fn generate_env_content(cli: &Cli, token: Option<&str>) -> String {
    let (server_tokens, client_token) = match token {
        Some(token) => (
            format!("RELAY_AUTH_TOKENS={}", token),
            format!("RELAY_TOKEN={}", token),
        ),
        None => (
            "# Guest mode: no tokens, every request is accepted\n# RELAY_AUTH_TOKENS=".to_string(),
            "# RELAY_TOKEN=".to_string(),
        ),
    };

    format!(
        "# ========================================\n\
         # Relay - Environment Configuration\n\
         # ========================================\n\
         # Generated: {}\n\
         # Auth: {:?}\n\
         #\n\
         # Contains the relay access token; keep it out of version control.\n\
         \n\
         # ADK agent server\n\
         ADK_BASE_URL={}\n\
         \n\
         # Relay server\n\
         RELAY_HOST={}\n\
         RELAY_PORT={}\n\
         {}\n\
         RELAY_LOGS_ENABLED={}\n\
         \n\
         # Terminal chat client\n\
         RELAY_PROXY_URL=http://{}:{}\n\
         {}\n\
         \n\
         # Logging\n\
         RELAY_LOG_LEVEL=info\n",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        cli.auth,
        cli.adk_base_url,
        cli.host,
        cli.port,
        server_tokens,
        cli.logs,
        client_host(&cli.host),
        cli.port,
        client_token,
    )
}

/// Address the client should dial for a bind address
fn client_host(host: &str) -> &str {
    match host {
        "0.0.0.0" | "::" | "[::]" => "127.0.0.1",
        other => other,
    }
}

fn main() {
    let cli = Cli::parse();

    if cli.output.exists() && !cli.force {
        eprintln!("Error: File {:?} already exists!", cli.output);
        eprintln!("   Use --force to overwrite");
        std::process::exit(1);
    }

    println!("Relay Configuration Generator");
    println!();

    let token = match cli.auth {
        AuthMode::Token => {
            let token = generate_token(32);
            if cli.show_token {
                println!("WARNING: Showing token (DO NOT use in production)");
                println!("   RELAY_TOKEN: {}", token);
            } else {
                println!("Generated access token (32 bytes, base64url)");
            }
            Some(token)
        }
        AuthMode::Guest => {
            println!("Guest mode: the relay will accept unauthenticated requests");
            None
        }
    };

    let content = generate_env_content(&cli, token.as_deref());
    if let Err(e) = fs::write(&cli.output, content) {
        eprintln!("Failed to write file: {}", e);
        std::process::exit(1);
    }
    println!("Configuration written to: {:?}", cli.output);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = fs::Permissions::from_mode(0o600);
        if let Err(e) = fs::set_permissions(&cli.output, perms) {
            eprintln!("Warning: Could not set file permissions: {}", e);
        } else {
            println!("Set file permissions to 600 (owner only)");
        }
    }

    println!();
    println!("Next steps:");
    println!("   1. Start the ADK server at {}", cli.adk_base_url);
    println!("   2. run-relay-ui serve");
    println!("   3. run-relay-ui chat");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("generate-config").chain(args.iter().copied()))
    }

    #[test]
    fn test_token_mode_writes_both_sides() {
        let content = generate_env_content(&cli(&[]), Some("abc"));
        assert!(content.contains("RELAY_AUTH_TOKENS=abc\n"));
        assert!(content.contains("RELAY_TOKEN=abc\n"));
        assert!(content.contains("ADK_BASE_URL=http://localhost:8000\n"));
        assert!(content.contains("RELAY_PROXY_URL=http://127.0.0.1:3000\n"));
    }

    #[test]
    fn test_guest_mode_leaves_tokens_commented() {
        let content = generate_env_content(&cli(&["--auth", "guest", "--host", "0.0.0.0", "--port", "4000"]), None);
        assert!(!content.contains("\nRELAY_AUTH_TOKENS="));
        assert!(content.contains("RELAY_HOST=0.0.0.0\n"));
        assert!(content.contains("RELAY_PROXY_URL=http://127.0.0.1:4000\n"));
    }

    #[test]
    fn test_generated_tokens_differ() {
        let a = generate_token(32);
        assert_ne!(a, generate_token(32));
        assert_eq!(a.len(), 43);
    }
}
