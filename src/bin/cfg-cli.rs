use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "cfg-cli")]
#[command(about = "Management CLI for the sip-cfg configuration daemon", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show generation and callback log statistics
    Status,
    /// List groups and their variables
    Groups,
    /// Read the current value of a variable
    Get { group: String, name: String },
    /// Change one variable immediately
    Set { group: String, name: String, value: String },
    /// Open a session for a multi-variable transaction
    Begin,
    /// Stage a change in an open session
    Stage {
        session: String,
        group: String,
        name: String,
        value: String,
    },
    /// Show the staged changes of a session against current values
    Diff { session: String },
    /// Commit a session's staged changes
    Commit { session: String },
    /// Discard a session's staged changes
    Rollback { session: String },
    /// Close a session
    End { session: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let base = cli.url.trim_end_matches('/');
    let request = match cli.command {
        Commands::Status => client.get(format!("{}/admin/status", base)),
        Commands::Groups => client.get(format!("{}/admin/groups", base)),
        Commands::Get { group, name } => {
            client.get(format!("{}/admin/groups/{}/{}", base, group, name))
        }
        Commands::Set { group, name, value } => client
            .put(format!("{}/admin/groups/{}/{}", base, group, name))
            .json(&json!({ "input": value })),
        Commands::Begin => client.post(format!("{}/admin/sessions", base)),
        Commands::Stage {
            session,
            group,
            name,
            value,
        } => client
            .put(format!("{}/admin/sessions/{}/changes/{}/{}", base, session, group, name))
            .json(&json!({ "input": value })),
        Commands::Diff { session } => {
            client.get(format!("{}/admin/sessions/{}/diff", base, session))
        }
        Commands::Commit { session } => {
            client.post(format!("{}/admin/sessions/{}/commit", base, session))
        }
        Commands::Rollback { session } => {
            client.post(format!("{}/admin/sessions/{}/rollback", base, session))
        }
        Commands::End { session } => client.delete(format!("{}/admin/sessions/{}", base, session)),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
