use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "status-cli")]
#[command(about = "Query a running backend-status daemon", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:8090")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the current backend availability
    Status,
    /// Print the availability every few seconds
    Watch {
        #[arg(short, long, default_value_t = 5)]
        interval_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()?;
    let url = format!("{}/status", cli.url.trim_end_matches('/'));

    match cli.command {
        Commands::Status => {
            let res = client.get(&url).send().await?;
            print_response(res).await?;
        }
        Commands::Watch { interval_secs } => {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
            loop {
                ticker.tick().await;
                match client.get(&url).send().await {
                    Ok(res) => print_response(res).await?,
                    Err(e) => eprintln!("Error: status endpoint unreachable: {}", e),
                }
            }
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: status endpoint returned {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
