use anyhow::Result;
use clap::Parser;
use colored::*;
use std::time::Duration;

mod api_client;
mod identity;
mod output;
mod scenarios;
mod sse_client;

use api_client::ApiClient;
use identity::TestUser;
use output::print_test_summary;
use sse_client::Connection;

#[derive(Parser)]
#[command(name = "sse-test-client")]
#[command(about = "SSE Integration Testing Tool")]
struct Cli {
    /// Base URL of the realtime hub (e.g., http://localhost:4000)
    #[arg(long)]
    base_url: String,

    /// User id for the first connection (sent as x-user-id)
    #[arg(long)]
    user1: String,

    /// User id for the second connection (sent as x-user-id)
    #[arg(long)]
    user2: String,

    /// Test scenario to run
    #[arg(long, value_enum)]
    scenario: ScenarioChoice,

    /// Seconds to wait for a heartbeat in the heartbeat scenario
    #[arg(long, default_value_t = 40)]
    heartbeat_timeout_secs: u64,

    /// Enable verbose output
    #[arg(long, short)]
    verbose: bool,
}

#[derive(clap::ValueEnum, Clone)]
enum ScenarioChoice {
    /// Test basic SSE connection and the connection_established handshake
    ConnectionTest,
    /// Test the connection status endpoints
    StatusTest,
    /// Test that an announcement reaches every connection
    AnnouncementTest,
    /// Wait for a heartbeat (slow unless the server uses a short interval)
    HeartbeatTest,
    /// Run all tests except the heartbeat wait
    All,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    }

    println!("{}", "=== SETUP PHASE ===".bright_white().bold());

    let user1 = TestUser::parse(&cli.user1, "User 1")?;
    let user2 = TestUser::parse(&cli.user2, "User 2")?;

    let client = reqwest::Client::new();
    let api_client = ApiClient::new(client, cli.base_url.clone());

    println!("{} Checking server health...", "→".blue());
    api_client.health().await?;
    println!("{} Server is healthy", "✓".green());

    // Establish SSE connections
    println!("\n{} Establishing SSE connections...", "→".blue());
    let mut sse1 = Connection::establish(&cli.base_url, &user1).await?;
    let mut sse2 = Connection::establish(&cli.base_url, &user2).await?;

    println!("{} User 1 SSE connection established ({})", "✓".green(), user1.user_id);
    println!("{} User 2 SSE connection established ({})", "✓".green(), user2.user_id);

    // Run test scenarios
    println!("\n{}", "=== TEST PHASE ===".bright_white().bold());

    let mut results = Vec::new();

    match cli.scenario {
        ScenarioChoice::ConnectionTest => {
            results.push(scenarios::test_connection(&user1, &user2, &mut sse1, &mut sse2).await?);
        }
        ScenarioChoice::StatusTest => {
            // Status is only meaningful once both streams are open
            results.push(scenarios::test_connection(&user1, &user2, &mut sse1, &mut sse2).await?);
            results.push(scenarios::test_status(&user1, &user2, &api_client).await?);
        }
        ScenarioChoice::AnnouncementTest => {
            results.push(scenarios::test_connection(&user1, &user2, &mut sse1, &mut sse2).await?);
            results.push(scenarios::test_announcement(&api_client, &mut sse1, &mut sse2).await?);
        }
        ScenarioChoice::HeartbeatTest => {
            results.push(
                scenarios::test_heartbeat(
                    &mut sse1,
                    Duration::from_secs(cli.heartbeat_timeout_secs),
                )
                .await?,
            );
        }
        ScenarioChoice::All => {
            results.push(scenarios::test_connection(&user1, &user2, &mut sse1, &mut sse2).await?);
            results.push(scenarios::test_status(&user1, &user2, &api_client).await?);
            results.push(scenarios::test_announcement(&api_client, &mut sse1, &mut sse2).await?);
        }
    }

    // Print summary
    println!("\n{}", "=== RESULTS ===".bright_white().bold());
    print_test_summary(&results);

    let all_passed = results.iter().all(|r| r.passed);

    if all_passed {
        println!("\n{}", "All tests passed! ✓".bright_green().bold());
    } else {
        println!("\n{}", "Some tests failed! ✗".bright_red().bold());
    }

    std::process::exit(if all_passed { 0 } else { 1 });
}
