//! Churn Tester CLI Tool
//!
//! Command-line tool for exercising the pairing core with simulated users.
//!
//! Usage:
//!   cargo run --bin churn-tester -- --help
//!   cargo run --bin churn-tester scenario --name couple
//!   cargo run --bin churn-tester scenario --name imbalance
//!   cargo run --bin churn-tester churn --users 50 --rounds 200
//!   cargo run --bin churn-tester churn --users 50 --rounds 200 --random

use anyhow::Result;
use clap::{Parser, Subcommand};
use rendezvous::config::AppConfig;
use rendezvous::lock::InMemoryLockManager;
use rendezvous::notify::MockNotifier;
use rendezvous::pair::InMemoryPairStore;
use rendezvous::pairing::{PairingManager, StartOutcome};
use rendezvous::profile::StaticProfileProvider;
use rendezvous::queue::InMemoryPendingQueue;
use rendezvous::types::{Gender, MatchPolicy, Preference, UserId, UserMatchProfile};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "churn-tester")]
#[command(about = "Drives the rendezvous pairing core with simulated users")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a predefined scenario
    Scenario {
        /// Scenario name (couple, triangle, imbalance)
        #[arg(short, long)]
        name: String,
    },
    /// Run randomized start/stop/next churn and report invariants
    Churn {
        /// Number of simulated users
        #[arg(short, long, default_value = "20")]
        users: usize,
        /// Number of operation rounds
        #[arg(short, long, default_value = "100")]
        rounds: usize,
        /// Use the random match policy
        #[arg(long)]
        random: bool,
    },
}

struct Simulator {
    manager: Arc<PairingManager>,
    profiles: Arc<StaticProfileProvider>,
    notifier: Arc<MockNotifier>,
}

impl Simulator {
    fn new(policy: MatchPolicy) -> Self {
        let mut config = AppConfig::default();
        config.matching.policy = policy;
        // Simulated users churn fast; no cooldown between repeat pairings
        config.matching.recent_partner_cooldown_hours = 0;

        let profiles = Arc::new(StaticProfileProvider::new());
        let notifier = Arc::new(MockNotifier::new());
        let manager = Arc::new(PairingManager::new(
            Arc::new(InMemoryLockManager::new()),
            Arc::new(InMemoryPendingQueue::new()),
            Arc::new(InMemoryPairStore::new()),
            profiles.clone(),
            notifier.clone(),
            config,
        ));

        Self {
            manager,
            profiles,
            notifier,
        }
    }

    fn add_user(&self, user_id: UserId, gender: Gender, preference: Preference) {
        self.profiles.upsert_profile(UserMatchProfile {
            user_id,
            gender,
            preference,
            age: Some(20 + (user_id % 30) as u32),
            location: None,
            search_radius_km: None,
            banned: false,
            soft_banned_until: None,
            premium: user_id % 7 == 0,
            activity_score: 0.5,
            rating: None,
            recent_pair_count: 0,
        });
    }

    async fn report(&self) -> Result<()> {
        let stats = self.manager.get_stats()?;
        let balance = self.manager.health().gender_balance().await?;

        println!("--- results ---");
        println!("searches:      {}", stats.searches);
        println!("matches made:  {}", stats.matches_made);
        println!("enqueued:      {}", stats.enqueued);
        println!("pairs ended:   {}", stats.pairs_ended);
        println!(
            "still waiting: {} ({}M/{}F, balanced: {})",
            balance.male + balance.female,
            balance.male,
            balance.female,
            balance.is_balanced
        );
        println!("events sent:   {}", self.notifier.events().len());
        Ok(())
    }
}

async fn run_scenario(name: &str) -> Result<()> {
    match name {
        "couple" => {
            let sim = Simulator::new(MatchPolicy::Strict);
            sim.add_user(1, Gender::Male, Preference::Female);
            sim.add_user(2, Gender::Female, Preference::Male);

            println!("user 1 searches: {}", sim.manager.start_search(1).await?.label());
            println!("user 2 searches: {}", sim.manager.start_search(2).await?.label());
            sim.report().await
        }
        "triangle" => {
            // Three users, only one mutually compatible pairing
            let sim = Simulator::new(MatchPolicy::Strict);
            sim.add_user(1, Gender::Male, Preference::Male);
            sim.add_user(2, Gender::Male, Preference::Female);
            sim.add_user(3, Gender::Female, Preference::Male);

            for user in [1, 2, 3] {
                let outcome = sim.manager.start_search(user).await?;
                println!("user {} searches: {}", user, outcome.label());
            }
            sim.report().await
        }
        "imbalance" => {
            // One male, six females wanting males: health signals kick in
            let sim = Simulator::new(MatchPolicy::Strict);
            sim.add_user(1, Gender::Male, Preference::Female);
            for id in 2..=7 {
                sim.add_user(id, Gender::Female, Preference::Male);
            }

            for id in 2..=7 {
                let outcome = sim.manager.start_search(id).await?;
                println!("user {} searches: {}", id, outcome.label());
            }
            let outcome = sim.manager.start_search(1).await?;
            println!("user 1 searches: {}", outcome.label());

            if let Some(gender) = sim.manager.health().underrepresented_gender().await? {
                println!("underrepresented gender: {}", gender);
            }
            sim.report().await
        }
        other => Err(anyhow::anyhow!(
            "Unknown scenario '{}'. Use couple, triangle, or imbalance",
            other
        )),
    }
}

async fn run_churn(users: usize, rounds: usize, random: bool) -> Result<()> {
    let policy = if random {
        MatchPolicy::Random
    } else {
        MatchPolicy::Strict
    };
    let sim = Simulator::new(policy);

    for id in 0..users as UserId {
        let gender = if id % 2 == 0 {
            Gender::Male
        } else {
            Gender::Female
        };
        let preference = match id % 3 {
            0 => Preference::Female,
            1 => Preference::Male,
            _ => Preference::Any,
        };
        sim.add_user(id + 1, gender, preference);
    }

    let mut matched = 0usize;
    for round in 0..rounds {
        let user = (round % users) as UserId + 1;
        // Deterministic mix of operations, no RNG needed for a smoke load
        let outcome = match round % 5 {
            0 | 1 | 2 => match sim.manager.start_search(user).await {
                Ok(outcome) => {
                    if matches!(outcome, StartOutcome::Matched(_)) {
                        matched += 1;
                    }
                    outcome.label().to_string()
                }
                Err(e) => format!("error: {}", e),
            },
            3 => match sim.manager.stop_search(user).await {
                Ok(_) => "stopped".to_string(),
                Err(e) => format!("error: {}", e),
            },
            _ => match sim.manager.next_search(user).await {
                Ok(outcome) => outcome.label().to_string(),
                Err(e) => format!("error: {}", e),
            },
        };

        if rounds <= 50 {
            println!("round {:3}: user {:3} -> {}", round, user, outcome);
        }
    }

    println!("matched during churn: {}", matched);
    sim.report().await
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scenario { name } => run_scenario(&name).await,
        Commands::Churn {
            users,
            rounds,
            random,
        } => run_churn(users, rounds, random).await,
    }
}
