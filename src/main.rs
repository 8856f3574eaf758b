use quizflow::cli::{Args, ConfigDiscovery, ExecutionMode, FlowAction, RunOptions, display};
use quizflow::{FlowConfig, FlowController, FlowError, Route};
use std::io::{self, Write};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging; RUST_LOG wins over the verbosity flag
    let default_filter = if args.verbose {
        "quizflow=debug"
    } else {
        "quizflow=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(io::stderr)
        .init();

    let mode = match args.mode() {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };

    match mode {
        ExecutionMode::Flow { action, options } => run_flow_action(action, options).await,
        ExecutionMode::Play(options) => run_play_mode(options).await,
        ExecutionMode::ShowConfig { config_override } => {
            ConfigDiscovery::show_discovery_info(config_override.as_deref());
            let config = ConfigDiscovery::load(config_override.as_deref())?;
            println!();
            println!("Effective configuration:");
            println!("{}", config.to_toml_string()?);
            Ok(())
        }
        ExecutionMode::InitConfig { path, force } => {
            ConfigDiscovery::write_default_config(&path, force)?;
            println!("✅ Wrote default configuration to {}", path.display());
            Ok(())
        }
    }
}

fn load_config(options: &RunOptions) -> anyhow::Result<FlowConfig> {
    let mut config = ConfigDiscovery::load(options.config_override.as_deref())?;
    if let Some(state_dir) = &options.state_dir_override {
        config.storage.state_dir = state_dir.clone();
    }
    Ok(config)
}

async fn open_flow(options: &RunOptions) -> Result<FlowController, Box<dyn std::error::Error>> {
    let config = load_config(options)?;
    info!(
        "Using session state in {}",
        config.storage.state_dir.display()
    );

    let mut flow = FlowController::with_simulated_admin(config)?;
    flow.enter().await?;
    Ok(flow)
}

async fn run_flow_action(
    action: FlowAction,
    options: RunOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut flow = open_flow(&options).await?;

    let outcome = apply_action(&mut flow, &action).await;
    display::print_view(&flow.view(), options.json)?;

    if let Err(e) = outcome {
        error!("{:?} failed: {}", action, e);
        std::process::exit(1);
    }
    Ok(())
}

/// One flow event; answering also waits for the administrator's decision
async fn apply_action(flow: &mut FlowController, action: &FlowAction) -> Result<(), FlowError> {
    match action {
        FlowAction::Status => Ok(()),
        FlowAction::Register { name, age } => flow.register(name, *age).await.map(drop),
        FlowAction::Answer { question, text } => {
            flow.answer(*question, text).await?;
            println!("📨 Answer sent, waiting for the administrator...");
            flow.wait_for_decision(display::print_warning).await.map(drop)
        }
        FlowAction::Wait => flow.wait_for_decision(display::print_warning).await.map(drop),
        FlowAction::Retry => flow.retry().await.map(drop),
        FlowAction::Rate(value) => flow.rate(*value).await.map(drop),
        FlowAction::Finish => {
            if *flow.route() != Route::Completion {
                println!("Nothing to acknowledge; the flow is at {}", flow.route());
                return Ok(());
            }
            flow.acknowledge_completion().await?;
            println!("👋 Thanks for taking part!");
            Ok(())
        }
        FlowAction::Restart => flow.restart().await.map(drop),
    }
}

async fn run_play_mode(options: RunOptions) -> Result<(), Box<dyn std::error::Error>> {
    info!("Running in interactive mode");
    let mut flow = open_flow(&options).await?;

    println!("🧩 Quiz started. Type 'restart' to start over or 'quit' to exit.");

    loop {
        display::print_view(&flow.view(), false)?;

        let outcome = match flow.route().clone() {
            Route::Registration => {
                let Some(name) = prompt("Name")? else { break };
                let Some(age) = prompt("Age")? else { break };
                match age.parse::<i64>() {
                    Ok(age) => flow.register(&name, age).await.map(drop),
                    Err(_) => {
                        println!("❌ age: Age must be a whole number");
                        continue;
                    }
                }
            }
            Route::Question { question_id } => {
                let Some(answer) = prompt(&format!("Answer {}", question_id))? else {
                    break;
                };
                if answer == "restart" {
                    flow.restart().await.map(drop)
                } else {
                    match flow.answer(question_id, &answer).await {
                        Ok(_) => {
                            println!("📨 Answer sent, waiting for the administrator...");
                            flow.wait_for_decision(display::print_warning).await.map(drop)
                        }
                        Err(e) => Err(e),
                    }
                }
            }
            Route::AwaitingValidation => {
                flow.wait_for_decision(display::print_warning).await.map(drop)
            }
            Route::ErrorOrBlocked {
                allow_retry: true, ..
            } => {
                let Some(input) = prompt("Press enter to try again")? else {
                    break;
                };
                if input == "restart" {
                    flow.restart().await.map(drop)
                } else {
                    flow.retry().await.map(drop)
                }
            }
            Route::ErrorOrBlocked { .. } => {
                let Some(_) = prompt("Press enter to start over")? else {
                    break;
                };
                flow.restart().await.map(drop)
            }
            Route::Rating => {
                let Some(value) = prompt("Rating (1-5)")? else { break };
                match value.parse::<i64>() {
                    Ok(value) => flow.rate(value).await.map(drop),
                    Err(_) => {
                        println!("❌ rating: Rating must be a number from 1 to 5");
                        continue;
                    }
                }
            }
            Route::Completion => {
                flow.acknowledge_completion().await?;
                println!("👋 Thanks for taking part!");
                match prompt("Play again? (y/n)")? {
                    Some(again) if again.eq_ignore_ascii_case("y") => flow.enter().await.map(drop),
                    _ => break,
                }
            }
        };

        if let Err(e) = outcome {
            error!("Flow event failed: {}", e);
        }
    }

    println!("Goodbye!");
    Ok(())
}

/// Read one trimmed line; `None` on EOF or when the participant quits
fn prompt(label: &str) -> io::Result<Option<String>> {
    print!("{}: ", label);
    io::stdout().flush()?;

    let mut input = String::new();
    if io::stdin().read_line(&mut input)? == 0 {
        return Ok(None);
    }

    let input = input.trim();
    if input == "quit" || input == "exit" {
        return Ok(None);
    }
    Ok(Some(input.to_string()))
}
