//! CLI module
//!
//! Command-line interface for the rebloom tool. `serve` runs the API server
//! in-process; every other subcommand talks to a running server over HTTP.

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use colored::Colorize;
use std::io;
use std::sync::Arc;

use crate::{
    api::{serve, Client, ClientConfig, ClientError, ServerConfig},
    garden::GardenStage,
    models::{Category, Core, Difficulty, Session, SessionResponse, Task, UserStats},
    providers::GeminiProvider,
    service::Service,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// API server URL
    #[arg(short, long, default_value = "http://localhost:3000")]
    server: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the rebloom API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = 3000)]
        port: u16,

        /// Gemini API key (falls back to GEMINI_API_KEY / GOOGLE_API_KEY)
        #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Populate with example tasks for UI testing
        #[arg(long)]
        example: bool,
    },

    /// Task management commands
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },

    /// Generate task suggestions from the content provider
    Generate {
        /// Category to generate tasks for
        #[arg(value_enum)]
        category: Category,

        /// How the user is feeling right now
        #[arg(short, long, default_value = "neutral")]
        mood: String,
    },

    /// Send one message to the coach
    Chat {
        /// The message to send
        message: String,
    },

    /// Show level, XP, streak and garden stage
    Stats,

    /// Set the daily streak counter
    Streak {
        /// Number of consecutive days
        days: u32,
    },

    /// Generate shell completions
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum TaskCommands {
    /// List all tasks on the board
    List,

    /// Add a new task
    Add {
        /// Task description
        text: String,

        /// Task category
        #[arg(short, long, value_enum, default_value_t = Category::Life)]
        category: Category,

        /// Task difficulty
        #[arg(short, long, value_enum, default_value_t = Difficulty::Easy)]
        difficulty: Difficulty,
    },

    /// Toggle a task's completion state
    Toggle {
        /// Task id (prefix is enough if unambiguous)
        id: String,
    },
}

/// Run the CLI application
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Serve {
            port,
            api_key,
            example,
        } => {
            println!("Starting rebloom API server on port {}...", port);

            let mut session = Session::new();
            if *example {
                println!("Populating with example tasks for UI testing...");
                seed_example_tasks(&mut session);
            }

            let provider = Arc::new(GeminiProvider::new(api_key.as_deref()));
            if !provider.has_key() {
                println!(
                    "{}",
                    "No Gemini API key found; generation and chat will use canned fallbacks."
                        .yellow()
                );
            }

            let service = Service::new(Core::new(session), provider.clone(), provider);

            let config = ServerConfig {
                address: ([127, 0, 0, 1], *port).into(),
            };

            serve(service, config).await?;
            Ok(())
        }

        Commands::Task { command } => {
            let client = create_client(&cli.server);
            match command {
                TaskCommands::List => {
                    let response = client.list_tasks().await?;
                    print_task_board(&response.res);
                    print_stats_line(&response.stats, response.garden_stage);
                    Ok(())
                }

                TaskCommands::Add {
                    text,
                    category,
                    difficulty,
                } => {
                    let response = client
                        .add_task(text.clone(), *category, *difficulty)
                        .await?;
                    println!(
                        "Added task: \"{}\" ({} / {})",
                        text, category, difficulty
                    );
                    print_stats_line(&response.stats, response.garden_stage);
                    Ok(())
                }

                TaskCommands::Toggle { id } => {
                    // Resolve a prefix against the board so users can paste
                    // the short form shown by `task list`
                    let board = client.list_tasks().await?;
                    let full_id = resolve_task_id(&board.res, id)?;

                    let response = client.toggle_task(full_id).await?;
                    match response.res {
                        Some(true) => println!("{}", "Task completed!".green()),
                        Some(false) => println!("Task marked incomplete."),
                        None => println!("No task with that id."),
                    }
                    print_stats_line(&response.stats, response.garden_stage);
                    Ok(())
                }
            }
        }

        Commands::Generate { category, mood } => {
            let client = create_client(&cli.server);
            match client.generate(*category, mood.clone()).await {
                Ok(response) => {
                    println!("New micro-habits for {}:", category);
                    print_task_board(&response.res);
                    Ok(())
                }
                Err(ClientError::Busy) => {
                    println!("A generation is already running; try again in a moment.");
                    Ok(())
                }
                Err(e) => Err(e.into()),
            }
        }

        Commands::Chat { message } => {
            let client = create_client(&cli.server);
            match client.chat(message.clone()).await {
                Ok(response) => {
                    println!("{} {}", "coach:".green().bold(), response.res.text());
                    Ok(())
                }
                Err(ClientError::Busy) => {
                    println!("The coach is still replying to your last message.");
                    Ok(())
                }
                Err(e) => Err(e.into()),
            }
        }

        Commands::Stats => {
            let client = create_client(&cli.server);
            let response = client.stats().await?;
            print_stats(&response);
            Ok(())
        }

        Commands::Streak { days } => {
            let client = create_client(&cli.server);
            let response = client.set_streak(*days).await?;
            println!("Streak set to {} day(s).", days);
            print_stats_line(&response.stats, response.garden_stage);
            Ok(())
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let bin_name = cmd.get_name().to_string();
            generate(*shell, &mut cmd, bin_name, &mut io::stdout());
            Ok(())
        }
    }
}

fn create_client(server_url: &str) -> Client {
    let config = ClientConfig {
        base_url: server_url.to_string(),
    };

    Client::with_config(config)
}

/// Match a full or prefix id against the board
fn resolve_task_id(tasks: &[Task], id: &str) -> Result<String, Box<dyn std::error::Error>> {
    let matches: Vec<&Task> = tasks.iter().filter(|t| t.id().starts_with(id)).collect();
    match matches.as_slice() {
        [task] => Ok(task.id().to_string()),
        [] => Ok(id.to_string()), // let the server report the silent no-op
        _ => Err(format!("Task id prefix '{}' is ambiguous", id).into()),
    }
}

fn print_task_board(tasks: &[Task]) {
    if tasks.is_empty() {
        println!("No tasks yet. Generate some with 'rebloom generate <category>'");
        return;
    }

    for task in tasks {
        let marker = if task.is_completed() {
            "✓".green().to_string()
        } else {
            "○".to_string()
        };
        let short_id = &task.id()[..8.min(task.id().len())];
        println!(
            "  {} [{}] {} ({} / {}, +{} XP)",
            marker,
            short_id,
            task.text(),
            task.category(),
            task.difficulty(),
            task.difficulty().xp_value(),
        );
    }
}

fn print_stats_line(stats: &UserStats, stage: GardenStage) {
    println!(
        "Level {} · {}/{} XP · {} day streak · {}",
        stats.level(),
        stats.xp(),
        stats.next_level_xp(),
        stats.streak(),
        stage_colored(stage),
    );
}

fn print_stats(response: &SessionResponse<()>) {
    let stats = &response.stats;
    println!("Your garden: {}", stage_colored(response.garden_stage));
    println!("  {}", response.garden_stage.blurb());
    println!("  Level:           {}", stats.level());
    println!(
        "  XP:              {} / {}",
        stats.xp(),
        stats.next_level_xp()
    );
    println!("  Streak:          {} day(s)", stats.streak());
    println!("  Tasks completed: {}", stats.tasks_completed());
}

fn stage_colored(stage: GardenStage) -> String {
    match stage {
        GardenStage::Sprout => stage.label().yellow().to_string(),
        GardenStage::Flower => stage.label().magenta().to_string(),
        GardenStage::Tree => stage.label().green().to_string(),
    }
}

/// Seeds a handful of tasks so the UI has something to show
fn seed_example_tasks(session: &mut Session) {
    session.add_tasks(vec![
        Task::new(
            "Open a window and take three deep breaths".to_string(),
            Category::Health,
            Difficulty::Easy,
        ),
        Task::new(
            "Read one page of any book".to_string(),
            Category::Study,
            Difficulty::Easy,
        ),
        Task::new(
            "Send a short message to someone you trust".to_string(),
            Category::Social,
            Difficulty::Medium,
        ),
    ]);
}
