use clap::{Parser, Subcommand};
use lib::api::{PlanApiClient, PlanBackend};
use lib::controller::{run_startup, StartupState};
use lib::conversation::{Message, Role};
use lib::session::{ChatSession, SubmitOutcome};

#[derive(Parser)]
#[command(name = "planchat")]
#[command(about = "Development-plan consultation assistant", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and default config file
    Init {
        /// Config file path (default: PLANCHAT_CONFIG_PATH or ~/.planchat/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Query backend readiness (embeddings model, retrieval chain, vector store)
    Status {
        /// Config file path (default: PLANCHAT_CONFIG_PATH or ~/.planchat/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Print the raw status JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Ask a single question and print the answer
    Ask {
        /// Config file path (default: PLANCHAT_CONFIG_PATH or ~/.planchat/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// The question to send
        #[arg(value_name = "QUESTION")]
        question: String,
    },

    /// Chat interactively with the consultation assistant
    Chat {
        /// Config file path (default: PLANCHAT_CONFIG_PATH or ~/.planchat/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("planchat {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Status { config, json }) => {
            if let Err(e) = run_status(config, json).await {
                log::error!("status failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Ask { config, question }) => {
            if let Err(e) = run_ask(config, question).await {
                log::error!("ask failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Chat { config }) => {
            if let Err(e) = run_chat(config).await {
                log::error!("chat failed: {}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(lib::config::default_config_path);
    let dir = lib::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

/// Build the API client and chat defaults from config + environment.
fn client_from_config(
    config_path: Option<std::path::PathBuf>,
) -> anyhow::Result<(PlanApiClient, u32)> {
    let (config, _path) = lib::config::load_config(config_path)?;
    let base_url = lib::config::resolve_base_url(&config);
    Ok((PlanApiClient::new(Some(base_url)), config.chat.top_k))
}

async fn run_status(config_path: Option<std::path::PathBuf>, json: bool) -> anyhow::Result<()> {
    let (client, _) = client_from_config(config_path)?;
    let status = client.fetch_status().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }
    println!("embeddings model: {}", loaded_label(status.embeddings_model_loaded));
    println!("retrieval chain:  {}", loaded_label(status.chain_loaded));
    println!("vector store:     {}", loaded_label(status.data_loaded));
    if let Some(n) = status.data_size {
        println!("documents:        {}", n);
    }
    Ok(())
}

fn loaded_label(loaded: bool) -> &'static str {
    if loaded {
        "loaded"
    } else {
        "not loaded"
    }
}

/// Print the startup outcome. Unavailable is shown to the user instead of
/// being silently logged; chatting stays possible either way.
fn report_startup(state: StartupState) {
    match state {
        StartupState::Ready => log::info!("backend ready"),
        StartupState::Unavailable => {
            eprintln!(
                "aviso: el sistema de consulta no está disponible en este momento; las consultas pueden fallar"
            );
        }
        other => log::debug!("startup ended in {:?}", other),
    }
}

fn print_reply(message: &Message) {
    let time = message
        .created_at
        .with_timezone(&chrono::Local)
        .format("%H:%M");
    let marker = if message.is_error { "!" } else { "<" };
    println!("[{}] {} {}", time, marker, message.content.trim());
    if let Some(n) = message.reference_count {
        println!("        {} referencias", n);
    }
}

async fn run_ask(
    config_path: Option<std::path::PathBuf>,
    question: String,
) -> anyhow::Result<()> {
    let (client, top_k) = client_from_config(config_path)?;
    report_startup(run_startup(&client).await);

    let mut session = ChatSession::new(client, top_k);
    if session.submit(&question).await == SubmitOutcome::IgnoredEmpty {
        anyhow::bail!("question is empty");
    }
    if let Some(reply) = session.conversation().last() {
        print_reply(reply);
    }
    Ok(())
}

async fn run_chat(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    use std::io::{self, Write};

    let (client, top_k) = client_from_config(config_path)?;
    let startup = run_startup(&client).await;
    let mut session = ChatSession::new(client, top_k);

    // Seeded welcome message.
    for message in session.conversation().messages() {
        print_reply(message);
    }
    report_startup(startup);

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("/exit") || input.eq_ignore_ascii_case("/quit") {
            break;
        }

        let before = session.conversation().len();
        session.submit(input).await;
        for message in &session.conversation().messages()[before..] {
            if message.role == Role::Bot {
                print_reply(message);
            }
        }
    }

    Ok(())
}
