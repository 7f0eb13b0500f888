use facet::Facet;
use figue as args;
use leakwatch::{Engine, EngineBuilder};
use std::time::Duration;

mod scenarios;

type AnyResult<T> = Result<T, String>;

#[derive(Facet, Debug)]
struct Cli {
    #[facet(flatten)]
    builtins: args::FigueBuiltins,
    #[facet(args::named, default)]
    no_backtrace: bool,
    #[facet(args::named, default)]
    settle_ms: Option<u64>,
    #[facet(args::subcommand)]
    command: CommandKind,
}

#[derive(Facet, Debug)]
#[repr(u8)]
enum CommandKind {
    ForgottenRelease,
    ReleasedSubscription,
    TaskLeak {
        #[facet(args::named, default)]
        tasks: Option<u32>,
    },
}

pub(crate) struct Config {
    pub(crate) capture_backtraces: bool,
    /// How long scenarios wait for the reaper before printing results.
    pub(crate) settle: Duration,
}

impl Config {
    pub(crate) fn engine_builder(&self) -> EngineBuilder {
        Engine::builder().capture_backtraces(self.capture_backtraces)
    }
}

const DEFAULT_SETTLE_MS: u64 = 500;
const DEFAULT_TASKS: u32 = 8;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

async fn run() -> AnyResult<()> {
    let cli = parse_cli()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cfg = config_from_cli(&cli);
    dispatch_command(&cfg, cli.command).await
}

fn parse_cli() -> AnyResult<Cli> {
    let figue_config = args::builder::<Cli>()
        .map_err(|e| format!("failed to build CLI schema: {e}"))?
        .cli(|cli| cli.strict())
        .help(|h| {
            h.program_name("leakwatch-examples")
                .description("Run leakwatch scenarios as subcommands")
                .version(option_env!("CARGO_PKG_VERSION").unwrap_or("dev"))
        })
        .build();

    args::Driver::new(figue_config)
        .run()
        .into_result()
        .map(|v| v.value)
        .map_err(|e| e.to_string())
}

fn config_from_cli(cli: &Cli) -> Config {
    let settle_ms = cli
        .settle_ms
        .or_else(|| {
            std::env::var("LEAKWATCH_SETTLE_MS")
                .ok()
                .and_then(|v| v.parse().ok())
        })
        .unwrap_or(DEFAULT_SETTLE_MS);

    Config {
        capture_backtraces: !cli.no_backtrace,
        settle: Duration::from_millis(settle_ms),
    }
}

async fn dispatch_command(cfg: &Config, command: CommandKind) -> AnyResult<()> {
    match command {
        CommandKind::ForgottenRelease => scenarios::forgotten_release::run(cfg).await,
        CommandKind::ReleasedSubscription => scenarios::released_subscription::run(cfg).await,
        CommandKind::TaskLeak { tasks } => {
            scenarios::task_leak::run(cfg, tasks.unwrap_or(DEFAULT_TASKS)).await
        }
    }
}
