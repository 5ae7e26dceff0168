use std::{
    io::{self, Read},
    path::PathBuf,
    process::ExitCode,
};

use clap::Parser;
use emudb::{Config, Engine, error::Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "emudb")]
#[command(about = "emudb - a small SQL database emulator", long_about = None)]
struct Args {
    /// JSON snapshot file; state is kept in memory when omitted
    #[arg(long, env = "EMUDB_DATA_FILE")]
    data_file: Option<PathBuf>,

    /// Database the session starts on
    #[arg(long, env = "EMUDB_DATABASE", default_value = emudb::config::DEFAULT_DATABASE)]
    database: String,

    /// Seed the sample company schema when no snapshot exists
    #[arg(long, env = "EMUDB_SEED_DEMO")]
    seed_demo: bool,

    /// SQL to execute
    #[arg(short = 'e', long = "execute", conflicts_with = "file")]
    sql: Option<String>,

    /// File of SQL statements to execute (stdin when neither is given)
    file: Option<PathBuf>,

    /// Print the database names and exit
    #[arg(long)]
    list: bool,
}

fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Logs go to stderr, results to stdout
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "emudb=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let config = Config {
        data_file: args.data_file,
        default_database: args.database,
        seed_demo: args.seed_demo,
        ..Config::default()
    };
    let mut engine = Engine::from_config(config)?;

    if args.list {
        println!("{}", serde_json::to_string_pretty(&engine.list_databases())?);
        return Ok(ExitCode::SUCCESS);
    }

    let sql = match (args.sql, args.file) {
        (Some(sql), _) => sql,
        (None, Some(path)) => std::fs::read_to_string(path)?,
        (None, None) => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let result = engine.session().execute(&sql);
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
