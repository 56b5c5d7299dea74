//! db-courier - read-only SQL runner with scheduled CSV exports.

use db_courier::app::Courier;
use db_courier::cli::{Cli, Command, TargetCommand};
use db_courier::config::Config;
use db_courier::error::Result;
use db_courier::logging;
use db_courier::output;
use db_courier::safety::Verdict;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();

    let log_to_file = matches!(cli.command, Command::Run { log_file: true });
    if log_to_file {
        logging::init_file_logging();
    } else {
        logging::init_stderr_logging();
    }

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("{}: {}", e.category(), e);
            if log_to_file {
                eprintln!("{}: {}", e.category(), e);
            }
            std::process::exit(1);
        }
    }
}

/// Runs one command and returns the process exit code.
async fn run(cli: Cli) -> Result<i32> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let config = Config::load_from_file(&config_path)?;

    let courier = Courier::open(config).await?;
    let result = dispatch(&courier, cli.command).await;
    courier.close().await;
    result
}

async fn dispatch(courier: &Courier, command: Command) -> Result<i32> {
    match command {
        Command::Validate { sql } => Ok(report_verdict(courier.validate(&sql))),

        Command::Query {
            target,
            sql,
            export,
        } => {
            let result = courier.execute(&target, &sql).await?;
            println!("{}", output::render_result(&result));
            if let Some(filename) = export {
                let path = courier.export(&result, &filename)?;
                println!("Saved {}", path.display());
            }
            Ok(0)
        }

        Command::Schedule(args) => {
            let job = courier.schedule(args.to_request()).await?;
            println!("Query scheduled successfully");
            println!(
                "Next run: {} (output prefix '{}')",
                job.next_run.format("%Y-%m-%d %H:%M:%S"),
                job.output_prefix
            );
            Ok(0)
        }

        Command::Jobs => {
            println!("{}", output::render_jobs(&courier.list_jobs().await));
            Ok(0)
        }

        Command::History(args) => {
            let today = chrono::Local::now().date_naive();
            let filter = args.filter(today)?;
            let page_index = args.page_index()?;
            let page = courier.history_query(&filter, page_index).await?;
            println!("{}", output::render_history(&page, page_index));
            Ok(0)
        }

        Command::Databases => {
            for name in courier.distinct_databases().await? {
                println!("{name}");
            }
            Ok(0)
        }

        Command::Targets {
            command: TargetCommand::List,
        } => {
            println!("{}", output::render_targets(&courier.list_targets().await));
            Ok(0)
        }

        Command::Targets { command } => {
            if let Some(target) = command.to_target()? {
                let name = target.name.clone();
                courier.add_target(target).await?;
                println!("Added target '{name}'");
            }
            Ok(0)
        }

        Command::Run { .. } => {
            run_scheduler(courier).await?;
            Ok(0)
        }
    }
}

fn report_verdict(verdict: Verdict) -> i32 {
    match verdict {
        Verdict::ReadOnly => {
            println!("OK: query is read-only");
            0
        }
        Verdict::Rejected(reason) => {
            println!("Rejected: {reason}");
            1
        }
    }
}

/// Runs the scheduler until Ctrl-C, printing notifications as they arrive.
async fn run_scheduler(courier: &Courier) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let period = courier.config().scheduler.tick_period();

    let handle = courier.scheduler(tx).spawn(period, cancel.clone());
    println!(
        "Scheduler running, checking every {}s. Press Ctrl-C to stop.",
        period.as_secs()
    );

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Interrupt received, stopping scheduler");
                cancel.cancel();
                break;
            }
            notification = rx.recv() => match notification {
                Some(n) => println!("{n}"),
                None => break,
            },
        }
    }

    if let Err(e) = handle.await {
        error!("Scheduler task failed: {e}");
    }
    while let Ok(n) = rx.try_recv() {
        println!("{n}");
    }
    Ok(())
}
