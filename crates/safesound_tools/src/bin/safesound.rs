#![forbid(unsafe_code)]

use std::env;

use safesound_os::channels::ChannelSet;
use safesound_os::config::PipelineConfig;
use safesound_tools::gate_cli::execute_gate_command;
use safesound_tools::notify_cli::{execute_notify_test, parse_notify_test_args};
use safesound_tools::USAGE;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    match run().await {
        Ok(output) => {
            if !output.is_empty() {
                println!("{output}");
            }
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    }
}

async fn run() -> Result<String, String> {
    let args: Vec<String> = env::args().skip(1).collect();
    let Some((subcommand, rest)) = args.split_first() else {
        return Err(USAGE.to_string());
    };
    let config = PipelineConfig::from_env();
    match subcommand.as_str() {
        "gate" => execute_gate_command(rest, config.gate),
        "notify-test" => {
            let parsed = parse_notify_test_args(rest)?;
            execute_notify_test(&parsed, ChannelSet::from_config(&config)).await
        }
        "help" | "--help" | "-h" => Ok(USAGE.to_string()),
        other => Err(format!("unknown subcommand '{other}'\n{USAGE}")),
    }
}
