use clap::Parser;
use kubecomply::{
    cli::{self, Cli, Commands},
    client, config,
    pod::KubePodContext,
    report, rules,
};
use log::{error, info};
use std::process;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    match run().await {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(2);
        }
    }
}

async fn run() -> kubecomply::Result<i32> {
    let cli = Cli::parse();

    // Initialize logging
    cli.init_logging();

    let config = config::load_config(cli.config.as_deref())?;
    let client = client::connect(cli.context.as_deref()).await?;
    let pods = KubePodContext::shared(client.clone(), &config.pod);

    match cli.command {
        Commands::Exec { node, commands } => {
            use kubecomply::PodContext;

            let results = pods.run_commands_on_node(&node, &commands).await;
            let mut failed = false;
            for (command, result) in commands.iter().zip(results) {
                match result {
                    Ok(output) => {
                        if !cli.quiet {
                            println!("$ {}", command);
                        }
                        print!("{}", output);
                    }
                    Err(err) => {
                        failed = true;
                        error!("{}: {}", command, err);
                        eprintln!("{}", cli::exec_failure_line(command, &err));
                    }
                }
            }
            Ok(if failed { 1 } else { 0 })
        }
        Commands::Run { format } => {
            let ruleset = rules::builtin_ruleset(Arc::new(client), pods, &config)?;
            info!(
                "Running ruleset {} {} ({} rules)",
                ruleset.id(),
                ruleset.version(),
                ruleset.rules().len()
            );
            let result = ruleset.run().await;
            report::print_result(&result, format.into());
            Ok(if result.has_violations() { 1 } else { 0 })
        }
    }
}
