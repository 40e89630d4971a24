use clap::{Parser, Subcommand};
use jsonserver_operator::config::OperatorConfig;
use jsonserver_operator::{controller, logging, JsonServer};
use kube::{Client, CustomResourceExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the controller (default)
    Run {
        /// YAML configuration file
        #[arg(short, long)]
        config: Option<String>,

        /// Only watch this namespace
        #[arg(short, long)]
        namespace: Option<String>,

        /// Log as JSON lines
        #[arg(long)]
        json_logs: bool,
    },
    /// Print the JsonServer CustomResourceDefinition as YAML
    Crd,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.command.unwrap_or(Command::Run {
        config: None,
        namespace: None,
        json_logs: false,
    }) {
        Command::Crd => {
            print!("{}", serde_yaml::to_string(&JsonServer::crd())?);
        }
        Command::Run {
            config,
            namespace,
            json_logs,
        } => {
            let mut config = match config {
                Some(path) => OperatorConfig::from_yaml_file(&path)?,
                None => OperatorConfig::default(),
            };
            if namespace.is_some() {
                config.namespace = namespace;
            }
            if json_logs {
                config.log_format = jsonserver_operator::config::LogFormat::Json;
            }
            config.validate()?;

            logging::init(config.log_format);
            tracing::info!("Starting JsonServer Kubernetes Operator");

            let client = Client::try_default().await?;
            controller::run(client, config).await;
        }
    }

    Ok(())
}
