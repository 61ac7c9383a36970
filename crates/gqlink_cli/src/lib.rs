//! Command-line host for gqlink.
//!
//! # Usage
//!
//! ```bash
//! # Show which endpoint the current mode resolves to
//! gqlink --config client.json endpoint
//!
//! # Store, inspect and clear the auth token
//! gqlink token set eyJhbGciOi...
//! gqlink token show
//! gqlink token clear
//!
//! # Run a query against the selected endpoint
//! gqlink --mode production query '{ me { id } }'
//! gqlink query 'query User($id: ID!) { user(id: $id) { name } }' --variables '{"id": "1"}'
//! ```

use clap::{Parser, Subcommand};
use colored::Colorize;
use gqlink_sdk::auth::mask_token;
use gqlink_sdk::{
    select_endpoint, ClientEnvironment, ClientOptions, ClientProvider, DeploymentMode,
    FileStorage, GraphqlClient, StderrAlerter, TokenStorage,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "gqlink")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// JSON file with client options
    #[arg(short, long, global = true, env = "GQLINK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Deployment mode; only `production` selects the production endpoint
    #[arg(long, global = true, env = "GQLINK_MODE", default_value = "development")]
    pub mode: DeploymentMode,

    /// Token storage file (defaults to ~/.gqlink/storage.json)
    #[arg(long, global = true, env = "GQLINK_STORAGE")]
    pub storage: Option<PathBuf>,

    /// Send every request to the mocking endpoint
    #[arg(long, global = true)]
    pub mocking: bool,

    /// Log GraphQL errors instead of alerting
    #[arg(long, global = true)]
    pub no_alert: bool,

    /// Log the token in debug output (ignored in production)
    #[arg(long, global = true)]
    pub log_token: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Log filter used when `RUST_LOG` is unset.
    pub fn default_log_filter(&self) -> &'static str {
        if self.verbose {
            "gqlink=debug"
        } else if self.quiet {
            "gqlink=error"
        } else {
            "gqlink=info"
        }
    }

    pub fn storage_path(&self) -> PathBuf {
        self.storage.clone().unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".gqlink").join("storage.json")
        })
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a query or mutation
    Query {
        /// Operation text
        query: String,

        /// Variables as a JSON object
        #[arg(long)]
        variables: Option<String>,

        /// Operation name
        #[arg(long)]
        operation_name: Option<String>,

        /// Send as a mutation
        #[arg(long)]
        mutation: bool,
    },

    /// Print the endpoint selected for the current options and mode
    Endpoint,

    /// Manage the stored auth token
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand, Debug)]
pub enum TokenAction {
    /// Store a token
    Set { token: String },
    /// Remove the stored token
    Clear,
    /// Report whether a token is stored
    Show,
}

/// Resolves client options: config file, then environment, then flags.
pub fn load_options<I>(cli: &Cli, vars: I) -> Result<ClientOptions, Box<dyn std::error::Error>>
where
    I: IntoIterator<Item = (String, String)>,
{
    let base = match &cli.config {
        Some(path) => ClientOptions::from_json(&std::fs::read_to_string(path)?)?,
        None => ClientOptions::default(),
    };
    let mut options = base.merge_vars(vars)?;

    if cli.mocking {
        options.mocking = true;
    }
    if cli.no_alert {
        options.alert_on_error = false;
    }
    if cli.log_token {
        options.log_token = true;
    }
    Ok(options)
}

pub async fn run(cli: Cli) -> Result<i32, Box<dyn std::error::Error>> {
    let options = load_options(&cli, std::env::vars())?;
    let storage = Arc::new(FileStorage::new(cli.storage_path()));
    debug!(storage = %storage.path().display(), mode = %cli.mode, "options loaded");

    match &cli.command {
        Commands::Query {
            query,
            variables,
            operation_name,
            mutation,
        } => {
            let env = ClientEnvironment::new(storage).alerter(Arc::new(StderrAlerter));
            let provider = ClientProvider::new(options, cli.mode, env);
            let client = provider.initialize()?;

            let variables = variables
                .as_deref()
                .map(serde_json::from_str::<serde_json::Value>)
                .transpose()?;
            run_query(&client, query, variables, operation_name.clone(), *mutation).await
        }
        Commands::Endpoint => {
            println!("{}", select_endpoint(&options, cli.mode));
            Ok(0)
        }
        Commands::Token { action } => handle_token(action, &*storage, &options),
        Commands::Version => {
            println!("gqlink {}", env!("CARGO_PKG_VERSION"));
            Ok(0)
        }
    }
}

async fn run_query(
    client: &GraphqlClient,
    query: &str,
    variables: Option<serde_json::Value>,
    operation_name: Option<String>,
    mutation: bool,
) -> Result<i32, Box<dyn std::error::Error>> {
    let mut builder = if mutation {
        client.mutate::<serde_json::Value>(query)
    } else {
        client.query::<serde_json::Value>(query)
    };
    if let Some(variables) = variables {
        builder = builder.variables(variables);
    }
    if let Some(name) = operation_name {
        builder = builder.operation_name(name);
    }

    let result = builder.execute().await?;

    if let Some(data) = &result.data {
        println!("{}", serde_json::to_string_pretty(data)?);
    }
    for error in &result.errors {
        eprintln!("{} {}", "GraphQL error:".red().bold(), error.message);
    }

    Ok(if result.has_errors() { 1 } else { 0 })
}

pub fn handle_token(
    action: &TokenAction,
    storage: &dyn TokenStorage,
    options: &ClientOptions,
) -> Result<i32, Box<dyn std::error::Error>> {
    let key = options.token_storage_key.as_str();
    match action {
        TokenAction::Set { token } => {
            storage.set_item(key, token)?;
            println!("{} token stored under '{}'", "Success:".green().bold(), key);
        }
        TokenAction::Clear => {
            storage.remove_item(key)?;
            println!("{} token cleared", "Success:".green().bold());
        }
        TokenAction::Show => match storage.get_item(key) {
            Some(token) if !token.is_empty() => {
                println!("{} {}", "Token:".blue(), mask_token(&token));
            }
            _ => {
                println!("{}", "No token stored".yellow());
                return Ok(1);
            }
        },
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gqlink_sdk::MemoryStorage;

    #[test]
    fn test_cli_parse() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_query_command() {
        let cli = Cli::try_parse_from([
            "gqlink",
            "--mode",
            "production",
            "query",
            "{ me { id } }",
            "--operation-name",
            "Me",
        ])
        .unwrap();

        assert_eq!(cli.mode, DeploymentMode::Production);
        match cli.command {
            Commands::Query {
                query,
                operation_name,
                mutation,
                ..
            } => {
                assert_eq!(query, "{ me { id } }");
                assert_eq!(operation_name.as_deref(), Some("Me"));
                assert!(!mutation);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_default_log_filter() {
        let cli = Cli::try_parse_from(["gqlink", "endpoint"]).unwrap();
        assert_eq!(cli.default_log_filter(), "gqlink=info");

        let cli = Cli::try_parse_from(["gqlink", "-v", "endpoint"]).unwrap();
        assert_eq!(cli.default_log_filter(), "gqlink=debug");
    }

    #[test]
    fn test_unknown_mode_is_development() {
        let cli = Cli::try_parse_from(["gqlink", "--mode", "staging", "endpoint"]).unwrap();
        assert_eq!(cli.mode, DeploymentMode::Development);
    }

    #[test]
    fn test_load_options_layers() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("client.json");
        std::fs::write(
            &config,
            r#"{
                "productionEndpoint": "http://prod/graphql",
                "testingEndpoint": "http://test/graphql"
            }"#,
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "gqlink",
            "--config",
            config.to_str().unwrap(),
            "--no-alert",
            "endpoint",
        ])
        .unwrap();
        let options = load_options(
            &cli,
            vec![(
                "GRAPHQL_TESTING_ENDPOINT".to_string(),
                "http://override/graphql".to_string(),
            )],
        )
        .unwrap();

        assert_eq!(options.production_endpoint, "http://prod/graphql");
        assert_eq!(options.testing_endpoint, "http://override/graphql");
        assert!(!options.alert_on_error);
        assert!(options.disable_caching);
    }

    #[test]
    fn test_token_commands() {
        let storage = MemoryStorage::new();
        let options = ClientOptions::default().token_storage_key("jwt");

        assert_eq!(handle_token(&TokenAction::Show, &storage, &options).unwrap(), 1);

        let set = TokenAction::Set {
            token: "abcdefgh".to_string(),
        };
        assert_eq!(handle_token(&set, &storage, &options).unwrap(), 0);
        assert_eq!(storage.get_item("jwt").as_deref(), Some("abcdefgh"));
        assert_eq!(handle_token(&TokenAction::Show, &storage, &options).unwrap(), 0);

        assert_eq!(handle_token(&TokenAction::Clear, &storage, &options).unwrap(), 0);
        assert_eq!(storage.get_item("jwt"), None);
    }
}
