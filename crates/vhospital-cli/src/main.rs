//! vhospital: terminal client for the virtual hospital consultation service

mod commands;
mod logging;
mod render;

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand};
use vhospital_core::credits::UserIdentity;
use vhospital_core::AppConfig;

use commands::consult::ConsultOptions;

#[derive(Parser, Debug)]
#[command(name = "vhospital", version, about = "Ask the virtual hospital a health question")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Config file (default: ~/.config/vhospital/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ask a single question
    Ask {
        /// The question (words are joined with spaces)
        #[arg(required = true)]
        question: Vec<String>,

        #[command(flatten)]
        user: UserArgs,

        /// Print each specialist's reply
        #[arg(long)]
        details: bool,
    },

    /// Interactive consultation session
    Chat {
        #[command(flatten)]
        user: UserArgs,

        /// Print each specialist's reply
        #[arg(long)]
        details: bool,
    },

    /// Inspect or adjust credit balances
    Credits {
        #[command(subcommand)]
        action: CreditsAction,
    },

    /// Payment webhook listener
    Webhook {
        #[command(subcommand)]
        action: WebhookAction,
    },

    /// Print the checkout link for buying credits
    CheckoutUrl {
        #[arg(long)]
        email: Option<String>,
    },
}

#[derive(Args, Debug)]
struct UserArgs {
    /// Signed-in user id
    #[arg(long = "user")]
    uid: Option<String>,

    /// Email of the signed-in user
    #[arg(long)]
    email: Option<String>,
}

impl UserArgs {
    fn identity(&self) -> Option<UserIdentity> {
        self.uid
            .as_ref()
            .map(|uid| UserIdentity::new(uid.clone(), self.email.clone()))
    }
}

#[derive(Subcommand, Debug)]
enum CreditsAction {
    /// Show one account
    Show { uid: String },
    /// Overwrite a balance
    Set { uid: String, credits: u64 },
    /// Add to a balance
    Add { uid: String, amount: u64 },
    /// List all accounts
    List,
}

#[derive(Subcommand, Debug)]
enum WebhookAction {
    /// Listen for payment webhooks
    Serve {
        /// Override the configured listen address
        #[arg(long)]
        listen: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Ask {
            question,
            user,
            details,
        } => {
            let options = ConsultOptions {
                user: user.identity(),
                details,
            };
            commands::consult::ask(&config, &question.join(" "), &options).await
        }
        Command::Chat { user, details } => {
            let options = ConsultOptions {
                user: user.identity(),
                details,
            };
            commands::consult::chat(&config, &options).await
        }
        Command::Credits { action } => match action {
            CreditsAction::Show { uid } => commands::credits::show(&config, &uid),
            CreditsAction::Set { uid, credits } => commands::credits::set(&config, &uid, credits),
            CreditsAction::Add { uid, amount } => commands::credits::add(&config, &uid, amount),
            CreditsAction::List => commands::credits::list(&config),
        },
        Command::Webhook { action } => match action {
            WebhookAction::Serve { listen } => {
                commands::webhook::serve(&config, listen.as_deref()).await
            }
        },
        Command::CheckoutUrl { email } => commands::checkout(&config, email.as_deref()),
    }
}
