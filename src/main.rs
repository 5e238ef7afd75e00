use std::fmt;
use std::io;
use std::path::Path;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::{Arg, ArgAction, ArgMatches, Command};
use log::error;

use quickmail::config::SettingsError;
use quickmail::email::{
    Attachment, CallContext, DispatchError, FailoverDispatcher, ProviderHealth, SendRequest,
    SmtpMailTransport,
};
use quickmail::error::ErrorCategory;
use quickmail::providers::{CredentialStore, ProviderInput, StoreError};
use quickmail::utils::io::{read_body, read_secret, split_list};
use quickmail::utils::logging::initialize_logging;
use quickmail::{ErrorKind, Settings};

/// Error reported to the terminal: a stable kind plus the detail text
struct Failure {
    kind: ErrorKind,
    detail: String,
}

impl Failure {
    fn new(kind: ErrorKind, detail: impl fmt::Display) -> Self {
        Self {
            kind,
            detail: detail.to_string(),
        }
    }

    fn exit_code(&self) -> i32 {
        match self.kind.category() {
            ErrorCategory::NotFound => 2,
            ErrorCategory::Validation => 3,
            ErrorCategory::Unavailable => 4,
            ErrorCategory::Internal => 1,
        }
    }
}

impl From<StoreError> for Failure {
    fn from(e: StoreError) -> Self {
        Failure::new(e.kind(), e)
    }
}

impl From<DispatchError> for Failure {
    fn from(e: DispatchError) -> Self {
        Failure::new(e.kind(), e)
    }
}

impl From<SettingsError> for Failure {
    fn from(e: SettingsError) -> Self {
        Failure::new(e.kind(), e)
    }
}

impl From<io::Error> for Failure {
    fn from(e: io::Error) -> Self {
        Failure::new(ErrorKind::Internal, e)
    }
}

fn cli() -> Command {
    Command::new("quickmail")
        .about("Encrypted SMTP provider store with failover delivery")
        .subcommand_required(true)
        .subcommand(
            Command::new("providers")
                .about("Manage stored SMTP providers")
                .subcommand_required(true)
                .subcommand(Command::new("list").about("List configured providers"))
                .subcommand(
                    Command::new("add")
                        .about("Add or replace a provider")
                        .arg(Arg::new("name").help("Unique provider name").required(true))
                        .arg(
                            Arg::new("host")
                                .long("host")
                                .help("SMTP server address")
                                .required(true),
                        )
                        .arg(
                            Arg::new("port")
                                .long("port")
                                .help("SMTP server port")
                                .default_value("587")
                                .value_parser(clap::value_parser!(u16)),
                        )
                        .arg(
                            Arg::new("username")
                                .long("username")
                                .help("SMTP login")
                                .required(true),
                        )
                        .arg(
                            Arg::new("password")
                                .long("password")
                                .help("SMTP password (prompted when omitted)"),
                        )
                        .arg(
                            Arg::new("from")
                                .long("from")
                                .help("Default sender address for this provider"),
                        )
                        .arg(
                            Arg::new("tls")
                                .long("tls")
                                .help("Use implicit TLS on connect")
                                .action(ArgAction::SetTrue),
                        ),
                )
                .subcommand(
                    Command::new("remove")
                        .about("Delete a provider")
                        .arg(Arg::new("name").help("Provider to delete").required(true)),
                ),
        )
        .subcommand(
            Command::new("send")
                .about("Send an email, failing over between providers")
                .arg(
                    Arg::new("to")
                        .long("to")
                        .help("Recipient (repeat or comma separate)")
                        .action(ArgAction::Append),
                )
                .arg(Arg::new("cc").long("cc").action(ArgAction::Append))
                .arg(Arg::new("bcc").long("bcc").action(ArgAction::Append))
                .arg(Arg::new("subject").long("subject").required(true))
                .arg(
                    Arg::new("body")
                        .long("body")
                        .help("Message body (read from stdin when omitted)"),
                )
                .arg(
                    Arg::new("html")
                        .long("html")
                        .help("Send the body as text/html")
                        .action(ArgAction::SetTrue),
                )
                .arg(Arg::new("from").long("from").help("Sender address"))
                .arg(
                    Arg::new("provider")
                        .long("provider")
                        .help("Provider to try, in order (repeatable)")
                        .action(ArgAction::Append),
                )
                .arg(
                    Arg::new("attach")
                        .long("attach")
                        .help("File to attach (repeatable)")
                        .action(ArgAction::Append),
                )
                .arg(
                    Arg::new("timeout")
                        .long("timeout")
                        .help("Overall deadline in seconds")
                        .value_parser(clap::value_parser!(u64)),
                ),
        )
        .subcommand(
            Command::new("check")
                .about("Check that a provider accepts a connection and login")
                .arg(Arg::new("name").help("Provider to probe").required(true)),
        )
}

#[tokio::main]
async fn main() {
    let matches = cli().get_matches();

    if let Err(failure) = run(&matches).await {
        error!("Command failed: [{}] {}", failure.kind, failure.detail);
        eprintln!("error [{}]: {}", failure.kind, failure.detail);
        process::exit(failure.exit_code());
    }
}

async fn run(matches: &ArgMatches) -> Result<(), Failure> {
    let settings = Settings::load()?;
    if let Err(e) = initialize_logging(&settings) {
        eprintln!("Warning: logging not initialized: {}", e);
    }

    let store = Arc::new(CredentialStore::open(
        settings.providers_file.clone(),
        settings.master_key()?,
    )?);

    match matches.subcommand() {
        Some(("providers", sub)) => match sub.subcommand() {
            Some(("list", _)) => list_providers(&store),
            Some(("add", args)) => add_provider(&store, args),
            Some(("remove", args)) => remove_provider(&store, args),
            _ => Ok(()),
        },
        Some(("send", args)) => {
            let dispatcher = dispatcher(store, &settings);
            send_email(&dispatcher, args).await
        }
        Some(("check", args)) => {
            let dispatcher = dispatcher(store, &settings);
            check_provider(&dispatcher, args).await
        }
        _ => Ok(()),
    }
}

fn dispatcher(store: Arc<CredentialStore>, settings: &Settings) -> FailoverDispatcher {
    FailoverDispatcher::from_settings(store, Arc::new(SmtpMailTransport::new()), settings)
}

fn list_providers(store: &CredentialStore) -> Result<(), Failure> {
    let providers = store.list_providers();
    if providers.is_empty() {
        println!("No providers configured.");
        return Ok(());
    }

    for provider in providers {
        println!(
            "Provider: {}\nServer: {}:{}\nUsername: {}\nFrom: {}\nTLS: {}\n",
            provider.name,
            provider.host,
            provider.port,
            provider.username,
            provider.from.as_deref().unwrap_or("-"),
            provider.use_tls
        );
    }
    Ok(())
}

fn add_provider(store: &CredentialStore, args: &ArgMatches) -> Result<(), Failure> {
    let name = string_arg(args, "name");

    let password = match args.get_one::<String>("password") {
        Some(password) => password.clone(),
        None => read_secret(&format!("SMTP password for {}: ", name))?,
    };

    let summary = store.upsert_provider(ProviderInput {
        name,
        host: string_arg(args, "host"),
        port: args.get_one::<u16>("port").copied().unwrap_or(587),
        username: string_arg(args, "username"),
        password,
        from: args.get_one::<String>("from").cloned(),
        use_tls: args.get_flag("tls"),
    })?;

    println!("Provider saved: {} ({}:{})", summary.name, summary.host, summary.port);
    Ok(())
}

fn remove_provider(store: &CredentialStore, args: &ArgMatches) -> Result<(), Failure> {
    let name = string_arg(args, "name");
    store.delete_provider(&name)?;
    println!("Provider deleted: {}", name);
    Ok(())
}

async fn send_email(dispatcher: &FailoverDispatcher, args: &ArgMatches) -> Result<(), Failure> {
    let body = match args.get_one::<String>("body") {
        Some(body) => body.clone(),
        None => read_body(io::stdin())?,
    };

    let attachments = args
        .get_many::<String>("attach")
        .into_iter()
        .flatten()
        .map(|path| Attachment::from_path(Path::new(path), None))
        .collect::<io::Result<Vec<_>>>()?;

    let request = SendRequest {
        subject: string_arg(args, "subject"),
        body,
        is_html: args.get_flag("html"),
        to: list_arg(args, "to"),
        cc: list_arg(args, "cc"),
        bcc: list_arg(args, "bcc"),
        attachments,
        provider_priority: list_arg(args, "provider"),
        from: args.get_one::<String>("from").cloned(),
    };

    let ctx = match args.get_one::<u64>("timeout") {
        Some(secs) => CallContext::with_timeout(Duration::from_secs(*secs)),
        None => CallContext::new(),
    };

    let delivery = dispatcher.send(&ctx, &request).await?;
    for failure in &delivery.failures {
        println!("Skipped {}", failure);
    }
    println!("Email sent via provider: {}", delivery.provider);
    Ok(())
}

async fn check_provider(dispatcher: &FailoverDispatcher, args: &ArgMatches) -> Result<(), Failure> {
    let name = string_arg(args, "name");
    match dispatcher.check_provider(&CallContext::new(), &name).await {
        ProviderHealth::Healthy => {
            println!("Provider {}: healthy", name);
            Ok(())
        }
        ProviderHealth::Unhealthy(e) => {
            println!("Provider {}: unhealthy", name);
            Err(Failure::new(e.kind(), e))
        }
    }
}

fn string_arg(args: &ArgMatches, id: &str) -> String {
    args.get_one::<String>(id).cloned().unwrap_or_default()
}

fn list_arg(args: &ArgMatches, id: &str) -> Vec<String> {
    split_list(args.get_many::<String>(id).into_iter().flatten())
}
