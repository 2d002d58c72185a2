use anyhow::Context;
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};

use fedilist::config::{Cli, Command, Credentials, ExportCommand, ImportCommand};
use fedilist::core::codec::accounts_to_csv;
use fedilist::utils::{logger, validation::Validate};
use fedilist::{Directory, MastodonDirectory, Reconciler};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logger::init_cli_logger(cli.verbose);

    if let Err(e) = run(cli).await {
        tracing::error!("{e:#}");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let credentials = Credentials::load(&cli.config)?;
    credentials.validate()?;

    let directory = MastodonDirectory::connect(&credentials.base_url, &credentials.access_token)
        .await
        .context("failed to connect to the configured server")?;
    let reconciler = Reconciler::connect(directory).await?;

    match cli.command {
        Command::Follow { account } => {
            reconciler.ensure_following(&account, true, false).await?;
        }
        Command::Unfollow { account } => {
            reconciler.unfollow(&account).await?;
        }
        Command::Whoami => {
            println!("{}", reconciler.viewer().acct);
        }
        Command::Export(command) => run_export(&reconciler, command).await?,
        Command::Import(command) => run_import(&reconciler, command).await?,
    }
    Ok(())
}

async fn run_export<D: Directory>(
    reconciler: &Reconciler<D>,
    command: ExportCommand,
) -> anyhow::Result<()> {
    match command {
        ExportCommand::Following {
            account,
            unlisted,
            file,
        } => {
            anyhow::ensure!(
                account.is_none() || !unlisted,
                "the --unlisted and --account options cannot be used together"
            );
            let output = if unlisted {
                reconciler.export_unlisted_csv().await?
            } else {
                reconciler.export_following_csv(account.as_deref()).await?
            };
            write_output(&output, file.as_deref())?;
        }
        ExportCommand::Followers { account, file } => {
            let output = reconciler.export_followers_csv(account.as_deref()).await?;
            write_output(&output, file.as_deref())?;
        }
        ExportCommand::List { name: None, .. } => {
            for list in reconciler.lists_with_members().await? {
                println!("{} - {} accounts", list.title, list.accounts.len());
            }
        }
        ExportCommand::List {
            name: Some(name),
            file,
        } if name.eq_ignore_ascii_case("all") => {
            for list in reconciler.lists_with_members().await? {
                let file_name = list_file_name(&list.title);
                let path = match &file {
                    Some(directory) => directory.join(&file_name),
                    None => PathBuf::from(&file_name),
                };
                let output = accounts_to_csv(list.accounts, Some(reconciler.viewer()))?;
                fs::write(&path, output)
                    .with_context(|| format!("failed to write {}", path.display()))?;
            }
        }
        ExportCommand::List {
            name: Some(name),
            file,
        } => {
            let output = reconciler.export_list_csv(&name).await?;
            write_output(&output, file.as_deref())?;
        }
    }
    Ok(())
}

async fn run_import<D: Directory>(
    reconciler: &Reconciler<D>,
    command: ImportCommand,
) -> anyhow::Result<()> {
    match command {
        ImportCommand::Following { file, replace } => {
            let csv_text = fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            if replace {
                reconciler.unfollow_all().await?;
            }
            reconciler.import_following(&csv_text).await?;
        }
        ImportCommand::List {
            file,
            list_name,
            replace,
        } => {
            let csv_text = fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            if replace {
                reconciler.remove_all_from_list(&list_name).await?;
            }
            reconciler.import_list(&csv_text, &list_name, true).await?;
        }
    }
    Ok(())
}

fn write_output(output: &str, file: Option<&Path>) -> anyhow::Result<()> {
    match file {
        Some(path) => fs::write(path, output)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{output}"),
    }
    Ok(())
}

/// File name for a per-list export. List titles are free text, so path
/// separators are replaced to keep the file inside the target directory.
fn list_file_name(title: &str) -> String {
    let sanitized: String = title
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | '\0') { '-' } else { c })
        .collect();
    format!("{sanitized}.csv")
}
