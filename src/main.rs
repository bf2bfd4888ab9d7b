// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{bail, Result};
use std::env;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

use finance_dashboard::config::Settings;
use finance_dashboard::logging::{init_tracing, LogSink};
use finance_dashboard::{
    format_amount, AccountDraft, Dashboard, QueryState, RouterClient, TracingNotifier,
    TransactionFilter,
};

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("import") => {
            // Import mode
            let (Some(file), Some(account)) = (args.get(2), args.get(3)) else {
                eprintln!("Usage: finance-dashboard import <file.csv|file.xlsx> <account name>");
                std::process::exit(2);
            };
            run_import(Path::new(file), account)?;
        }
        Some("summary") => {
            // Optional period: summary <from> <to>
            let filter = match (args.get(2), args.get(3)) {
                (Some(from), Some(to)) => {
                    TransactionFilter::between(from.parse()?, to.parse()?)
                }
                _ => TransactionFilter::default(),
            };
            run_summary(filter)?;
        }
        _ => {
            // UI mode (default)
            run_ui_mode()?;
        }
    }

    Ok(())
}

fn headless_dashboard(settings: &Settings) -> Result<Dashboard<RouterClient>> {
    let api = Arc::new(RouterClient::open(&settings.database_path)?);
    Ok(Dashboard::new(api, Arc::new(TracingNotifier), settings.import.clone()))
}

fn run_import(file: &Path, account_name: &str) -> Result<()> {
    let settings = Settings::load()?;
    init_tracing(&settings.log_filter, LogSink::Stderr)?;

    println!("🗄️  Transaction Import - {} → {}", file.display(), account_name);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let runtime = Runtime::new()?;
    runtime.block_on(import_file(&settings, file, account_name))
}

async fn import_file(settings: &Settings, file: &Path, account_name: &str) -> Result<()> {
    let dashboard = headless_dashboard(settings)?;
    let page = &dashboard.transactions;

    // 1. Parse the file into the wizard
    println!("\n📂 Parsing file...");
    page.upload_file(file)?;
    let wizard = page.wizard();
    let results = wizard.results();
    println!("✓ Parsed {} rows from {}", results.rows.len(), results.meta.source);
    for issue in &results.errors {
        println!("  ⚠️  row {}: {}", issue.row, issue.message);
    }

    // 2. Show the detected column mapping
    let Some(mapping) = wizard.mapping() else {
        bail!("import wizard did not open");
    };
    println!("\n🔗 Column mapping:");
    for (column, header) in results.headers.iter().enumerate() {
        let field = mapping.field_for(column).map_or("skip", |f| f.name());
        println!("   {header:<24} → {field}");
    }
    if !mapping.is_complete() {
        let missing: Vec<&str> = mapping.missing().iter().map(|f| f.name()).collect();
        bail!("columns not recognized: {}", missing.join(", "));
    }

    // 3. Find or create the target account
    let accounts = dashboard.accounts.hooks().list(&()).await?;
    let account = match accounts.into_iter().find(|a| a.name == account_name) {
        Some(account) => account,
        None => {
            println!("\n➕ Creating account {account_name}");
            dashboard.accounts.hooks().create(&AccountDraft::new(account_name)).await?
        }
    };

    // 4. Submit, answering the account dialog with the chosen account
    println!("\n💾 Inserting transactions...");
    let gate = page.account_gate();
    let submit = page.submit_import();
    tokio::pin!(submit);
    let created = loop {
        tokio::select! {
            result = &mut submit => break result?,
            _ = tokio::time::sleep(Duration::from_millis(10)) => {
                if gate.is_pending() {
                    gate.choose(&account.id)?;
                }
            }
        }
    };

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ Imported {} transactions into {}", created.len(), account.name);
    Ok(())
}

fn run_summary(filter: TransactionFilter) -> Result<()> {
    let settings = Settings::load()?;
    init_tracing(&settings.log_filter, LogSink::Stderr)?;

    let runtime = Runtime::new()?;
    runtime.block_on(print_summary(&settings, filter))
}

async fn print_summary(settings: &Settings, filter: TransactionFilter) -> Result<()> {
    let period = match (filter.from, filter.to) {
        (Some(from), Some(to)) => format!("{from} → {to}"),
        _ => "Last 30 days".to_string(),
    };

    let dashboard = headless_dashboard(settings)?;
    dashboard.set_summary_filter(filter);
    dashboard.refresh_summary().await;

    let summary = match dashboard.summary() {
        QueryState::Ready(summary) => summary,
        QueryState::Failed(err) => bail!("failed to load summary: {err}"),
        QueryState::Loading => bail!("summary did not load"),
    };

    println!("📊 {period}");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("   Remaining  {:>14}  ({:+.1}%)", format_amount(summary.remaining_amount), summary.remaining_change);
    println!("   Income     {:>14}  ({:+.1}%)", format_amount(summary.income_amount), summary.income_change);
    println!("   Expenses   {:>14}  ({:+.1}%)", format_amount(summary.expenses_amount), summary.expenses_change);
    if !summary.categories.is_empty() {
        println!("\n   Top categories:");
        for category in &summary.categories {
            println!("   {:<24} {:>14}", category.name, format_amount(category.value));
        }
    }
    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode() -> Result<()> {
    use finance_dashboard::RecordingNotifier;

    let settings = Settings::load()?;
    let api = Arc::new(RouterClient::open(&settings.database_path)?);

    // the terminal belongs to the UI, so logs go next to the database
    let log_path = settings.database_path.with_extension("log");
    init_tracing(&settings.log_filter, LogSink::File(&log_path))?;

    println!("🖥️  Loading Finance Dashboard ({})...\n", settings.database_path.display());

    let runtime = Runtime::new()?;
    let notifier = Arc::new(RecordingNotifier::new());
    let dashboard = Arc::new(Dashboard::new(api, notifier.clone(), settings.import.clone()));

    println!("Starting UI... (Press 'q' to quit)\n");

    let mut app = ui::App::new(dashboard, notifier, runtime.handle().clone());
    ui::run_ui(&mut app)?;

    println!("\n✅ UI closed successfully");

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode() -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or run the API: cargo run --bin finance-server --features server");
    std::process::exit(1);
}
