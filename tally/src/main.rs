use std::io::Write as _;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use colored::Colorize;
use tally::{
    parse_due_date, App, DocumentHub, IdentityProvider, LocalStore, SortOrder, Task, TaskStore,
};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::time::sleep;

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Personal task list with local or synced storage", long_about = None)]
struct Cli {
    /// Storage and authentication variant
    #[arg(short, long, value_enum, default_value = "local")]
    variant: Variant,

    /// SQLite database URL for the local variant
    #[arg(short, long, default_value = "sqlite://tally.db?mode=rwc")]
    database: String,

    /// Fixed sign-in username for the local variant
    #[arg(long, default_value = "local")]
    username: String,

    /// Fixed sign-in password for the local variant
    #[arg(long, default_value = "local")]
    password: String,
}

#[derive(Clone, Copy, ValueEnum)]
enum Variant {
    /// Local slot storage, fixed credentials
    Local,
    /// Hub storage, one collection per account
    PerUser,
    /// Hub storage, one shared collection
    Shared,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tally=info".into()),
        )
        .init();

    let cli = Cli::parse();
    match cli.variant {
        Variant::Local => {
            let store = match LocalStore::new(&cli.database).await {
                Ok(store) => store,
                Err(e) => {
                    tracing::error!(%e, database = %cli.database, "failed to open database");
                    return Ok(());
                }
            };
            if let Err(e) = store.run_migrations().await {
                tracing::error!(%e, "failed to run migrations");
                return Ok(());
            }
            run(App::offline(cli.username, cli.password, store)).await
        }
        Variant::PerUser => run(App::per_user(Arc::new(DocumentHub::new()))).await,
        Variant::Shared => run(App::shared(Arc::new(DocumentHub::new()))).await,
    }
}

/// Give the identity watcher and change feed a beat to settle.
async fn settle() {
    sleep(Duration::from_millis(100)).await;
}

async fn run<P: IdentityProvider, S: TaskStore>(mut app: App<P, S>) -> std::io::Result<()> {
    println!("{}", "tally - type 'help' for commands".bold());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut sort = SortOrder::DueDate;
    let mut last_view: Vec<Task> = Vec::new();

    loop {
        print!("{} ", "tally>".cyan());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        let (cmd, rest) = match line.split_once(char::is_whitespace) {
            Some((cmd, rest)) => (cmd, rest.trim()),
            None => (line, ""),
        };

        match cmd {
            "" => continue,
            "help" => print_help(),
            "signup" | "login" => {
                let Some((username, password)) = rest.split_once(char::is_whitespace) else {
                    println!("{}", format!("usage: {cmd} <username> <password>").dimmed());
                    continue;
                };
                app.session.set_username(username.trim()).await;
                app.session.set_password(password.trim()).await;
                let outcome = if cmd == "signup" {
                    app.session.sign_up().await
                } else {
                    app.session.sign_in().await
                };
                match outcome {
                    Ok(identity) => {
                        settle().await;
                        println!("signed in as {}", identity.username.green());
                    }
                    Err(e) => println!("{}", e.to_string().red()),
                }
            }
            "logout" => {
                app.session.sign_out().await;
                settle().await;
                last_view.clear();
                println!("signed out");
            }
            "add" => {
                let (title, due) = split_trailing_date(rest);
                if title.is_empty() {
                    println!("{}", "usage: add <title> [yyyy-mm-dd]".dimmed());
                    continue;
                }
                if let Err(e) = app.engine.submit(title, due).await {
                    println!("{}", format!("could not save task: {e}").red());
                } else {
                    settle().await;
                }
            }
            "list" => {
                last_view = app.engine.view("", sort).await;
                print_tasks(&last_view);
                let total = app.engine.total_count().await;
                let done = app.engine.completed_count().await;
                println!("{}", format!("{done}/{total} completed").dimmed());
            }
            "search" => {
                last_view = app.engine.view(rest, sort).await;
                print_tasks(&last_view);
            }
            "sort" => match rest.parse::<SortOrder>() {
                Ok(order) => {
                    sort = order;
                    println!("sorting by {sort}");
                }
                Err(_) => println!("{}", "usage: sort due_date|completion".dimmed()),
            },
            "done" | "del" | "edit" => {
                let Some(task) = pick(&last_view, rest) else {
                    println!("{}", "run 'list' first, then use the shown number".dimmed());
                    continue;
                };
                let id = task.id;
                let result = match cmd {
                    "done" => app.engine.toggle_completion(id).await,
                    "del" => app.engine.remove(id).await,
                    _ => {
                        app.engine.begin_edit(id).await;
                        edit_dialog(&app, &mut lines).await?
                    }
                };
                if let Err(e) = result {
                    println!("{}", format!("could not save change: {e}").red());
                } else {
                    settle().await;
                }
            }
            "quit" | "exit" => break,
            other => println!("{}", format!("unknown command '{other}'").dimmed()),
        }
    }

    app.shutdown().await;
    Ok(())
}

fn print_help() {
    println!("  signup <user> <pass>   create an account and sign in");
    println!("  login <user> <pass>    sign in");
    println!("  logout                 sign out");
    println!("  add <title> [date]     add a task, date as yyyy-mm-dd");
    println!("  list                   show tasks with the current sort");
    println!("  search <term>          filter tasks by title");
    println!("  sort due_date|completion");
    println!("  done <n>               toggle completion of task n from the last list");
    println!("  edit <n>               rewrite title/date of task n");
    println!("  del <n>                delete task n");
    println!("  quit");
}

fn print_tasks(tasks: &[Task]) {
    if tasks.is_empty() {
        println!("{}", "(no tasks)".dimmed());
        return;
    }
    for (i, task) in tasks.iter().enumerate() {
        let mark = if task.completed {
            "x".green()
        } else {
            " ".normal()
        };
        let due = task
            .due
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        println!("  {:>2} [{}] {} {}", i + 1, mark, task.title, due.dimmed());
    }
}

/// Resolves a 1-based index from the last printed view.
fn pick<'a>(view: &'a [Task], arg: &str) -> Option<&'a Task> {
    let index: usize = arg.parse().ok()?;
    view.get(index.checked_sub(1)?)
}

/// Splits a trailing `yyyy-mm-dd` token off the title, if one is present.
fn split_trailing_date(input: &str) -> (&str, Option<chrono::NaiveDate>) {
    if let Some((title, tail)) = input.rsplit_once(char::is_whitespace) {
        if let Some(due) = parse_due_date(tail) {
            return (title.trim(), Some(due));
        }
    }
    (input.trim(), None)
}

/// Two-line edit dialog over the engine's draft: empty input keeps the
/// current value.
async fn edit_dialog<P: IdentityProvider, S: TaskStore>(
    app: &App<P, S>,
    lines: &mut Lines<BufReader<Stdin>>,
) -> std::io::Result<tally::StoreResult<()>> {
    let draft = app.engine.draft().await;

    print!("  title [{}]: ", draft.title);
    std::io::stdout().flush()?;
    let title = lines.next_line().await?.unwrap_or_default();
    let title = if title.trim().is_empty() {
        draft.title.clone()
    } else {
        title.trim().to_string()
    };

    let current_date = draft
        .due
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default();
    print!("  date [{current_date}]: ");
    std::io::stdout().flush()?;
    let date_input = lines.next_line().await?.unwrap_or_default();
    let due = if date_input.trim().is_empty() {
        draft.due
    } else {
        parse_due_date(&date_input)
    };

    Ok(app.engine.submit(&title, due).await)
}
