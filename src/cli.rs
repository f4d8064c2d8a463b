use std::path::PathBuf;

use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::debug;

use crate::api::{self, BillingRepo};
use crate::core::payment::{PaymentEdit, PaymentInput, ProjectScopeKind};
use crate::core::records::{BillingMonth, PaymentTarget};
use crate::logging;
use crate::storage::{self, FileSystem};

const APP_DIR: &str = "billing_ledger";

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Storage(#[from] storage::Error),
    #[error(transparent)]
    Api(#[from] api::Error),
    #[error("either --contract or --project is required")]
    MissingTarget,
    #[error("either --amount or --percentage is required")]
    MissingAmount,
    #[error("cant render json: {0}")]
    Render(#[from] serde_json::Error),
}

#[derive(Parser)]
#[clap(name = "billing_ledger", version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Директория хранилища
    #[clap(long, env = "BILLING_LEDGER_DATA")]
    data: Option<PathBuf>,

    /// Уровень логирования: error, warn, info, debug, trace
    #[clap(long, env = "BILLING_LEDGER_LOG", default_value = "info")]
    log_level: String,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct TargetArgs {
    /// Идентификатор контракта
    #[clap(long)]
    contract: Option<String>,
    /// Идентификатор проекта
    #[clap(long)]
    project: Option<String>,
}

impl TargetArgs {
    fn target(self) -> Result<PaymentTarget, Error> {
        match (self.contract, self.project) {
            (Some(id), _) => Ok(PaymentTarget::Contract(id)),
            (None, Some(id)) => Ok(PaymentTarget::Project(id)),
            (None, None) => Err(Error::MissingTarget),
        }
    }
}

#[derive(Subcommand, Debug)]
enum PayKind {
    /// Фиксированная сумма
    Fixed {
        amount: f64,
        #[clap(long)]
        note: Option<String>,
    },
    /// Поддержка и доработки
    Evolutive {
        amount: f64,
        #[clap(long)]
        note: Option<String>,
    },
    /// Ежемесячная поддержка
    Recurring {
        amount: f64,
        /// Месяц начисления, YYYY-MM
        #[clap(long)]
        month: BillingMonth,
        #[clap(long)]
        note: Option<String>,
    },
    /// Процент от стоимости контракта или проекта
    Percentage {
        percentage: f64,
        #[clap(long)]
        note: Option<String>,
    },
    /// Платёж по объёму выбранного проекта
    Scope {
        /// Проект, на который разносится платёж
        #[clap(long)]
        select: Option<String>,
        #[clap(long, conflicts_with = "percentage")]
        amount: Option<f64>,
        #[clap(long)]
        percentage: Option<f64>,
        #[clap(long)]
        note: Option<String>,
    },
}

impl PayKind {
    fn into_input(self) -> Result<PaymentInput, Error> {
        let input = match self {
            PayKind::Fixed { amount, note } => PaymentInput::Fixed { amount, note },
            PayKind::Evolutive { amount, note } => PaymentInput::SupportEvolutive { amount, note },
            PayKind::Recurring {
                amount,
                month,
                note,
            } => PaymentInput::RecurringSupport {
                amount,
                billing_month: month,
                note,
            },
            PayKind::Percentage { percentage, note } => PaymentInput::Percentage { percentage, note },
            PayKind::Scope {
                select,
                amount,
                percentage,
                note,
            } => {
                let kind = match (amount, percentage) {
                    (_, Some(percentage)) => ProjectScopeKind::Percentage { percentage },
                    (Some(amount), None) => ProjectScopeKind::Fixed { amount },
                    (None, None) => return Err(Error::MissingAmount),
                };
                PaymentInput::ProjectScope {
                    selected_project_id: select,
                    kind,
                    note,
                }
            }
        };
        Ok(input)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Создать хранилище
    Init,

    /// Сводка оплат по клиентам
    #[clap(alias = "b")]
    Billing {
        /// Вывести JSON вместо дерева
        #[clap(long)]
        json: bool,
    },

    /// Рассчитать и записать платёж
    Pay {
        #[clap(flatten)]
        target: TargetArgs,
        /// Дата платежа, по умолчанию сегодня
        #[clap(long)]
        date: Option<NaiveDate>,
        /// Эквивалент в часах
        #[clap(long)]
        hours: Option<Decimal>,
        #[clap(subcommand)]
        kind: PayKind,
    },

    /// История платежей контракта или проекта
    History {
        #[clap(flatten)]
        target: TargetArgs,
    },

    /// Исправить сумму платежа
    EditPayment {
        id: String,
        #[clap(long)]
        amount: f64,
        #[clap(long)]
        description: Option<String>,
        #[clap(long)]
        date: Option<NaiveDate>,
        #[clap(long)]
        hours: Option<Decimal>,
    },

    /// Удалить платёж
    DeletePayment { id: String },

    /// Удалить проект без записей времени
    DeleteProject { id: String },

    /// Бюджет и списанные часы
    Hours {
        #[clap(flatten)]
        target: TargetArgs,
    },
}

fn data_dir(explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(|| {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    })
}

fn execute<R: BillingRepo>(repo: &R, command: Commands) -> Result<(), Error> {
    match command {
        Commands::Init => println!("Хранилище: {}", repo.location()),
        Commands::Billing { json } => {
            let groups = api::billing_overview(repo)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&groups)?);
            } else if groups.is_empty() {
                println!("Нет данных для сводки");
            } else {
                groups.iter().for_each(|g| println!("{g}"));
            }
        }
        Commands::Pay {
            target,
            date,
            hours,
            kind,
        } => {
            let target = target.target()?;
            let input = kind.into_input()?;
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            let payment = api::register_payment(repo, &target, &input, date, hours)?;
            println!(
                "{} {} - {} ({})",
                date,
                payment.amount(),
                payment.description,
                payment.id
            );
        }
        Commands::History { target } => {
            let history = api::payment_history(repo, &target.target()?)?;
            print!("{history}");
        }
        Commands::EditPayment {
            id,
            amount,
            description,
            date,
            hours,
        } => {
            let edit = PaymentEdit {
                amount,
                description,
                payment_date: date,
                equivalent_hours: hours,
            };
            let payment = api::edit_payment(repo, &id, &edit)?;
            println!("{} - {} ({})", payment.amount(), payment.description, payment.id);
        }
        Commands::DeletePayment { id } => {
            api::delete_payment(repo, &id)?;
            println!("Платёж {id} удалён");
        }
        Commands::DeleteProject { id } => {
            api::delete_project(repo, &id)?;
            println!("Проект {id} удалён");
        }
        Commands::Hours { target } => {
            let summary = api::hours_summary(repo, &target.target()?)?;
            println!(
                "Бюджет: {} ч, списано: {} ч, осталось: {} ч",
                summary.budget, summary.used, summary.remaining
            );
        }
    }
    Ok(())
}

/// Запуск cli над хранилищем из `--data`
///
/// # Errors
/// Ошибки хранилища и расчёта платежа
///
/// returns: Result<(), Error>
pub fn run() -> Result<(), Error> {
    let cli = Cli::parse();
    logging::init(&cli.log_level);
    let root = data_dir(cli.data);
    debug!(root = %root.display(), "хранилище");
    let repo = FileSystem::init(&root)?;
    execute(&repo, cli.command)
}
