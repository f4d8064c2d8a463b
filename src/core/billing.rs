use std::collections::{HashMap, HashSet};
use std::fmt::{Display, Formatter};

use serde::Serialize;
use tracing::warn;

use crate::core::finance::{Money, Percentage};
use crate::core::records::{Client, Contract, Payment, Project, RecordId};
use crate::core::status::{PaymentStatus, classify, payment_percentage};
use crate::core::total::{Billed, contract_total, project_total, resolve_total};

pub const UNKNOWN_CLIENT: &str = "Cliente desconocido";
pub const INDEPENDENT_CLIENT: &str = "Cliente independiente";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Contract,
    Project,
}

/// Итоги оплаты одной сущности или группы
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub total_value: Money,
    pub paid_amount: Money,
    pub pending_amount: Money,
    pub payment_percentage: Percentage,
    pub payment_status: PaymentStatus,
}

impl Totals {
    pub fn new(total_value: Money, paid_amount: Money) -> Self {
        Self {
            total_value,
            paid_amount,
            pending_amount: Money::pending(total_value, paid_amount),
            payment_percentage: payment_percentage(paid_amount, total_value),
            payment_status: classify(paid_amount, total_value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BillingItem {
    pub id: RecordId,
    pub kind: ItemKind,
    pub label: String,
    #[serde(flatten)]
    pub totals: Totals,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BillingGroup {
    pub client_name: String,
    pub items: Vec<BillingItem>,
    #[serde(flatten)]
    pub totals: Totals,
}

impl BillingGroup {
    fn new(client_name: String) -> Self {
        Self {
            client_name,
            items: Vec::new(),
            totals: Totals::new(Money::ZERO, Money::ZERO),
        }
    }

    fn push(&mut self, item: BillingItem) {
        let (t, it) = (&mut self.totals, &item.totals);
        t.total_value = accumulate(t.total_value, it.total_value, &item.id);
        t.paid_amount = accumulate(t.paid_amount, it.paid_amount, &item.id);
        t.pending_amount = accumulate(t.pending_amount, it.pending_amount, &item.id);
        self.items.push(item);
    }

    fn recompute(&mut self) {
        self.totals.payment_percentage =
            payment_percentage(self.totals.paid_amount, self.totals.total_value);
        self.totals.payment_status = classify(self.totals.paid_amount, self.totals.total_value);
    }
}

impl Display for BillingGroup {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let t = &self.totals;
        writeln!(
            f,
            "📂 {:<30} {} / {} [{}] {}",
            self.client_name, t.paid_amount, t.total_value, t.payment_percentage, t.payment_status
        )?;
        let len = self.items.len();
        for (i, item) in self.items.iter().enumerate() {
            let prefix = if i + 1 == len { "└──" } else { "├──" };
            let it = &item.totals;
            writeln!(
                f,
                "{prefix} {:<27} {} / {} - pendiente {} [{}]",
                item.label, it.paid_amount, it.total_value, it.pending_amount, it.payment_status
            )?;
        }
        Ok(())
    }
}

/// Слагаемое, на котором сумма переполнилась, пропускается, а не роняет сводку
fn accumulate(acc: Money, amount: Money, id: &str) -> Money {
    acc.checked_add(amount).unwrap_or_else(|| {
        warn!(id, %amount, "переполнение суммы, слагаемое пропущено");
        acc
    })
}

fn paid_of<'a>(payments: impl IntoIterator<Item = &'a Payment>) -> Money {
    payments
        .into_iter()
        .fold(Money::ZERO, |acc, p| accumulate(acc, Money::new(p.amount()), &p.id))
}

/// Платежи, которые идут в зачёт контракта или проекта
///
/// Контракту засчитываются его собственные платежи и платежи его проектов:
/// проект под контрактом отдельной строкой в сводке не выводится.
pub fn billed_payments<'a>(
    billed: Billed<'_>,
    projects: &[Project],
    payments: &'a [Payment],
) -> Vec<&'a Payment> {
    let target = billed.target();
    let via_projects: HashSet<&str> = match billed {
        Billed::Contract(contract) => projects
            .iter()
            .filter(|p| p.is_contracted() && p.contract_id.as_deref() == Some(contract.id.as_str()))
            .map(|p| p.id.as_str())
            .collect(),
        Billed::Project(_) => HashSet::new(),
    };
    payments
        .iter()
        .filter(|p| {
            p.belongs_to(&target)
                || (p.contract_id.is_none()
                    && p.project_id.as_deref().is_some_and(|id| via_projects.contains(id)))
        })
        .collect()
}

fn client_name(clients: &[Client], client_id: Option<&RecordId>) -> String {
    client_id
        .and_then(|id| clients.iter().find(|c| &c.id == id))
        .and_then(|c| c.name.clone().or_else(|| c.company.clone()))
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// Битая стоимость не должна ронять всю сводку
fn total_or_zero(id: &str, total: Result<Money, impl Display>) -> Money {
    total.unwrap_or_else(|e| {
        warn!(id, "стоимость не рассчитана, считаю нулевой: {e}");
        Money::ZERO
    })
}

fn contract_item(contract: &Contract, projects: &[Project], payments: &[Payment]) -> BillingItem {
    let total = total_or_zero(&contract.id, contract_total(contract));
    let paid = paid_of(billed_payments(Billed::Contract(contract), projects, payments));
    BillingItem {
        id: contract.id.clone(),
        kind: ItemKind::Contract,
        label: contract.label(),
        totals: Totals::new(total, paid),
    }
}

fn project_item(project: &Project, payments: &[Payment]) -> BillingItem {
    let total = total_or_zero(&project.id, project_total(project, None));
    let paid = paid_of(billed_payments(Billed::Project(project), &[], payments));
    BillingItem {
        id: project.id.clone(),
        kind: ItemKind::Project,
        label: project.name.clone(),
        totals: Totals::new(total, paid),
    }
}

/// Сводка биллинга по клиентам
///
/// Контракты группируются по имени клиента, самостоятельные проекты - по
/// `client_name` проекта. Оплачено - сумма строк платежей, а не
/// сохранённое `billed_amount`; платежи проектов под контрактом идут в зачёт
/// контракта. Группы идут в порядке первого появления.
///
/// Никогда не падает: битые записи дают нулевые суммы и имя-заглушку.
pub fn build_billing_groups(
    contracts: &[Contract],
    projects: &[Project],
    payments: &[Payment],
    clients: &[Client],
) -> Vec<BillingGroup> {
    let mut groups: Vec<BillingGroup> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut add = |name: String, item: BillingItem| {
        let idx = *index.entry(name.clone()).or_insert_with(|| {
            groups.push(BillingGroup::new(name));
            groups.len() - 1
        });
        groups[idx].push(item);
    };

    for contract in contracts {
        let name = client_name(clients, contract.client_id.as_ref());
        add(name, contract_item(contract, projects, payments));
    }

    for project in projects.iter().filter(|p| p.is_independent) {
        let name = project
            .client_name
            .clone()
            .unwrap_or_else(|| INDEPENDENT_CLIENT.to_string());
        add(name, project_item(project, payments));
    }

    for group in &mut groups {
        group.recompute();
    }
    groups
}

/// Сводка, упорядоченная по имени клиента
pub fn sorted_billing_groups(
    contracts: &[Contract],
    projects: &[Project],
    payments: &[Payment],
    clients: &[Client],
) -> Vec<BillingGroup> {
    let mut groups = build_billing_groups(contracts, projects, payments, clients);
    groups.sort_by(|a, b| a.client_name.cmp(&b.client_name));
    groups
}

/// История платежей одной сущности, новые сверху
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentHistory {
    pub target: RecordId,
    pub payments: Vec<Payment>,
    #[serde(flatten)]
    pub totals: Totals,
}

impl Display for PaymentHistory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let t = &self.totals;
        writeln!(f, "Historial de pagos {}:", self.target)?;
        writeln!(f, "├── Valor total: {}", t.total_value)?;
        writeln!(f, "├── Pagado:      {} [{}]", t.paid_amount, t.payment_percentage)?;
        writeln!(f, "├── Pendiente:   {}", t.pending_amount)?;
        writeln!(f, "├── Estado:      {}", t.payment_status)?;
        let len = self.payments.len();
        if len == 0 {
            return writeln!(f, "└── (sin pagos)");
        }
        for (i, p) in self.payments.iter().enumerate() {
            let prefix = if i + 1 == len { "└──" } else { "├──" };
            let date = p
                .payment_date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "----------".to_string());
            writeln!(
                f,
                "{prefix} {date} {:<14} {} ({})",
                Money::new(p.amount()).to_string(),
                p.description,
                p.id
            )?;
        }
        Ok(())
    }
}

/// Собирает историю платежей контракта или проекта
pub fn payment_history(
    billed: Billed<'_>,
    linked_contract: Option<&Contract>,
    projects: &[Project],
    payments: &[Payment],
) -> PaymentHistory {
    let mut own: Vec<Payment> = billed_payments(billed, projects, payments)
        .into_iter()
        .cloned()
        .collect();
    own.sort_by(|a, b| b.payment_date.cmp(&a.payment_date));

    let total = total_or_zero(billed.id(), resolve_total(billed, linked_contract));
    let paid = paid_of(&own);
    PaymentHistory {
        target: billed.id().to_string(),
        payments: own,
        totals: Totals::new(total, paid),
    }
}
