use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::core::records::{Project, RecordId, TimeEntry};
use crate::core::total::Billed;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HoursError {
    #[error("project {id} has {count} time entries and cannot be deleted")]
    ProjectHasTimeEntries { id: RecordId, count: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HoursSummary {
    pub budget: Decimal,
    pub used: Decimal,
    pub remaining: Decimal,
}

/// Сколько часов уже списано на контракт или проект.
/// Запись, на которой сумма переполнилась, пропускается.
pub fn used_hours(billed: Billed<'_>, entries: &[TimeEntry]) -> Decimal {
    let target = billed.target();
    entries
        .iter()
        .filter(|e| e.belongs_to(&target))
        .fold(Decimal::ZERO, |acc, e| {
            let hours = e.hours_used.unwrap_or_default();
            acc.checked_add(hours).unwrap_or_else(|| {
                warn!(id = %e.id, %hours, "переполнение часов, запись пропущена");
                acc
            })
        })
}

pub fn hours_summary(billed: Billed<'_>, entries: &[TimeEntry]) -> HoursSummary {
    let budget = match billed {
        Billed::Contract(c) => c.total_hours(),
        Billed::Project(p) => p.estimated_hours(),
    };
    let used = used_hours(billed, entries);
    HoursSummary {
        budget,
        used,
        remaining: budget.checked_sub(used).unwrap_or_default().max(Decimal::ZERO),
    }
}

/// Проект с записями времени удалять нельзя
///
/// # Errors
/// `ProjectHasTimeEntries` - на проект ссылается хотя бы одна запись
pub fn ensure_deletable(project: &Project, entries: &[TimeEntry]) -> Result<(), HoursError> {
    let count = entries
        .iter()
        .filter(|e| e.project_id.as_ref() == Some(&project.id))
        .count();
    if count > 0 {
        return Err(HoursError::ProjectHasTimeEntries {
            id: project.id.clone(),
            count,
        });
    }
    Ok(())
}

#[cfg(test)]
mod test_hours {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::core::records::Contract;

    fn entry(id: &str, project: Option<&str>, contract: Option<&str>, hours: Option<Decimal>) -> TimeEntry {
        TimeEntry {
            id: id.to_string(),
            project_id: project.map(str::to_string),
            contract_id: contract.map(str::to_string),
            hours_used: hours,
            ..Default::default()
        }
    }

    #[test]
    fn contract_hours() {
        let contract = Contract {
            id: "c1".to_string(),
            total_hours: Some(dec!(40)),
            ..Default::default()
        };
        let entries = [
            entry("1", None, Some("c1"), Some(dec!(12.5))),
            entry("2", None, Some("c1"), None),
            entry("3", None, Some("c2"), Some(dec!(100))),
        ];
        assert_eq!(
            hours_summary(Billed::Contract(&contract), &entries),
            HoursSummary {
                budget: dec!(40),
                used: dec!(12.5),
                remaining: dec!(27.5),
            }
        );
    }

    #[test]
    fn remaining_never_negative() {
        let project = Project {
            id: "p1".to_string(),
            estimated_hours: Some(dec!(5)),
            ..Default::default()
        };
        let entries = [entry("1", Some("p1"), None, Some(dec!(8)))];
        let summary = hours_summary(Billed::Project(&project), &entries);
        assert_eq!(summary.used, dec!(8));
        assert_eq!(summary.remaining, Decimal::ZERO);
    }

    #[test]
    fn overflowing_entries_are_skipped() {
        let project = Project {
            id: "p1".to_string(),
            estimated_hours: Some(dec!(5)),
            ..Default::default()
        };
        let entries = [
            entry("1", Some("p1"), None, Some(Decimal::MAX)),
            entry("2", Some("p1"), None, Some(Decimal::MAX)),
            entry("3", Some("p1"), None, Some(dec!(1))),
        ];
        let summary = hours_summary(Billed::Project(&project), &entries);
        assert_eq!(summary.used, Decimal::MAX);
        assert_eq!(summary.remaining, Decimal::ZERO);
    }

    #[test]
    fn deletion_guard() {
        let project = Project {
            id: "p1".to_string(),
            ..Default::default()
        };
        assert_eq!(ensure_deletable(&project, &[]), Ok(()));
        let entries = [entry("1", Some("p1"), None, Some(dec!(1))), entry("2", Some("p1"), None, None)];
        assert_eq!(
            ensure_deletable(&project, &entries),
            Err(HoursError::ProjectHasTimeEntries {
                id: "p1".to_string(),
                count: 2
            })
        );
    }
}
