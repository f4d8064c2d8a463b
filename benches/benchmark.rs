use billing_ledger::core::billing::build_billing_groups;
use billing_ledger::core::payment::{PaymentContext, PaymentInput, ProjectScopeKind, compute_payment};
use billing_ledger::core::records::{Client, Contract, Payment, Project, Snapshot};
use billing_ledger::core::total::Billed;
use criterion::{Criterion, criterion_group, criterion_main};
use rust_decimal::Decimal;
use std::hint::black_box;

fn snapshot(size: usize) -> Snapshot {
    let mut s = Snapshot::default();
    for i in 0..size {
        let client_id = format!("cl{}", i % 50);
        s.clients.push(Client {
            id: client_id.clone(),
            name: Some(format!("Cliente {}", i % 50)),
            ..Default::default()
        });
        s.contracts.push(Contract {
            id: format!("c{i}"),
            client_id: Some(client_id),
            hourly_rate: Some(Decimal::from(80_000)),
            total_hours: Some(Decimal::from(100 + i)),
            ..Default::default()
        });
        s.projects.push(Project {
            id: format!("p{i}"),
            contract_id: Some(format!("c{i}")),
            name: format!("Proyecto {i}"),
            estimated_hours: Some(Decimal::from(20)),
            ..Default::default()
        });
        s.projects.push(Project {
            id: format!("i{i}"),
            is_independent: true,
            name: format!("Independiente {i}"),
            client_name: Some(format!("Cliente {}", i % 70)),
            total_amount: Some(Decimal::from(1_000_000)),
            ..Default::default()
        });
        for n in 0..5 {
            s.payments.push(Payment {
                id: format!("pay{i}-{n}"),
                contract_id: Some(format!("c{i}")),
                amount: Some(Decimal::from(150_000)),
                ..Default::default()
            });
        }
    }
    s
}

fn benchmark(c: &mut Criterion) {
    let s = snapshot(500);
    c.bench_function("billing_groups", |b| {
        b.iter(|| {
            build_billing_groups(
                black_box(&s.contracts),
                black_box(&s.projects),
                black_box(&s.payments),
                black_box(&s.clients),
            )
        });
    });

    let billed = Billed::Contract(&s.contracts[250]);
    let input = PaymentInput::ProjectScope {
        selected_project_id: Some("p250".to_string()),
        kind: ProjectScopeKind::Percentage { percentage: 35.5 },
        note: None,
    };
    c.bench_function("project_scope_payment", |b| {
        b.iter(|| compute_payment(black_box(&input), &PaymentContext::new(billed, &s)));
    });
}

criterion_group!(benches, benchmark);
criterion_main!(benches);
