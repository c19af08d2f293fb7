use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::Utc;
use lotledger_catalog::{Article, Depot, InMemoryCatalog};
use lotledger_core::{ArticleId, CurrencyCode, DepotId};
use lotledger_infra::{EngineConfig, InventoryEngine};
use lotledger_inventory::{EntryLine, LotAllocation, MovementKind, Quantity, TransferLine};
use lotledger_valuation::{RateTable, StaticRateProvider};
use rust_decimal::Decimal;
use std::sync::Arc;

struct Bench {
    engine: InventoryEngine,
    article: ArticleId,
    source: DepotId,
    destination: DepotId,
}

fn setup() -> Bench {
    let catalog = InMemoryCatalog::new();
    let article = ArticleId::new();
    let source = DepotId::new();
    let destination = DepotId::new();
    catalog.register_article(
        Article::new(article, "SEICHE-M", Decimal::from(20), Decimal::from(10), CurrencyCode::mru()).unwrap(),
    );
    catalog.register_depot(Depot::new(source, "NDB", "Nouadhibou").unwrap());
    catalog.register_depot(Depot::new(destination, "NKC", "Nouakchott").unwrap());

    let rates = RateTable::identity(CurrencyCode::mru(), Utc::now().date_naive());
    Bench {
        engine: InventoryEngine::new(
            EngineConfig::default(),
            Arc::new(catalog),
            Arc::new(StaticRateProvider::new(rates)),
        ),
        article,
        source,
        destination,
    }
}

impl Bench {
    fn entry(&self, kg: i64, cost: i64) -> MovementKind {
        MovementKind::Entry {
            depot_id: self.source,
            lines: vec![EntryLine {
                article_id: self.article,
                quantity: Quantity::Kg(Decimal::from(kg)),
                unit_cost: Decimal::from(cost),
                currency: None,
                batch_number: None,
                quarantined: false,
            }],
        }
    }

    fn fifo_transfer(&self, kg: i64) -> MovementKind {
        MovementKind::Transfer {
            source_depot: self.source,
            destination_depot: self.destination,
            lines: vec![TransferLine {
                article_id: self.article,
                quantity: Quantity::Kg(Decimal::from(kg)),
                allocation: LotAllocation::Fifo,
            }],
        }
    }
}

fn bench_entry_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("entry_latency");
    group.throughput(Throughput::Elements(1));

    let bench = setup();
    let mut cost = 0i64;
    group.bench_function("entry_single_line", |b| {
        b.iter(|| {
            cost = cost % 50 + 1;
            black_box(bench.engine.submit(bench.entry(100, cost)).unwrap());
        });
    });

    group.finish();
}

fn bench_fifo_transfer(c: &mut Criterion) {
    let mut group = c.benchmark_group("fifo_transfer");

    for lots in [10i64, 100, 1_000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(lots), lots, |b, &lots| {
            b.iter_batched(
                || {
                    let bench = setup();
                    for i in 0..lots {
                        bench.engine.submit(bench.entry(10, i % 40 + 1)).unwrap();
                    }
                    bench
                },
                |bench| {
                    // Spans every lot.
                    black_box(bench.engine.submit(bench.fifo_transfer(lots * 10)).unwrap());
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

fn bench_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("replay");

    for movements in [100i64, 1_000].iter() {
        let bench = setup();
        for i in 0..*movements {
            bench.engine.submit(bench.entry(10, i % 40 + 1)).unwrap();
        }
        group.throughput(Throughput::Elements(*movements as u64));
        group.bench_with_input(BenchmarkId::from_parameter(movements), &bench, |b, bench| {
            b.iter(|| black_box(bench.engine.verify_replay().unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_entry_latency, bench_fifo_transfer, bench_replay);
criterion_main!(benches);
