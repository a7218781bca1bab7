//! Benchmarks for moving tasks on a populated board
//!
//! Measures a same-column reorder and a cross-column transfer against both
//! storage backends, with the source column holding a few hundred tasks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use taskboard::test_support::{add_tasks, board, memory_manager, sqlite_manager, USER};
use taskboard::{BoardManager, ColumnId, TaskId};
use tempfile::TempDir;
use tokio::runtime::Runtime;

const COLUMN_SIZES: [usize; 3] = [10, 100, 500];

struct Populated {
    manager: BoardManager,
    todo: ColumnId,
    doing: ColumnId,
    tasks: Vec<TaskId>,
}

async fn populate(manager: BoardManager, size: usize) -> Populated {
    let view = board(&manager).await;
    let todo = view.columns[0].column.id.clone();
    let doing = view.columns[1].column.id.clone();
    let names: Vec<String> = (0..size).map(|i| format!("task-{i}")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let tasks = add_tasks(&manager, &todo, &refs)
        .await
        .into_iter()
        .map(|t| t.id)
        .collect();
    Populated {
        manager,
        todo,
        doing,
        tasks,
    }
}

/// Move the last task to the head of its column and back
fn bench_reorder(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("reorder");

    for size in COLUMN_SIZES {
        let (_, manager) = memory_manager();
        let populated = rt.block_on(populate(manager, size));
        let last = populated.tasks[size - 1].clone();

        group.bench_with_input(BenchmarkId::new("memory", size), &size, |b, &size| {
            b.to_async(&rt).iter(|| async {
                let to_head = populated
                    .manager
                    .move_task(&last, &populated.todo, Some(0), &USER.into())
                    .await
                    .unwrap();
                let to_tail = populated
                    .manager
                    .move_task(&last, &populated.todo, Some(size), &USER.into())
                    .await
                    .unwrap();
                black_box((to_head, to_tail));
            });
        });
    }

    group.finish();
}

/// Transfer the head task to another column and back
fn bench_transfer(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("transfer");
    let temp = TempDir::new().unwrap();

    for size in COLUMN_SIZES {
        let sqlite = sqlite_manager(&temp.path().join(format!("bench-{size}.db")));
        let (_, memory) = memory_manager();

        for (backend, manager) in [("memory", memory), ("sqlite", sqlite)] {
            let populated = rt.block_on(populate(manager, size));
            let head = populated.tasks[0].clone();

            group.bench_with_input(BenchmarkId::new(backend, size), &size, |b, _| {
                b.to_async(&rt).iter(|| async {
                    let out = populated
                        .manager
                        .move_task(&head, &populated.doing, None, &USER.into())
                        .await
                        .unwrap();
                    let back = populated
                        .manager
                        .move_task(&head, &populated.todo, Some(0), &USER.into())
                        .await
                        .unwrap();
                    black_box((out, back));
                });
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_reorder, bench_transfer);
criterion_main!(benches);
