use criterion::{Criterion, black_box, criterion_group, criterion_main};

use driftdb_protocol::Value;
use driftdb_storage::{Db, MemoryPersistor};

fn bench_set_get_sequential(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("set_get_sequential_10k", |b| {
        b.iter(|| {
            rt.block_on(async {
                let db = Db::start(MemoryPersistor::new());
                for i in 0..10_000 {
                    let key = format!("key:{i}");
                    let value = Value::string(&format!("value:{i}"));
                    db.set(key.clone(), value, None).await.unwrap();
                    black_box(db.get(&key).await.unwrap());
                }
            });
        })
    });
}

fn bench_incr_sequential(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("incr_sequential_10k", |b| {
        b.iter(|| {
            rt.block_on(async {
                let db = Db::start(MemoryPersistor::new());
                for _ in 0..10_000 {
                    black_box(db.incr("counter").await.unwrap());
                }
            });
        })
    });
}

fn bench_incr_concurrent(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("incr_concurrent_4_tasks_10k", |b| {
        b.iter(|| {
            rt.block_on(async {
                let db = Db::start(MemoryPersistor::new());
                let mut handles = Vec::new();

                for _ in 0..4 {
                    let db = db.clone();
                    handles.push(tokio::spawn(async move {
                        for _ in 0..2_500 {
                            black_box(db.incr("counter").await.unwrap());
                        }
                    }));
                }

                for h in handles {
                    h.await.unwrap();
                }
            });
        })
    });
}

fn bench_rpush_1k(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("rpush_1k", |b| {
        b.iter(|| {
            rt.block_on(async {
                let db = Db::start(MemoryPersistor::new());
                for i in 0..1_000 {
                    db.rpush("list", Value::string(&format!("item:{i}")))
                        .await
                        .unwrap();
                }
                black_box(db.get("list").await.unwrap());
            });
        })
    });
}

fn bench_save_10k_keys(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let db = rt.block_on(async {
        let db = Db::start(MemoryPersistor::new());
        for i in 0..10_000 {
            db.set(format!("key:{i}"), Value::string("value"), None)
                .await
                .unwrap();
        }
        db
    });

    c.bench_function("save_10k_keys", |b| {
        b.iter(|| rt.block_on(async { db.save().await.unwrap() }))
    });
}

criterion_group!(
    benches,
    bench_set_get_sequential,
    bench_incr_sequential,
    bench_incr_concurrent,
    bench_rpush_1k,
    bench_save_10k_keys,
);
criterion_main!(benches);
