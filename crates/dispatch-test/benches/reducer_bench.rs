//! Benchmarks for board reduction and encoding

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use dispatch_core::{Action, EntityId, State};
use dispatch_runtime::encode_sync;
use dispatch_state::{apply, CanonicalStore};

/// Board with `doctors` doctors spread over the built-in locations
fn staffed_board(doctors: u64) -> State {
    let mut store = CanonicalStore::default();
    let locations: Vec<EntityId> = store.current().locations.iter().map(|l| l.id.clone()).collect();
    for n in 0..doctors {
        store.dispatch(Action::add_doctor(format!("Dr. {n}"), "Urgences"));
        let id = store.current().doctors[n as usize].id.clone();
        let dest = locations[n as usize % locations.len()].clone();
        store.dispatch(Action::move_doctor(id, None, Some(dest)));
    }
    store.current().clone()
}

fn bench_move_doctor(c: &mut Criterion) {
    let board = staffed_board(100);
    let doctor = board.doctors[50].id.clone();

    c.bench_function("move_doctor_100", |b| {
        b.iter(|| {
            black_box(apply(
                &board,
                Action::move_doctor(doctor.clone(), None, Some(EntityId::new("intervention"))),
            ))
        })
    });
}

fn bench_delete_location(c: &mut Criterion) {
    let board = staffed_board(100);

    c.bench_function("delete_location_100", |b| {
        b.iter(|| black_box(apply(&board, Action::DeleteLocation(EntityId::new("repos")))))
    });
}

fn bench_load_data(c: &mut Criterion) {
    let board = staffed_board(200);

    c.bench_function("load_data_200", |b| {
        b.iter(|| black_box(apply(&State::initial(), Action::LoadData(board.clone()))))
    });
}

fn bench_store_dispatch(c: &mut Criterion) {
    let mut store = CanonicalStore::new(staffed_board(100));

    c.bench_function("store_dispatch_add_doctor", |b| {
        b.iter(|| {
            store.dispatch(black_box(Action::add_doctor("Dr. Bench", "Urgences")));
        })
    });
}

fn bench_encode_sync(c: &mut Criterion) {
    let board = staffed_board(100);

    c.bench_function("encode_sync_100", |b| {
        b.iter(|| black_box(encode_sync(black_box(&board))))
    });
}

criterion_group!(
    benches,
    bench_move_doctor,
    bench_delete_location,
    bench_load_data,
    bench_store_dispatch,
    bench_encode_sync
);
criterion_main!(benches);
