use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use dipchat_core::chat::{
    ChatService, GameId, InMemoryGameDirectory, Nation, Nations, SendMessage,
    StaticVariantRegistry, Timestamp, UserId, CLASSICAL,
};
use dipchat_core::config::{ChatConfig, StoreConfig};
use dipchat_core::storage::{ChatStore, MemoryChatStore, SqliteChatStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

const GAME: GameId = GameId(1);
const SEATS: [(&str, &str); 7] = [
    ("u-aus", "Austria"),
    ("u-eng", "England"),
    ("u-fra", "France"),
    ("u-ger", "Germany"),
    ("u-ita", "Italy"),
    ("u-rus", "Russia"),
    ("u-tur", "Turkey"),
];

fn build_service<S: ChatStore + 'static>(runtime: &Runtime, store: S, config: ChatConfig) -> ChatService<S> {
    let games = InMemoryGameDirectory::new();
    runtime.block_on(async {
        games.add_game(GAME, CLASSICAL).await;
        for (user, nation) in SEATS {
            games
                .add_player(GAME, UserId::new(user), Nation::from(nation))
                .await
                .unwrap();
        }
    });

    ChatService::new(
        Arc::new(store),
        Arc::new(games),
        Arc::new(StaticVariantRegistry::classical()),
        config,
    )
}

fn sqlite_store(dir: &tempfile::TempDir) -> SqliteChatStore {
    let config = StoreConfig {
        db_path: dir.path().join("bench.db"),
        ..StoreConfig::default()
    };
    SqliteChatStore::open(&config).unwrap()
}

/// Every two-nation channel England takes part in
fn england_pairs() -> Vec<Nations> {
    SEATS
        .iter()
        .filter(|(_, nation)| *nation != "England")
        .map(|(_, nation)| Nations::new([Nation::from("England"), Nation::from(*nation)]))
        .collect()
}

fn bench_create_message(c: &mut Criterion) {
    let mut group = c.benchmark_group("create_message");
    group.measurement_time(Duration::from_secs(10));
    group.throughput(Throughput::Elements(1));

    let runtime = Runtime::new().unwrap();
    let england = &UserId::new("u-eng");
    let members: &Nations = &"England,France".parse().unwrap();

    let memory = &build_service(&runtime, MemoryChatStore::new(), ChatConfig::default());
    group.bench_function("memory", |b| {
        b.to_async(&runtime).iter(|| async move {
            let message = memory
                .create_message(Some(england), GAME, SendMessage::new(members.clone(), "bench"))
                .await
                .unwrap();
            black_box(message)
        });
    });

    let dir = tempfile::tempdir().unwrap();
    let sqlite = &build_service(&runtime, sqlite_store(&dir), ChatConfig::default());
    group.bench_function("sqlite", |b| {
        b.to_async(&runtime).iter(|| async move {
            let message = sqlite
                .create_message(Some(england), GAME, SendMessage::new(members.clone(), "bench"))
                .await
                .unwrap();
            black_box(message)
        });
    });

    group.finish();
}

fn bench_list_channels_since(c: &mut Criterion) {
    let mut group = c.benchmark_group("list_channels_since");
    group.measurement_time(Duration::from_secs(10));

    let runtime = Runtime::new().unwrap();
    let england = &UserId::new("u-eng");
    let dir = tempfile::tempdir().unwrap();
    let cutoff = Timestamp::now();

    for concurrency in [1usize, 4, 16] {
        let config = ChatConfig {
            count_concurrency: concurrency,
            ..ChatConfig::default()
        };
        let db = tempfile::tempdir_in(dir.path()).unwrap();
        let service = &build_service(&runtime, sqlite_store(&db), config);

        runtime.block_on(async {
            for members in england_pairs() {
                for _ in 0..50 {
                    service
                        .create_message(Some(england), GAME, SendMessage::new(members.clone(), "seed"))
                        .await
                        .unwrap();
                }
            }
        });

        group.bench_with_input(
            BenchmarkId::new("sqlite", concurrency),
            &concurrency,
            |b, _| {
                b.to_async(&runtime).iter(|| async move {
                    let channels = service
                        .list_channels(Some(england), GAME, Some(cutoff))
                        .await
                        .unwrap();
                    black_box(channels)
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_create_message, bench_list_channels_since);
criterion_main!(benches);
