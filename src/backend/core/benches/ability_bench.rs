//! Ability benchmarks. Run with: cargo bench --bench ability_bench
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use saas_core::rbac::{
    parse_subject, AbilityBuilder, Action, Condition, EvaluationSettings, MembershipResolver,
    PolicyEngine, ResourceType, Role, User, UserId,
};
use saas_core::store::{InMemoryStore, OrganizationDetails, OrganizationStore};

fn bench_build_ability(c: &mut Criterion) {
    let mut g = c.benchmark_group("ability_build");
    g.measurement_time(Duration::from_secs(5));
    let engine = PolicyEngine::standard();
    let user = User::new("123");
    for role in Role::all() {
        g.bench_with_input(BenchmarkId::new("role", role), &role, |b, &role| {
            b.iter(|| black_box(engine.build_ability(&user, role).unwrap()));
        });
    }
    g.finish();
}

fn bench_check(c: &mut Criterion) {
    let mut g = c.benchmark_group("ability_check");
    g.measurement_time(Duration::from_secs(5));
    let engine = PolicyEngine::standard();
    let admin = engine.build_ability(&User::new("123"), Role::Admin).unwrap();
    let owned = parse_subject(ResourceType::Organization, &json!({ "id": "1", "ownerId": "123" })).unwrap();
    let foreign = parse_subject(ResourceType::Organization, &json!({ "id": "2", "ownerId": "456" })).unwrap();

    g.bench_function("bare_type_allow", |b| b.iter(|| black_box(admin.can(Action::Get, ResourceType::Project))));
    g.bench_function("bare_type_deny", |b| b.iter(|| black_box(admin.can(Action::Update, ResourceType::Organization))));
    g.bench_function("owned_instance_allow", |b| b.iter(|| black_box(admin.can(Action::Update, &owned))));
    g.bench_function("foreign_instance_deny", |b| b.iter(|| black_box(admin.can(Action::Update, &foreign))));
    g.finish();
}

fn bench_rule_count(c: &mut Criterion) {
    let mut g = c.benchmark_group("ability_rule_count");
    g.measurement_time(Duration::from_secs(5));
    let subject = parse_subject(ResourceType::Project, &json!({ "id": "p", "ownerId": "u-0" })).unwrap();
    for &n in &[1usize, 10, 100, 1000] {
        let mut builder = AbilityBuilder::new();
        builder.can([Action::Get], ResourceType::Project);
        for i in 0..n {
            builder.cannot_when(
                [Action::Delete],
                ResourceType::Project,
                Condition::field("ownerId").eq(format!("u-{}", i + 1)),
            );
        }
        let ability = builder.build(EvaluationSettings::default());
        g.throughput(Throughput::Elements(n as u64));
        // every deny condition fails, so the scan walks the full rule list
        g.bench_with_input(BenchmarkId::new("fallthrough", n), &ability, |b, ability| {
            b.iter(|| black_box(ability.can(Action::Delete, &subject)));
        });
    }
    g.finish();
}

fn bench_resolve_context(c: &mut Criterion) {
    let mut g = c.benchmark_group("ability_resolve");
    g.measurement_time(Duration::from_secs(5));
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = Arc::new(InMemoryStore::new());
    let owner = UserId::new("123");
    rt.block_on(async {
        store
            .create_organization(&owner, OrganizationDetails { name: "Acme".into(), domain: None, should_attach_users_by_domain: false })
            .await
            .unwrap();
    });
    let engine = PolicyEngine::standard();

    g.bench_function("membership_and_ability", |b| {
        b.to_async(&rt).iter(|| async {
            let ctx = store.resolve_membership(&owner, "acme").await.unwrap();
            black_box(engine.build_ability(&User::new(owner.clone()), ctx.membership.role).unwrap())
        });
    });
    g.finish();
}

criterion_group!(benches, bench_build_ability, bench_check, bench_rule_count, bench_resolve_context);
criterion_main!(benches);
