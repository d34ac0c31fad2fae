use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use mapd_sql::plan::translate_query;
use mapd_sql::rel::to_rel;

mod bench_support;
use bench_support::BenchCtx;

const QUERIES: &[(&str, &str)] = &[
    ("filter", "select ename, sal * 2 from emp where deptno = 10 and comm is not null"),
    ("join", "select e.ename, d.dname from emp e join dept d on e.deptno = d.deptno where d.loc like 'N%'"),
    ("group_by", "select deptno, count(*) as c, avg(sal) from emp group by deptno having count(*) > 1 order by c desc"),
    ("star", "select * from emp e left join dept d on e.deptno = d.deptno order by 1"),
];

fn bench_validate(c: &mut Criterion) {
    let ctx = BenchCtx::new().expect("bench ctx");
    let mut group = c.benchmark_group("validate");
    group.throughput(Throughput::Elements(1));

    for (name, sql) in QUERIES {
        group.bench_with_input(BenchmarkId::new("base", name), sql, |b, sql| {
            b.iter(|| ctx.base.validate_sql(sql).expect("validate"));
        });
        group.bench_with_input(BenchmarkId::new("expanding", name), sql, |b, sql| {
            b.iter(|| ctx.expanding.validate_sql(sql).expect("validate"));
        });
    }
    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let ctx = BenchCtx::new().expect("bench ctx");
    let sql = "select deptno, count(*) as c, sum(sal) from emp where sal > 100 group by deptno order by c desc limit 10";
    let mut group = c.benchmark_group("pipeline");

    // SQL -> relational algebra -> plan
    group.bench_function("sql_to_plan", |b| {
        b.iter(|| {
            let validated = ctx.expanding.validate_sql(sql).expect("validate");
            let json = to_rel(&validated).and_then(|r| r.to_json()).expect("rel");
            translate_query(&json, ctx.catalog.as_ref()).expect("plan")
        });
    });
    let json = ctx.expanding.validate_sql(sql).and_then(|v| to_rel(&v)).and_then(|r| r.to_json()).expect("rel");
    group.bench_function("translate_only", |b| {
        b.iter(|| translate_query(&json, ctx.catalog.as_ref()).expect("plan"));
    });
    group.finish();
}

criterion_group!(benches, bench_validate, bench_pipeline);
criterion_main!(benches);
