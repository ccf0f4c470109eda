// tests/transaction.rs

//! Transaction engine integration tests: real archives, a real image
//! tree, and the SQLite state database.

mod common;

use common::PackageBuilder;
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use zpm::cache::Cache;
use zpm::db::StateDb;
use zpm::repo::Repo;
use zpm::solver::{Operation, OperationKind, Policy, Request, Solution, Solver};
use zpm::template::Scope;
use zpm::transaction::{installed_packages, Transaction};
use zpm::{Error, Pool, Requirement};

struct Fixture {
    image: TempDir,
    _cache_dir: TempDir,
    cache: Cache,
    state: StateDb,
}

impl Fixture {
    fn new() -> Self {
        let image = TempDir::new().unwrap();
        let cache_dir = TempDir::new().unwrap();
        let cache = Cache::open(cache_dir.path()).unwrap();
        let state = StateDb::open_in_memory().unwrap();
        Self {
            image,
            _cache_dir: cache_dir,
            cache,
            state,
        }
    }

    fn stage(&self, builder: &PackageBuilder) {
        builder.write_to(self.cache.root());
    }

    fn install_solution(&self, builders: &[&PackageBuilder]) -> Solution {
        let mut solution = Solution::new();
        for builder in builders {
            solution.push(Operation::new(OperationKind::Install, builder.package()));
        }
        solution
    }

    fn transaction(&self) -> Transaction<'_> {
        Transaction::new(self.image.path(), &self.cache, &self.state, Scope::new())
    }

    /// Solve against the current installed state plus one remote repo.
    fn solve(&self, remote: Vec<zpm::Package>, request: &Request) -> Result<Solution, Error> {
        let installed = Repo::installed(installed_packages(&self.state).unwrap());
        let main = Repo::new("main", "file:///repo", 10, true, remote);
        let pool = Pool::new(installed, vec![main]).unwrap();
        Solver::new(&pool, Policy::Updated).solve(request)
    }
}

#[test]
fn install_realizes_tree_and_state() {
    let fx = Fixture::new();
    let pkg = PackageBuilder::new("demo", "1.0.0")
        .dir("/usr")
        .dir("/usr/bin")
        .file("/usr/bin/demo", b"#!/bin/sh\nexit 0\n")
        .symlink("/usr/bin/d", "demo");
    fx.stage(&pkg);

    let mut tx = fx.transaction();
    tx.realize(&fx.install_solution(&[&pkg])).unwrap();

    let binary = fx.image.path().join("usr/bin/demo");
    assert_eq!(fs::read(&binary).unwrap(), b"#!/bin/sh\nexit 0\n");
    assert_eq!(
        fs::read_link(fx.image.path().join("usr/bin/d"))
            .unwrap()
            .to_string_lossy(),
        "demo"
    );

    assert!(fx.state.packages_get("demo").unwrap().is_some());
    let claims = fx.state.objects_get("/usr/bin/demo").unwrap();
    assert_eq!(claims.len(), 1);
    assert_eq!(claims[0].pkg, "demo");

    let log = fx.state.transactions_all().unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].operation, "install");
    assert_eq!(log[0].pkg_id, "demo@1.0.0");
}

#[test]
fn remove_unwinds_tree_and_state() {
    let fx = Fixture::new();
    let pkg = PackageBuilder::new("demo", "1.0.0")
        .dir("/usr")
        .dir("/usr/bin")
        .file("/usr/bin/demo", b"bin");
    fx.stage(&pkg);

    let mut tx = fx.transaction();
    tx.realize(&fx.install_solution(&[&pkg])).unwrap();

    let mut request = Request::new();
    request.remove(Requirement::parse("demo").unwrap());
    let solution = fx.solve(Vec::new(), &request).unwrap();

    let mut tx = fx.transaction();
    tx.realize(&solution).unwrap();

    assert!(!fx.image.path().join("usr/bin/demo").exists());
    assert!(!fx.image.path().join("usr").exists());
    assert!(fx.state.packages_get("demo").unwrap().is_none());
    assert!(fx.state.objects_get("/usr/bin/demo").unwrap().is_empty());
}

#[test]
fn remove_leaves_shared_directories() {
    let fx = Fixture::new();
    let a = PackageBuilder::new("a", "1.0.0")
        .dir("/usr")
        .dir("/usr/bin")
        .file("/usr/bin/a", b"a");
    let b = PackageBuilder::new("b", "1.0.0")
        .dir("/usr")
        .dir("/usr/bin")
        .file("/usr/bin/b", b"b");
    fx.stage(&a);
    fx.stage(&b);

    let mut tx = fx.transaction();
    tx.realize(&fx.install_solution(&[&a, &b])).unwrap();

    let mut request = Request::new();
    request.remove(Requirement::parse("a").unwrap());
    let solution = fx.solve(Vec::new(), &request).unwrap();
    fx.transaction().realize(&solution).unwrap();

    // b still owns /usr/bin, so the directories stay
    assert!(!fx.image.path().join("usr/bin/a").exists());
    assert!(fx.image.path().join("usr/bin/b").is_file());
    assert_eq!(fx.state.objects_get("/usr/bin").unwrap().len(), 1);
}

#[test]
fn solution_path_conflict_aborts_before_mutation() {
    let fx = Fixture::new();
    let p = PackageBuilder::new("p", "1.0.0")
        .dir("/etc")
        .file("/etc/x", b"from p");
    let q = PackageBuilder::new("q", "1.0.0")
        .dir("/etc")
        .file("/etc/x", b"from q");
    fx.stage(&p);
    fx.stage(&q);

    let mut tx = fx.transaction();
    let err = tx.realize(&fx.install_solution(&[&p, &q])).unwrap_err();

    match err {
        Error::PackageConflict(pkg_a, _, path, pkg_b, _) => {
            assert_eq!(path, "/etc/x");
            assert_eq!(pkg_a, "p");
            assert_eq!(pkg_b, "q");
        }
        other => panic!("expected package conflict, got {:?}", other),
    }

    // No mutation happened
    assert!(!fx.image.path().join("etc/x").exists());
    assert!(fx.state.packages_get("p").unwrap().is_none());
    assert!(fx.state.transactions_all().unwrap().is_empty());
}

#[test]
fn shared_dir_claims_are_not_conflicts() {
    let fx = Fixture::new();
    let a = PackageBuilder::new("a", "1.0.0").dir("/opt").file("/opt/a", b"a");
    let b = PackageBuilder::new("b", "1.0.0").dir("/opt").file("/opt/b", b"b");
    fx.stage(&a);
    fx.stage(&b);

    let mut tx = fx.transaction();
    tx.realize(&fx.install_solution(&[&a, &b])).unwrap();

    assert_eq!(fx.state.objects_get("/opt").unwrap().len(), 2);
}

#[test]
fn image_path_conflict_aborts() {
    let fx = Fixture::new();
    let p = PackageBuilder::new("p", "1.0.0").dir("/etc").file("/etc/x", b"p");
    fx.stage(&p);
    fx.transaction().realize(&fx.install_solution(&[&p])).unwrap();

    let q = PackageBuilder::new("q", "1.0.0").dir("/etc").file("/etc/x", b"q");
    fx.stage(&q);
    let err = fx
        .transaction()
        .realize(&fx.install_solution(&[&q]))
        .unwrap_err();

    match err {
        Error::ImageConflict(_, path, installed, candidate) => {
            assert_eq!(path, "/etc/x");
            assert_eq!(installed, "p");
            assert_eq!(candidate, "q");
        }
        other => panic!("expected image conflict, got {:?}", other),
    }

    assert_eq!(fs::read(fx.image.path().join("etc/x")).unwrap(), b"p");
    assert!(fx.state.packages_get("q").unwrap().is_none());
}

#[test]
fn upgrade_is_paired_under_one_tx_id() {
    let fx = Fixture::new();
    let old = PackageBuilder::new("app", "1.0.0")
        .dir("/usr")
        .dir("/usr/bin")
        .file("/usr/bin/app", b"old");
    fx.stage(&old);
    fx.transaction().realize(&fx.install_solution(&[&old])).unwrap();

    let new = PackageBuilder::new("app", "1.1.0")
        .dir("/usr")
        .dir("/usr/bin")
        .file("/usr/bin/app", b"new");
    fx.stage(&new);

    let mut request = Request::new();
    request.install(Requirement::parse("app>=1.1").unwrap());
    let solution = fx.solve(vec![new.package()], &request).unwrap();

    let kinds: Vec<String> = solution.operations().iter().map(|o| o.to_string()).collect();
    assert_eq!(kinds, vec!["remove app@1.0.0", "install app@1.1.0"]);

    let mut tx = fx.transaction();
    let tx_id = tx.id().to_string();
    tx.realize(&solution).unwrap();

    assert_eq!(fs::read(fx.image.path().join("usr/bin/app")).unwrap(), b"new");

    let entries = fx.state.transactions_get(&tx_id).unwrap();
    let rendered: Vec<String> = entries
        .iter()
        .map(|e| format!("{} {}", e.operation, e.pkg_id))
        .collect();
    assert_eq!(rendered, vec!["remove app@1.0.0", "install app@1.1.0"]);
}

#[test]
fn replay_is_a_noop() {
    let fx = Fixture::new();
    let pkg = PackageBuilder::new("demo", "1.0.0")
        .dir("/usr")
        .file("/usr/demo", b"demo");
    fx.stage(&pkg);
    fx.transaction().realize(&fx.install_solution(&[&pkg])).unwrap();

    let log_before = fx.state.transactions_all().unwrap().len();

    // Re-solving the same request against the updated image yields noop
    let mut request = Request::new();
    request.install(Requirement::parse("demo").unwrap());
    let solution = fx.solve(vec![pkg.package()], &request).unwrap();
    assert!(solution
        .operations()
        .iter()
        .all(|op| op.kind == OperationKind::Noop));

    fx.transaction().realize(&solution).unwrap();
    assert_eq!(fx.state.transactions_all().unwrap().len(), log_before);
}

#[test]
fn template_renders_during_install() {
    let fx = Fixture::new();
    let pkg = PackageBuilder::new("app", "1.0.0")
        .dir("/etc")
        .file("/etc/app.tmpl", b"os={{ image.os }} provider={{ cloud.provider }}\n")
        .template("/etc/app.tmpl", "/etc/app.conf");
    fx.stage(&pkg);

    let mut scope = Scope::new();
    scope.set("image.os", "linux");
    scope.set("cloud.provider", "unknown");

    let mut tx = Transaction::new(fx.image.path(), &fx.cache, &fx.state, scope);
    tx.realize(&fx.install_solution(&[&pkg])).unwrap();

    let rendered = fs::read_to_string(fx.image.path().join("etc/app.conf")).unwrap();
    assert_eq!(rendered, "os=linux provider=unknown\n");
}

#[test]
fn missing_artifact_fails_before_mutation() {
    let fx = Fixture::new();
    let pkg = PackageBuilder::new("ghost", "1.0.0").dir("/etc");
    // Archive deliberately not staged into the cache

    let err = fx
        .transaction()
        .realize(&fx.install_solution(&[&pkg]))
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert!(fx.state.transactions_all().unwrap().is_empty());
}

#[test]
fn cancellation_stops_before_the_next_operation() {
    let fx = Fixture::new();
    let pkg = PackageBuilder::new("demo", "1.0.0").dir("/usr").file("/usr/demo", b"x");
    fx.stage(&pkg);

    let cancel = Arc::new(AtomicBool::new(true));
    let mut tx = fx.transaction().with_cancel(Arc::clone(&cancel));
    let err = tx.realize(&fx.install_solution(&[&pkg])).unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert!(fx.state.packages_get("demo").unwrap().is_none());

    // Cleared token lets the same solution through
    cancel.store(false, Ordering::Relaxed);
    let mut tx = fx.transaction().with_cancel(cancel);
    tx.realize(&fx.install_solution(&[&pkg])).unwrap();
    assert!(fx.state.packages_get("demo").unwrap().is_some());
}
