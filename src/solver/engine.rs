// src/solver/engine.rs

//! Constraint solver
//!
//! A backtracking search over `(name -> chosen candidate)` assignments.
//! Install intents seed the decision stack with the top-of-policy
//! candidate; each decision propagates its `depends` relations and
//! registers its `conflicts`. When a candidate is incompatible with the
//! assignments made so far, the search falls back to the next candidate
//! under the policy, unwinding partial propagation. The result is ordered
//! through [`DependencyGraph`] before it is returned.

use super::graph::DependencyGraph;
use super::policy::Policy;
use super::{Operation, OperationKind, Request, Solution};
use crate::action::Requirement;
use crate::error::{Error, Result};
use crate::pkg::Package;
use crate::pool::Pool;
use std::collections::{BTreeMap, BTreeSet};

/// Produces an ordered solution for a request against a pool
pub struct Solver<'a> {
    pool: &'a Pool,
    policy: Policy,
}

/// Mutable search state threaded through the recursion
#[derive(Default)]
struct Search {
    /// Name to selected remote candidate
    assignments: BTreeMap<String, Package>,
    /// Installed names marked for removal
    removals: BTreeSet<String>,
    /// Requested names already satisfied by the image
    noops: BTreeMap<String, Package>,
    /// Failure explanations, most recent last
    trace: Vec<String>,
}

impl<'a> Solver<'a> {
    pub fn new(pool: &'a Pool, policy: Policy) -> Self {
        Self { pool, policy }
    }

    /// Solve a request into an ordered solution
    ///
    /// Deterministic: identical `(pool, policy, request)` inputs yield an
    /// identical solution.
    pub fn solve(&self, request: &Request) -> Result<Solution> {
        let mut search = Search::default();

        self.seed_removals(request, &mut search)?;

        for req in request.installs() {
            if self.pool.what_provides(req).is_empty() {
                return Err(Error::NoCandidates(req.to_string()));
            }
        }

        for req in request.installs() {
            if !self.resolve_request(req, &mut search) {
                return Err(Error::Unsatisfiable(search.trace.join("\n")));
            }
        }

        self.assemble(search)
    }

    /// Mark removal targets and close over broken reverse dependencies
    fn seed_removals(&self, request: &Request, search: &mut Search) -> Result<()> {
        for req in request.removes() {
            let matched: Vec<&Package> = self
                .pool
                .installed_packages()
                .into_iter()
                .filter(|p| p.matches(req))
                .collect();
            if matched.is_empty() {
                return Err(Error::NoCandidates(req.to_string()));
            }
            for package in matched {
                search.removals.insert(package.name.clone());
            }
        }

        // A package whose depends chain is broken by the removals goes too
        loop {
            let mut grew = false;
            for package in self.pool.installed_packages() {
                if search.removals.contains(&package.name) {
                    continue;
                }
                for dep in package.depends() {
                    let broken = self.removal_breaks(dep, &search.removals);
                    if broken {
                        search.removals.insert(package.name.clone());
                        grew = true;
                        break;
                    }
                }
            }
            if !grew {
                break;
            }
        }

        Ok(())
    }

    /// True when `dep` was satisfied by a removed package and nothing
    /// remaining in the image still satisfies it
    fn removal_breaks(&self, dep: &Requirement, removals: &BTreeSet<String>) -> bool {
        let installed = self.pool.installed_packages();
        let satisfied_by_removed = installed
            .iter()
            .any(|p| removals.contains(&p.name) && p.matches(dep));
        if !satisfied_by_removed {
            return false;
        }
        !installed
            .iter()
            .any(|p| !removals.contains(&p.name) && p.matches(dep))
    }

    /// Resolve a top-level install intent
    ///
    /// Unlike transitive propagation, the request consults policy across
    /// every candidate, so an explicit `install a>=1.1` upgrades an
    /// installed `a@1.0.0` instead of settling for it.
    fn resolve_request(&self, req: &Requirement, search: &mut Search) -> bool {
        if search.assignments.values().any(|p| p.matches(req)) {
            return true;
        }

        let candidates = self.policy.order(self.pool.what_provides(req));
        for candidate in candidates {
            if search.removals.contains(&candidate.name) {
                search
                    .trace
                    .push(format!("{} is marked for removal", candidate.id()));
                continue;
            }

            if candidate.is_installed() {
                // The image already carries the best admissible version
                search
                    .noops
                    .insert(candidate.name.clone(), candidate.clone());
                return true;
            }

            if self.try_candidate(candidate, req, "request", search) {
                return true;
            }
        }

        search
            .trace
            .push(format!("no candidate satisfies {} for the request", req));
        false
    }

    /// Resolve a propagated `depends` relation
    fn resolve_dep(&self, req: &Requirement, required_by: &str, search: &mut Search) -> bool {
        if search.assignments.values().any(|p| p.matches(req)) {
            return true;
        }

        // An installed package that is staying satisfies the dependency
        let satisfied_installed = self.pool.installed_packages().into_iter().any(|p| {
            !search.removals.contains(&p.name)
                && !search.assignments.contains_key(&p.name)
                && p.matches(req)
        });
        if satisfied_installed {
            return true;
        }

        let candidates = self.policy.order(self.pool.what_provides(req));
        if candidates.is_empty() {
            search
                .trace
                .push(format!("nothing provides {} required by {}", req, required_by));
            return false;
        }

        for candidate in candidates {
            if search.removals.contains(&candidate.name) {
                continue;
            }
            if candidate.is_installed() {
                // Shadowed by an assignment of another version
                continue;
            }
            if self.try_candidate(candidate, req, required_by, search) {
                return true;
            }
        }

        search.trace.push(format!(
            "no candidate for {} (required by {}) survives the current constraints",
            req, required_by
        ));
        false
    }

    /// Assign one candidate and propagate its relations
    ///
    /// On any failure the assignments map is restored to its state before
    /// the attempt, so the caller can fall through to the next candidate.
    fn try_candidate(
        &self,
        candidate: &Package,
        req: &Requirement,
        required_by: &str,
        search: &mut Search,
    ) -> bool {
        if let Some(existing) = search.assignments.get(&candidate.name) {
            search.trace.push(format!(
                "{} competes with already selected {}",
                candidate.id(),
                existing.id()
            ));
            return false;
        }

        if let Some(reason) = self.conflict_with(candidate, search) {
            search.trace.push(reason);
            return false;
        }

        let checkpoint = search.assignments.clone();
        search
            .assignments
            .insert(candidate.name.clone(), candidate.clone());

        for dep in candidate.depends() {
            if !self.resolve_dep(dep, &candidate.id(), search) {
                search.trace.push(format!(
                    "{} (for {} required by {}) was abandoned",
                    candidate.id(),
                    req,
                    required_by
                ));
                search.assignments = checkpoint;
                return false;
            }
        }

        true
    }

    /// Check a candidate against declared conflicts, both directions
    fn conflict_with(&self, candidate: &Package, search: &Search) -> Option<String> {
        let remaining: Vec<&Package> = self
            .pool
            .installed_packages()
            .into_iter()
            .filter(|p| {
                !search.removals.contains(&p.name) && !search.assignments.contains_key(&p.name)
            })
            .collect();

        for conflict in candidate.conflicts() {
            if let Some(victim) = search.assignments.values().find(|p| p.matches(conflict)) {
                return Some(format!(
                    "{} conflicts with selected {}",
                    candidate.id(),
                    victim.id()
                ));
            }
            if let Some(victim) = remaining.iter().find(|p| p.matches(conflict)) {
                return Some(format!(
                    "{} conflicts with installed {}",
                    candidate.id(),
                    victim.id()
                ));
            }
        }

        for holder in search.assignments.values().chain(remaining.iter().copied()) {
            for conflict in holder.conflicts() {
                if candidate.matches(conflict) {
                    return Some(format!(
                        "{} is forbidden by {} from {}",
                        candidate.id(),
                        conflict,
                        holder.id()
                    ));
                }
            }
        }

        None
    }

    /// Order the search result into a solution
    fn assemble(&self, search: Search) -> Result<Solution> {
        let mut solution = Solution::new();

        // Pure removals: dependents strictly before dependencies
        if !search.removals.is_empty() {
            let mut graph = DependencyGraph::new();
            let removed: BTreeMap<&str, &Package> = self
                .pool
                .installed_packages()
                .into_iter()
                .filter(|p| search.removals.contains(&p.name))
                .map(|p| (p.name.as_str(), p))
                .collect();

            for (name, package) in &removed {
                graph.add_node(name);
                for dep in package.depends() {
                    for provider in removed.values() {
                        if provider.matches(dep) {
                            graph.add_edge(name, &provider.name);
                        }
                    }
                }
            }

            for name in graph.remove_order()? {
                let package = removed[name.as_str()];
                solution.push(Operation::new(OperationKind::Remove, package.clone()));
            }
        }

        // Installs: dependencies strictly before dependents, an upgrade's
        // removal immediately before its install
        if !search.assignments.is_empty() {
            let mut graph = DependencyGraph::new();
            for (name, package) in &search.assignments {
                graph.add_node(name);
                for dep in package.depends() {
                    for provider in search.assignments.values() {
                        if provider.matches(dep) {
                            graph.add_edge(name, &provider.name);
                        }
                    }
                }
            }

            for name in graph.install_order()? {
                let package = &search.assignments[&name];
                if let Some(old) = self.pool.installed(&name) {
                    solution.push(Operation::new(OperationKind::Remove, old.clone()));
                }
                solution.push(Operation::new(OperationKind::Install, package.clone()));
            }
        }

        for package in search.noops.into_values() {
            solution.push(Operation::new(OperationKind::Noop, package));
        }

        Ok(solution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::Repo;
    use crate::version::{Version, VersionOp};

    fn pkg(name: &str, version: &str) -> Package {
        Package {
            name: name.to_string(),
            version: Version::parse(version).unwrap(),
            os: "linux".to_string(),
            arch: "x86_64".to_string(),
            publisher: "tests".to_string(),
            summary: String::new(),
            requirements: Vec::new(),
            location: None,
        }
    }

    fn with_dep(mut package: Package, name: &str, op: VersionOp, version: &str) -> Package {
        package.requirements.push(Requirement::depends(
            name,
            op,
            Some(Version::parse(version).unwrap()),
        ));
        package
    }

    fn pool(installed: Vec<Package>, remote: Vec<Package>) -> Pool {
        let image = Repo::installed(installed);
        let main = Repo::new("main", "file:///repo", 10, true, remote);
        Pool::new(image, vec![main]).unwrap()
    }

    fn ops(solution: &Solution) -> Vec<String> {
        solution
            .operations()
            .iter()
            .map(|op| op.to_string())
            .collect()
    }

    #[test]
    fn test_empty_request_empty_solution() {
        let pool = pool(Vec::new(), vec![pkg("a", "1.0.0")]);
        let solver = Solver::new(&pool, Policy::Updated);
        let solution = solver.solve(&Request::new()).unwrap();
        assert!(solution.is_empty());
    }

    #[test]
    fn test_linear_dependencies_install_in_order() {
        let a = with_dep(pkg("a", "1.0.0"), "b", VersionOp::Ge, "1.0.0");
        let b = pkg("b", "1.0.0");
        let pool = pool(Vec::new(), vec![a, b]);
        let solver = Solver::new(&pool, Policy::Updated);

        let mut request = Request::new();
        request.install(Requirement::parse("a").unwrap());
        let solution = solver.solve(&request).unwrap();

        assert_eq!(ops(&solution), vec!["install b@1.0.0", "install a@1.0.0"]);
    }

    #[test]
    fn test_upgrade_emits_paired_operations() {
        let installed = pkg("a", "1.0.0");
        let newer = pkg("a", "1.1.0");
        let pool = pool(vec![installed], vec![newer]);
        let solver = Solver::new(&pool, Policy::Updated);

        let mut request = Request::new();
        request.install(Requirement::parse("a>=1.1").unwrap());
        let solution = solver.solve(&request).unwrap();

        assert_eq!(ops(&solution), vec!["remove a@1.0.0", "install a@1.1.0"]);
    }

    #[test]
    fn test_already_installed_is_noop() {
        let pool = pool(vec![pkg("a", "1.0.0")], vec![pkg("a", "1.0.0")]);
        let solver = Solver::new(&pool, Policy::Updated);

        let mut request = Request::new();
        request.install(Requirement::parse("a").unwrap());
        let solution = solver.solve(&request).unwrap();

        assert_eq!(ops(&solution), vec!["noop a@1.0.0"]);
    }

    #[test]
    fn test_conflicting_provides_is_unsatisfiable() {
        let mut a = pkg("a", "1.0.0");
        a.requirements
            .push(Requirement::provides("c", Some(Version::new(1, 0, 0))));
        let mut b = pkg("b", "1.0.0");
        b.requirements
            .push(Requirement::provides("c", Some(Version::new(1, 0, 0))));
        b.requirements
            .push(Requirement::conflicts("a", VersionOp::Any, None));

        let pool = pool(Vec::new(), vec![a, b]);
        let solver = Solver::new(&pool, Policy::Updated);

        let mut request = Request::new();
        request.install(Requirement::parse("a").unwrap());
        request.install(Requirement::parse("b").unwrap());

        match solver.solve(&request) {
            Err(Error::Unsatisfiable(trace)) => {
                assert!(trace.contains("b@1.0.0"));
                assert!(trace.contains("a@1.0.0"));
            }
            other => panic!("expected unsatisfiable, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_candidate() {
        let pool = pool(Vec::new(), vec![pkg("a", "1.0.0")]);
        let solver = Solver::new(&pool, Policy::Updated);

        let mut request = Request::new();
        request.install(Requirement::parse("x").unwrap());

        match solver.solve(&request) {
            Err(Error::NoCandidates(req)) => assert_eq!(req, "x"),
            other => panic!("expected no candidates, got {:?}", other),
        }
    }

    #[test]
    fn test_virtual_dependency_resolved_through_provides() {
        let mut app = pkg("app", "1.0.0");
        app.requirements
            .push(Requirement::depends("webserver", VersionOp::Any, None));
        let mut nginx = pkg("nginx", "1.24.0");
        nginx
            .requirements
            .push(Requirement::provides("webserver", Some(Version::new(1, 0, 0))));

        let pool = pool(Vec::new(), vec![app, nginx]);
        let solver = Solver::new(&pool, Policy::Updated);

        let mut request = Request::new();
        request.install(Requirement::parse("app").unwrap());
        let solution = solver.solve(&request).unwrap();

        assert_eq!(
            ops(&solution),
            vec!["install nginx@1.24.0", "install app@1.0.0"]
        );
    }

    #[test]
    fn test_dependency_satisfied_by_installed_stays_put() {
        let app = with_dep(pkg("app", "1.0.0"), "lib", VersionOp::Ge, "1.0.0");
        let lib_installed = pkg("lib", "1.0.0");
        let lib_newer = pkg("lib", "2.0.0");

        let pool = pool(vec![lib_installed], vec![app, lib_newer]);
        let solver = Solver::new(&pool, Policy::Updated);

        let mut request = Request::new();
        request.install(Requirement::parse("app").unwrap());
        let solution = solver.solve(&request).unwrap();

        // lib stays at 1.0.0; only app is installed
        assert_eq!(ops(&solution), vec!["install app@1.0.0"]);
    }

    #[test]
    fn test_remove_takes_broken_dependents() {
        let lib = pkg("lib", "1.0.0");
        let app = with_dep(pkg("app", "1.0.0"), "lib", VersionOp::Ge, "1.0.0");

        let pool = pool(vec![lib, app], Vec::new());
        let solver = Solver::new(&pool, Policy::Updated);

        let mut request = Request::new();
        request.remove(Requirement::parse("lib").unwrap());
        let solution = solver.solve(&request).unwrap();

        // Dependent removed before its dependency
        assert_eq!(ops(&solution), vec!["remove app@1.0.0", "remove lib@1.0.0"]);
    }

    #[test]
    fn test_remove_missing_is_no_candidates() {
        let pool = pool(Vec::new(), Vec::new());
        let solver = Solver::new(&pool, Policy::Updated);

        let mut request = Request::new();
        request.remove(Requirement::parse("ghost").unwrap());
        assert!(matches!(
            solver.solve(&request),
            Err(Error::NoCandidates(_))
        ));
    }

    #[test]
    fn test_backtracks_to_older_candidate() {
        // Policy puts lib 2.0.0 first, but its own dependency is
        // unsatisfiable, so the solver must unwind and settle for 1.5.0
        let app = with_dep(pkg("app", "1.0.0"), "lib", VersionOp::Ge, "1.0.0");
        let lib_new = with_dep(pkg("lib", "2.0.0"), "bridge", VersionOp::Ge, "9.0.0");
        let lib_old = pkg("lib", "1.5.0");

        let pool = pool(Vec::new(), vec![app, lib_new, lib_old]);
        let solver = Solver::new(&pool, Policy::Updated);

        let mut request = Request::new();
        request.install(Requirement::parse("app").unwrap());
        let solution = solver.solve(&request).unwrap();

        assert_eq!(
            ops(&solution),
            vec!["install lib@1.5.0", "install app@1.0.0"]
        );
    }

    #[test]
    fn test_constraint_filters_before_policy() {
        // Policy never sees candidates the constraint already excludes
        let app = with_dep(pkg("app", "1.0.0"), "lib", VersionOp::Lt, "2.0.0");
        let lib_new = pkg("lib", "2.0.0");
        let lib_old = pkg("lib", "1.5.0");

        let pool = pool(Vec::new(), vec![app, lib_new, lib_old]);
        let solver = Solver::new(&pool, Policy::Updated);

        let mut request = Request::new();
        request.install(Requirement::parse("app").unwrap());
        let solution = solver.solve(&request).unwrap();

        assert_eq!(
            ops(&solution),
            vec!["install lib@1.5.0", "install app@1.0.0"]
        );
    }

    #[test]
    fn test_solver_is_deterministic() {
        let a = with_dep(pkg("a", "1.0.0"), "b", VersionOp::Ge, "1.0.0");
        let b = with_dep(pkg("b", "1.0.0"), "c", VersionOp::Ge, "1.0.0");
        let c = pkg("c", "1.0.0");
        let d = pkg("d", "1.0.0");

        let build = || {
            let pool = pool(
                Vec::new(),
                vec![a.clone(), b.clone(), c.clone(), d.clone()],
            );
            let solver = Solver::new(&pool, Policy::Updated);
            let mut request = Request::new();
            request.install(Requirement::parse("a").unwrap());
            request.install(Requirement::parse("d").unwrap());
            ops(&solver.solve(&request).unwrap())
        };

        assert_eq!(build(), build());
    }
}
