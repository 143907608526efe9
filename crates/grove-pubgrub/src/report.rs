//! Build a report as clear as possible as to why dependency solving failed.

use std::fmt::{self, Display};

use rustc_hash::FxHashMap;

use grove_version::{Version, VersionSet};

use crate::internal::arena::{Arena, Id};
use crate::term::Term;
use crate::{FxIndexSet, Package};

pub type NodeId<P, V> = Id<Node<P, V>>;

/// Reporter trait.
pub trait Reporter<P: Package, V: Version> {
    /// Output type of the report.
    type Output;

    /// Generate a report from the derivation tree describing the resolution failure.
    fn report(derivation_tree: &DerivationTree<P, V>) -> Self::Output;
}

/// The proof that resolution failed.
///
/// Nodes live in an arena; a node reached through several paths of the proof is stored once and
/// referenced by each parent.
#[derive(Debug, Clone)]
pub struct DerivationTree<P, V> {
    nodes: Arena<Node<P, V>>,
    root: NodeId<P, V>,
}

#[derive(Debug, Clone)]
pub enum Node<P, V> {
    /// An incompatibility taken directly from the problem.
    External(External<P, V>),
    /// An incompatibility learned from two others.
    Derived(Derived<P, V>),
}

/// Incompatibilities that are not derived from others. They have their own reason.
#[derive(Debug, Clone)]
pub enum External<P, V> {
    /// Initial incompatibility aiming at picking the root package for the first decision.
    NotRoot(P, V),
    /// There are no versions in the given set for this package.
    NoVersions(P, VersionSet<V>),
    /// Incompatibility coming from the dependencies of a given package.
    FromDependencyOf(P, VersionSet<V>, P, VersionSet<V>),
}

/// Incompatibility derived from two others.
#[derive(Debug, Clone)]
pub struct Derived<P, V> {
    /// Terms of the incompatibility.
    pub terms: Vec<(P, Term<V>)>,
    /// Indicate if that incompatibility is present multiple times in the derivation tree.
    /// If that is the case, it has a unique id, provided in that option. Then, we may want to
    /// only explain it once, and refer to the explanation for the other times.
    pub shared_id: Option<usize>,
    /// First cause.
    pub cause1: NodeId<P, V>,
    /// Second cause.
    pub cause2: NodeId<P, V>,
}

impl<P: Package, V: Version> DerivationTree<P, V> {
    pub(crate) fn new(nodes: Arena<Node<P, V>>, root: NodeId<P, V>) -> Self {
        Self { nodes, root }
    }

    pub fn root(&self) -> &Node<P, V> {
        &self.nodes[self.root]
    }

    pub fn root_id(&self) -> NodeId<P, V> {
        self.root
    }

    pub fn node(&self, id: NodeId<P, V>) -> &Node<P, V> {
        &self.nodes[id]
    }

    /// Every package mentioned anywhere in the proof.
    pub fn packages(&self) -> FxIndexSet<&P> {
        let mut packages = FxIndexSet::default();
        for (_, node) in self.nodes.iter() {
            match node {
                Node::External(
                    External::NotRoot(package, _) | External::NoVersions(package, _),
                ) => {
                    packages.insert(package);
                }
                Node::External(External::FromDependencyOf(package, _, dependency, _)) => {
                    packages.insert(package);
                    packages.insert(dependency);
                }
                Node::Derived(derived) => {
                    packages.extend(derived.terms.iter().map(|(package, _)| package));
                }
            }
        }
        packages
    }

    /// Merge the [`NoVersions`](External::NoVersions) external incompatibilities into the
    /// other one they are derived with, which shortens the report.
    ///
    /// For example, `a 1 depends on b` and `there is no version of b` become
    /// `a 1 depends on b`, hiding that `b` was looked at and doesn't exist.
    ///
    /// This is lossy: the merged node no longer proves exactly the same terms.
    pub fn collapse_no_versions(&mut self) {
        // Children have smaller ids than their parents, so this rewrites bottom-up.
        let ids: Vec<_> = self.nodes.iter().map(|(id, _)| id).collect();
        for id in ids {
            let Node::Derived(derived) = &self.nodes[id] else {
                continue;
            };
            let collapsed = match (&self.nodes[derived.cause1], &self.nodes[derived.cause2]) {
                (Node::External(External::NoVersions(package, set)), sibling)
                | (sibling, Node::External(External::NoVersions(package, set))) => {
                    sibling.clone().merge_no_versions(package, set)
                }
                _ => None,
            };
            if let Some(collapsed) = collapsed {
                *self.nodes.get_mut(id) = collapsed;
            }
        }
    }
}

impl<P: Package, V: Version> Node<P, V> {
    fn merge_no_versions(self, package: &P, set: &VersionSet<V>) -> Option<Self> {
        match self {
            // The derived sibling already explains the conflict on its own.
            Self::Derived(_) => Some(self),
            Self::External(External::NotRoot(..)) => None,
            Self::External(External::NoVersions(_, existing)) => Some(Self::External(
                External::NoVersions(package.clone(), existing.union(set)),
            )),
            Self::External(External::FromDependencyOf(p1, r1, p2, r2)) => {
                if &p1 == package {
                    Some(Self::External(External::FromDependencyOf(
                        p1,
                        r1.union(set),
                        p2,
                        r2,
                    )))
                } else {
                    Some(Self::External(External::FromDependencyOf(
                        p1,
                        r1,
                        p2,
                        r2.union(set),
                    )))
                }
            }
        }
    }
}

/// Whether `set` places no requirement worth printing.
fn is_unconstrained<V: Version>(set: &VersionSet<V>) -> bool {
    set.is_any() || *set == VersionSet::full_release()
}

impl<P: Package, V: Version> Display for External<P, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotRoot(package, version) => {
                write!(f, "we are solving dependencies of {package} {version}")
            }
            Self::NoVersions(package, set) => {
                if is_unconstrained(set) {
                    write!(f, "there is no available version for {package}")
                } else {
                    write!(f, "there is no version of {package} in {set}")
                }
            }
            Self::FromDependencyOf(package, set, dependency, dependency_set) => {
                match (is_unconstrained(set), is_unconstrained(dependency_set)) {
                    (true, true) => write!(f, "{package} depends on {dependency}"),
                    (true, false) => {
                        write!(f, "{package} depends on {dependency} {dependency_set}")
                    }
                    (false, true) => write!(f, "{package} {set} depends on {dependency}"),
                    (false, false) => {
                        write!(f, "{package} {set} depends on {dependency} {dependency_set}")
                    }
                }
            }
        }
    }
}

/// Default reporter able to generate an explanation as a [`String`].
pub struct DefaultStringReporter<'tree, P, V> {
    tree: &'tree DerivationTree<P, V>,
    /// Number of explanations already with a line reference.
    ref_count: usize,
    /// Shared nodes that have already been marked with a line reference. The incompatibility
    /// ids are the keys, and the line references are the values.
    shared_with_ref: FxHashMap<usize, usize>,
    /// Accumulated lines of the report already generated.
    lines: Vec<String>,
}

impl<'tree, P: Package, V: Version> DefaultStringReporter<'tree, P, V> {
    fn new(tree: &'tree DerivationTree<P, V>) -> Self {
        Self {
            tree,
            ref_count: 0,
            shared_with_ref: FxHashMap::default(),
            lines: Vec::new(),
        }
    }

    /// The report, one statement per line. Independent parts of the explanation are separated
    /// by an empty line.
    pub fn report_lines(tree: &'tree DerivationTree<P, V>) -> Vec<String> {
        match tree.root() {
            Node::External(external) => vec![external.to_string()],
            Node::Derived(derived) => {
                let mut reporter = Self::new(tree);
                reporter.build_recursive(derived);
                reporter.lines
            }
        }
    }

    fn build_recursive(&mut self, derived: &Derived<P, V>) {
        self.build_recursive_helper(derived);
        if let Some(id) = derived.shared_id
            && !self.shared_with_ref.contains_key(&id)
        {
            self.add_line_ref();
            self.shared_with_ref.insert(id, self.ref_count);
        }
    }

    fn build_recursive_helper(&mut self, current: &Derived<P, V>) {
        let tree = self.tree;
        match (tree.node(current.cause1), tree.node(current.cause2)) {
            (Node::External(external1), Node::External(external2)) => {
                // Simplest case, we just combine two external incompatibilities.
                self.lines.push(Self::explain_both_external(
                    external1,
                    external2,
                    &current.terms,
                ));
            }
            (Node::Derived(derived), Node::External(external))
            | (Node::External(external), Node::Derived(derived)) => {
                // One cause is derived, so we explain it first, then add the one-line external
                // part and conclude with the current incompatibility.
                self.report_one_each(derived, external, &current.terms);
            }
            (Node::Derived(derived1), Node::Derived(derived2)) => {
                match (
                    self.line_ref_of(derived1.shared_id),
                    self.line_ref_of(derived2.shared_id),
                ) {
                    // Both causes are already explained: refer to them.
                    (Some(ref1), Some(ref2)) => self.lines.push(Self::explain_both_ref(
                        ref1,
                        derived1,
                        ref2,
                        derived2,
                        &current.terms,
                    )),
                    // Explain the one without a reference, then conclude with the other.
                    (Some(ref1), None) => {
                        self.build_recursive(derived2);
                        self.lines
                            .push(Self::and_explain_ref(ref1, derived1, &current.terms));
                    }
                    (None, Some(ref2)) => {
                        self.build_recursive(derived1);
                        self.lines
                            .push(Self::and_explain_ref(ref2, derived2, &current.terms));
                    }
                    (None, None) => {
                        self.build_recursive(derived1);
                        if derived1.shared_id.is_some() {
                            // The first cause now has a line reference, so the current node
                            // falls into one of the cases above.
                            self.lines.push(String::new());
                            self.build_recursive(current);
                        } else {
                            self.add_line_ref();
                            let ref1 = self.ref_count;
                            self.lines.push(String::new());
                            self.build_recursive(derived2);
                            self.lines
                                .push(Self::and_explain_ref(ref1, derived1, &current.terms));
                        }
                    }
                }
            }
        }
    }

    /// Report a derived and an external incompatibility.
    ///
    /// The result depends on the fact that the derived incompatibility has already been
    /// explained or not.
    fn report_one_each(
        &mut self,
        derived: &Derived<P, V>,
        external: &External<P, V>,
        current_terms: &[(P, Term<V>)],
    ) {
        match self.line_ref_of(derived.shared_id) {
            Some(ref_id) => self.lines.push(Self::explain_ref_and_external(
                ref_id,
                derived,
                external,
                current_terms,
            )),
            None => self.report_recurse_one_each(derived, external, current_terms),
        }
    }

    /// Report one derived (without a line ref yet) and one external.
    fn report_recurse_one_each(
        &mut self,
        derived: &Derived<P, V>,
        external: &External<P, V>,
        current_terms: &[(P, Term<V>)],
    ) {
        let tree = self.tree;
        match (tree.node(derived.cause1), tree.node(derived.cause2)) {
            // If the derived cause has itself one external prior cause, we can chain the
            // external explanations.
            (Node::Derived(prior_derived), Node::External(prior_external))
            | (Node::External(prior_external), Node::Derived(prior_derived)) => {
                self.build_recursive(prior_derived);
                self.lines.push(Self::and_explain_prior_and_external(
                    prior_external,
                    external,
                    current_terms,
                ));
            }
            _ => {
                self.build_recursive(derived);
                self.lines
                    .push(Self::and_explain_external(external, current_terms));
            }
        }
    }

    fn explain_both_external(
        external1: &External<P, V>,
        external2: &External<P, V>,
        current_terms: &[(P, Term<V>)],
    ) -> String {
        format!(
            "Because {external1} and {external2}, {}.",
            Self::string_terms(current_terms)
        )
    }

    fn explain_both_ref(
        ref_id1: usize,
        derived1: &Derived<P, V>,
        ref_id2: usize,
        derived2: &Derived<P, V>,
        current_terms: &[(P, Term<V>)],
    ) -> String {
        format!(
            "Because {} ({ref_id1}) and {} ({ref_id2}), {}.",
            Self::string_terms(&derived1.terms),
            Self::string_terms(&derived2.terms),
            Self::string_terms(current_terms)
        )
    }

    fn explain_ref_and_external(
        ref_id: usize,
        derived: &Derived<P, V>,
        external: &External<P, V>,
        current_terms: &[(P, Term<V>)],
    ) -> String {
        format!(
            "Because {} ({ref_id}) and {external}, {}.",
            Self::string_terms(&derived.terms),
            Self::string_terms(current_terms)
        )
    }

    fn and_explain_external(external: &External<P, V>, current_terms: &[(P, Term<V>)]) -> String {
        format!(
            "And because {external}, {}.",
            Self::string_terms(current_terms)
        )
    }

    fn and_explain_ref(
        ref_id: usize,
        derived: &Derived<P, V>,
        current_terms: &[(P, Term<V>)],
    ) -> String {
        format!(
            "And because {} ({ref_id}), {}.",
            Self::string_terms(&derived.terms),
            Self::string_terms(current_terms)
        )
    }

    fn and_explain_prior_and_external(
        prior_external: &External<P, V>,
        external: &External<P, V>,
        current_terms: &[(P, Term<V>)],
    ) -> String {
        format!(
            "And because {prior_external} and {external}, {}.",
            Self::string_terms(current_terms)
        )
    }

    /// Add a line reference to the last line and increment the reference count.
    fn add_line_ref(&mut self) {
        self.ref_count += 1;
        if let Some(line) = self.lines.last_mut() {
            line.push_str(&format!(" ({})", self.ref_count));
        }
    }

    fn line_ref_of(&self, shared_id: Option<usize>) -> Option<usize> {
        shared_id.and_then(|id| self.shared_with_ref.get(&id).copied())
    }
}

impl<P: Package, V: Version> DefaultStringReporter<'_, P, V> {
    /// Try to print terms of an incompatibility in a human-readable way.
    pub fn string_terms(terms: &[(P, Term<V>)]) -> String {
        match terms {
            [] => "version solving failed".into(),
            [(package, Term::Positive(set))] => format!("{package} {set} is forbidden"),
            [(package, Term::Negative(set))] => format!("{package} {set} is mandatory"),
            [(p1, Term::Positive(r1)), (p2, Term::Negative(r2))]
            | [(p2, Term::Negative(r2)), (p1, Term::Positive(r1))] => {
                External::FromDependencyOf(p1.clone(), r1.clone(), p2.clone(), r2.clone())
                    .to_string()
            }
            slice => {
                let str_terms: Vec<_> = slice
                    .iter()
                    .map(|(package, term)| format!("{package} {term}"))
                    .collect();
                str_terms.join(", ") + " are incompatible"
            }
        }
    }
}

impl<P: Package, V: Version> Reporter<P, V> for DefaultStringReporter<'_, P, V> {
    type Output = String;

    fn report(derivation_tree: &DerivationTree<P, V>) -> Self::Output {
        DefaultStringReporter::report_lines(derivation_tree).join("\n")
    }
}

#[cfg(test)]
mod tests {
    use grove_version::SemanticVersion;
    use insta::assert_snapshot;

    use super::*;

    type Tree = DerivationTree<&'static str, SemanticVersion>;

    fn version(major: u64) -> SemanticVersion {
        SemanticVersion::new(major, 0, 0)
    }

    fn between(lower: u64, upper: u64) -> VersionSet<SemanticVersion> {
        VersionSet::between(version(lower), version(upper))
    }

    fn report(tree: &Tree) -> String {
        <DefaultStringReporter<_, _> as Reporter<_, _>>::report(tree)
    }

    /// `root 1` depends on `a [1, 2)`, of which there is no version.
    fn no_versions_tree() -> Tree {
        let mut nodes = Arena::new();
        let no_versions = nodes.alloc(Node::External(External::NoVersions("a", between(1, 2))));
        let dependency = nodes.alloc(Node::External(External::FromDependencyOf(
            "root",
            VersionSet::exact(version(1)),
            "a",
            between(1, 2),
        )));
        let root = nodes.alloc(Node::Derived(Derived {
            terms: vec![("root", Term::exact(version(1)))],
            shared_id: None,
            cause1: no_versions,
            cause2: dependency,
        }));
        DerivationTree::new(nodes, root)
    }

    #[test]
    fn external_display() {
        assert_eq!(
            External::<_, SemanticVersion>::NotRoot("root", version(1)).to_string(),
            "we are solving dependencies of root 1.0.0"
        );
        assert_eq!(
            External::NoVersions("a", VersionSet::<SemanticVersion>::any()).to_string(),
            "there is no available version for a"
        );
        assert_eq!(
            External::NoVersions("a", between(1, 2)).to_string(),
            "there is no version of a in >=1.0.0, <2.0.0"
        );
        assert_eq!(
            External::FromDependencyOf("a", between(1, 2), "b", VersionSet::full_release())
                .to_string(),
            "a >=1.0.0, <2.0.0 depends on b"
        );
        assert_eq!(
            External::FromDependencyOf("a", VersionSet::any(), "b", between(1, 2)).to_string(),
            "a depends on b >=1.0.0, <2.0.0"
        );
    }

    #[test]
    fn string_terms() {
        type StringReporter<'a> = DefaultStringReporter<'a, &'static str, SemanticVersion>;
        assert_eq!(StringReporter::string_terms(&[]), "version solving failed");
        assert_eq!(
            StringReporter::string_terms(&[("a", Term::Positive(between(1, 2)))]),
            "a >=1.0.0, <2.0.0 is forbidden"
        );
        assert_eq!(
            StringReporter::string_terms(&[("a", Term::Negative(between(1, 2)))]),
            "a >=1.0.0, <2.0.0 is mandatory"
        );
        assert_eq!(
            StringReporter::string_terms(&[
                ("b", Term::Negative(between(2, 3))),
                ("a", Term::exact(version(1))),
            ]),
            "a 1.0.0 depends on b >=2.0.0, <3.0.0"
        );
        assert_eq!(
            StringReporter::string_terms(&[
                ("a", Term::exact(version(1))),
                ("b", Term::exact(version(2))),
                ("c", Term::Negative(between(1, 2))),
            ]),
            "a 1.0.0, b 2.0.0, c Not ( >=1.0.0, <2.0.0 ) are incompatible"
        );
    }

    #[test]
    fn report_derived_root() {
        let tree = no_versions_tree();
        assert_snapshot!(report(&tree), @"Because there is no version of a in >=1.0.0, <2.0.0 and root 1.0.0 depends on a >=1.0.0, <2.0.0, root 1.0.0 is forbidden.");
    }

    #[test]
    fn collapse_no_versions_into_dependency() {
        let mut tree = no_versions_tree();
        tree.collapse_no_versions();
        assert!(matches!(tree.root(), Node::External(_)));
        assert_snapshot!(report(&tree), @"root 1.0.0 depends on a >=1.0.0, <2.0.0");
        assert_eq!(
            tree.packages().into_iter().collect::<Vec<_>>(),
            vec![&"a", &"root"]
        );
    }

    #[test]
    fn collapse_keeps_not_root() {
        let mut nodes = Arena::new();
        let not_root = nodes.alloc(Node::External(External::NotRoot("root", version(1))));
        let no_versions = nodes.alloc(Node::External(External::NoVersions(
            "root",
            VersionSet::exact(version(1)),
        )));
        let root = nodes.alloc(Node::Derived(Derived {
            terms: vec![],
            shared_id: None,
            cause1: not_root,
            cause2: no_versions,
        }));
        let mut tree = DerivationTree::new(nodes, root);
        tree.collapse_no_versions();
        assert!(matches!(tree.root(), Node::Derived(_)));
        assert_snapshot!(report(&tree), @"Because we are solving dependencies of root 1.0.0 and there is no version of root in 1.0.0, version solving failed.");
    }
}
