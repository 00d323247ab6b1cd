//! Breadth-first resolution of an action's transitive dependencies into an
//! [`ActionTree`]. Grown the same way the algorithm this is grounded on
//! grows a slice while iterating it by index: a work list of
//! `(identity, parent node)` pairs that children get appended to as they are
//! discovered.

use std::collections::HashSet;

use super::identity::ActionIdentity;
use super::tree::ActionTree;

/// Reads the set of actions a single action or reusable workflow transitively
/// references. Implemented by `infrastructure` against a materialised source
/// directory; the domain layer only needs the shape of the call.
pub trait TransitiveReader {
    type Error;

    /// The direct children of `identity`: the actions referenced by its
    /// manifest (for [`super::identity::ActionKind::Action`]) or by the
    /// workflow file it points at (for
    /// [`super::identity::ActionKind::ReusableWorkflow`]). A Dockerfile-only
    /// manifest has no children and yields an empty vector, not an error.
    fn children(&mut self, identity: &ActionIdentity) -> Result<Vec<ActionIdentity>, Self::Error>;
}

/// Resolve `roots` into a tree of their transitive dependencies.
///
/// Local kinds never contribute children, regardless of `transitive`: there
/// is no upstream source to read a manifest or workflow file from. When
/// `transitive` is false, the tree has exactly one layer below the root: the
/// roots themselves, unexpanded.
///
/// An identity that appears under more than one parent is recorded once per
/// parent (so it shows up as more than one tree node), but its own children
/// are only resolved the first time it is encountered, preventing cycles and
/// redundant fetches.
///
/// # Errors
///
/// Propagates whatever `reader` returns.
pub fn resolve<R: TransitiveReader>(
    roots: Vec<ActionIdentity>,
    transitive: bool,
    reader: &mut R,
) -> Result<ActionTree, R::Error> {
    let mut tree = ActionTree::new();
    let mut seen: HashSet<ActionIdentity> = HashSet::new();
    let mut work: Vec<(ActionIdentity, usize)> =
        roots.into_iter().map(|id| (id, tree.root())).collect();

    let mut cursor = 0;
    while cursor < work.len() {
        let (identity, parent) = work[cursor].clone();
        cursor += 1;

        let node = tree.add_child(parent, identity.clone());

        if identity.kind.is_local() || !transitive {
            continue;
        }
        if !seen.insert(identity.clone()) {
            continue;
        }

        for child in reader.children(&identity)? {
            work.push((child, node));
        }
    }

    Ok(tree)
}
