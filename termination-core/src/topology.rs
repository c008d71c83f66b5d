//! The Topology Planner.
//!
//! Canonical, arithmetic addressing: every PE computes its own role at every
//! level in `O(L)` time from `(N, G, K)` alone, with no distributed lookup.
//! `Topology` is a pure value; it holds no substrate handle and performs no
//! I/O, so it is cheap to recompute independently on every PE (and in
//! tests).

/// The planned hierarchy for one run: levels, per-level group counts, and
/// the arithmetic to find owners and member counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    /// Total number of PEs (`N`).
    pub peers: usize,
    /// Leaf group size (`G`).
    pub leaf_group_size: usize,
    /// Branching factor above the leaf (`K`).
    pub branch_factor: usize,
    /// Number of groups at each level, `groups[0..levels]`.
    pub groups: Vec<usize>,
}

impl Topology {
    /// Plans the hierarchy for `peers` PEs with leaf group size `leaf_group_size`
    /// and branching factor `branch_factor`.
    ///
    /// `branch_factor` is only consulted above level 0; when `peers <=
    /// leaf_group_size` the whole run fits in a single leaf group and the
    /// hierarchy collapses to one level.
    pub fn plan(peers: usize, leaf_group_size: usize, branch_factor: usize) -> Topology {
        assert!(peers >= 1, "a topology needs at least one PE");
        assert!(leaf_group_size >= 1, "leaf group size must be at least 1");
        assert!(branch_factor >= 2, "branch factor must be at least 2");

        let mut groups = vec![ceil_div(peers, leaf_group_size)];
        while *groups.last().unwrap() > 1 {
            let prev = *groups.last().unwrap();
            groups.push(ceil_div(prev, branch_factor));
        }

        Topology { peers, leaf_group_size, branch_factor, groups }
    }

    /// Plans a STAR topology: PEs fan in to leaf-group anchors same as
    /// H-STAR, but every anchor reports directly to the root with no
    /// further branching in between — `run_star_termination`'s
    /// `ROOT_GROUP_DONE[gidx]` is written straight to `ROOT_PE` regardless
    /// of how many leaf groups there are. Forcing the branch factor to
    /// cover every leaf group in one step collapses `plan`'s usual
    /// per-`K`-sized intermediate levels down to exactly one flat root
    /// level (or zero, if everything already fits in the single leaf group).
    pub fn plan_star(peers: usize, leaf_group_size: usize) -> Topology {
        let groups0 = ceil_div(peers, leaf_group_size);
        let flat_branch_factor = groups0.max(2);
        Topology::plan(peers, leaf_group_size, flat_branch_factor)
    }

    /// Number of levels, `L`.
    pub fn levels(&self) -> usize {
        self.groups.len()
    }

    /// Number of groups at `level`.
    pub fn groups_at(&self, level: usize) -> usize {
        self.groups[level]
    }

    /// The span, in PEs, of one group at `level`: `G * K^level`.
    pub fn span_at(&self, level: usize) -> usize {
        self.leaf_group_size * self.branch_factor.pow(level as u32)
    }

    /// The owning PE of group `group` at `level`: `group * span_at(level)`.
    pub fn owner(&self, level: usize, group: usize) -> usize {
        group * self.span_at(level)
    }

    /// The group index at `level` that PE `pe` belongs to.
    pub fn group_of(&self, level: usize, pe: usize) -> usize {
        pe / self.span_at(level)
    }

    /// The number of live children of group `group` at `level`: `G` or `K`
    /// nominally, less at a tail group.
    pub fn member_count(&self, level: usize, group: usize) -> usize {
        if level == 0 {
            let start = self.owner(0, group);
            let end = (start + self.leaf_group_size).min(self.peers);
            end.saturating_sub(start)
        } else {
            let groups_below = self.groups[level - 1];
            let first_child = group * self.branch_factor;
            if first_child >= groups_below {
                0
            } else {
                (groups_below - first_child).min(self.branch_factor)
            }
        }
    }

    /// The parent group index of `group` at `level` (the group `group`
    /// belongs to one level up).
    pub fn parent_group(&self, level: usize, group: usize) -> usize {
        group / self.branch_factor
    }

    /// This group's index within its parent's child list: the slot it
    /// writes to in the parent's mailbox.
    pub fn index_in_parent(&self, level: usize, group: usize) -> usize {
        group % self.branch_factor
    }

    /// `true` if `level` is the top (root) level.
    pub fn is_top_level(&self, level: usize) -> bool {
        level + 1 == self.levels()
    }
}

fn ceil_div(a: usize, b: usize) -> usize {
    (a + b - 1) / b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_pe_is_its_own_root() {
        let t = Topology::plan(1, 8, 8);
        assert_eq!(t.levels(), 1);
        assert_eq!(t.owner(0, 0), 0);
        assert_eq!(t.member_count(0, 0), 1);
    }

    #[test]
    fn partial_single_leaf_group() {
        // A single partially-filled leaf group: N=5, G=8, K=8.
        let t = Topology::plan(5, 8, 8);
        assert_eq!(t.levels(), 1);
        assert_eq!(t.owner(0, 0), 0);
        assert_eq!(t.member_count(0, 0), 5);
    }

    #[test]
    fn star_with_many_leaf_groups_collapses_to_one_flat_root_level() {
        // N=20, G=8: two full leaf groups and a tail, all reporting to one
        // flat root level rather than drifting into independent roots.
        let t = Topology::plan_star(20, 8);
        assert_eq!(t.levels(), 2);
        assert_eq!(t.groups_at(0), 3);
        assert_eq!(t.groups_at(1), 1);
        assert_eq!(t.member_count(1, 0), 3);
        assert!(!t.is_top_level(0));
        assert!(t.is_top_level(1));
    }

    #[test]
    fn star_within_a_single_leaf_group_stays_flat() {
        let t = Topology::plan_star(5, 8);
        assert_eq!(t.levels(), 1);
        assert!(t.is_top_level(0));
    }

    #[test]
    fn perfect_hstar_64() {
        // An evenly divisible two-level hierarchy: N=64, G=8, K=8 -> L=2, groups[0]=8, groups[1]=1.
        let t = Topology::plan(64, 8, 8);
        assert_eq!(t.levels(), 2);
        assert_eq!(t.groups_at(0), 8);
        assert_eq!(t.groups_at(1), 1);
        for g in 0..8 {
            assert_eq!(t.owner(0, g), g * 8);
            assert_eq!(t.member_count(0, g), 8);
        }
        assert_eq!(t.owner(1, 0), 0);
        assert_eq!(t.member_count(1, 0), 8);
    }

    #[test]
    fn non_divisible_hstar_70() {
        // A non-divisible two-level hierarchy with a tail group: N=70, G=8, K=8 -> L=2, groups[0]=9, groups[1]=1.
        let t = Topology::plan(70, 8, 8);
        assert_eq!(t.levels(), 2);
        assert_eq!(t.groups_at(0), 9);
        assert_eq!(t.groups_at(1), 1);
        assert_eq!(t.owner(0, 8), 64);
        assert_eq!(t.member_count(0, 8), 6);
        assert_eq!(t.member_count(1, 0), 9);
    }

    #[test]
    fn tail_group_has_no_phantom_children() {
        let t = Topology::plan(70, 8, 8);
        // One level-0 group beyond the real 9 must not be addressed.
        assert_eq!(t.groups_at(0), 9);
    }

    #[test]
    fn group_of_and_owner_are_consistent() {
        let t = Topology::plan(70, 8, 8);
        for pe in 0..70 {
            let g = t.group_of(0, pe);
            let owner = t.owner(0, g);
            assert!(pe >= owner && pe < owner + t.member_count(0, g));
        }
    }
}
