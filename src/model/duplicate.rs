//! Structural duplication of group subtrees.
//!
//! A copy runs in two passes. The define pass walks the source depth first
//! and declares every group, dimension, variable and attribute in the
//! destination, then commits the definitions. The write pass walks the plan
//! recorded during the first pass and moves the array data, optionally
//! keeping only selected positions along some dimensions.
//!
//! Dimensions are mapped per path: each group passes its children a map
//! from source dimension to destination dimension that extends the one it
//! received. A dimension is declared in the destination the first time a
//! path reaches it, and every deeper group reuses that declaration.

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::{DimLength, IndexSelection};
use crate::util::{EntityKind, Error, Result};

use super::dimension::{join_path, Dimension};
use super::group::Group;
use super::variable::Variable;

/// What to do when the destination already holds an entity of the same name.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExistingPolicy {
    /// Reuse it when its layout matches, fail with
    /// [`Error::SchemaInconsistent`] otherwise.
    #[default]
    ReuseIdentical,
    /// Always fail with [`Error::DuplicateName`].
    Fail,
}

/// Options for [`Group::duplicate`] and [`Duplicator`].
#[derive(Clone, Debug, Default)]
pub struct DuplicateOptions {
    selections: Vec<(String, IndexSelection)>,
    existing: ExistingPolicy,
}

impl DuplicateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only `selection` along the dimension named by `dimension`
    /// (a name or path resolved from the source group).
    pub fn select(mut self, dimension: impl Into<String>, selection: impl Into<IndexSelection>) -> Self {
        self.selections.push((dimension.into(), selection.into()));
        self
    }

    pub fn existing(mut self, policy: ExistingPolicy) -> Self {
        self.existing = policy;
        self
    }

    pub fn selections(&self) -> &[(String, IndexSelection)] {
        &self.selections
    }
}

/// Counts gathered while copying.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DuplicateReport {
    pub groups: usize,
    pub dimensions: usize,
    pub variables: usize,
    pub arrays_written: usize,
    pub values_written: usize,
}

/// Source-to-destination dimension map visible along one path.
///
/// Extending returns a new map, so siblings never see each other's entries.
#[derive(Clone, Default)]
struct InheritedDims {
    by_source: HashMap<String, Dimension>,
}

impl InheritedDims {
    fn get(&self, source: &Dimension) -> Option<&Dimension> {
        self.by_source.get(&source.full_path())
    }

    fn extended(&self, pairs: &[(Dimension, Dimension)]) -> Self {
        let mut next = self.clone();
        for (source, dest) in pairs {
            next.by_source.insert(source.full_path(), dest.clone());
        }
        next
    }
}

struct VariableTask {
    name: String,
    /// (axis, 0-based positions) to keep.
    slices: Vec<(usize, Arc<Vec<usize>>)>,
}

struct GroupPlan {
    source: Group,
    dest: Group,
    variables: Vec<VariableTask>,
    children: Vec<GroupPlan>,
}

impl GroupPlan {
    fn new(source: Group, dest: Group) -> Self {
        Self {
            source,
            dest,
            variables: Vec::new(),
            children: Vec::new(),
        }
    }
}

/// Copies the contents of one group into another.
pub struct Duplicator {
    source: Group,
    existing: ExistingPolicy,
    /// Source dimension path to kept 0-based positions.
    selections: HashMap<String, Arc<Vec<usize>>>,
}

impl Duplicator {
    /// Validate `options` against `source`. Unknown or ambiguous dimensions
    /// and out-of-range selections are reported here, before anything is
    /// created.
    pub fn new(source: &Group, options: &DuplicateOptions) -> Result<Self> {
        let mut selections = HashMap::new();
        for (name, selection) in options.selections() {
            let dim = source.dimension(name)?;
            let positions = selection.resolve(dim.len())?;
            if selections.insert(dim.full_path(), Arc::new(positions)).is_some() {
                return Err(Error::InvalidTruncation(format!(
                    "dimension {} is selected more than once",
                    dim.full_path()
                )));
            }
        }
        Ok(Self {
            source: source.clone(),
            existing: options.existing,
            selections,
        })
    }

    /// Copy the source group's attributes, dimensions, variables and child
    /// groups into `dest`.
    ///
    /// A failure during the define pass returns before the destination is
    /// committed. A failure during the write pass abandons the rest of the
    /// affected subtree, finishes the others and returns
    /// [`Error::IncompleteCopy`].
    pub fn copy_into(&self, dest: &Group) -> Result<DuplicateReport> {
        let mut report = DuplicateReport::default();
        let mut plan = GroupPlan::new(self.source.clone(), dest.clone());
        self.define_group(&self.source, dest, &InheritedDims::default(), &mut plan, &mut report)?;
        dest.backend().lock().end_define()?;
        tracing::debug!(
            "defined copy of {} in {}: {} group(s), {} dimension(s), {} variable(s)",
            self.source.path(),
            dest.path(),
            report.groups,
            report.dimensions,
            report.variables
        );

        let mut failures = Vec::new();
        self.write_group(&plan, &mut failures, &mut report);
        if failures.is_empty() {
            tracing::info!(
                "copied {} into {} ({} array(s), {} value(s))",
                self.source.path(),
                dest.path(),
                report.arrays_written,
                report.values_written
            );
            return Ok(report);
        }
        let failed = failures.iter().map(|(path, _)| path.clone()).collect();
        let (_, first) = failures.remove(0);
        Err(Error::IncompleteCopy {
            failed,
            first: Box::new(first),
        })
    }

    // ========================================================================
    // Define pass
    // ========================================================================

    fn define_group(
        &self,
        src: &Group,
        dst: &Group,
        inherited: &InheritedDims,
        plan: &mut GroupPlan,
        report: &mut DuplicateReport,
    ) -> Result<()> {
        for (key, value) in src.attributes().iter() {
            dst.set_attribute(key, value.clone())?;
        }

        let mut local = Vec::new();
        for dim in src.dimensions() {
            if inherited.get(&dim).is_some() {
                continue;
            }
            let target = self.declare_dimension(src, dst, &dim, report)?;
            local.push((dim, target));
        }
        let scope = inherited.extended(&local);

        for var in src.variables() {
            let dims = var
                .dimensions()
                .iter()
                .map(|d| {
                    scope.get(d).cloned().ok_or_else(|| {
                        Error::schema(format!(
                            "dimension {} of variable {} is not visible from {}",
                            d.full_path(),
                            join_path(src.path(), var.name()),
                            src.path()
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            self.declare_variable(dst, &var, dims, report)?;

            let slices = var
                .dimensions()
                .iter()
                .enumerate()
                .filter_map(|(axis, d)| self.selections.get(&d.full_path()).map(|p| (axis, p.clone())))
                .collect();
            plan.variables.push(VariableTask {
                name: var.name().to_string(),
                slices,
            });
        }

        for child in src.children() {
            let dst_child = self.declare_group(dst, &child, report)?;
            let mut child_plan = GroupPlan::new(child.clone(), dst_child.clone());
            self.define_group(&child, &dst_child, &scope, &mut child_plan, report)?;
            plan.children.push(child_plan);
        }
        Ok(())
    }

    /// Declare the copy of `src` in `dst`. A dimension the source group owns
    /// is matched only against dimensions `dst` owns, so a copied group that
    /// shadows an ancestor's dimension shadows it in the destination too.
    /// One the source group inherits may reuse any dimension visible in `dst`.
    fn declare_dimension(
        &self,
        src_group: &Group,
        dst: &Group,
        src: &Dimension,
        report: &mut DuplicateReport,
    ) -> Result<Dimension> {
        let length = match src.length() {
            DimLength::Growable => DimLength::Growable,
            DimLength::Fixed(n) => DimLength::Fixed(
                self.selections
                    .get(&src.full_path())
                    .map_or(n, |p| p.len()),
            ),
        };
        let owned = src.group_path() == src_group.path();
        let existing = dst
            .local_dimension(src.name())
            .filter(|d| !owned || d.group_path() == dst.path());
        if let Some(existing) = existing {
            return match self.existing {
                ExistingPolicy::ReuseIdentical if existing.length() == length => Ok(existing),
                ExistingPolicy::ReuseIdentical => Err(Error::schema(format!(
                    "dimension {} already exists with length {}, copy needs {}",
                    existing.full_path(),
                    existing.length(),
                    length
                ))),
                ExistingPolicy::Fail => Err(Error::duplicate(EntityKind::Dimension, src.name(), dst.path())),
            };
        }
        report.dimensions += 1;
        dst.define_dimension(src.name(), length)
    }

    fn declare_variable(
        &self,
        dst: &Group,
        var: &Variable,
        dims: Vec<Dimension>,
        report: &mut DuplicateReport,
    ) -> Result<()> {
        if let Some(existing) = dst.local_variable(var.name()) {
            let same_dims = existing.dimensions().len() == dims.len()
                && existing.dimensions().iter().zip(&dims).all(|(a, b)| a.same_as(b));
            return match self.existing {
                ExistingPolicy::ReuseIdentical if same_dims && existing.same_layout(var) => {
                    for (key, value) in var.attributes().user_entries() {
                        dst.set_local_variable_attribute(var.name(), key, value.clone())?;
                    }
                    Ok(())
                }
                ExistingPolicy::ReuseIdentical => Err(Error::schema(format!(
                    "variable {} already exists with a different layout",
                    join_path(dst.path(), var.name())
                ))),
                ExistingPolicy::Fail => Err(Error::duplicate(EntityKind::Variable, var.name(), dst.path())),
            };
        }
        match var {
            Variable::Real(v) => {
                dst.define_real(v.name(), v.scalar_type(), dims, v.attributes().clone())?;
            }
            Variable::Complex(c) => {
                dst.define_complex(c.name(), c.scalar_type(), dims, c.attributes())?;
            }
        }
        report.variables += 1;
        Ok(())
    }

    fn declare_group(&self, dst: &Group, src: &Group, report: &mut DuplicateReport) -> Result<Group> {
        if let Some(existing) = dst.child(src.name()) {
            return match self.existing {
                ExistingPolicy::ReuseIdentical => Ok(existing),
                ExistingPolicy::Fail => Err(Error::duplicate(EntityKind::Group, src.name(), dst.path())),
            };
        }
        report.groups += 1;
        dst.add_group(src.name())
    }

    // ========================================================================
    // Write pass
    // ========================================================================

    fn write_group(&self, plan: &GroupPlan, failures: &mut Vec<(String, Error)>, report: &mut DuplicateReport) {
        for task in &plan.variables {
            if let Err(err) = self.copy_variable(plan, task, report) {
                let path = join_path(plan.source.path(), &task.name);
                tracing::warn!("copy of {} failed, skipping the rest of {}: {}", path, plan.source.path(), err);
                failures.push((path, err));
                return;
            }
        }
        for child in &plan.children {
            self.write_group(child, failures, report);
        }
    }

    fn copy_variable(&self, plan: &GroupPlan, task: &VariableTask, report: &mut DuplicateReport) -> Result<()> {
        let mut data = plan.source.read(&task.name)?;
        for (axis, positions) in &task.slices {
            data = data.select(*axis, positions)?;
        }
        plan.dest.write_local(&task.name, &data)?;
        report.arrays_written += 1;
        report.values_written += data.shape().num_points();
        Ok(())
    }
}

impl Group {
    /// Copy this group and its subtree to a new child `name` of `parent`.
    ///
    /// The parent may belong to another dataset. If the copy fails the new
    /// group is left half-built and should be discarded along with its
    /// dataset.
    pub fn duplicate(&self, parent: &Group, name: &str, options: &DuplicateOptions) -> Result<Group> {
        let duplicator = Duplicator::new(self, options)?;
        let mut ancestor = Some(parent.clone());
        while let Some(group) = ancestor {
            if group.same_as(self) {
                return Err(Error::schema(format!(
                    "cannot copy {} into its own subtree",
                    self.path()
                )));
            }
            ancestor = group.parent();
        }
        if parent.child(name).is_some() {
            return Err(Error::duplicate(EntityKind::Group, name, parent.path()));
        }
        let dest = parent.add_group(name)?;
        duplicator.copy_into(&dest)?;
        Ok(dest)
    }
}
